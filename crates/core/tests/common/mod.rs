//! In-process mock broker for sender and end-to-end tests.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use mdbridge_codec::{decode_frame, Frame};

pub struct MockBroker {
    pub addr: SocketAddr,
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl MockBroker {
    /// Accept connections, record every frame, answer each with `ack`.
    pub fn start(ack: [u8; 4]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let frames = Arc::new(Mutex::new(Vec::new()));

        let accept_frames = Arc::clone(&frames);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let frames = Arc::clone(&accept_frames);
                thread::spawn(move || {
                    while let Some(frame) = read_frame(&mut stream) {
                        frames.lock().unwrap().push(frame);
                        if stream.write_all(&ack).is_err() {
                            break;
                        }
                    }
                });
            }
        });

        Self { addr, frames }
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn wait_for_frames(&self, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.frames.lock().unwrap().len() >= n {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }
}

fn read_frame(stream: &mut TcpStream) -> Option<Frame> {
    let mut len = [0u8; 4];
    stream.read_exact(&mut len).ok()?;
    let total = i32::from_le_bytes(len);
    if total < 4 {
        return None;
    }
    let mut body = vec![0u8; total as usize];
    stream.read_exact(&mut body).ok()?;

    let mut full = len.to_vec();
    full.extend(body);
    let (frame, _) = decode_frame(&full).ok()?;
    Some(frame)
}
