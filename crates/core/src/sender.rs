//! Per-category TCP sender for the broker's framed protocol.
//!
//! Each sender owns one connection and is driven by exactly one thread.
//! Reconnects are throttled so a dead broker costs one connect attempt per
//! interval instead of one per packet. The post-frame ACK is advisory: a
//! missing or mangled ACK is logged and reported as [`SendStatus::WrittenNoAck`],
//! not as a failure.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use socket2::{SockRef, TcpKeepalive};
use tracing::{debug, info, warn};

use mdbridge_codec::{encode_frame, ACK_BYTES, ACK_LEN};

use crate::error::SendError;
use crate::stats::Category;

/// Keepalive probing after 10 s idle, every 5 s.
const KEEPALIVE_IDLE: Duration = Duration::from_secs(10);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);

/// Reconnect throttle for the slow categories.
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);
/// Real-time reconnects faster; its data goes stale in seconds.
pub const RECONNECT_INTERVAL_REALTIME: Duration = Duration::from_secs(2);
/// Real-time sends use a tight IO timeout instead of the configured one.
pub const REALTIME_IO_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub category: Category,
    pub host: String,
    pub port: u16,
    pub queue_name: String,
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
    pub reconnect_interval: Duration,
}

/// What a successful send actually achieved on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Frame written and the broker acknowledged it.
    Acknowledged,
    /// Frame written but the ACK was missing or malformed.
    WrittenNoAck,
}

pub struct ChannelSender {
    config: SenderConfig,
    stream: Option<TcpStream>,
    last_attempt: Option<Instant>,
    connect_attempts: u64,
}

impl ChannelSender {
    pub fn new(config: SenderConfig) -> Self {
        Self {
            config,
            stream: None,
            last_attempt: None,
            connect_attempts: 0,
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.config.queue_name
    }

    /// Real connect attempts made so far (throttled calls do not count).
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn ensure_connected(&mut self) -> Result<(), SendError> {
        if self.stream.is_some() {
            return Ok(());
        }
        if let Some(last) = self.last_attempt {
            if last.elapsed() < self.config.reconnect_interval {
                return Err(SendError::NotConnected(
                    "reconnect throttled".to_string(),
                ));
            }
        }
        self.last_attempt = Some(Instant::now());
        self.connect_attempts += 1;

        let addr = (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                SendError::NotConnected(format!("{} resolved to nothing", self.config.host))
            })?;
        let stream = TcpStream::connect_timeout(&addr, self.config.connect_timeout)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(self.config.io_timeout))?;
        stream.set_write_timeout(Some(self.config.io_timeout))?;
        let keepalive = TcpKeepalive::new()
            .with_time(KEEPALIVE_IDLE)
            .with_interval(KEEPALIVE_INTERVAL);
        SockRef::from(&stream).set_tcp_keepalive(&keepalive)?;

        info!(
            category = self.config.category.name(),
            queue = %self.config.queue_name,
            peer = %addr,
            "connected to broker"
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn teardown(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
    }

    pub fn close(&mut self) {
        if self.stream.is_some() {
            debug!(
                category = self.config.category.name(),
                "closing broker connection"
            );
            self.teardown();
        }
    }

    /// Frame `payload` for this sender's queue and write it, then read the
    /// advisory ACK. Write failures tear the connection down; the next call
    /// reconnects (subject to the throttle).
    pub fn send(&mut self, payload: &[u8]) -> Result<SendStatus, SendError> {
        self.ensure_connected()?;
        let frame = encode_frame(&self.config.queue_name, payload);
        let Some(stream) = self.stream.as_mut() else {
            return Err(SendError::NotConnected("no stream after connect".to_string()));
        };

        if let Err(e) = stream.write_all(&frame) {
            warn!(
                category = self.config.category.name(),
                error = %e,
                "write failed, dropping connection"
            );
            self.teardown();
            return Err(e.into());
        }

        let mut ack = [0u8; ACK_LEN];
        match stream.read_exact(&mut ack) {
            Ok(()) if ack[..ACK_BYTES.len()] == *ACK_BYTES => Ok(SendStatus::Acknowledged),
            Ok(()) => {
                warn!(
                    category = self.config.category.name(),
                    ack = ?ack,
                    "unexpected ack bytes"
                );
                Ok(SendStatus::WrittenNoAck)
            }
            Err(e) if matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ) =>
            {
                warn!(
                    category = self.config.category.name(),
                    "ack timed out"
                );
                Ok(SendStatus::WrittenNoAck)
            }
            Err(e) => {
                warn!(
                    category = self.config.category.name(),
                    error = %e,
                    "ack read failed, dropping connection"
                );
                self.teardown();
                Ok(SendStatus::WrittenNoAck)
            }
        }
    }
}

impl Drop for ChannelSender {
    fn drop(&mut self) {
        self.teardown();
    }
}
