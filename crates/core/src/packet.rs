//! Owned packets queued between the driver callback and the consumers.

use std::time::Instant;

use mdbridge_codec::PacketKind;

/// A packet copied out of the driver's transient buffer. The payload is
/// exactly `record_count` complete slots of `kind`'s layout; nothing in
/// here refers back to driver memory.
#[derive(Debug, Clone)]
pub struct RawPacket {
    pub kind: PacketKind,
    pub record_count: usize,
    pub payload: Vec<u8>,
    pub captured_at: Instant,
}

impl RawPacket {
    /// Copy `bytes` from the entry region. Must happen inside the callback
    /// window, while the region is still valid.
    pub fn capture(kind: PacketKind, record_count: usize, entries: &[u8], bytes: usize) -> Self {
        Self {
            kind,
            record_count,
            payload: entries[..bytes].to_vec(),
            captured_at: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_copies_only_the_complete_slots() {
        let entries = vec![7u8; 100];
        let packet = RawPacket::capture(PacketKind::ExRights, 3, &entries, 72);
        assert_eq!(packet.payload.len(), 72);
        assert_eq!(packet.record_count, 3);
        assert!(packet.payload.iter().all(|&b| b == 7));
    }
}
