//! Fixed binary layouts of the native driver's packets.
//!
//! All multi-byte fields are little-endian and the structs are packed, so
//! every slot is read by value with `bytemuck::pod_read_unaligned` and the
//! fields copied out. Sizes are pinned by compile-time assertions.

use bytemuck::{Pod, Zeroable};

use crate::error::CodecError;

/// Real-time quote slot size in bytes.
pub const QUOTE_SLOT_SIZE: usize = 158;
/// Market table header size in bytes. Symbol entries start right after it.
pub const MARKET_HEADER_SIZE: usize = 54;
/// Symbol table entry size in bytes.
pub const SYMBOL_SLOT_SIZE: usize = 44;
/// Daily bar slot size in bytes.
pub const DAILY_SLOT_SIZE: usize = 32;
/// Ex-rights slot size in bytes.
pub const EX_RIGHTS_SLOT_SIZE: usize = 24;
/// Receive header handed alongside every non-table packet.
pub const RECV_HEADER_SIZE: usize = 8;

/// Sentinel in the first 4 bytes of an interleaved slot: the slot is a
/// stock-context header, not data.
pub const HEAD_TAG: u32 = 0xFFFF_FFFF;

/// Record count cap for everything except the symbol table. Larger claims
/// are clamped, not rejected.
pub const MAX_RECORD_COUNT: usize = 10_000;
/// Symbol table entry cap (the header field is a u16).
pub const MAX_SYMBOL_COUNT: usize = 65_535;
/// Slow-lane claims above this are garbage headers and reject the packet.
pub const REJECT_COUNT_LIMIT: usize = 100_000;
/// Copied payload cap for slow-lane packets.
pub const MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;
/// Copied payload cap for real-time packets (bursts run large).
pub const MAX_QUOTE_PAYLOAD_BYTES: usize = 50 * 1024 * 1024 + 1024;

/// Kind of packet the driver callback delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    RealTime,
    SymbolTable,
    DailyBar,
    ExRights,
    MinuteBar,
    FiveMinuteBar,
}

impl PacketKind {
    /// Dispatch priority: 0 is most urgent.
    pub fn priority(self) -> u8 {
        match self {
            PacketKind::RealTime => 0,
            PacketKind::SymbolTable => 1,
            _ => 2,
        }
    }

    /// Only real-time quotes ride the fast lane.
    pub fn is_fast_lane(self) -> bool {
        self.priority() == 0
    }

    /// Bytes per entry in this packet's data region.
    pub fn slot_size(self) -> usize {
        match self {
            PacketKind::RealTime => QUOTE_SLOT_SIZE,
            PacketKind::SymbolTable => SYMBOL_SLOT_SIZE,
            PacketKind::DailyBar => DAILY_SLOT_SIZE,
            PacketKind::ExRights => EX_RIGHTS_SLOT_SIZE,
            // Minute slots share the daily bar layout.
            PacketKind::MinuteBar | PacketKind::FiveMinuteBar => DAILY_SLOT_SIZE,
        }
    }

    fn count_cap(self) -> usize {
        match self {
            PacketKind::SymbolTable => MAX_SYMBOL_COUNT,
            _ => MAX_RECORD_COUNT,
        }
    }

    fn payload_cap(self) -> usize {
        match self {
            PacketKind::RealTime => MAX_QUOTE_PAYLOAD_BYTES,
            _ => MAX_PAYLOAD_BYTES,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PacketKind::RealTime => "realtime",
            PacketKind::SymbolTable => "symbols",
            PacketKind::DailyBar => "daily",
            PacketKind::ExRights => "ex_rights",
            PacketKind::MinuteBar => "minute",
            PacketKind::FiveMinuteBar => "five_minute",
        }
    }
}

/// Real-time quote slot. Bid/ask levels 4 and 5 live outside the arrays
/// and are merged by the decoder.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct QuoteSlot {
    pub cb_size: u16,
    pub time: i32,
    pub market: u16,
    pub label: [u8; 10],
    pub name: [u8; 32],
    pub last_close: f32,
    pub open: f32,
    pub high: f32,
    pub low: f32,
    pub new_price: f32,
    pub volume: f32,
    pub amount: f32,
    pub buy_price: [f32; 3],
    pub buy_volume: [f32; 3],
    pub sell_price: [f32; 3],
    pub sell_volume: [f32; 3],
    pub buy_price4: f32,
    pub buy_volume4: f32,
    pub buy_price5: f32,
    pub buy_volume5: f32,
    pub sell_price4: f32,
    pub sell_volume4: f32,
    pub sell_price5: f32,
    pub sell_volume5: f32,
}

/// Header at the front of a market table payload.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct MarketHeader {
    pub name: [u8; 50],
    pub data_type: u16,
    pub entry_count: u16,
}

/// One symbol table entry.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct SymbolSlot {
    pub time: i32,
    pub market: u16,
    pub label: [u8; 10],
    pub name: [u8; 28],
}

/// One daily (or minute) bar slot.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct DailySlot {
    pub time: i32,
    pub open: f32,
    pub high: f32,
    pub low: f32,
    pub close: f32,
    pub volume: f32,
    pub amount: f32,
    pub advance: u16,
    pub decline: u16,
}

/// One ex-rights slot.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct ExRightsSlot {
    pub time: i32,
    pub give: f32,
    pub pei: f32,
    pub pei_price: f32,
    pub profit: f32,
    pub reserved: [u8; 4],
}

/// Prefix of an interleaved slot when it carries a stock-context header
/// instead of data.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct ContextHeader {
    pub tag: u32,
    pub market: u16,
    pub label: [u8; 10],
}

/// Receive header for quote/bar/ex-rights callbacks.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct RecvHeader {
    pub data_type: i32,
    pub record_count: i32,
}

const _: () = assert!(std::mem::size_of::<QuoteSlot>() == QUOTE_SLOT_SIZE);
const _: () = assert!(std::mem::size_of::<MarketHeader>() == MARKET_HEADER_SIZE);
const _: () = assert!(std::mem::size_of::<SymbolSlot>() == SYMBOL_SLOT_SIZE);
const _: () = assert!(std::mem::size_of::<DailySlot>() == DAILY_SLOT_SIZE);
const _: () = assert!(std::mem::size_of::<ExRightsSlot>() == EX_RIGHTS_SLOT_SIZE);
const _: () = assert!(std::mem::size_of::<ContextHeader>() == 16);
const _: () = assert!(std::mem::size_of::<RecvHeader>() == RECV_HEADER_SIZE);

/// Fields lifted out of a packet's header at callback time.
#[derive(Debug, Clone, Copy)]
pub struct PacketHeader {
    pub record_count: usize,
}

/// Extract and validate the record count from the kind-specific header.
pub fn parse_packet_header(kind: PacketKind, header: &[u8]) -> Result<PacketHeader, CodecError> {
    let count = match kind {
        PacketKind::SymbolTable => {
            if header.len() < MARKET_HEADER_SIZE {
                return Err(CodecError::HeaderTooShort {
                    got: header.len(),
                    need: MARKET_HEADER_SIZE,
                });
            }
            let mh: MarketHeader =
                bytemuck::pod_read_unaligned(&header[..MARKET_HEADER_SIZE]);
            i64::from(mh.entry_count)
        }
        _ => {
            if header.len() < RECV_HEADER_SIZE {
                return Err(CodecError::HeaderTooShort {
                    got: header.len(),
                    need: RECV_HEADER_SIZE,
                });
            }
            let rh: RecvHeader = bytemuck::pod_read_unaligned(&header[..RECV_HEADER_SIZE]);
            i64::from(rh.record_count)
        }
    };

    if count <= 0 {
        return Err(CodecError::InvalidCount(count));
    }
    let count = count as usize;
    // A real-time burst legitimately overshoots the cap; slow-lane claims
    // this large only come from corrupt headers.
    if kind != PacketKind::RealTime && count > REJECT_COUNT_LIMIT {
        return Err(CodecError::CountExceedsCap {
            count,
            cap: REJECT_COUNT_LIMIT,
        });
    }
    Ok(PacketHeader {
        record_count: count.min(kind.count_cap()),
    })
}

/// How many bytes to copy out of the entry region for `count` records.
///
/// The region length is authoritative: when the driver claims more records
/// than the region holds, only the complete slots present are taken. An
/// empty region against a positive count is the stale-pointer case and is
/// rejected outright.
pub fn payload_len(
    kind: PacketKind,
    count: usize,
    entries_len: usize,
) -> Result<usize, CodecError> {
    if entries_len == 0 {
        return Err(CodecError::EmptyEntries(count));
    }
    let slot = kind.slot_size();
    let complete = (entries_len / slot).min(count);
    if complete == 0 {
        return Err(CodecError::EmptyEntries(count));
    }
    let bytes = complete * slot;
    let cap = kind.payload_cap();
    if bytes > cap {
        return Err(CodecError::PayloadTooLarge { bytes, cap });
    }
    Ok(bytes)
}

/// Decode a NUL-padded fixed byte field to a trimmed string. Names arrive
/// in a legacy multibyte encoding; invalid sequences degrade lossily.
pub fn fixed_str(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recv_header(count: i32) -> Vec<u8> {
        let mut h = vec![0u8; RECV_HEADER_SIZE];
        h[4..8].copy_from_slice(&count.to_le_bytes());
        h
    }

    fn market_header(count: u16) -> Vec<u8> {
        let mut h = vec![0u8; MARKET_HEADER_SIZE];
        h[52..54].copy_from_slice(&count.to_le_bytes());
        h
    }

    #[test]
    fn parses_recv_header_count() {
        let h = recv_header(42);
        let parsed = parse_packet_header(PacketKind::RealTime, &h).unwrap();
        assert_eq!(parsed.record_count, 42);
    }

    #[test]
    fn parses_market_header_count() {
        let h = market_header(6000);
        let parsed = parse_packet_header(PacketKind::SymbolTable, &h).unwrap();
        assert_eq!(parsed.record_count, 6000);
    }

    #[test]
    fn rejects_nonpositive_count() {
        assert!(matches!(
            parse_packet_header(PacketKind::DailyBar, &recv_header(0)),
            Err(CodecError::InvalidCount(0))
        ));
        assert!(matches!(
            parse_packet_header(PacketKind::DailyBar, &recv_header(-5)),
            Err(CodecError::InvalidCount(-5))
        ));
    }

    #[test]
    fn clamps_count_over_cap() {
        // An oversized real-time burst is taken at the cap, never dropped.
        let parsed = parse_packet_header(PacketKind::RealTime, &recv_header(10_001)).unwrap();
        assert_eq!(parsed.record_count, 10_000);
        let parsed = parse_packet_header(PacketKind::RealTime, &recv_header(500_000)).unwrap();
        assert_eq!(parsed.record_count, 10_000);

        let parsed = parse_packet_header(PacketKind::DailyBar, &recv_header(50_000)).unwrap();
        assert_eq!(parsed.record_count, 10_000);

        // The symbol table cap is the full u16 range, so any header parses.
        let parsed = parse_packet_header(PacketKind::SymbolTable, &market_header(u16::MAX));
        assert!(parsed.is_ok());
    }

    #[test]
    fn rejects_garbage_slow_lane_count() {
        assert!(matches!(
            parse_packet_header(PacketKind::DailyBar, &recv_header(100_001)),
            Err(CodecError::CountExceedsCap {
                count: 100_001,
                ..
            })
        ));
        assert!(matches!(
            parse_packet_header(PacketKind::ExRights, &recv_header(2_000_000)),
            Err(CodecError::CountExceedsCap { .. })
        ));
    }

    #[test]
    fn rejects_short_header() {
        assert!(matches!(
            parse_packet_header(PacketKind::RealTime, &[0u8; 4]),
            Err(CodecError::HeaderTooShort { got: 4, need: 8 })
        ));
    }

    #[test]
    fn payload_len_truncates_to_complete_slots() {
        // 2.5 slots worth of bytes but a claimed count of 5.
        let len = QUOTE_SLOT_SIZE * 2 + QUOTE_SLOT_SIZE / 2;
        assert_eq!(
            payload_len(PacketKind::RealTime, 5, len).unwrap(),
            QUOTE_SLOT_SIZE * 2
        );
    }

    #[test]
    fn payload_len_rejects_empty_region() {
        assert!(matches!(
            payload_len(PacketKind::DailyBar, 3, 0),
            Err(CodecError::EmptyEntries(3))
        ));
    }

    #[test]
    fn fixed_str_trims_nul_padding() {
        assert_eq!(fixed_str(b"SH600000\0\0"), "SH600000");
        assert_eq!(fixed_str(b"\0\0\0\0"), "");
        assert_eq!(fixed_str(b"  ABC \0\0"), "ABC");
    }
}
