//! mdbridge-codec: binary layouts, decoders and wire encoding for the
//! native stock driver feed.
//!
//! Everything here is pure bytes-in / values-out: no sockets, no threads.
//! The runtime crate owns queues, senders and lifecycle.

pub mod decode;
pub mod error;
pub mod frame;
pub mod json;
pub mod layout;
pub mod normalize;
pub mod records;

pub use decode::{decode_daily_bars, decode_ex_rights, decode_quotes, decode_symbols, Decoded};
pub use error::{CodecError, FrameError};
pub use frame::{decode_frame, encode_frame, Frame, ACK_BYTES, ACK_LEN};
pub use layout::{parse_packet_header, payload_len, PacketHeader, PacketKind};
pub use records::{DailyBarRecord, ExRightsRecord, QuoteRecord, SymbolRecord};
