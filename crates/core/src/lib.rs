//! mdbridge-core: runtime for the market-data ingestion bridge.
//!
//! The native driver delivers transient binary buffers through a
//! synchronous callback. [`Bridge::on_feed_data`] copies them into owned
//! packets and feeds a two-lane priority queue; dedicated consumer threads
//! decode the payloads and republish them per category to the broker over
//! the framed TCP protocol.

pub mod batch;
pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod packet;
pub mod queue;
pub mod sender;
pub mod server;
pub mod stats;

pub use batch::{BatchBuffer, BatchingSender};
pub use bridge::Bridge;
pub use config::{BridgeConfig, BrokerConfig, ChannelFlags, QueueNames};
pub use dispatch::Dispatcher;
pub use error::{ConfigError, SendError};
pub use packet::RawPacket;
pub use queue::{ConsumerHandles, EnqueueOutcome, IngestQueue, PacketHandler, QueueLimits};
pub use sender::{ChannelSender, SendStatus, SenderConfig};
pub use server::{create_router, run_server, ServerState};
pub use stats::{BridgeStats, Category};
