//! Wires config, stats, senders, dispatcher and queue together.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use mdbridge_codec::{parse_packet_header, payload_len, PacketKind};

use crate::batch::BatchingSender;
use crate::config::BridgeConfig;
use crate::dispatch::Dispatcher;
use crate::metrics;
use crate::packet::RawPacket;
use crate::queue::{ConsumerHandles, EnqueueOutcome, IngestQueue, PacketHandler};
use crate::sender::{
    ChannelSender, SenderConfig, REALTIME_IO_TIMEOUT, RECONNECT_INTERVAL,
    RECONNECT_INTERVAL_REALTIME,
};
use crate::stats::{BridgeStats, Category};

pub struct Bridge {
    config: BridgeConfig,
    stats: Arc<BridgeStats>,
    queue: Arc<IngestQueue>,
    dispatcher: Option<Arc<Dispatcher>>,
    handles: Option<ConsumerHandles>,
}

impl Bridge {
    pub fn new(config: BridgeConfig, stats: Arc<BridgeStats>) -> Self {
        let queue = IngestQueue::new(Arc::clone(&stats));
        Self {
            config,
            stats,
            queue,
            dispatcher: None,
            handles: None,
        }
    }

    pub fn queue(&self) -> Arc<IngestQueue> {
        Arc::clone(&self.queue)
    }

    pub fn stats(&self) -> Arc<BridgeStats> {
        Arc::clone(&self.stats)
    }

    fn sender_config(&self, category: Category, queue_name: &str) -> SenderConfig {
        let broker = &self.config.broker;
        let realtime = category == Category::RealTime;
        SenderConfig {
            category,
            host: broker.host.clone(),
            port: broker.port,
            queue_name: queue_name.to_string(),
            connect_timeout: Duration::from_millis(broker.connect_timeout_ms),
            io_timeout: if realtime {
                REALTIME_IO_TIMEOUT
            } else {
                Duration::from_millis(broker.send_timeout_ms)
            },
            reconnect_interval: if realtime {
                RECONNECT_INTERVAL_REALTIME
            } else {
                RECONNECT_INTERVAL
            },
        }
    }

    /// Build the enabled senders and start the consumer threads.
    pub fn start(&mut self) {
        if self.handles.is_some() {
            return;
        }
        let channels = self.config.channels.clone();
        let queues = self.config.queues.clone();

        let realtime = channels.realtime.then(|| {
            BatchingSender::start(
                ChannelSender::new(self.sender_config(Category::RealTime, &queues.realtime)),
                Arc::clone(&self.stats),
            )
        });
        let daily = channels
            .daily
            .then(|| ChannelSender::new(self.sender_config(Category::Daily, &queues.daily)));
        let ex_rights = channels.ex_rights.then(|| {
            ChannelSender::new(self.sender_config(Category::ExRights, &queues.ex_rights))
        });
        let symbols = channels
            .symbols
            .then(|| ChannelSender::new(self.sender_config(Category::Symbols, &queues.symbols)));

        let dispatcher = Arc::new(Dispatcher::new(
            realtime,
            daily,
            ex_rights,
            symbols,
            Arc::clone(&self.stats),
        ));
        self.handles = Some(
            self.queue
                .start(Arc::clone(&dispatcher) as Arc<dyn PacketHandler>),
        );
        self.dispatcher = Some(dispatcher);
        info!(
            broker = %self.config.broker.host,
            port = self.config.broker.port,
            "bridge started"
        );
    }

    /// Stop consumers first so nothing new reaches the senders, then let
    /// the dispatcher flush and close its connections.
    pub fn stop(&mut self) {
        if let Some(handles) = self.handles.take() {
            self.queue.stop(handles);
        }
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.shutdown();
        }
        info!("bridge stopped");
    }

    /// Entry point for the driver callback shim. Both slices are only
    /// valid for the duration of the call; everything worth keeping is
    /// copied here.
    pub fn on_feed_data(
        &self,
        kind: PacketKind,
        header: &[u8],
        entries: &[u8],
    ) -> EnqueueOutcome {
        let parsed = match parse_packet_header(kind, header) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(kind = kind.name(), error = %e, "rejected packet header");
                metrics::inc_packets_dropped("rejected", 1);
                return EnqueueOutcome::Rejected;
            }
        };
        let bytes = match payload_len(kind, parsed.record_count, entries.len()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    kind = kind.name(),
                    count = parsed.record_count,
                    error = %e,
                    "rejected packet payload"
                );
                metrics::inc_packets_dropped("rejected", 1);
                return EnqueueOutcome::Rejected;
            }
        };
        let count = bytes / kind.slot_size();
        if count < parsed.record_count {
            warn!(
                kind = kind.name(),
                claimed = parsed.record_count,
                complete = count,
                "entry region shorter than claimed, taking complete slots only"
            );
        }
        self.queue
            .enqueue(RawPacket::capture(kind, count, entries, bytes))
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if self.handles.is_some() {
            self.stop();
        }
    }
}
