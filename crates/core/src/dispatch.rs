//! Routes drained packets to the outbound senders.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use mdbridge_codec::{
    decode_daily_bars, decode_ex_rights, decode_quotes, decode_symbols, json, PacketKind,
};

use crate::batch::BatchingSender;
use crate::packet::RawPacket;
use crate::queue::PacketHandler;
use crate::sender::ChannelSender;
use crate::stats::{BridgeStats, Category};

fn lock(m: &Mutex<ChannelSender>) -> MutexGuard<'_, ChannelSender> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Decodes packets and hands records to the category senders. Slow-lane
/// sends happen inline on the slow consumer thread; real-time batches go
/// through the batching sender.
pub struct Dispatcher {
    realtime: Option<BatchingSender>,
    daily: Option<Mutex<ChannelSender>>,
    ex_rights: Option<Mutex<ChannelSender>>,
    symbols: Option<Mutex<ChannelSender>>,
    stats: Arc<BridgeStats>,
    // one warning per unhandled kind, ever
    unhandled_warned: [AtomicBool; 6],
    // first skipped-slot warning is loud, the rest are debug
    skip_warned: AtomicBool,
}

impl Dispatcher {
    pub fn new(
        realtime: Option<BatchingSender>,
        daily: Option<ChannelSender>,
        ex_rights: Option<ChannelSender>,
        symbols: Option<ChannelSender>,
        stats: Arc<BridgeStats>,
    ) -> Self {
        Self {
            realtime,
            daily: daily.map(Mutex::new),
            ex_rights: ex_rights.map(Mutex::new),
            symbols: symbols.map(Mutex::new),
            stats,
            unhandled_warned: Default::default(),
            skip_warned: AtomicBool::new(false),
        }
    }

    /// Stop the batching sender and close the slow connections.
    pub fn shutdown(&self) {
        if let Some(realtime) = &self.realtime {
            realtime.stop();
        }
        for sender in [&self.daily, &self.ex_rights, &self.symbols]
            .into_iter()
            .flatten()
        {
            lock(sender).close();
        }
    }

    fn warn_unhandled_once(&self, kind: PacketKind) {
        let idx = match kind {
            PacketKind::RealTime => 0,
            PacketKind::SymbolTable => 1,
            PacketKind::DailyBar => 2,
            PacketKind::ExRights => 3,
            PacketKind::MinuteBar => 4,
            PacketKind::FiveMinuteBar => 5,
        };
        if !self.unhandled_warned[idx].swap(true, Ordering::Relaxed) {
            warn!(
                kind = kind.name(),
                "no outbound channel for this packet kind, dropping (logged once)"
            );
        }
    }

    fn note_skipped(&self, kind: PacketKind, category: Category, skipped: usize) {
        self.stats.record_skipped(category, skipped);
        if !self.skip_warned.swap(true, Ordering::Relaxed) {
            warn!(
                kind = kind.name(),
                skipped, "skipped undecodable slots (further skips logged at debug)"
            );
        } else {
            debug!(kind = kind.name(), skipped, "skipped undecodable slots");
        }
    }

    fn send_slow(
        &self,
        sender: &Mutex<ChannelSender>,
        category: Category,
        records: usize,
        payload: &str,
    ) {
        match lock(sender).send(payload.as_bytes()) {
            Ok(_) => self.stats.record_send(category, records, payload.len()),
            Err(e) if e.is_throttled() => {
                self.stats.record_error(category);
                debug!(category = category.name(), "send skipped: {e}");
            }
            Err(e) => {
                self.stats.record_error(category);
                warn!(category = category.name(), error = %e, "send failed");
            }
        }
    }
}

impl PacketHandler for Dispatcher {
    fn handle(&self, packet: RawPacket) {
        match packet.kind {
            PacketKind::RealTime => {
                let decoded = decode_quotes(&packet.payload, packet.record_count);
                if decoded.skipped > 0 {
                    self.note_skipped(packet.kind, Category::RealTime, decoded.skipped);
                }
                if decoded.records.is_empty() {
                    return;
                }
                match &self.realtime {
                    Some(realtime) => realtime.submit(decoded.records),
                    None => self.warn_unhandled_once(packet.kind),
                }
            }
            PacketKind::DailyBar => {
                let decoded = decode_daily_bars(&packet.payload, packet.record_count);
                if decoded.skipped > 0 {
                    self.note_skipped(packet.kind, Category::Daily, decoded.skipped);
                }
                if decoded.records.is_empty() {
                    return;
                }
                match &self.daily {
                    Some(sender) => {
                        let payload = json::daily_payload(&decoded.records);
                        self.send_slow(sender, Category::Daily, decoded.records.len(), &payload);
                    }
                    None => self.warn_unhandled_once(packet.kind),
                }
            }
            PacketKind::ExRights => {
                let decoded = decode_ex_rights(&packet.payload, packet.record_count);
                if decoded.skipped > 0 {
                    self.note_skipped(packet.kind, Category::ExRights, decoded.skipped);
                }
                if decoded.records.is_empty() {
                    return;
                }
                match &self.ex_rights {
                    Some(sender) => {
                        let payload = json::ex_rights_payload(&decoded.records);
                        self.send_slow(
                            sender,
                            Category::ExRights,
                            decoded.records.len(),
                            &payload,
                        );
                    }
                    None => self.warn_unhandled_once(packet.kind),
                }
            }
            PacketKind::SymbolTable => {
                let decoded = decode_symbols(&packet.payload, packet.record_count);
                if decoded.skipped > 0 {
                    self.note_skipped(packet.kind, Category::Symbols, decoded.skipped);
                }
                if decoded.records.is_empty() {
                    return;
                }
                match &self.symbols {
                    Some(sender) => {
                        let payload = json::symbols_payload(&decoded.records);
                        self.send_slow(
                            sender,
                            Category::Symbols,
                            decoded.records.len(),
                            &payload,
                        );
                    }
                    None => self.warn_unhandled_once(packet.kind),
                }
            }
            PacketKind::MinuteBar | PacketKind::FiveMinuteBar => {
                self.warn_unhandled_once(packet.kind);
            }
        }
    }
}
