//! Full pipeline: callback bytes in, broker frames out.

mod common;

use std::sync::Arc;
use std::time::Duration;

use bytemuck::Zeroable;
use serde_json::Value;

use mdbridge_codec::layout::{
    DailySlot, QuoteSlot, RecvHeader, DAILY_SLOT_SIZE, HEAD_TAG, RECV_HEADER_SIZE,
};
use mdbridge_codec::PacketKind;
use mdbridge_core::{
    Bridge, BridgeConfig, BridgeStats, Category, ChannelFlags, EnqueueOutcome,
};

use common::MockBroker;

fn recv_header(count: i32) -> [u8; RECV_HEADER_SIZE] {
    let header = RecvHeader {
        data_type: 0,
        record_count: count,
    };
    let mut out = [0u8; RECV_HEADER_SIZE];
    out.copy_from_slice(bytemuck::bytes_of(&header));
    out
}

fn quote_slot(label: &str, new_price: f32) -> Vec<u8> {
    let mut slot = QuoteSlot::zeroed();
    slot.time = 1_700_000_000;
    slot.market = 1;
    slot.label[..label.len()].copy_from_slice(label.as_bytes());
    slot.name[..4].copy_from_slice(b"TEST");
    slot.new_price = new_price;
    bytemuck::bytes_of(&slot).to_vec()
}

fn bridge_for(broker: &MockBroker, channels: ChannelFlags) -> Bridge {
    let mut config = BridgeConfig::default();
    config.broker.host = broker.addr.ip().to_string();
    config.broker.port = broker.addr.port();
    config.channels = channels;
    Bridge::new(config, Arc::new(BridgeStats::default()))
}

#[test]
fn realtime_packet_reaches_the_broker_as_one_batch() {
    let broker = MockBroker::start(*b"ACK\0");
    let mut bridge = bridge_for(
        &broker,
        ChannelFlags {
            daily: false,
            realtime: true,
            ex_rights: false,
            symbols: false,
        },
    );
    bridge.start();

    let mut entries = quote_slot("600000", 10.2);
    entries.extend(quote_slot("000001", 12.3));
    entries.extend(quote_slot("600519", 1800.0));

    assert_eq!(
        bridge.on_feed_data(PacketKind::RealTime, &recv_header(3), &entries),
        EnqueueOutcome::Queued
    );

    assert!(broker.wait_for_frames(1, Duration::from_secs(5)));
    let frames = broker.frames();
    assert_eq!(frames[0].queue_name, "realtime_data_queue");

    let v: Value = serde_json::from_slice(&frames[0].payload).unwrap();
    let records = v["records"].as_array().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["stock_code"], "SH600000");
    assert_eq!(records[1]["stock_code"], "SZ000001");
    assert_eq!(records[2]["stock_code"], "SH600519");

    // Stop joins the send thread, so the counters are settled.
    bridge.stop();
    let stats = bridge.stats();
    assert_eq!(stats.category(Category::RealTime).records, 3);
    assert_eq!(stats.category(Category::RealTime).errors, 0);
}

#[test]
fn daily_packet_goes_out_on_the_slow_lane() {
    let broker = MockBroker::start(*b"ACK\0");
    let mut bridge = bridge_for(
        &broker,
        ChannelFlags {
            daily: true,
            realtime: false,
            ex_rights: false,
            symbols: false,
        },
    );
    bridge.start();

    // Context header followed by two bar slots.
    let mut entries = vec![0u8; DAILY_SLOT_SIZE];
    entries[0..4].copy_from_slice(&HEAD_TAG.to_le_bytes());
    entries[4..6].copy_from_slice(&1u16.to_le_bytes());
    entries[6..12].copy_from_slice(b"600000");
    for i in 0..2i32 {
        let slot = DailySlot {
            time: 1_700_000_000 + i * 86_400,
            open: 10.0,
            high: 11.0,
            low: 9.5,
            close: 10.5,
            volume: 1000.0,
            amount: 10_500.0,
            advance: 0,
            decline: 3,
        };
        entries.extend(bytemuck::bytes_of(&slot));
    }

    assert_eq!(
        bridge.on_feed_data(PacketKind::DailyBar, &recv_header(3), &entries),
        EnqueueOutcome::Queued
    );

    assert!(broker.wait_for_frames(1, Duration::from_secs(5)));
    let frames = broker.frames();
    assert_eq!(frames[0].queue_name, "daily_data_queue");

    let v: Value = serde_json::from_slice(&frames[0].payload).unwrap();
    let records = v["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["stock_code"], "SH600000");
    assert!(records[0]["advance_count"].is_null());
    assert_eq!(records[0]["decline_count"], 3);

    bridge.stop();
    assert_eq!(bridge.stats().category(Category::Daily).records, 2);
}
