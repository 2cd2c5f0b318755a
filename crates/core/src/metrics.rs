//! Prometheus metrics for the bridge.

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter_vec, register_int_gauge_vec, Encoder, IntCounterVec, IntGaugeVec,
    TextEncoder,
};

const LABEL_CATEGORY: &str = "category";
const LABEL_LANE: &str = "lane";
const LABEL_REASON: &str = "reason";

static RECORDS_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "mdbridge_records_sent_total",
        "Records successfully sent to the broker",
        &[LABEL_CATEGORY]
    )
    .expect("Failed to register records_sent metric")
});

static BYTES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "mdbridge_bytes_sent_total",
        "Payload bytes successfully sent to the broker",
        &[LABEL_CATEGORY]
    )
    .expect("Failed to register bytes_sent metric")
});

static RECORDS_SKIPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "mdbridge_records_skipped_total",
        "Slots the decoder could not turn into records",
        &[LABEL_CATEGORY]
    )
    .expect("Failed to register records_skipped metric")
});

static SEND_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "mdbridge_send_errors_total",
        "Failed send attempts per category",
        &[LABEL_CATEGORY]
    )
    .expect("Failed to register send_errors metric")
});

static QUEUE_DEPTH: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "mdbridge_queue_depth",
        "Current ingestion queue depth per lane",
        &[LABEL_LANE]
    )
    .expect("Failed to register queue_depth metric")
});

static PACKETS_DROPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "mdbridge_packets_dropped_total",
        "Packets dropped by the ingestion queue",
        &[LABEL_REASON]
    )
    .expect("Failed to register packets_dropped metric")
});

pub fn inc_records_sent(category: &str, n: u64) {
    RECORDS_SENT.with_label_values(&[category]).inc_by(n);
}

pub fn inc_bytes_sent(category: &str, n: u64) {
    BYTES_SENT.with_label_values(&[category]).inc_by(n);
}

pub fn inc_records_skipped(category: &str, n: u64) {
    RECORDS_SKIPPED.with_label_values(&[category]).inc_by(n);
}

pub fn inc_send_errors(category: &str) {
    SEND_ERRORS.with_label_values(&[category]).inc();
}

pub fn set_queue_depth(lane: &str, depth: usize) {
    QUEUE_DEPTH.with_label_values(&[lane]).set(depth as i64);
}

pub fn inc_packets_dropped(reason: &str, n: u64) {
    PACKETS_DROPPED.with_label_values(&[reason]).inc_by(n);
}

/// Encode all registered metrics in the prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_includes_registered_metrics() {
        inc_records_sent("realtime", 5);
        set_queue_depth("fast", 2);
        inc_packets_dropped("queue_full", 1);

        let text = encode_metrics().unwrap();
        assert!(text.contains("mdbridge_records_sent_total"));
        assert!(text.contains("mdbridge_queue_depth"));
        assert!(text.contains("mdbridge_packets_dropped_total"));
    }
}
