//! Payload decoders: flat slot walks for quotes and symbols, and the
//! header-interleaved walk for daily bars and ex-rights data.

use chrono::{DateTime, Local, TimeZone};

use crate::layout::{
    fixed_str, ContextHeader, DailySlot, ExRightsSlot, QuoteSlot, SymbolSlot, DAILY_SLOT_SIZE,
    EX_RIGHTS_SLOT_SIZE, HEAD_TAG, QUOTE_SLOT_SIZE, SYMBOL_SLOT_SIZE,
};
use crate::normalize::{market_code, normalize_stock_code};
use crate::records::{DailyBarRecord, ExRightsRecord, QuoteRecord, SymbolRecord};

/// Decoded records plus the number of slots that were skipped (blank label,
/// bad timestamp, or a data slot with no stock context yet).
#[derive(Debug)]
pub struct Decoded<T> {
    pub records: Vec<T>,
    pub skipped: usize,
}

fn local_time(ts: i32) -> Option<DateTime<Local>> {
    Local.timestamp_opt(i64::from(ts), 0).single()
}

/// Decode up to `count` real-time quote slots.
pub fn decode_quotes(payload: &[u8], count: usize) -> Decoded<QuoteRecord> {
    let mut records = Vec::with_capacity(count.min(payload.len() / QUOTE_SLOT_SIZE));
    let mut skipped = 0usize;

    for chunk in payload.chunks_exact(QUOTE_SLOT_SIZE).take(count) {
        let slot: QuoteSlot = bytemuck::pod_read_unaligned(chunk);
        let label = fixed_str(&slot.label);
        if label.is_empty() {
            skipped += 1;
            continue;
        }
        let Some(update_time) = local_time(slot.time) else {
            skipped += 1;
            continue;
        };

        let buy_price = merge_levels(slot.buy_price, slot.buy_price4, slot.buy_price5);
        let buy_volume = merge_levels(slot.buy_volume, slot.buy_volume4, slot.buy_volume5);
        let sell_price = merge_levels(slot.sell_price, slot.sell_price4, slot.sell_price5);
        let sell_volume = merge_levels(slot.sell_volume, slot.sell_volume4, slot.sell_volume5);

        records.push(QuoteRecord {
            stock_code: normalize_stock_code(&label),
            stock_name: fixed_str(&slot.name),
            market_code: slot.market,
            update_time,
            time_stamp: slot.time,
            last_close: f64::from(slot.last_close),
            open: f64::from(slot.open),
            high: f64::from(slot.high),
            low: f64::from(slot.low),
            new_price: f64::from(slot.new_price),
            volume: f64::from(slot.volume),
            amount: f64::from(slot.amount),
            buy_price,
            buy_volume,
            sell_price,
            sell_volume,
        });
    }

    Decoded { records, skipped }
}

fn merge_levels(first3: [f32; 3], l4: f32, l5: f32) -> [f64; 5] {
    [
        f64::from(first3[0]),
        f64::from(first3[1]),
        f64::from(first3[2]),
        f64::from(l4),
        f64::from(l5),
    ]
}

/// Decode up to `count` symbol table entries.
pub fn decode_symbols(payload: &[u8], count: usize) -> Decoded<SymbolRecord> {
    let mut records = Vec::with_capacity(count.min(payload.len() / SYMBOL_SLOT_SIZE));
    let mut skipped = 0usize;

    for chunk in payload.chunks_exact(SYMBOL_SLOT_SIZE).take(count) {
        let slot: SymbolSlot = bytemuck::pod_read_unaligned(chunk);
        let label = fixed_str(&slot.label);
        if label.is_empty() {
            skipped += 1;
            continue;
        }
        let Some(update_time) = local_time(slot.time) else {
            skipped += 1;
            continue;
        };
        let stock_code = normalize_stock_code(&label);
        let market_code = market_code(&stock_code);
        records.push(SymbolRecord {
            stock_code,
            stock_name: fixed_str(&slot.name),
            market_code,
            update_time,
            time_stamp: slot.time,
        });
    }

    Decoded { records, skipped }
}

/// Stock context set by an interleaved header slot.
struct StockContext {
    stock_code: String,
    market: u16,
}

fn read_context(chunk: &[u8]) -> StockContext {
    let header: ContextHeader =
        bytemuck::pod_read_unaligned(&chunk[..std::mem::size_of::<ContextHeader>()]);
    StockContext {
        stock_code: normalize_stock_code(&fixed_str(&header.label)),
        market: header.market,
    }
}

fn is_context_header(chunk: &[u8]) -> bool {
    u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) == HEAD_TAG
}

/// Decode up to `count` interleaved daily bar slots.
///
/// A slot whose first 4 bytes equal [`HEAD_TAG`] replaces the current stock
/// context; data slots before the first header are skipped.
pub fn decode_daily_bars(payload: &[u8], count: usize) -> Decoded<DailyBarRecord> {
    let mut records = Vec::new();
    let mut skipped = 0usize;
    let mut context: Option<StockContext> = None;

    for chunk in payload.chunks_exact(DAILY_SLOT_SIZE).take(count) {
        if is_context_header(chunk) {
            context = Some(read_context(chunk));
            continue;
        }
        let Some(ctx) = &context else {
            skipped += 1;
            continue;
        };
        let slot: DailySlot = bytemuck::pod_read_unaligned(chunk);
        if slot.time == 0 {
            skipped += 1;
            continue;
        }
        let Some(trade_time) = local_time(slot.time) else {
            skipped += 1;
            continue;
        };
        records.push(DailyBarRecord {
            stock_code: ctx.stock_code.clone(),
            market_code: ctx.market,
            trade_time,
            time_stamp: slot.time,
            open: f64::from(slot.open),
            high: f64::from(slot.high),
            low: f64::from(slot.low),
            close: f64::from(slot.close),
            volume: f64::from(slot.volume),
            amount: f64::from(slot.amount),
            advance_count: slot.advance,
            decline_count: slot.decline,
        });
    }

    Decoded { records, skipped }
}

/// Decode up to `count` interleaved ex-rights slots.
pub fn decode_ex_rights(payload: &[u8], count: usize) -> Decoded<ExRightsRecord> {
    let mut records = Vec::new();
    let mut skipped = 0usize;
    let mut context: Option<StockContext> = None;

    for chunk in payload.chunks_exact(EX_RIGHTS_SLOT_SIZE).take(count) {
        if is_context_header(chunk) {
            context = Some(read_context(chunk));
            continue;
        }
        let Some(ctx) = &context else {
            skipped += 1;
            continue;
        };
        let slot: ExRightsSlot = bytemuck::pod_read_unaligned(chunk);
        if slot.time == 0 {
            skipped += 1;
            continue;
        }
        let Some(ex_time) = local_time(slot.time) else {
            skipped += 1;
            continue;
        };
        records.push(ExRightsRecord {
            stock_code: ctx.stock_code.clone(),
            market_code: ctx.market,
            ex_time,
            time_stamp: slot.time,
            give_per_10: f64::from(slot.give),
            pei_per_10: f64::from(slot.pei),
            pei_price: f64::from(slot.pei_price),
            profit_per_share: f64::from(slot.profit),
        });
    }

    Decoded { records, skipped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::QUOTE_SLOT_SIZE;
    use bytemuck::Zeroable;

    const TS: i32 = 1_700_000_000;

    fn quote_slot_bytes(label: &str, name: &str, new_price: f32) -> Vec<u8> {
        let mut slot = QuoteSlot::zeroed();
        slot.cb_size = QUOTE_SLOT_SIZE as u16;
        slot.time = TS;
        slot.market = 1;
        slot.label[..label.len()].copy_from_slice(label.as_bytes());
        slot.name[..name.len()].copy_from_slice(name.as_bytes());
        slot.last_close = 10.0;
        slot.open = 10.1;
        slot.high = 10.5;
        slot.low = 9.9;
        slot.new_price = new_price;
        slot.volume = 1_000_000.0;
        slot.amount = 10_200_000.0;
        slot.buy_price = [10.19, 10.18, 10.17];
        slot.buy_volume = [100.0, 200.0, 300.0];
        slot.sell_price = [10.21, 10.22, 10.23];
        slot.sell_volume = [110.0, 210.0, 310.0];
        slot.buy_price4 = 10.16;
        slot.buy_volume4 = 400.0;
        slot.buy_price5 = 10.15;
        slot.buy_volume5 = 500.0;
        slot.sell_price4 = 10.24;
        slot.sell_volume4 = 410.0;
        slot.sell_price5 = 10.25;
        slot.sell_volume5 = 510.0;
        bytemuck::bytes_of(&slot).to_vec()
    }

    fn context_bytes(slot_size: usize, market: u16, label: &str) -> Vec<u8> {
        let mut buf = vec![0u8; slot_size];
        buf[0..4].copy_from_slice(&HEAD_TAG.to_le_bytes());
        buf[4..6].copy_from_slice(&market.to_le_bytes());
        buf[6..6 + label.len()].copy_from_slice(label.as_bytes());
        buf
    }

    fn daily_slot_bytes(time: i32, close: f32, advance: u16) -> Vec<u8> {
        let slot = DailySlot {
            time,
            open: close - 0.5,
            high: close + 0.5,
            low: close - 1.0,
            close,
            volume: 5000.0,
            amount: 60_000.0,
            advance,
            decline: 0,
        };
        bytemuck::bytes_of(&slot).to_vec()
    }

    fn ex_rights_slot_bytes(time: i32, give: f32) -> Vec<u8> {
        let slot = ExRightsSlot {
            time,
            give,
            pei: 1.5,
            pei_price: 8.8,
            profit: 0.35,
            reserved: [0; 4],
        };
        bytemuck::bytes_of(&slot).to_vec()
    }

    #[test]
    fn decodes_quotes_and_merges_depth_levels() {
        let mut payload = quote_slot_bytes("600000", "PUFA BANK", 10.2);
        payload.extend(quote_slot_bytes("000001", "PAB", 12.3));

        let decoded = decode_quotes(&payload, 2);
        assert_eq!(decoded.skipped, 0);
        assert_eq!(decoded.records.len(), 2);

        let q = &decoded.records[0];
        assert_eq!(q.stock_code, "SH600000");
        assert_eq!(q.stock_name, "PUFA BANK");
        assert_eq!(q.time_stamp, TS);
        assert_eq!(q.buy_price[3], f64::from(10.16f32));
        assert_eq!(q.buy_price[4], f64::from(10.15f32));
        assert_eq!(q.sell_volume[4], 510.0);
        assert_eq!(decoded.records[1].stock_code, "SZ000001");
    }

    #[test]
    fn skips_blank_label_quotes() {
        let mut payload = quote_slot_bytes("", "GHOST", 1.0);
        payload.extend(quote_slot_bytes("600000", "REAL", 2.0));
        let decoded = decode_quotes(&payload, 2);
        assert_eq!(decoded.skipped, 1);
        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.records[0].stock_name, "REAL");
    }

    #[test]
    fn quote_count_limits_the_walk() {
        let mut payload = quote_slot_bytes("600000", "A", 1.0);
        payload.extend(quote_slot_bytes("600001", "B", 2.0));
        let decoded = decode_quotes(&payload, 1);
        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.records[0].stock_name, "A");
    }

    #[test]
    fn truncated_quote_payload_yields_complete_slots_only() {
        let mut payload = quote_slot_bytes("600000", "A", 1.0);
        payload.extend_from_slice(&[0u8; 40]);
        let decoded = decode_quotes(&payload, 2);
        assert_eq!(decoded.records.len(), 1);
    }

    #[test]
    fn decodes_symbols_with_market_from_prefix() {
        let mut slot = SymbolSlot::zeroed();
        slot.time = TS;
        slot.market = 9; // driver market id is ignored for symbols
        slot.label[..6].copy_from_slice(b"600000");
        slot.name[..4].copy_from_slice(b"PUFA");
        let mut payload = bytemuck::bytes_of(&slot).to_vec();

        let mut slot2 = SymbolSlot::zeroed();
        slot2.time = TS;
        slot2.label[..6].copy_from_slice(b"000001");
        slot2.name[..3].copy_from_slice(b"PAB");
        payload.extend(bytemuck::bytes_of(&slot2));

        let decoded = decode_symbols(&payload, 2);
        assert_eq!(decoded.records.len(), 2);
        assert_eq!(decoded.records[0].stock_code, "SH600000");
        assert_eq!(decoded.records[0].market_code, 1);
        assert_eq!(decoded.records[0].time_stamp, TS);
        assert_eq!(decoded.records[0].update_time, local_time(TS).unwrap());
        assert_eq!(decoded.records[1].stock_code, "SZ000001");
        assert_eq!(decoded.records[1].market_code, 0);
    }

    #[test]
    fn interleaved_headers_switch_stock_context() {
        let mut payload = Vec::new();
        payload.extend(context_bytes(DAILY_SLOT_SIZE, 1, "600000"));
        payload.extend(daily_slot_bytes(TS, 10.0, 1200));
        payload.extend(daily_slot_bytes(TS + 86_400, 10.5, 0));
        payload.extend(context_bytes(DAILY_SLOT_SIZE, 0, "000001"));
        payload.extend(daily_slot_bytes(TS, 12.0, 7));

        let decoded = decode_daily_bars(&payload, 5);
        assert_eq!(decoded.skipped, 0);
        assert_eq!(decoded.records.len(), 3);
        assert_eq!(decoded.records[0].stock_code, "SH600000");
        assert_eq!(decoded.records[0].advance_count, 1200);
        assert_eq!(decoded.records[1].stock_code, "SH600000");
        assert_eq!(decoded.records[1].decline_count, 0);
        assert_eq!(decoded.records[2].stock_code, "SZ000001");
        assert_eq!(decoded.records[2].market_code, 0);
    }

    #[test]
    fn data_slot_before_any_header_is_skipped() {
        let mut payload = daily_slot_bytes(TS, 10.0, 0);
        payload.extend(context_bytes(DAILY_SLOT_SIZE, 1, "600000"));
        payload.extend(daily_slot_bytes(TS, 11.0, 0));

        let decoded = decode_daily_bars(&payload, 3);
        assert_eq!(decoded.skipped, 1);
        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.records[0].close, 11.0);
    }

    #[test]
    fn zero_timestamp_slot_is_skipped() {
        let mut payload = context_bytes(DAILY_SLOT_SIZE, 1, "600000");
        payload.extend(daily_slot_bytes(0, 10.0, 0));
        payload.extend(daily_slot_bytes(TS, 10.0, 0));

        let decoded = decode_daily_bars(&payload, 3);
        assert_eq!(decoded.skipped, 1);
        assert_eq!(decoded.records.len(), 1);
    }

    #[test]
    fn decodes_interleaved_ex_rights() {
        let mut payload = context_bytes(EX_RIGHTS_SLOT_SIZE, 1, "600519");
        payload.extend(ex_rights_slot_bytes(TS, 2.0));
        payload.extend(ex_rights_slot_bytes(TS + 100, 3.0));

        let decoded = decode_ex_rights(&payload, 3);
        assert_eq!(decoded.skipped, 0);
        assert_eq!(decoded.records.len(), 2);
        let r = &decoded.records[0];
        assert_eq!(r.stock_code, "SH600519");
        assert_eq!(r.give_per_10, 2.0);
        assert_eq!(r.pei_per_10, 1.5);
        assert_eq!(r.profit_per_share, f64::from(0.35f32));
    }
}
