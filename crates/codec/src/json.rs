//! Hand-written JSON payloads for the broker.
//!
//! The hot path writes straight into a `String`; serde stays out of it.
//! Each payload is a `{"records":[...]}` object whose field names are part
//! of the downstream contract and must not change.

use std::fmt::Write as _;

use crate::records::{DailyBarRecord, ExRightsRecord, QuoteRecord, SymbolRecord};

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FMT: &str = "%Y-%m-%d";

fn push_escaped(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
}

fn push_str_field(out: &mut String, name: &str, value: &str) {
    out.push('"');
    out.push_str(name);
    out.push_str("\":\"");
    push_escaped(out, value);
    out.push('"');
}

fn push_f64_array(out: &mut String, name: &str, values: &[f64; 5]) {
    out.push('"');
    out.push_str(name);
    out.push_str("\":[");
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{v}");
    }
    out.push(']');
}

/// Counts of zero serialize as `null`: the feed writes zero both for
/// "absent" and for a genuine zero and the consumers rely on `null` there.
fn push_count_or_null(out: &mut String, name: &str, value: u16) {
    out.push('"');
    out.push_str(name);
    out.push_str("\":");
    if value > 0 {
        let _ = write!(out, "{value}");
    } else {
        out.push_str("null");
    }
}

fn payload<T>(records: &[T], mut one: impl FnMut(&mut String, &T)) -> String {
    let mut out = String::with_capacity(64 + records.len() * 256);
    out.push_str("{\"records\":[");
    for (i, r) in records.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        one(&mut out, r);
    }
    out.push_str("]}");
    out
}

pub fn quotes_payload(records: &[QuoteRecord]) -> String {
    payload(records, |out, r| {
        out.push('{');
        push_str_field(out, "stock_code", &r.stock_code);
        out.push(',');
        push_str_field(out, "stock_name", &r.stock_name);
        let _ = write!(out, ",\"market_code\":{}", r.market_code);
        out.push(',');
        push_str_field(out, "update_time", &r.update_time.format(DATETIME_FMT).to_string());
        let _ = write!(
            out,
            ",\"time_stamp\":{},\"last_close\":{},\"open\":{},\"high\":{},\"low\":{},\"new_price\":{},\"volume\":{},\"amount\":{},",
            r.time_stamp, r.last_close, r.open, r.high, r.low, r.new_price, r.volume, r.amount
        );
        push_f64_array(out, "buy_price", &r.buy_price);
        out.push(',');
        push_f64_array(out, "buy_volume", &r.buy_volume);
        out.push(',');
        push_f64_array(out, "sell_price", &r.sell_price);
        out.push(',');
        push_f64_array(out, "sell_volume", &r.sell_volume);
        out.push('}');
    })
}

pub fn daily_payload(records: &[DailyBarRecord]) -> String {
    payload(records, |out, r| {
        out.push('{');
        push_str_field(out, "stock_code", &r.stock_code);
        let _ = write!(out, ",\"market_code\":{},", r.market_code);
        push_str_field(out, "trade_date", &r.trade_time.format(DATE_FMT).to_string());
        out.push(',');
        push_str_field(
            out,
            "trade_datetime",
            &r.trade_time.format(DATETIME_FMT).to_string(),
        );
        let _ = write!(
            out,
            ",\"time_stamp\":{},\"open_price\":{},\"high_price\":{},\"low_price\":{},\"close_price\":{},\"volume\":{},\"amount\":{},",
            r.time_stamp, r.open, r.high, r.low, r.close, r.volume, r.amount
        );
        push_count_or_null(out, "advance_count", r.advance_count);
        out.push(',');
        push_count_or_null(out, "decline_count", r.decline_count);
        out.push('}');
    })
}

pub fn ex_rights_payload(records: &[ExRightsRecord]) -> String {
    payload(records, |out, r| {
        out.push('{');
        push_str_field(out, "stock_code", &r.stock_code);
        let _ = write!(out, ",\"market_code\":{},", r.market_code);
        push_str_field(out, "ex_rights_date", &r.ex_time.format(DATE_FMT).to_string());
        out.push(',');
        push_str_field(
            out,
            "ex_rights_datetime",
            &r.ex_time.format(DATETIME_FMT).to_string(),
        );
        let _ = write!(
            out,
            ",\"time_stamp\":{},\"give_per_10_shares\":{},\"pei_per_10_shares\":{},\"pei_price\":{},\"profit_per_share\":{}}}",
            r.time_stamp, r.give_per_10, r.pei_per_10, r.pei_price, r.profit_per_share
        );
    })
}

pub fn symbols_payload(records: &[SymbolRecord]) -> String {
    payload(records, |out, r| {
        out.push('{');
        push_str_field(out, "stock_code", &r.stock_code);
        out.push(',');
        push_str_field(out, "stock_name", &r.stock_name);
        let _ = write!(out, ",\"market_code\":{},", r.market_code);
        push_str_field(
            out,
            "update_time",
            &r.update_time.format(DATETIME_FMT).to_string(),
        );
        let _ = write!(out, ",\"time_stamp\":{}}}", r.time_stamp);
    })
}
