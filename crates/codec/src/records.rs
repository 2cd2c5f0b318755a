//! Typed records decoded from driver payloads, ready for serialization.

use chrono::{DateTime, Local};

/// One real-time quote, bid/ask depth merged to five levels.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRecord {
    pub stock_code: String,
    pub stock_name: String,
    pub market_code: u16,
    pub update_time: DateTime<Local>,
    pub time_stamp: i32,
    pub last_close: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub new_price: f64,
    pub volume: f64,
    pub amount: f64,
    pub buy_price: [f64; 5],
    pub buy_volume: [f64; 5],
    pub sell_price: [f64; 5],
    pub sell_volume: [f64; 5],
}

/// One daily bar. `advance_count`/`decline_count` of zero can mean either
/// "not supplied" or a genuine zero; the feed does not distinguish and
/// neither do we.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyBarRecord {
    pub stock_code: String,
    pub market_code: u16,
    pub trade_time: DateTime<Local>,
    pub time_stamp: i32,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub amount: f64,
    pub advance_count: u16,
    pub decline_count: u16,
}

/// One ex-rights event (dividends and rights issues per 10 shares).
#[derive(Debug, Clone, PartialEq)]
pub struct ExRightsRecord {
    pub stock_code: String,
    pub market_code: u16,
    pub ex_time: DateTime<Local>,
    pub time_stamp: i32,
    pub give_per_10: f64,
    pub pei_per_10: f64,
    pub pei_price: f64,
    pub profit_per_share: f64,
}

/// One symbol table entry. `market_code` is 1 for Shanghai, 0 for Shenzhen.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolRecord {
    pub stock_code: String,
    pub stock_name: String,
    pub market_code: u16,
    pub update_time: DateTime<Local>,
    pub time_stamp: i32,
}
