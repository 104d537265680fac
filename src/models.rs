use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Column header of the raw CSV layout (same field order as the upstream JSON).
pub const RAW_HEADER: [&str; 5] = ["id", "price", "side", "size", "time"];

/// Column header of the normalized (btloader) CSV layout.
pub const NORMALIZED_HEADER: [&str; 7] = [
    "NanoTs",
    "Symbol",
    "Exchange",
    "Price",
    "Size",
    "TradeId",
    "TakerSide",
];

/// Which party initiated a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
    Unknown,
}

impl Side {
    pub fn parse(s: &str) -> Self {
        match s {
            "buy" => Side::Buy,
            "sell" => Side::Sell,
            _ => Side::Unknown,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
            Side::Unknown => "unknown",
        }
    }

    /// Single-character taker code used by the normalized layout.
    pub fn taker_code(&self) -> &'static str {
        match self {
            Side::Buy => "B",
            Side::Sell => "S",
            Side::Unknown => "-",
        }
    }
}

/// One executed trade as reported by `/markets/{market}/trades`.
///
/// Only built by decoding a page response; fields are read through accessors.
/// The side text is kept as sent so raw rows reproduce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    id: u64,
    price: f64,
    side: String,
    size: f64,
    time: DateTime<FixedOffset>,
}

impl Trade {
    #[cfg(test)]
    pub(crate) fn new(id: u64, price: f64, side: Side, size: f64, time: DateTime<Utc>) -> Self {
        Self {
            id,
            price,
            side: side.as_str().to_string(),
            size,
            time: time.fixed_offset(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn side(&self) -> Side {
        Side::parse(&self.side)
    }

    /// Side exactly as the upstream reported it.
    pub fn side_text(&self) -> &str {
        &self.side
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn time(&self) -> DateTime<FixedOffset> {
        self.time
    }

    pub fn time_utc(&self) -> DateTime<Utc> {
        self.time.with_timezone(&Utc)
    }

    /// Unix nanoseconds. Saturates outside the ~1677..2262 range chrono can express as i64.
    pub fn nano_ts(&self) -> i64 {
        self.time
            .timestamp_nanos_opt()
            .unwrap_or(if self.time.timestamp() < 0 { i64::MIN } else { i64::MAX })
    }

    pub fn day_key(&self) -> DayKey {
        DayKey::of(&self.time_utc())
    }

    /// Raw row: `id, price, side, size, time` with time as RFC3339 (nanosecond precision).
    pub fn raw_record(&self) -> [String; 5] {
        [
            self.id.to_string(),
            format_float(self.price),
            self.side.clone(),
            format_float(self.size),
            format_rfc3339_nano(&self.time),
        ]
    }

    /// Normalized row: `NanoTs, Symbol, Exchange, Price, Size, TradeId, TakerSide`.
    pub fn normalized_record(&self, symbol: &str, exchange: &str) -> [String; 7] {
        [
            self.nano_ts().to_string(),
            symbol.to_string(),
            exchange.to_string(),
            format_float(self.price),
            format_float(self.size),
            self.id.to_string(),
            self.side().taker_code().to_string(),
        ]
    }
}

/// Shortest decimal that round-trips, never in exponent form.
pub fn format_float(v: f64) -> String {
    format!("{}", v)
}

/// RFC3339 with the fraction trimmed of trailing zeros (omitted when zero)
/// and `Z` for a zero offset.
pub fn format_rfc3339_nano(t: &DateTime<FixedOffset>) -> String {
    let mut out = t.format("%Y-%m-%dT%H:%M:%S").to_string();
    let nanos = t.nanosecond() % 1_000_000_000;
    if nanos > 0 {
        let frac = format!("{:09}", nanos);
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    if t.offset().local_minus_utc() == 0 {
        out.push('Z');
    } else {
        out.push_str(&t.format("%:z").to_string());
    }
    out
}

/// Envelope returned by every FTX US REST endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeResponse {
    pub success: bool,
    #[serde(default)]
    pub result: Vec<Trade>,
}

/// Inclusive request window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// `start_date 00:00:00` through the last second of `end_date`.
    pub fn from_dates(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        let start = Utc.from_utc_datetime(&start_date.and_time(NaiveTime::default()));
        let end = Utc.from_utc_datetime(&end_date.and_time(NaiveTime::default()))
            + chrono::Duration::seconds(SECONDS_PER_DAY - 1);
        Self { start, end }
    }

    /// Query bounds in whole Unix seconds, as the upstream expects.
    pub fn unix_bounds(&self) -> (i64, i64) {
        (self.start.timestamp(), self.end.timestamp())
    }
}

/// UTC midnight of a trade's calendar day, in seconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayKey(pub i64);

impl DayKey {
    pub fn of(t: &DateTime<Utc>) -> Self {
        Self(t.timestamp().div_euclid(SECONDS_PER_DAY) * SECONDS_PER_DAY)
    }

    pub fn date(&self) -> NaiveDate {
        DateTime::<Utc>::from_timestamp(self.0, 0)
            .map(|dt| dt.date_naive())
            .unwrap_or_default()
    }

    /// `YYYYMMDD`, used in output file names.
    pub fn compact(&self) -> String {
        self.date().format("%Y%m%d").to_string()
    }
}

impl std::fmt::Display for DayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.date())
    }
}
