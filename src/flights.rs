// Flight record model and the informational payload shapes served next to it

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const CURRENCY: &str = "USD";

// One searchable flight offer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub airline: String,
    pub price: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub date: NaiveDate,
    pub departure_time: String,
    pub arrival_time: String,
    pub duration: String,
    #[serde(default)]
    pub stops: u8,
}

fn default_currency() -> String {
    CURRENCY.to_string()
}

impl FlightRecord {
    /// Route key in the `"JFK-LAX"` form used for aggregation.
    pub fn route(&self) -> String {
        format!("{}-{}", self.origin, self.destination)
    }

    /// Total elapsed minutes, or `None` when `duration` is not `"<H>h <M>m"`.
    pub fn duration_minutes(&self) -> Option<u32> {
        parse_duration(&self.duration)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularRoute {
    pub route: String,
    pub flights: u32,
    pub avg_price: f64,
    pub popularity: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingTrend {
    pub date: NaiveDate,
    pub avg_price: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub title: String,
    pub description: String,
}

impl Insight {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

// Response envelopes, one per endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightsResponse {
    pub flights: Vec<FlightRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutesResponse {
    pub routes: Vec<PopularRoute>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendsResponse {
    pub trends: Vec<PricingTrend>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsResponse {
    pub insights: Vec<Insight>,
}

/// Parse a `"<H>h <M>m"` duration into total minutes.
///
/// Minutes must be in `0..=59`. Anything else, including extra whitespace
/// inside a component or a missing unit, is rejected.
pub fn parse_duration(value: &str) -> Option<u32> {
    let (hours, minutes) = value.trim().split_once(' ')?;
    let hours = hours.strip_suffix('h')?;
    let minutes = minutes.strip_suffix('m')?;

    if !is_digits(hours) || !is_digits(minutes) {
        return None;
    }

    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if minutes > 59 {
        return None;
    }

    hours.checked_mul(60)?.checked_add(minutes)
}

pub fn format_duration(total_minutes: u32) -> String {
    format!("{}h {}m", total_minutes / 60, total_minutes % 60)
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

// Rounds to cents, the precision every price in the payloads is served with
pub fn round_price(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
