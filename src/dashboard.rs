// Dashboard presentation state: last fetched results, local sorting and the
// chart series derived from them

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    client::{ClientError, FlightApi},
    flights::{round_price, FlightRecord, Insight, PopularRoute, PricingTrend},
    search::SearchRequest,
};

// Width of a price histogram bucket in USD
pub const PRICE_BUCKET_WIDTH: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Price,
    Duration,
    DepartureTime,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown sort key {0:?}, expected price, duration or departure_time")]
pub struct ParseSortKeyError(String);

impl FromStr for SortKey {
    type Err = ParseSortKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price" => Ok(SortKey::Price),
            "duration" => Ok(SortKey::Duration),
            "departure_time" => Ok(SortKey::DepartureTime),
            other => Err(ParseSortKeyError(other.to_string())),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortKey::Price => "price",
            SortKey::Duration => "duration",
            SortKey::DepartureTime => "departure_time",
        };
        f.write_str(name)
    }
}

/// Sorted copy of `flights`, ascending by `key`. Equal keys keep their order.
///
/// Durations that do not parse sort as zero minutes. Departure times compare
/// as strings, which is chronological only for zero-padded `HH:MM`.
pub fn sort_flights(flights: &[FlightRecord], key: SortKey) -> Vec<FlightRecord> {
    let mut sorted = flights.to_vec();
    match key {
        SortKey::Price => sorted.sort_by(|a, b| a.price.total_cmp(&b.price)),
        SortKey::Duration => sorted.sort_by_key(|f| f.duration_minutes().unwrap_or(0)),
        SortKey::DepartureTime => sorted.sort_by(|a, b| a.departure_time.cmp(&b.departure_time)),
    }
    sorted
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl ChartSeries {
    fn push(&mut self, label: impl Into<String>, value: f64) {
        self.labels.push(label.into());
        self.values.push(value);
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Chart widgets of the dashboard. Built once, updated through the refresh
/// calls after every fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartPanel {
    pub airline_prices: ChartSeries,
    pub route_counts: ChartSeries,
    pub price_histogram: ChartSeries,
    pub price_trend: ChartSeries,
}

impl ChartPanel {
    pub fn refresh_results(&mut self, flights: &[FlightRecord]) {
        self.airline_prices = airline_prices(flights);
        self.route_counts = route_counts(flights);
        self.price_histogram = price_histogram(flights);
    }

    pub fn refresh_trends(&mut self, trends: &[PricingTrend]) {
        let mut series = ChartSeries::default();
        for trend in trends {
            series.push(trend.date.to_string(), trend.avg_price);
        }
        self.price_trend = series;
    }
}

// Average price per airline, by airline name
fn airline_prices(flights: &[FlightRecord]) -> ChartSeries {
    let mut totals: BTreeMap<&str, (f64, u32)> = BTreeMap::new();
    for flight in flights {
        let entry = totals.entry(flight.airline.as_str()).or_insert((0.0, 0));
        entry.0 += flight.price;
        entry.1 += 1;
    }

    let mut series = ChartSeries::default();
    for (airline, (total, count)) in totals {
        series.push(airline, round_price(total / f64::from(count)));
    }
    series
}

// Flight count per route, busiest first
fn route_counts(flights: &[FlightRecord]) -> ChartSeries {
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    for flight in flights {
        *counts.entry(flight.route()).or_insert(0) += 1;
    }

    let mut counts: Vec<(String, u32)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let mut series = ChartSeries::default();
    for (route, count) in counts {
        series.push(route, f64::from(count));
    }
    series
}

// Past this many buckets only the non-empty ones are charted
const MAX_FILLED_BUCKETS: u64 = 50;

fn price_bucket(price: f64) -> u64 {
    (price / PRICE_BUCKET_WIDTH).floor() as u64
}

fn bucket_label(bucket: u64) -> String {
    let width = PRICE_BUCKET_WIDTH as u64;
    let from = bucket.saturating_mul(width);
    format!("${from}-{}", from.saturating_add(width - 1))
}

// Fixed-width buckets from the cheapest to the dearest flight. Gaps are
// filled with zero counts unless the range is too wide to chart.
fn price_histogram(flights: &[FlightRecord]) -> ChartSeries {
    let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
    for flight in flights {
        *counts.entry(price_bucket(flight.price)).or_insert(0) += 1;
    }

    let mut series = ChartSeries::default();
    let (Some(&low), Some(&high)) = (counts.keys().next(), counts.keys().next_back()) else {
        return series;
    };

    if high - low < MAX_FILLED_BUCKETS {
        for bucket in low..=high {
            let count = counts.get(&bucket).copied().unwrap_or(0);
            series.push(bucket_label(bucket), count as f64);
        }
    } else {
        for (bucket, count) in counts {
            series.push(bucket_label(bucket), count as f64);
        }
    }
    series
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardView {
    Idle,
    Results,
    Empty,
    // Inline error with a manual retry action
    Error { message: String },
}

pub struct Dashboard<A> {
    api: A,
    last_request: Option<SearchRequest>,
    fetched: Vec<FlightRecord>,
    visible: Vec<FlightRecord>,
    sort_key: Option<SortKey>,
    view: DashboardView,
    charts: ChartPanel,
    routes: Vec<PopularRoute>,
    insights: Vec<Insight>,
}

impl<A: FlightApi> Dashboard<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            last_request: None,
            fetched: Vec::new(),
            visible: Vec::new(),
            sort_key: None,
            view: DashboardView::Idle,
            charts: ChartPanel::default(),
            routes: Vec::new(),
            insights: Vec::new(),
        }
    }

    /// Fetch results for `request`. On failure the previous results stay on
    /// screen behind the error.
    pub async fn search(&mut self, request: SearchRequest) -> &DashboardView {
        self.last_request = Some(request.clone());

        match self.api.search(&request).await {
            Ok(flights) => {
                debug!(count = flights.len(), "search results fetched");
                self.fetched = flights;
                self.visible = match self.sort_key {
                    Some(key) => sort_flights(&self.fetched, key),
                    None => self.fetched.clone(),
                };
                self.charts.refresh_results(&self.fetched);
                self.view = if self.fetched.is_empty() {
                    DashboardView::Empty
                } else {
                    DashboardView::Results
                };
            }
            Err(err) => {
                warn!(error = %err, "flight search failed");
                self.view = DashboardView::Error {
                    message: err.to_string(),
                };
            }
        }
        &self.view
    }

    /// Re-issue the last search once.
    pub async fn retry(&mut self) -> &DashboardView {
        let request = self.last_request.clone().unwrap_or_default();
        self.search(request).await
    }

    pub async fn clear_filters(&mut self) -> &DashboardView {
        self.search(SearchRequest::default()).await
    }

    pub fn sort_by(&mut self, key: SortKey) -> &[FlightRecord] {
        self.sort_key = Some(key);
        self.visible = sort_flights(&self.fetched, key);
        &self.visible
    }

    /// Back to the order the results were fetched in.
    pub fn clear_sort(&mut self) -> &[FlightRecord] {
        self.sort_key = None;
        self.visible = self.fetched.clone();
        &self.visible
    }

    /// Fetch the informational panels concurrently. Panels that load are
    /// kept even when another fails; the first failure is returned.
    pub async fn load_overview(&mut self) -> Result<(), ClientError> {
        let (routes, trends, insights) = futures::join!(
            self.api.popular_routes(),
            self.api.pricing_trends(),
            self.api.insights()
        );

        let mut first_error = None;
        match routes {
            Ok(routes) => self.routes = routes,
            Err(err) => first_error = first_error.or(Some(err)),
        }
        match trends {
            Ok(trends) => self.charts.refresh_trends(&trends),
            Err(err) => first_error = first_error.or(Some(err)),
        }
        match insights {
            Ok(insights) => self.insights = insights,
            Err(err) => first_error = first_error.or(Some(err)),
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn view(&self) -> &DashboardView {
        &self.view
    }

    pub fn results(&self) -> &[FlightRecord] {
        &self.visible
    }

    pub fn fetched(&self) -> &[FlightRecord] {
        &self.fetched
    }

    pub fn sort_key(&self) -> Option<SortKey> {
        self.sort_key
    }

    pub fn charts(&self) -> &ChartPanel {
        &self.charts
    }

    pub fn routes(&self) -> &[PopularRoute] {
        &self.routes
    }

    pub fn insights(&self) -> &[Insight] {
        &self.insights
    }
}
