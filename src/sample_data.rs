// Sample data provider: the immutable catalog a server process serves from

use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Timelike, Utc};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use tracing::{debug, info};

use crate::flights::{
    format_duration, round_price, FlightRecord, PopularRoute, PricingTrend, CURRENCY,
};

pub const AIRPORTS: &[&str] = &[
    "JFK", "LAX", "ORD", "ATL", "DFW", "DEN", "SFO", "SEA", "MIA", "BOS",
];

// (name, IATA designator)
pub const AIRLINES: &[(&str, &str)] = &[
    ("American Airlines", "AA"),
    ("Delta Air Lines", "DL"),
    ("United Airlines", "UA"),
    ("Southwest Airlines", "WN"),
    ("JetBlue Airways", "B6"),
    ("Alaska Airlines", "AS"),
];

// Days ahead of generation that sample departures are spread over
pub const BOOKING_WINDOW_DAYS: u64 = 30;

// Days of pricing history, ending on the generation date
pub const TREND_WINDOW_DAYS: u64 = 30;

/// Everything the informational endpoints serve, generated once at startup.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub flights: Vec<FlightRecord>,
    pub routes: Vec<PopularRoute>,
    pub trends: Vec<PricingTrend>,
    pub generated_at: DateTime<Utc>,
}

impl Catalog {
    /// Generate a catalog of `size` flights departing from `today` onwards.
    /// The same `seed` always yields the same catalog.
    pub fn generate(size: usize, seed: Option<u64>, today: NaiveDate) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let flights: Vec<FlightRecord> = (0..size)
            .map(|_| generate_flight(&mut rng, today))
            .collect();
        let trends = generate_trends(&mut rng, &flights, today);

        info!(
            flights = flights.len(),
            seeded = seed.is_some(),
            "generated sample flight catalog"
        );

        Self::from_parts(flights, trends)
    }

    pub fn from_parts(flights: Vec<FlightRecord>, trends: Vec<PricingTrend>) -> Self {
        let routes = popular_routes(&flights);
        Self {
            flights,
            routes,
            trends,
            generated_at: Utc::now(),
        }
    }

    pub fn average_price(&self) -> Option<f64> {
        average(self.flights.iter().map(|f| f.price))
    }
}

fn generate_flight<R: Rng>(rng: &mut R, today: NaiveDate) -> FlightRecord {
    let origin = *AIRPORTS.choose(rng).unwrap_or(&"JFK");
    let destination = loop {
        let candidate = *AIRPORTS.choose(rng).unwrap_or(&"LAX");
        if candidate != origin {
            break candidate;
        }
    };
    let (airline, designator) = *AIRLINES.choose(rng).unwrap_or(&AIRLINES[0]);

    let date = today
        .checked_add_days(Days::new(rng.gen_range(0..BOOKING_WINDOW_DAYS)))
        .unwrap_or(today);

    let stops: u8 = if rng.gen_bool(0.3) { 1 } else { 0 };
    let flying_minutes: u32 = rng.gen_range(60..=420);
    let layover_minutes: u32 = if stops > 0 { rng.gen_range(45..=150) } else { 0 };
    let total_minutes = flying_minutes + layover_minutes;

    let departure = NaiveTime::from_hms_opt(rng.gen_range(5..=22), rng.gen_range(0..12) * 5, 0)
        .unwrap_or(NaiveTime::MIN);
    let (arrival, _) =
        departure.overflowing_add_signed(chrono::Duration::minutes(i64::from(total_minutes)));

    // Longer flights cost more; nonstop carries a premium
    let base = 49.0 + f64::from(flying_minutes) * rng.gen_range(0.55..1.35);
    let premium = if stops == 0 { 1.15 } else { 1.0 };

    FlightRecord {
        flight_number: format!("{}{}", designator, rng.gen_range(100..=2999)),
        origin: origin.to_string(),
        destination: destination.to_string(),
        airline: airline.to_string(),
        price: round_price(base * premium),
        currency: CURRENCY.to_string(),
        date,
        departure_time: format_time(departure),
        arrival_time: format_time(arrival),
        duration: format_duration(total_minutes),
        stops,
    }
}

fn format_time(time: NaiveTime) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

fn generate_trends<R: Rng>(
    rng: &mut R,
    flights: &[FlightRecord],
    today: NaiveDate,
) -> Vec<PricingTrend> {
    let baseline = average(flights.iter().map(|f| f.price)).unwrap_or(300.0);

    (0..TREND_WINDOW_DAYS)
        .rev()
        .filter_map(|days_ago| {
            let date = today.checked_sub_days(Days::new(days_ago))?;
            // Weekly seasonality with a little noise on top
            let weekly = (days_ago as f64 * std::f64::consts::TAU / 7.0).sin() * 0.08;
            let noise = rng.gen_range(-0.05..0.05);
            Some(PricingTrend {
                date,
                avg_price: round_price(baseline * (1.0 + weekly + noise)),
            })
        })
        .collect()
}

/// Aggregate flights per route, busiest first. Popularity is scaled so the
/// busiest route scores 100.
pub fn popular_routes(flights: &[FlightRecord]) -> Vec<PopularRoute> {
    let mut by_route: BTreeMap<String, (u32, f64)> = BTreeMap::new();
    for flight in flights {
        let entry = by_route.entry(flight.route()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += flight.price;
    }

    let busiest = by_route.values().map(|(count, _)| *count).max().unwrap_or(0);

    let mut routes: Vec<PopularRoute> = by_route
        .into_iter()
        .map(|(route, (count, total))| PopularRoute {
            route,
            flights: count,
            avg_price: round_price(total / f64::from(count)),
            popularity: ((f64::from(count) * 100.0) / f64::from(busiest.max(1))).round() as u8,
        })
        .collect();

    // BTreeMap iteration already ordered ties by route name
    routes.sort_by(|a, b| b.flights.cmp(&a.flights));
    debug!(routes = routes.len(), "aggregated popular routes");
    routes
}

pub(crate) fn average(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (count, total) = values.fold((0usize, 0.0), |(n, sum), v| (n + 1, sum + v));
    if count == 0 {
        None
    } else {
        Some(total / count as f64)
    }
}
