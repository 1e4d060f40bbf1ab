// Flight search: request validation and filtering over the in-memory catalog

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flights::FlightRecord;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

// Validation errors raised before a request ever reaches the filter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be a number, got {value:?}")]
    InvalidPrice { field: &'static str, value: String },

    #[error("{field} must not be negative, got {value}")]
    NegativePrice { field: &'static str, value: f64 },

    #[error("date must be formatted as YYYY-MM-DD, got {0:?}")]
    InvalidDate(String),

    #[error("{field} must be a 3-letter airport code, got {value:?}")]
    InvalidAirportCode { field: &'static str, value: String },
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::InvalidPrice { field, .. }
            | ValidationError::NegativePrice { field, .. }
            | ValidationError::InvalidAirportCode { field, .. } => field,
            ValidationError::InvalidDate(_) => "date",
        }
    }
}

// Prices are accepted as JSON numbers or as numeric strings from form fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceInput {
    Number(f64),
    Text(String),
}

impl From<f64> for PriceInput {
    fn from(value: f64) -> Self {
        PriceInput::Number(value)
    }
}

// Wire form of a search as the client submits it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<PriceInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<PriceInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub airline: Option<String>,
}

/// Validated filter criteria. `None` means no constraint on that dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub date: Option<NaiveDate>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub airline: Option<String>,
}

impl TryFrom<SearchRequest> for SearchQuery {
    type Error = ValidationError;

    fn try_from(request: SearchRequest) -> Result<Self, Self::Error> {
        Ok(SearchQuery {
            origin: airport_code("origin", request.origin)?,
            destination: airport_code("destination", request.destination)?,
            date: date(request.date)?,
            min_price: price("min_price", request.min_price)?,
            max_price: price("max_price", request.max_price)?,
            airline: non_blank(request.airline),
        })
    }
}

impl SearchQuery {
    pub fn is_empty(&self) -> bool {
        self == &SearchQuery::default()
    }

    pub fn matches(&self, flight: &FlightRecord) -> bool {
        let origin_ok = self
            .origin
            .as_ref()
            .map_or(true, |code| flight.origin.eq_ignore_ascii_case(code));

        let destination_ok = self
            .destination
            .as_ref()
            .map_or(true, |code| flight.destination.eq_ignore_ascii_case(code));

        let date_ok = self.date.map_or(true, |date| flight.date == date);

        let min_price_ok = self.min_price.map_or(true, |min| flight.price >= min);

        let max_price_ok = self.max_price.map_or(true, |max| flight.price <= max);

        let airline_ok = self.airline.as_ref().map_or(true, |airline| {
            flight.airline.to_lowercase() == airline.to_lowercase()
        });

        origin_ok && destination_ok && date_ok && min_price_ok && max_price_ok && airline_ok
    }
}

/// Return the flights matching every supplied constraint, in catalog order.
///
/// An inverted price range (`min_price > max_price`) is taken literally and
/// matches nothing.
pub fn search_flights(flights: &[FlightRecord], query: &SearchQuery) -> Vec<FlightRecord> {
    flights
        .iter()
        .filter(|flight| query.matches(flight))
        .cloned()
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn airport_code(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<String>, ValidationError> {
    let Some(code) = non_blank(value) else {
        return Ok(None);
    };

    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(ValidationError::InvalidAirportCode { field, value: code });
    }

    Ok(Some(code.to_ascii_uppercase()))
}

fn date(value: Option<String>) -> Result<Option<NaiveDate>, ValidationError> {
    let Some(raw) = non_blank(value) else {
        return Ok(None);
    };

    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map(Some)
        .map_err(|_| ValidationError::InvalidDate(raw))
}

fn price(field: &'static str, value: Option<PriceInput>) -> Result<Option<f64>, ValidationError> {
    let amount = match value {
        None => return Ok(None),
        Some(PriceInput::Number(n)) => n,
        Some(PriceInput::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse::<f64>()
                .map_err(|_| ValidationError::InvalidPrice {
                    field,
                    value: text.to_string(),
                })?
        }
    };

    if !amount.is_finite() {
        return Err(ValidationError::InvalidPrice {
            field,
            value: amount.to_string(),
        });
    }
    if amount < 0.0 {
        return Err(ValidationError::NegativePrice {
            field,
            value: amount,
        });
    }

    Ok(Some(amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flight(origin: &str, destination: &str, airline: &str, price: f64) -> FlightRecord {
        FlightRecord {
            flight_number: format!("XX{}", price as u32),
            origin: origin.to_string(),
            destination: destination.to_string(),
            airline: airline.to_string(),
            price,
            currency: "USD".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            departure_time: "09:00".to_string(),
            arrival_time: "12:00".to_string(),
            duration: "3h 0m".to_string(),
            stops: 0,
        }
    }

    fn seeded() -> Vec<FlightRecord> {
        vec![
            flight("BOS", "ORD", "United Airlines", 180.0),
            flight("JFK", "LAX", "Delta Air Lines", 420.0),
            flight("JFK", "SFO", "JetBlue Airways", 310.0),
            flight("JFK", "LAX", "American Airlines", 390.0),
            flight("LAX", "JFK", "Delta", 450.0),
        ]
    }

    fn query(request: SearchRequest) -> SearchQuery {
        SearchQuery::try_from(request).unwrap()
    }

    #[test]
    fn test_empty_query_returns_full_collection_in_order() {
        let flights = seeded();
        let results = search_flights(&flights, &SearchQuery::default());
        assert_eq!(results, flights);
    }

    #[test]
    fn test_origin_and_destination_scenario() {
        let flights = seeded();
        let q = query(SearchRequest {
            origin: Some("JFK".to_string()),
            destination: Some("LAX".to_string()),
            ..Default::default()
        });

        let results = search_flights(&flights, &q);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].airline, "Delta Air Lines");
        assert_eq!(results[1].airline, "American Airlines");
    }

    #[test]
    fn test_origin_only_is_case_insensitive() {
        let flights = seeded();
        let q = SearchQuery {
            origin: Some("jfk".to_string()),
            ..Default::default()
        };

        let results = search_flights(&flights, &q);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|f| f.origin.eq_ignore_ascii_case("jfk")));
    }

    #[test]
    fn test_price_range_is_inclusive() {
        let flights: Vec<_> = [150.0, 200.0, 500.0, 800.0, 900.0]
            .into_iter()
            .map(|p| flight("JFK", "LAX", "Delta Air Lines", p))
            .collect();
        let q = query(SearchRequest {
            min_price: Some(200.0.into()),
            max_price: Some(800.0.into()),
            ..Default::default()
        });

        let prices: Vec<f64> = search_flights(&flights, &q).iter().map(|f| f.price).collect();
        assert_eq!(prices, vec![200.0, 500.0, 800.0]);
    }

    #[test]
    fn test_inverted_price_range_is_empty() {
        let flights = seeded();
        for (min, max) in [(500.0, 100.0), (180.01, 180.0), (1000.0, 0.0)] {
            let q = SearchQuery {
                min_price: Some(min),
                max_price: Some(max),
                ..Default::default()
            };
            assert!(search_flights(&flights, &q).is_empty());
        }
    }

    #[test]
    fn test_airline_is_exact_not_substring() {
        let flights = seeded();
        let q = query(SearchRequest {
            airline: Some("Delta Air Lines".to_string()),
            ..Default::default()
        });

        let results = search_flights(&flights, &q);
        assert_eq!(results.len(), 1);
        assert!(results.iter().all(|f| f.airline != "Delta"));

        let q = query(SearchRequest {
            airline: Some("delta".to_string()),
            ..Default::default()
        });
        let results = search_flights(&flights, &q);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].airline, "Delta");
    }

    #[test]
    fn test_date_filter() {
        let mut flights = seeded();
        flights[2].date = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        let q = query(SearchRequest {
            date: Some("2024-06-02".to_string()),
            ..Default::default()
        });

        let results = search_flights(&flights, &q);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].destination, "SFO");
    }

    #[test]
    fn test_query_is_empty() {
        assert!(SearchQuery::default().is_empty());

        let blank = SearchQuery::try_from(SearchRequest {
            origin: Some("  ".to_string()),
            airline: Some(String::new()),
            ..Default::default()
        })
        .unwrap();
        assert!(blank.is_empty());

        let q = SearchQuery::try_from(SearchRequest {
            airline: Some("Delta Air Lines".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert!(!q.is_empty());
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let q = query(SearchRequest {
            origin: Some("SEA".to_string()),
            ..Default::default()
        });
        assert!(search_flights(&seeded(), &q).is_empty());
    }

    #[test]
    fn test_validation_normalizes_input() {
        let q = query(SearchRequest {
            origin: Some(" jfk ".to_string()),
            destination: Some("".to_string()),
            date: Some("2024-06-01".to_string()),
            min_price: Some(PriceInput::Text("199.5".to_string())),
            max_price: Some(PriceInput::Text("   ".to_string())),
            airline: Some("  Delta Air Lines ".to_string()),
        });

        assert_eq!(q.origin.as_deref(), Some("JFK"));
        assert_eq!(q.destination, None);
        assert_eq!(q.date, NaiveDate::from_ymd_opt(2024, 6, 1));
        assert_eq!(q.min_price, Some(199.5));
        assert_eq!(q.max_price, None);
        assert_eq!(q.airline.as_deref(), Some("Delta Air Lines"));
    }

    #[test]
    fn test_validation_rejects_non_numeric_price() {
        let err = SearchQuery::try_from(SearchRequest {
            max_price: Some(PriceInput::Text("cheap".to_string())),
            ..Default::default()
        })
        .unwrap_err();

        assert_eq!(err.field(), "max_price");
        assert!(matches!(err, ValidationError::InvalidPrice { .. }));
    }

    #[test]
    fn test_validation_rejects_negative_price() {
        let err = SearchQuery::try_from(SearchRequest {
            min_price: Some((-5.0).into()),
            ..Default::default()
        })
        .unwrap_err();

        assert_eq!(err.field(), "min_price");
    }

    #[test]
    fn test_validation_rejects_malformed_date() {
        for bad in ["2024-13-01", "06/01/2024", "tomorrow", "2024-02-30"] {
            let err = SearchQuery::try_from(SearchRequest {
                date: Some(bad.to_string()),
                ..Default::default()
            })
            .unwrap_err();
            assert_eq!(err, ValidationError::InvalidDate(bad.to_string()));
        }
    }

    #[test]
    fn test_validation_rejects_bad_airport_code() {
        for bad in ["JF", "JFKX", "J1K"] {
            let err = SearchQuery::try_from(SearchRequest {
                destination: Some(bad.to_string()),
                ..Default::default()
            })
            .unwrap_err();
            assert_eq!(err.field(), "destination");
        }
    }

    #[test]
    fn test_request_deserializes_mixed_price_types() {
        let request: SearchRequest =
            serde_json::from_str(r#"{"origin":"JFK","min_price":"100","max_price":450.5}"#)
                .unwrap();

        assert_eq!(request.min_price, Some(PriceInput::Text("100".to_string())));
        assert_eq!(request.max_price, Some(PriceInput::Number(450.5)));
        assert_eq!(request.airline, None);
    }

    #[test]
    fn test_request_serialization_skips_absent_fields() {
        let request = SearchRequest {
            origin: Some("JFK".to_string()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&request).unwrap(), r#"{"origin":"JFK"}"#);
    }
}
