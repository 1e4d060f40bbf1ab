// Mock flight data API and the dashboard state that consumes it

pub mod circuit_breaker;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod flights;
pub mod insights;
pub mod logging;
pub mod sample_data;
pub mod search;
pub mod server;

// Re-export key types for convenience
pub use client::{ClientError, FlightApi, HttpFlightApi};
pub use config::Config;
pub use dashboard::{sort_flights, ChartPanel, Dashboard, DashboardView, SortKey};
pub use error::{Error, Result};
pub use flights::{FlightRecord, Insight, PopularRoute, PricingTrend};
pub use insights::{InsightService, InsightSource, OpenAiInsights};
pub use sample_data::Catalog;
pub use search::{search_flights, SearchQuery, SearchRequest, ValidationError};
pub use server::{AppState, Server};
