// Dashboard-side API client for the flight endpoints

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::{
    flights::{
        FlightRecord, FlightsResponse, Insight, InsightsResponse, PopularRoute, PricingTrend,
        RoutesResponse, TrendsResponse,
    },
    search::SearchRequest,
    server::ErrorBody,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    #[error("Could not read response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

// The calls the dashboard makes against the API
#[async_trait]
pub trait FlightApi: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<FlightRecord>, ClientError>;

    async fn popular_routes(&self) -> Result<Vec<PopularRoute>, ClientError>;

    async fn pricing_trends(&self) -> Result<Vec<PricingTrend>, ClientError>;

    async fn insights(&self) -> Result<Vec<Insight>, ClientError>;
}

#[derive(Debug, Clone)]
pub struct HttpFlightApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpFlightApi {
    /// `base_url` includes the API base path, e.g. `http://localhost:8000/api`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Prefer the API's own error detail when the body carries one
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.detail)
            .unwrap_or(text);
        Err(ClientError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.http.get(self.url(path)).send().await?;
        Self::read(response).await
    }
}

#[async_trait]
impl FlightApi for HttpFlightApi {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<FlightRecord>, ClientError> {
        debug!(?request, "searching flights");
        let response = self
            .http
            .post(self.url("/flights/search"))
            .json(request)
            .send()
            .await?;
        let body: FlightsResponse = Self::read(response).await?;
        Ok(body.flights)
    }

    async fn popular_routes(&self) -> Result<Vec<PopularRoute>, ClientError> {
        let body: RoutesResponse = self.get("/routes/popular").await?;
        Ok(body.routes)
    }

    async fn pricing_trends(&self) -> Result<Vec<PricingTrend>, ClientError> {
        let body: TrendsResponse = self.get("/trends/pricing").await?;
        Ok(body.trends)
    }

    async fn insights(&self) -> Result<Vec<Insight>, ClientError> {
        let body: InsightsResponse = self.get("/insights/generate").await?;
        Ok(body.insights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        insights::InsightService,
        sample_data::Catalog,
        search::PriceInput,
        server::{AppState, Server},
    };
    use chrono::NaiveDate;
    use std::time::Duration;

    async fn start() -> Server {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..Default::default()
        };
        let catalog = Catalog::generate(60, Some(5), NaiveDate::from_ymd_opt(2024, 9, 1).unwrap());
        let insights = InsightService::new(None, Duration::from_secs(1), 3, Duration::from_secs(60));
        Server::start(AppState::new(catalog, insights), &config)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_against_server() {
        let server = start().await;
        let api = HttpFlightApi::new(server.base_url());

        let everything = api.search(&SearchRequest::default()).await.unwrap();
        assert_eq!(everything.len(), 60);

        let origin = everything[0].origin.clone();
        let request = SearchRequest {
            origin: Some(origin.to_lowercase()),
            max_price: Some(PriceInput::Number(10_000.0)),
            ..Default::default()
        };
        let subset = api.search(&request).await.unwrap();
        assert!(!subset.is_empty());
        assert!(subset.iter().all(|f| f.origin == origin));

        assert!(!api.popular_routes().await.unwrap().is_empty());
        assert_eq!(api.pricing_trends().await.unwrap().len(), 30);
        assert!(!api.insights().await.unwrap().is_empty());

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_validation_error_surfaces_detail() {
        let server = start().await;
        let api = HttpFlightApi::new(format!("{}/", server.base_url()));

        let err = api
            .search(&SearchRequest {
                date: Some("not-a-date".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();

        match err {
            ClientError::Status { status, message } => {
                assert_eq!(status, 422);
                assert!(message.contains("YYYY-MM-DD"), "{message}");
            }
            other => panic!("unexpected error {other:?}"),
        }
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = HttpFlightApi::new(format!("http://{addr}/api"));
        let err = api.popular_routes().await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)), "{err:?}");
    }
}
