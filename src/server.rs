// HTTP surface: JSON endpoints over the immutable catalog

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{debug, error, info, warn};

use crate::{
    config::Config,
    error::{Error, Result},
    flights::{FlightsResponse, InsightsResponse, RoutesResponse, TrendsResponse},
    insights::InsightService,
    sample_data::Catalog,
    search::{search_flights, SearchQuery, SearchRequest, ValidationError},
};

pub const API_BASE_PATH: &str = "/api";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// Head room left for the fallback after the AI call gives up
const AI_FALLBACK_MARGIN: Duration = Duration::from_secs(5);

/// Per-request deadline. Always outlasts the AI timeout so insight requests
/// can still answer with fallback content.
pub fn request_timeout(config: &Config) -> Duration {
    REQUEST_TIMEOUT.max(config.ai_timeout() + AI_FALLBACK_MARGIN)
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub field: Option<String>,
    pub detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let field = match &self {
            ApiError::Validation(err) => Some(err.field().to_string()),
            ApiError::MalformedBody(_) => None,
        };
        let body = ErrorBody {
            error: "validation_error".to_string(),
            field,
            detail: self.to_string(),
        };
        (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedBody(rejection.body_text())
    }
}

// Shared, read-only state handed to every request
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub insights: Arc<InsightService>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(catalog: Catalog, insights: InsightService) -> Self {
        Self {
            catalog: Arc::new(catalog),
            insights: Arc::new(insights),
            started_at: Utc::now(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let catalog = Catalog::generate(
            config.sample_size,
            config.sample_seed,
            Utc::now().date_naive(),
        );
        let insights = InsightService::from_config(config)?;
        Ok(Self::new(catalog, insights))
    }
}

/// Routes without middleware. API endpoints live under [`API_BASE_PATH`];
/// `/health` is also answered at the root for container probes.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/flights/search", post(search))
        .route("/routes/popular", get(popular_routes))
        .route("/trends/pricing", get(pricing_trends))
        .route("/insights/generate", get(generate_insights))
        .route("/scraping/status", get(scraping_status))
        .route("/scraping/trigger", post(trigger_scraping))
        .route("/health", get(health));

    Router::new()
        .nest(API_BASE_PATH, api)
        .route("/health", get(health))
        .with_state(state)
}

/// The full application: routes, static assets and middleware.
pub fn app(state: AppState, config: &Config) -> Router {
    let mut router = router(state);

    if let Some(dir) = &config.static_dir {
        info!(dir = %dir.display(), "serving static dashboard assets");
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(TimeoutLayer::new(request_timeout(config)))
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    match config.cors_origin_list() {
        None => layer.allow_origin(Any),
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(%origin, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            layer.allow_origin(AllowOrigin::list(origins))
        }
    }
}

async fn search(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SearchRequest>, JsonRejection>,
) -> std::result::Result<Json<FlightsResponse>, ApiError> {
    let Json(request) = payload?;
    let query = SearchQuery::try_from(request).map_err(|err| {
        debug!(error = %err, "rejected search request");
        err
    })?;

    let flights = search_flights(&state.catalog.flights, &query);
    debug!(?query, unfiltered = query.is_empty(), matches = flights.len(), "flight search");
    Ok(Json(FlightsResponse { flights }))
}

async fn popular_routes(State(state): State<AppState>) -> Json<RoutesResponse> {
    Json(RoutesResponse {
        routes: state.catalog.routes.clone(),
    })
}

async fn pricing_trends(State(state): State<AppState>) -> Json<TrendsResponse> {
    Json(TrendsResponse {
        trends: state.catalog.trends.clone(),
    })
}

async fn generate_insights(State(state): State<AppState>) -> Json<InsightsResponse> {
    let generated = state.insights.generate(&state.catalog).await;
    debug!(origin = ?generated.origin, count = generated.insights.len(), "insights generated");
    Json(InsightsResponse {
        insights: generated.insights,
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScrapingStatus {
    pub status: String,
    pub sources: Vec<String>,
    pub last_run: DateTime<Utc>,
    pub records: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScrapingAck {
    pub status: String,
    pub message: String,
    pub requested_at: DateTime<Utc>,
}

// No real ingestion exists: data is generated once at startup
async fn scraping_status(State(state): State<AppState>) -> Json<ScrapingStatus> {
    Json(ScrapingStatus {
        status: "idle".to_string(),
        sources: vec!["sample-generator".to_string()],
        last_run: state.catalog.generated_at,
        records: state.catalog.flights.len(),
    })
}

async fn trigger_scraping() -> (StatusCode, Json<ScrapingAck>) {
    info!("scraping trigger requested, nothing to run");
    (
        StatusCode::ACCEPTED,
        Json(ScrapingAck {
            status: "accepted".to_string(),
            message: "Sample data is generated at startup; no scrape was started.".to_string(),
            requested_at: Utc::now(),
        }),
    )
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub version: String,
    pub flights: usize,
    pub uptime_secs: i64,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        flights: state.catalog.flights.len(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

/// A running server. Dropping it without [`Server::shutdown`] leaves the
/// task running until the runtime stops.
pub struct Server {
    local_addr: SocketAddr,
    join_handle: JoinHandle<()>,
    shutdown_sender: oneshot::Sender<()>,
}

impl Server {
    pub async fn start(state: AppState, config: &Config) -> Result<Self> {
        let addr = config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| Error::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let app = app(state, config);
        let (shutdown_sender, shutdown_receiver) = oneshot::channel::<()>();
        let join_handle = tokio::spawn(async move {
            info!(%local_addr, "starting HTTP server");
            let shutdown = async move {
                let _ = shutdown_receiver.await;
                info!("starting graceful shutdown");
            };
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(error = %err, "HTTP server terminated with error");
            }
        });

        Ok(Self {
            local_addr,
            join_handle,
            shutdown_sender,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}{}", self.local_addr, API_BASE_PATH)
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_sender.send(());
        if let Err(err) = self.join_handle.await {
            error!(error = %err, "HTTP server task failed");
        }
        info!("HTTP server has been shut down");
    }
}
