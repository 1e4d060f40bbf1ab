// Market insights: phrased by an external AI service when it is reachable,
// generated locally from the catalog when it is not

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    circuit_breaker::CircuitBreaker,
    config::Config,
    flights::{round_price, Insight, PopularRoute, PricingTrend},
    sample_data::{average, Catalog},
};

#[derive(Error, Debug)]
pub enum InsightError {
    #[error("AI service is not configured")]
    Disabled,

    #[error("AI service circuit is open")]
    CircuitOpen,

    #[error("request to AI service failed: {0}")]
    Transport(String),

    #[error("AI service timed out after {0}ms")]
    Timeout(u64),

    #[error("AI service error: {status} - {message}")]
    Upstream { status: u16, message: String },

    #[error("could not decode AI response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for InsightError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            InsightError::Decode(err.to_string())
        } else {
            InsightError::Transport(err.to_string())
        }
    }
}

/// Facts about the catalog that insights are phrased from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarketSummary {
    pub total_flights: usize,
    pub average_price: Option<f64>,
    pub best_value_route: Option<PopularRoute>,
    pub busiest_route: Option<PopularRoute>,
    pub cheapest_airline: Option<(String, f64)>,
    pub trend_change_pct: Option<f64>,
    pub cheapest_trend_day: Option<PricingTrend>,
    pub route_count: usize,
}

impl MarketSummary {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let best_value_route = catalog
            .routes
            .iter()
            .min_by(|a, b| a.avg_price.total_cmp(&b.avg_price))
            .cloned();

        let mut airlines: Vec<&str> = catalog.flights.iter().map(|f| f.airline.as_str()).collect();
        airlines.sort_unstable();
        airlines.dedup();
        let cheapest_airline = airlines
            .into_iter()
            .filter_map(|airline| {
                let avg = average(
                    catalog
                        .flights
                        .iter()
                        .filter(|f| f.airline == airline)
                        .map(|f| f.price),
                )?;
                Some((airline.to_string(), round_price(avg)))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));

        let trend_change_pct = match (catalog.trends.first(), catalog.trends.last()) {
            (Some(first), Some(last)) if first.avg_price > 0.0 && catalog.trends.len() > 1 => {
                Some(round_price((last.avg_price - first.avg_price) / first.avg_price * 100.0))
            }
            _ => None,
        };

        Self {
            total_flights: catalog.flights.len(),
            average_price: catalog.average_price().map(round_price),
            best_value_route,
            busiest_route: catalog.routes.first().cloned(),
            cheapest_airline,
            trend_change_pct,
            cheapest_trend_day: catalog
                .trends
                .iter()
                .min_by(|a, b| a.avg_price.total_cmp(&b.avg_price))
                .cloned(),
            route_count: catalog.routes.len(),
        }
    }
}

// An upstream that phrases a market summary as insights
#[async_trait]
pub trait InsightSource: Send + Sync + 'static {
    async fn generate(&self, summary: &MarketSummary) -> Result<Vec<Insight>, InsightError>;
}

// OpenAI-compatible chat completions client
pub struct OpenAiInsights {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

const SYSTEM_PROMPT: &str = "You are a travel analyst. Reply only with a JSON array of \
objects with \"title\" and \"description\" string fields.";

impl OpenAiInsights {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    fn prompt(summary: &MarketSummary) -> String {
        let facts = serde_json::to_string(summary).unwrap_or_default();
        format!(
            "Write 3 to 4 short, friendly insights for travellers from these flight \
             market facts (prices in USD): {facts}"
        )
    }
}

#[async_trait]
impl InsightSource for OpenAiInsights {
    async fn generate(&self, summary: &MarketSummary) -> Result<Vec<Insight>, InsightError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Self::prompt(summary),
                },
            ],
            temperature: 0.7,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(InsightError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| InsightError::Decode("response has no choices".to_string()))?;

        parse_insights(&content)
    }
}

/// Decode the insight array out of model output, tolerating code fences or
/// prose around it.
pub fn parse_insights(content: &str) -> Result<Vec<Insight>, InsightError> {
    let start = content.find('[');
    let end = content.rfind(']');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => return Err(InsightError::Decode("no JSON array in content".to_string())),
    };

    let insights: Vec<Insight> =
        serde_json::from_str(json).map_err(|e| InsightError::Decode(e.to_string()))?;

    let insights: Vec<Insight> = insights
        .into_iter()
        .filter(|i| !i.title.trim().is_empty() && !i.description.trim().is_empty())
        .collect();

    if insights.is_empty() {
        return Err(InsightError::Decode("empty insight list".to_string()));
    }
    Ok(insights)
}

/// Locally generated insights. Never empty.
pub fn fallback_insights(summary: &MarketSummary) -> Vec<Insight> {
    let mut insights = Vec::new();

    if let Some(route) = &summary.best_value_route {
        insights.push(Insight::new(
            "Best Value Route",
            format!(
                "{} averages ${:.2}, the lowest average fare across {} routes.",
                route.route, route.avg_price, summary.route_count
            ),
        ));
    }

    if let Some(route) = &summary.busiest_route {
        insights.push(Insight::new(
            "Busiest Route",
            format!(
                "{} has the most departures ({}) in the current schedule, so there is \
                 plenty of choice on times.",
                route.route, route.flights
            ),
        ));
    }

    if let Some((airline, avg)) = &summary.cheapest_airline {
        insights.push(Insight::new(
            "Lowest-Fare Airline",
            format!("{airline} offers the lowest average fare at ${avg:.2}."),
        ));
    }

    if let Some(change) = summary.trend_change_pct {
        let direction = if change >= 0.0 { "up" } else { "down" };
        let mut description = format!(
            "Average fares are {direction} {:.1}% over the last 30 days.",
            change.abs()
        );
        if let Some(day) = &summary.cheapest_trend_day {
            description.push_str(&format!(
                " The cheapest day was {} at ${:.2}.",
                day.date, day.avg_price
            ));
        }
        insights.push(Insight::new("Pricing Trend", description));
    }

    if insights.is_empty() {
        insights.push(Insight::new(
            "Book Early",
            "Fares tend to rise as departure approaches; booking a few weeks ahead \
             usually secures a better price.",
        ));
    }

    insights
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightOrigin {
    Ai,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct GeneratedInsights {
    pub insights: Vec<Insight>,
    pub origin: InsightOrigin,
}

/// Front for the insight endpoint. Makes at most one upstream call per
/// request and never surfaces an upstream failure.
pub struct InsightService {
    source: Option<Arc<dyn InsightSource>>,
    breaker: Mutex<CircuitBreaker>,
    timeout: Duration,
}

impl InsightService {
    pub fn new(
        source: Option<Arc<dyn InsightSource>>,
        timeout: Duration,
        failure_threshold: u32,
        reset_timeout: Duration,
    ) -> Self {
        Self {
            source,
            breaker: Mutex::new(CircuitBreaker::new(
                "ai-insights",
                failure_threshold,
                reset_timeout,
            )),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let source: Option<Arc<dyn InsightSource>> = match config.api_key() {
            Some(key) => {
                info!(model = %config.ai_model, "AI insights enabled");
                Some(Arc::new(OpenAiInsights::new(
                    &config.ai_base_url,
                    &config.ai_model,
                    key,
                    config.ai_timeout(),
                )?))
            }
            None => {
                info!("no AI API key configured, insights use local fallback");
                None
            }
        };

        Ok(Self::new(
            source,
            config.ai_timeout(),
            config.ai_failure_threshold,
            config.ai_reset_timeout(),
        ))
    }

    pub async fn generate(&self, catalog: &Catalog) -> GeneratedInsights {
        let summary = MarketSummary::from_catalog(catalog);

        match self.try_source(&summary).await {
            Ok(insights) => GeneratedInsights {
                insights,
                origin: InsightOrigin::Ai,
            },
            Err(err) => {
                match err {
                    InsightError::Disabled | InsightError::CircuitOpen => {
                        debug!(reason = %err, "serving fallback insights")
                    }
                    _ => warn!(error = %err, "AI insights failed, serving fallback"),
                }
                GeneratedInsights {
                    insights: fallback_insights(&summary),
                    origin: InsightOrigin::Fallback,
                }
            }
        }
    }

    async fn try_source(&self, summary: &MarketSummary) -> Result<Vec<Insight>, InsightError> {
        let source = self.source.as_ref().ok_or(InsightError::Disabled)?;

        if !self.breaker.lock().should_allow_call() {
            return Err(InsightError::CircuitOpen);
        }

        let result = match tokio::time::timeout(self.timeout, source.generate(summary)).await {
            Ok(result) => result,
            Err(_) => Err(InsightError::Timeout(self.timeout.as_millis() as u64)),
        };

        let mut breaker = self.breaker.lock();
        match &result {
            Ok(_) => breaker.success(),
            Err(_) => breaker.fail(),
        }
        result
    }
}
