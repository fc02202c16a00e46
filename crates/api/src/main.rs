use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use dcf_core::domain::{
    Assumptions, DiscountAnchor, Period, StatementError, StatementKind, Symbol, ValuationError,
};
use dcf_core::ingest::FmpDataProvider;
use dcf_core::service::{
    validate_years, DcfData, DcfService, DcfValuation, ServiceOptions, StatementsData, UfcfData,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = dcf_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let options = ServiceOptions::from_env()?;
    let service = match FmpDataProvider::from_settings(&settings) {
        Ok(provider) => Some(Arc::new(DcfService::new(Arc::new(provider), options))),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "data provider not configured; starting API in degraded mode");
            None
        }
    };

    let state = AppState { service, options };

    let app = router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/valuations/:symbol", get(get_valuation))
        .route("/ufcf/:symbol", get(get_ufcf))
        .route("/metrics/:symbol", get(get_metrics))
        .route("/statements/:symbol", get(get_statements))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    service: Option<Arc<DcfService>>,
    options: ServiceOptions,
}

#[derive(Debug, Default, Deserialize)]
struct DcfQuery {
    period: Option<String>,
    years: Option<u32>,
    discount_rate: Option<f64>,
    terminal_growth_rate: Option<f64>,
    net_debt: Option<f64>,
    anchor: Option<String>,
    kind: Option<String>,
}

#[derive(Debug, Clone)]
struct DcfRequest {
    symbol: Symbol,
    period: Period,
    years: u32,
    assumptions: Assumptions,
    net_debt: Option<f64>,
    kind: Option<StatementKind>,
}

impl DcfRequest {
    /// Only valuations discount anything, so the other routes accept any rates.
    fn validated_assumptions(&self) -> Result<&Assumptions, ApiError> {
        self.assumptions
            .validate()
            .map_err(|e| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
        Ok(&self.assumptions)
    }
}

impl DcfQuery {
    fn into_request(self, symbol: &str, defaults: &ServiceOptions) -> Result<DcfRequest, ApiError> {
        let symbol = Symbol::parse(symbol).map_err(ApiError::bad_request)?;
        let period = match self.period.as_deref() {
            Some(p) => p.parse::<Period>().map_err(ApiError::bad_request)?,
            None => Period::default(),
        };
        let years = self.years.unwrap_or(defaults.years);
        validate_years(years).map_err(|e| ApiError::bad_request(format!("{e:#}")))?;
        let anchor = match self.anchor.as_deref() {
            Some(a) => a.parse::<DiscountAnchor>().map_err(ApiError::bad_request)?,
            None => defaults.assumptions.anchor,
        };

        let assumptions = Assumptions {
            discount_rate: self.discount_rate.unwrap_or(defaults.assumptions.discount_rate),
            terminal_growth_rate: self
                .terminal_growth_rate
                .unwrap_or(defaults.assumptions.terminal_growth_rate),
            anchor,
        };
        let kind = match self.kind.as_deref() {
            Some(k) => Some(k.parse::<StatementKind>().map_err(ApiError::bad_request)?),
            None => None,
        };

        Ok(DcfRequest {
            symbol,
            period,
            years,
            assumptions,
            net_debt: self.net_debt,
            kind,
        })
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(err: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::BAD_REQUEST, err.to_string())
    }

    fn unavailable() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "data provider is not configured")
    }

    /// Typed domain errors keep their meaning; anything else is an upstream provider failure.
    fn from_service(err: anyhow::Error) -> Self {
        let status = if err.downcast_ref::<ValuationError>().is_some()
            || err.downcast_ref::<StatementError>().is_some()
        {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            sentry_anyhow::capture_anyhow(&err);
            StatusCode::BAD_GATEWAY
        };
        tracing::warn!(%status, error = %format!("{err:#}"), "dcf request failed");
        Self::new(status, format!("{err:#}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn prepare(
    state: &AppState,
    symbol: &str,
    query: DcfQuery,
) -> Result<(Arc<DcfService>, DcfRequest), ApiError> {
    let req = query.into_request(symbol, &state.options)?;
    let service = state.service.clone().ok_or_else(ApiError::unavailable)?;
    Ok((service, req))
}

async fn get_valuation(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<DcfQuery>,
) -> Result<Json<DcfValuation>, ApiError> {
    let (service, req) = prepare(&state, &symbol, query)?;
    let assumptions = req.validated_assumptions()?;
    let valuation = service
        .valuation(&req.symbol, req.period, req.years, assumptions, req.net_debt)
        .await
        .map_err(ApiError::from_service)?;
    Ok(Json(valuation))
}

async fn get_ufcf(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<DcfQuery>,
) -> Result<Json<UfcfData>, ApiError> {
    let (service, req) = prepare(&state, &symbol, query)?;
    let ufcf = service
        .ufcf(&req.symbol, req.period, req.years)
        .await
        .map_err(ApiError::from_service)?;
    Ok(Json(ufcf))
}

async fn get_metrics(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<DcfQuery>,
) -> Result<Json<DcfData>, ApiError> {
    let (service, req) = prepare(&state, &symbol, query)?;
    let data = service
        .dcf_data(&req.symbol, req.period, req.years)
        .await
        .map_err(ApiError::from_service)?;
    Ok(Json(data))
}

async fn get_statements(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<DcfQuery>,
) -> Result<Json<StatementsData>, ApiError> {
    let (service, req) = prepare(&state, &symbol, query)?;
    let kind = req
        .kind
        .ok_or_else(|| ApiError::bad_request("kind is required (income or cash-flow)"))?;
    let data = service
        .statements(&req.symbol, req.period, req.years, kind)
        .await
        .map_err(ApiError::from_service)?;
    Ok(Json(data))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &dcf_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
