use axum::{
    extract::{rejection::JsonRejection, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

mod config;
mod error;
mod inference;
mod logging;
mod models;
mod projections;

#[cfg(test)]
mod fixtures;

use config::Config;
use error::{ApiError, PredictError};
use inference::{PricePredictor, ROME_MUNICIPI};
use models::{format_price, ApiResponse, HostsParams, ListingQuery, Neighbourhood, PredictionResponse};
use projections::ListingsDataset;

/// Rome listings API
/// Artifacts and listings load once at startup, each feature degrades on its own
#[derive(Clone)]
struct AppState {
    predictor: Availability<PricePredictor>,
    listings: Availability<ListingsDataset>,
    currency_symbol: Arc<str>,
}

/// A startup-loaded resource, or the reason it failed to load
enum Availability<T> {
    Ready { value: Arc<T>, loaded_at: DateTime<Utc> },
    Unavailable(Arc<str>),
}

impl<T> Clone for Availability<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Ready { value, loaded_at } => Self::Ready {
                value: value.clone(),
                loaded_at: *loaded_at,
            },
            Self::Unavailable(reason) => Self::Unavailable(reason.clone()),
        }
    }
}

impl<T> Availability<T> {
    fn from_result<E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Ready {
                value: Arc::new(value),
                loaded_at: Utc::now(),
            },
            Err(e) => Self::Unavailable(e.to_string().into()),
        }
    }

    fn get(&self) -> Result<&Arc<T>, &str> {
        match self {
            Self::Ready { value, .. } => Ok(value),
            Self::Unavailable(reason) => Err(&**reason),
        }
    }
}

impl AppState {
    fn initialize(config: &Config) -> Self {
        let predictor = PricePredictor::initialize(&config.artifact_paths(), config.validation());
        match &predictor {
            Ok(p) => info!(model = p.model_name(), policy = ?p.policy(), "price prediction ready"),
            Err(e) => error!(error = %e, "price prediction disabled"),
        }

        let listings = ListingsDataset::load(&config.listings_path);
        match &listings {
            Ok(d) => info!(path = %d.path().display(), rows = d.len(), "listings loaded"),
            Err(e) => error!(error = %e, "listing statistics disabled"),
        }

        Self {
            predictor: Availability::from_result(predictor),
            listings: Availability::from_result(listings),
            currency_symbol: config.currency_symbol.as_str().into(),
        }
    }

    fn listings(&self) -> Result<&Arc<ListingsDataset>, ApiError> {
        self.listings
            .get()
            .map_err(|reason| ApiError::ListingsUnavailable(reason.to_string()))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    logging::init_logger();

    let config = Config::from_env();
    let state = AppState::initialize(&config);
    let app = build_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("server running on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/neighbourhoods", get(list_neighbourhoods))
        .route("/predict", post(predict_price))
        .route("/listings/overview", get(listings_overview))
        .route("/listings/neighbourhoods", get(listings_by_neighbourhood))
        .route("/listings/accommodates", get(listings_by_accommodates))
        .route("/listings/room-types", get(listings_by_room_type))
        .route("/listings/price-by-rating", get(listings_price_by_rating))
        .route("/listings/hosts", get(listings_top_hosts))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> &'static str {
    "Rome Listings API v0.1.0"
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let prediction = match &state.predictor {
        Availability::Ready { value, loaded_at } => serde_json::json!({
            "available": true,
            "model": value.model_name(),
            "neighbourhoods": value.encoding().len(),
            "loaded_at": loaded_at.to_rfc3339(),
        }),
        Availability::Unavailable(reason) => serde_json::json!({
            "available": false,
            "error": reason.to_string(),
        }),
    };
    let listings = match &state.listings {
        Availability::Ready { value, loaded_at } => serde_json::json!({
            "available": true,
            "rows": value.len(),
            "loaded_at": loaded_at.to_rfc3339(),
        }),
        Availability::Unavailable(reason) => serde_json::json!({
            "available": false,
            "error": reason.to_string(),
        }),
    };

    let all_ready = state.predictor.get().is_ok() && state.listings.get().is_ok();
    Json(serde_json::json!({
        "status": if all_ready { "healthy" } else { "degraded" },
        "timestamp": Utc::now().to_rfc3339(),
        "prediction": prediction,
        "listings": listings,
    }))
}

/// Districts offered by the prediction form
async fn list_neighbourhoods(State(state): State<AppState>) -> Json<ApiResponse> {
    let neighbourhoods: Vec<Neighbourhood> = match state.predictor.get() {
        Ok(predictor) => predictor
            .encoding()
            .entries()
            .map(|(code, name)| Neighbourhood {
                name: name.to_string(),
                code: Some(code),
            })
            .collect(),
        Err(_) => ROME_MUNICIPI
            .iter()
            .map(|name| Neighbourhood {
                name: name.to_string(),
                code: None,
            })
            .collect(),
    };

    Json(ApiResponse::success(
        format!("{} neighbourhoods", neighbourhoods.len()),
        neighbourhoods,
    ))
}

/// Predict the nightly price of a listing
async fn predict_price(
    State(state): State<AppState>,
    payload: Result<Json<ListingQuery>, JsonRejection>,
) -> Result<Json<ApiResponse>, ApiError> {
    let Json(query) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "prediction request rejected");
        ApiError::from(rejection)
    })?;
    let predictor = state
        .predictor
        .get()
        .map_err(|reason| ApiError::PredictorUnavailable(reason.to_string()))?;

    let request_id = Uuid::new_v4();
    let result = predictor.encode(&query).and_then(|features| {
        predictor
            .predict_encoded(&features)
            .map(|price| (features, price))
    });

    let (features, price) = match result {
        Ok(ok) => ok,
        Err(e) if e.is_client_error() => {
            warn!(%request_id, error = %e, "prediction rejected");
            return Err(e.into());
        }
        Err(e @ PredictError::FeatureShapeError { .. }) => {
            error!(%request_id, neighbourhood = %query.neighbourhood, error = %e, "prediction failed");
            return Err(e.into());
        }
        Err(e) => {
            warn!(%request_id, neighbourhood = %query.neighbourhood, error = %e, "prediction failed");
            return Err(e.into());
        }
    };

    let display = format_price(price, &state.currency_symbol);
    info!(%request_id, neighbourhood = %query.neighbourhood, price, "price predicted");

    Ok(Json(ApiResponse::success(
        format!("The predicted price of the accommodation is {}", display),
        PredictionResponse {
            request_id,
            price,
            display,
            currency_symbol: state.currency_symbol.to_string(),
            features: features.as_slice().to_vec(),
        },
    )))
}

async fn listings_overview(State(state): State<AppState>) -> Result<Json<ApiResponse>, ApiError> {
    let dataset = state.listings()?;
    Ok(Json(ApiResponse::success("overview", dataset.overview())))
}

async fn listings_by_neighbourhood(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse>, ApiError> {
    let dataset = state.listings()?;
    Ok(Json(ApiResponse::success(
        "listings by neighbourhood",
        dataset.neighbourhoods(),
    )))
}

async fn listings_by_accommodates(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse>, ApiError> {
    let dataset = state.listings()?;
    Ok(Json(ApiResponse::success(
        "listings by number of guests",
        dataset.accommodates_distribution(),
    )))
}

async fn listings_by_room_type(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse>, ApiError> {
    let dataset = state.listings()?;
    Ok(Json(ApiResponse::success(
        "listings by property and room type",
        dataset.room_types(),
    )))
}

async fn listings_price_by_rating(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse>, ApiError> {
    let dataset = state.listings()?;
    Ok(Json(ApiResponse::success(
        "mean price by general score",
        dataset.price_by_rating(),
    )))
}

async fn listings_top_hosts(
    State(state): State<AppState>,
    Query(params): Query<HostsParams>,
) -> Result<Json<ApiResponse>, ApiError> {
    let dataset = state.listings()?;
    let limit = params.limit.unwrap_or(10);
    Ok(Json(ApiResponse::success(
        format!("top {} hosts", limit),
        dataset.top_hosts(limit),
    )))
}
