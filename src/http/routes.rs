//! HTTP route definitions

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::geocode::GeocodeError;
use crate::http::middleware::require_auth;
use crate::http::validation;
use crate::store::repository::{NewStore, RepoError, StoreFilter, StoreUpdate, StoreWithTags};

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // Read endpoints are open to any origin; mutations are gated by token
    let cors = CorsLayer::permissive();

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/stores", get(list_stores_handler))
        .route("/stores/:store_id", get(get_store_handler));

    // Protected routes (bearer token required)
    let protected_routes = Router::new()
        .route(
            "/stores",
            post(create_store_handler)
                .patch(update_store_handler)
                .delete(delete_store_handler),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

// ============================================================================
// Store endpoints
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListStoresQuery {
    search_name: Option<String>,
    tag_name: Option<String>,
}

#[derive(Serialize)]
struct StoresResponse {
    stores: Vec<StoreWithTags>,
}

async fn list_stores_handler(
    State(state): State<AppState>,
    Query(query): Query<ListStoresQuery>,
) -> Result<Json<StoresResponse>, ApiError> {
    info!("store list requested");

    if let Some(ref name) = query.search_name {
        validation::bounded_filter("searchName", name).map_err(ApiError::Validation)?;
    }
    if let Some(ref tag) = query.tag_name {
        validation::bounded_filter("tagName", tag).map_err(ApiError::Validation)?;
    }

    // Empty filter values mean no filtering
    let filter = StoreFilter {
        name_pattern: query.search_name.filter(|v| !v.is_empty()),
        tag_name: query.tag_name.filter(|v| !v.is_empty()),
    };

    let stores = state.store_repo.list(&filter).await?;

    Ok(Json(StoresResponse { stores }))
}

async fn get_store_handler(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
) -> Result<Json<StoreWithTags>, ApiError> {
    info!("store fetch requested: {}", store_id);

    let store_id = parse_store_id(&store_id)?;
    let store = state.store_repo.get(store_id).await?;

    Ok(Json(store))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateStoreRequest {
    store_name: Option<String>,
    address: Option<String>,
    content: Option<String>,
    tags: Option<Vec<String>>,
}

async fn create_store_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateStoreRequest>,
) -> Result<StatusCode, ApiError> {
    let store_name = required_field("storeName", req.store_name)?;
    let address = required_field("address", req.address)?;
    let content = required_field("content", req.content)?;

    info!("store create requested: {}", store_name);

    let tags = req
        .tags
        .ok_or_else(|| ApiError::Validation("tags is required".to_string()))?;
    if tags.is_empty() {
        return Err(ApiError::Validation("tags must not be empty".to_string()));
    }
    for tag in &tags {
        validation::required_text("tags", tag).map_err(ApiError::Validation)?;
    }

    state
        .store_repo
        .create(NewStore {
            store_name,
            address,
            content,
            tags,
        })
        .await?;

    Ok(StatusCode::CREATED)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateStoreRequest {
    store_id: Option<String>,
    store_name: Option<String>,
    address: Option<String>,
    content: Option<String>,
    tags: Option<Vec<String>>,
}

async fn update_store_handler(
    State(state): State<AppState>,
    Json(req): Json<UpdateStoreRequest>,
) -> Result<StatusCode, ApiError> {
    let store_id = req
        .store_id
        .ok_or_else(|| ApiError::Validation("storeId is required".to_string()))?;
    let store_id = parse_store_id(&store_id)?;

    info!("store update requested: {}", store_id);

    if let Some(ref v) = req.store_name {
        validation::required_text("storeName", v).map_err(ApiError::Validation)?;
    }
    if let Some(ref v) = req.address {
        validation::required_text("address", v).map_err(ApiError::Validation)?;
    }
    if let Some(ref v) = req.content {
        validation::required_text("content", v).map_err(ApiError::Validation)?;
    }
    // An empty tag list is valid here: it unlinks every tag
    if let Some(ref tags) = req.tags {
        for tag in tags {
            validation::required_text("tags", tag).map_err(ApiError::Validation)?;
        }
    }

    state
        .store_repo
        .update(
            store_id,
            StoreUpdate {
                store_name: req.store_name,
                address: req.address,
                content: req.content,
                tags: req.tags,
            },
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteStoreQuery {
    store_id: Option<String>,
}

async fn delete_store_handler(
    State(state): State<AppState>,
    Query(query): Query<DeleteStoreQuery>,
) -> Result<StatusCode, ApiError> {
    let store_id = query
        .store_id
        .ok_or_else(|| ApiError::Validation("storeId is required".to_string()))?;
    let store_id = parse_store_id(&store_id)?;

    info!("store delete requested: {}", store_id);

    state.store_repo.delete(store_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

fn required_field(field: &str, value: Option<String>) -> Result<String, ApiError> {
    let value = value.ok_or_else(|| ApiError::Validation(format!("{} is required", field)))?;
    validation::required_text(field, &value).map_err(ApiError::Validation)?;
    Ok(value)
}

fn parse_store_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::Validation("storeId must be a UUID".to_string()))
}

// ============================================================================
// Error handling
// ============================================================================

/// Domain failures mapped one-to-one onto transport status codes
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed request fields; reported as 404 by service convention
    #[error("{0}")]
    Validation(String),

    #[error("Store not found")]
    StoreNotFound,

    #[error("Address not found")]
    AddressNotFound,

    #[error("No response from the geocoding API")]
    GeocoderUnreachable,

    #[error("Geocoding request failed")]
    GeocoderFault,

    #[error("Data integrity violation")]
    DataIntegrity,

    #[error("Database unavailable")]
    StorageUnavailable,

    #[error("Database schema error")]
    StorageSchema,

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::NOT_FOUND,
            ApiError::StoreNotFound => StatusCode::NOT_FOUND,
            ApiError::AddressNotFound => StatusCode::NOT_FOUND,
            ApiError::GeocoderUnreachable => StatusCode::BAD_REQUEST,
            ApiError::GeocoderFault => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::DataIntegrity => StatusCode::BAD_REQUEST,
            ApiError::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::StorageSchema => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GeocodeError> for ApiError {
    fn from(err: GeocodeError) -> Self {
        match err {
            GeocodeError::NotFound => ApiError::AddressNotFound,
            GeocodeError::Unreachable => ApiError::GeocoderUnreachable,
            GeocodeError::Unexpected(_) => ApiError::GeocoderFault,
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::StoreNotFound => {
                warn!("store not found");
                ApiError::StoreNotFound
            }
            RepoError::Geocode(geo) => {
                warn!("geocoding failed: {}", geo);
                ApiError::from(geo)
            }
            RepoError::Integrity(e) => {
                error!("data integrity violation: {}", e);
                ApiError::DataIntegrity
            }
            RepoError::Unavailable(e) => {
                error!("database unavailable: {}", e);
                ApiError::StorageUnavailable
            }
            RepoError::Schema(e) => {
                error!("database schema error: {}", e);
                ApiError::StorageSchema
            }
            RepoError::Other(e) => {
                error!("database error: {}", e);
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_report_not_found_status() {
        // Service convention: field violations are 404, not 400/422
        let err = ApiError::Validation("searchName must be at most 100 characters".to_string());

        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn status_mapping_covers_the_taxonomy() {
        assert_eq!(ApiError::StoreNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::AddressNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::GeocoderUnreachable.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::GeocoderFault.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::DataIntegrity.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::StorageUnavailable.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::StorageSchema.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::Internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn geocode_failures_translate_one_to_one() {
        assert!(matches!(
            ApiError::from(GeocodeError::NotFound),
            ApiError::AddressNotFound
        ));
        assert!(matches!(
            ApiError::from(GeocodeError::Unreachable),
            ApiError::GeocoderUnreachable
        ));
        assert!(matches!(
            ApiError::from(GeocodeError::Unexpected("boom".to_string())),
            ApiError::GeocoderFault
        ));
    }

    #[test]
    fn repo_failures_translate_one_to_one() {
        assert!(matches!(
            ApiError::from(RepoError::StoreNotFound),
            ApiError::StoreNotFound
        ));
        assert!(matches!(
            ApiError::from(RepoError::Geocode(GeocodeError::NotFound)),
            ApiError::AddressNotFound
        ));
        assert!(matches!(
            ApiError::from(RepoError::Unavailable(sqlx::Error::PoolTimedOut)),
            ApiError::StorageUnavailable
        ));
        assert!(matches!(
            ApiError::from(RepoError::Other(sqlx::Error::RowNotFound)),
            ApiError::Internal
        ));
    }

    #[test]
    fn invalid_store_id_is_a_validation_error() {
        assert!(matches!(
            parse_store_id("not-a-uuid"),
            Err(ApiError::Validation(_))
        ));
        assert!(parse_store_id("11111111-1111-1111-1111-111111111111").is_ok());
    }
}
