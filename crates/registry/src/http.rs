//! Axum router for the Node Registry's external HTTP surface.

use crate::service::RegistryService;
use axum::{
    extract::{Path, State},
    http::{header::CACHE_CONTROL, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chronicle_types::{ErrorCode, RegistryError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Wraps [`RegistryError`] so this crate can implement [`IntoResponse`] for
/// it without running afoul of the orphan rule.
struct ApiError(RegistryError);

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.code() {
            "InvalidArgumentError" => StatusCode::BAD_REQUEST,
            "ForbiddenError" => StatusCode::FORBIDDEN,
            "ConflictError" => StatusCode::CONFLICT,
            "UpgradeRequiredError" => StatusCode::UPGRADE_REQUIRED,
            "NotFoundError" => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct PublicUriEntry {
    public_uri: String,
}

#[derive(Serialize)]
struct BlacklistBody {
    blacklist: Vec<String>,
}

#[derive(Deserialize)]
struct CreateBody {
    tnt_addr: String,
    public_uri: Option<String>,
}

#[derive(Deserialize)]
struct UpdateBody {
    public_uri: Option<String>,
    hmac: String,
}

#[derive(Serialize)]
struct NodeBody {
    tnt_addr: String,
    public_uri: Option<String>,
    hmac_key: String,
}

fn node_version(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
    .get("x-node-version")
    .and_then(|v| v.to_str().ok())
    .ok_or_else(|| {
            ApiError(RegistryError::InvalidArgument(
                    "missing x-node-version header".into(),
            ))
    })
}

async fn random_handler(State(svc): State<Arc<RegistryService>>) -> Result<Response, ApiError> {
    let nodes = svc.random_healthy(25)?;
    let body: Vec<PublicUriEntry> = nodes
    .into_iter()
    .filter_map(|n| n.public_uri)
    .map(|public_uri| PublicUriEntry { public_uri })
    .collect();
    let mut resp = Json(body).into_response();
    resp.headers_mut()
    .insert(CACHE_CONTROL, HeaderValue::from_static("max-age=60"));
    Ok(resp)
}

async fn blacklist_handler(State(svc): State<Arc<RegistryService>>) -> Result<Response, ApiError> {
    let blacklist = svc.blacklist()?;
    let mut resp = Json(BlacklistBody { blacklist }).into_response();
    resp.headers_mut()
    .insert(CACHE_CONTROL, HeaderValue::from_static("max-age=600"));
    Ok(resp)
}

async fn create_handler(
    State(svc): State<Arc<RegistryService>>,
    headers: HeaderMap,
    Json(body): Json<CreateBody>,
) -> Result<Response, ApiError> {
    let version = node_version(&headers)?;
    let node = svc
    .create(&body.tnt_addr, body.public_uri, version)
    .await
    .map_err(ApiError::from)?;
    Ok((
            StatusCode::CREATED,
            Json(NodeBody {
                    tnt_addr: node.tnt_addr,
                    public_uri: node.public_uri,
                    hmac_key: node.hmac_key,
            }),
        )
        .into_response())
}

async fn update_handler(
    State(svc): State<Arc<RegistryService>>,
    Path(tnt_addr): Path<String>,
    headers: HeaderMap,
    Json(body): Json<UpdateBody>,
) -> Result<Response, ApiError> {
    let version = node_version(&headers)?;
    let node = svc
    .update(&tnt_addr, body.public_uri, &body.hmac, version)
    .await
    .map_err(ApiError::from)?;
    Ok(Json(NodeBody {
                tnt_addr: node.tnt_addr,
                public_uri: node.public_uri,
                hmac_key: node.hmac_key,
        })
        .into_response())
}

/// Builds the Node Registry's router, ready to be merged into a larger
/// `axum::Router` or served standalone.
pub fn router(service: Arc<RegistryService>) -> Router {
    Router::new()
    .route("/nodes/random", get(random_handler))
    .route("/nodes/blacklist", get(blacklist_handler))
    .route("/node", post(create_handler))
    .route("/node/:tnt_addr", put(update_handler))
    .with_state(service)
}
