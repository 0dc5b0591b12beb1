//! Tenant provisioning and secret rotation
//!
//! Rotation is two-phase: `rotate` stages a next secret (both accepted
//! during the grace period), `promote` makes it current.

use axum::{
    extract::{Path, State},
    Json,
};
use pulse_common::db::tenants;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub tenant_id: String,
}

#[derive(Debug, Serialize)]
pub struct TenantSecretResponse {
    pub tenant_id: String,
    pub signing_secret: String,
}

/// POST /api/tenants
pub async fn create_tenant(
    State(state): State<AppState>,
    Json(request): Json<CreateTenantRequest>,
) -> Result<Json<TenantSecretResponse>, ApiError> {
    if request.tenant_id.trim().is_empty() {
        return Err(ApiError::BadRequest("tenant_id must not be empty".to_string()));
    }

    let secret = tenants::create_tenant(&state.db, &request.tenant_id)
        .await
        .map_err(|e| match e {
            pulse_common::Error::InvalidInput(msg) => ApiError::Conflict(msg),
            other => ApiError::Common(other),
        })?;

    Ok(Json(TenantSecretResponse {
        tenant_id: request.tenant_id,
        signing_secret: secret,
    }))
}

/// POST /api/tenants/:tenant_id/rotate
pub async fn rotate_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let next = tenants::rotate_tenant_secret(&state.db, &tenant_id)
        .await
        .map_err(|e| match e {
            pulse_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            other => ApiError::Common(other),
        })?;

    Ok(Json(json!({
        "tenant_id": tenant_id,
        "next_signing_secret": next,
    })))
}

/// POST /api/tenants/:tenant_id/promote
pub async fn promote_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    tenants::promote_tenant_secret(&state.db, &tenant_id)
        .await
        .map_err(|e| match e {
            pulse_common::Error::InvalidInput(msg) => ApiError::Conflict(msg),
            pulse_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            other => ApiError::Common(other),
        })?;

    Ok(Json(json!({"tenant_id": tenant_id, "status": "promoted"})))
}
