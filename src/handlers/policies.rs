use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Json,
};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use super::AppState;
use crate::error::ApiError;
use crate::gateway::{PolicyDates, PolicyRecord, SshCredentials, RECENT_POLICY_LIMIT};

const POLICY_NOT_FOUND: &str = "Policy not found";

/// GET /p_policies - the most recently created policies, newest first
pub async fn list(
    State(state): State<AppState>,
    credentials: SshCredentials,
) -> Result<Json<Vec<PolicyRecord>>, ApiError> {
    let mut session = state.sessions.open(&credentials).await?;
    let outcome = session.recent_policies(RECENT_POLICY_LIMIT).await;
    session.close().await;

    let policies = outcome?;
    tracing::info!(count = policies.len(), "listed recent policies");
    Ok(Json(policies))
}

/// GET /gp_policies/:policy_id - first policy with this policy_id
pub async fn get(
    State(state): State<AppState>,
    Path(policy_id): Path<String>,
    credentials: SshCredentials,
) -> Result<Json<PolicyRecord>, ApiError> {
    let mut session = state.sessions.open(&credentials).await?;
    let outcome = session.find_policy(&policy_id).await;
    session.close().await;

    match outcome? {
        Some(policy) => Ok(Json(policy)),
        None => {
            tracing::info!(%policy_id, "policy not found");
            Err(ApiError::not_found(POLICY_NOT_FOUND))
        }
    }
}

/// PUT /up_policies/:policy_id - set policy_start/policy_end on every matching row
pub async fn update(
    State(state): State<AppState>,
    Path(policy_id): Path<String>,
    credentials: SshCredentials,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| ApiError::invalid_json(rejection.body_text()))?;
    let dates = policy_dates(&payload)?;

    let mut session = state.sessions.open(&credentials).await?;
    let outcome = session.update_policy_dates(&policy_id, &dates).await;
    session.close().await;

    let matched = outcome?;
    if matched == 0 {
        tracing::info!(%policy_id, "no policy to update");
        return Err(ApiError::not_found(POLICY_NOT_FOUND));
    }

    tracing::info!(%policy_id, matched, "policy dates updated");
    Ok(Json(json!({ "message": "Policy dates updated successfully" })))
}

/// Validate the update body: both dates present as non-empty strings.
fn policy_dates(payload: &Value) -> Result<PolicyDates, ApiError> {
    let body = payload
        .as_object()
        .ok_or_else(|| ApiError::invalid_json("Request body must be a JSON object"))?;

    let mut field_errors = HashMap::new();
    let policy_start = required_string(body, "policy_start", &mut field_errors);
    let policy_end = required_string(body, "policy_end", &mut field_errors);

    match (policy_start, policy_end) {
        (Some(policy_start), Some(policy_end)) => Ok(PolicyDates {
            policy_start,
            policy_end,
        }),
        _ => Err(ApiError::validation_error(
            "policy_start and policy_end are required",
            Some(field_errors),
        )),
    }
}

fn required_string(
    body: &Map<String, Value>,
    field: &str,
    field_errors: &mut HashMap<String, String>,
) -> Option<String> {
    match body.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::String(_)) | Some(Value::Null) | None => {
            field_errors.insert(field.to_string(), "This field is required".to_string());
            None
        }
        Some(_) => {
            field_errors.insert(field.to_string(), "Must be a date string".to_string());
            None
        }
    }
}
