// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the admin REST API.
//!
//! Scenario administration, on-demand delivery processing, segment
//! broadcasts, and escalation workflow. Validation failures and missing
//! entities map to 4xx; everything else is logged and returned as an
//! opaque 500.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use nagare_core::types::{
    ContactId, DeliveryLogId, DeliveryStatus, EscalationId, EscalationStatus, ScenarioId,
    TriggerKind,
};
use nagare_core::NagareError;
use nagare_engine::PollOutcome;
use nagare_segment::{broadcast, SegmentCondition};
use nagare_storage::queries::{ai_logs, contacts, deliveries, scenarios};
use nagare_storage::{
    DeliveryLog, Escalation, EscalationUpdate, NewScenario, NewScenarioStep, Scenario,
    ScenarioStep, ScenarioSummary,
};
use serde::{Deserialize, Serialize};

use crate::server::AppState;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// An admin-API failure carrying its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }
}

impl From<NagareError> for ApiError {
    fn from(e: NagareError) -> Self {
        match e {
            NagareError::InvalidCondition(_) | NagareError::PayloadMalformed(_) => {
                Self::bad_request(e.to_string())
            }
            NagareError::NotFound(_) => Self::not_found(e.to_string()),
            other => {
                tracing::error!(error = %other, "admin request failed");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "internal error".to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status string.
    pub status: String,
    /// Binary version.
    pub version: String,
}

/// GET /health
///
/// Public liveness endpoint, no authentication.
pub async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Request body for POST /api/scenarios.
#[derive(Debug, Deserialize)]
pub struct CreateScenarioRequest {
    /// Scenario name; must be non-blank.
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// What fires the scenario.
    pub trigger_kind: TriggerKind,
    /// Trigger parameters, e.g. `{"keywords": [...]}` for message_keyword.
    #[serde(default)]
    pub trigger_config: Option<serde_json::Value>,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
    /// Steps in delivery order; step_order is assigned from list position.
    #[serde(default)]
    pub steps: Vec<CreateStepRequest>,
}

/// One step inside a scenario creation request.
#[derive(Debug, Deserialize)]
pub struct CreateStepRequest {
    #[serde(default = "default_message_kind")]
    pub message_kind: String,
    pub message_content: String,
    /// Minutes after the trigger before this step is due.
    #[serde(default)]
    pub delay_minutes: i64,
    #[serde(default)]
    pub condition: Option<serde_json::Value>,
}

fn default_is_active() -> bool {
    true
}

fn default_message_kind() -> String {
    "text".to_string()
}

/// A scenario with its ordered steps.
#[derive(Debug, Serialize)]
pub struct ScenarioDetail {
    #[serde(flatten)]
    pub scenario: Scenario,
    pub steps: Vec<ScenarioStep>,
}

/// POST /api/scenarios
pub async fn create_scenario(
    State(state): State<AppState>,
    Json(body): Json<CreateScenarioRequest>,
) -> Result<Response, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }

    let new = NewScenario {
        name: body.name,
        description: body.description,
        trigger_kind: body.trigger_kind,
        trigger_config: body.trigger_config.map(|v| v.to_string()),
        is_active: body.is_active,
        steps: body
            .steps
            .into_iter()
            .map(|step| NewScenarioStep {
                message_kind: step.message_kind,
                message_content: step.message_content,
                delay_minutes: step.delay_minutes,
                condition_json: step.condition.map(|v| v.to_string()),
            })
            .collect(),
    };

    let (scenario, steps) = scenarios::create_with_steps(&state.db, &new).await?;
    Ok((
        StatusCode::CREATED,
        Json(ScenarioDetail { scenario, steps }),
    )
        .into_response())
}

/// GET /api/scenarios
pub async fn list_scenarios(
    State(state): State<AppState>,
) -> Result<Json<Vec<ScenarioSummary>>, ApiError> {
    Ok(Json(scenarios::list_with_step_counts(&state.db).await?))
}

/// GET /api/scenarios/{id}
pub async fn get_scenario(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ScenarioDetail>, ApiError> {
    let (scenario, steps) = scenarios::get_with_steps(&state.db, &ScenarioId::from(id))
        .await?
        .ok_or_else(|| ApiError::not_found("scenario not found"))?;
    Ok(Json(ScenarioDetail { scenario, steps }))
}

/// Request body for POST /api/scenarios/{id}/execute.
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    /// Contact ids to run the scenario for.
    pub contact_ids: Vec<String>,
}

/// Per-contact outcome counts of a manual scenario execution.
#[derive(Debug, Serialize)]
pub struct ExecuteOutcome {
    pub requested: usize,
    pub executed: usize,
    pub failed: usize,
}

/// POST /api/scenarios/{id}/execute
///
/// Runs the scenario engine once per listed contact. Unknown contacts and
/// per-contact execution failures count as failed without stopping the
/// rest.
pub async fn execute_scenario(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ExecuteRequest>,
) -> Result<Json<ExecuteOutcome>, ApiError> {
    let scenario_id = ScenarioId::from(id);
    let (_, steps) = scenarios::get_with_steps(&state.db, &scenario_id)
        .await?
        .ok_or_else(|| ApiError::not_found("scenario not found"))?;
    if steps.is_empty() {
        return Err(ApiError::bad_request("scenario has no steps"));
    }

    let mut outcome = ExecuteOutcome {
        requested: body.contact_ids.len(),
        executed: 0,
        failed: 0,
    };
    for raw_id in body.contact_ids {
        let contact_id = ContactId::from(raw_id);
        if contacts::find_by_id(&state.db, &contact_id).await?.is_none() {
            tracing::warn!(
                contact_id = contact_id.as_str(),
                "manual execution requested for unknown contact"
            );
            outcome.failed += 1;
            continue;
        }
        match state.engine.execute(&scenario_id, &contact_id).await {
            Ok(()) => outcome.executed += 1,
            Err(e) => {
                tracing::warn!(
                    contact_id = contact_id.as_str(),
                    error = %e,
                    "manual scenario execution failed"
                );
                outcome.failed += 1;
            }
        }
    }
    Ok(Json(outcome))
}

/// POST /api/deliveries/process
///
/// Runs one poller pass on demand, same semantics as the interval task.
pub async fn process_deliveries(
    State(state): State<AppState>,
) -> Result<Json<PollOutcome>, ApiError> {
    Ok(Json(state.poller.run_once().await?))
}

/// POST /api/deliveries/{id}/cancel
pub async fn cancel_delivery(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeliveryLog>, ApiError> {
    let id = DeliveryLogId::from(id);
    let log = deliveries::get(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("delivery not found"))?;
    if log.status != DeliveryStatus::Pending {
        return Err(ApiError::conflict(format!(
            "delivery is {}, only pending deliveries can be cancelled",
            log.status
        )));
    }

    // The poller may have claimed the row between the read and the update.
    if !deliveries::cancel(&state.db, &id).await? {
        return Err(ApiError::conflict(
            "delivery was claimed before it could be cancelled",
        ));
    }

    let log = deliveries::get(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("delivery not found"))?;
    Ok(Json(log))
}

/// Request body for POST /api/segments/preview.
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub conditions: Vec<SegmentCondition>,
}

/// POST /api/segments/preview
pub async fn preview_segment(
    State(state): State<AppState>,
    Json(body): Json<PreviewRequest>,
) -> Result<Response, ApiError> {
    if body.conditions.is_empty() {
        return Err(ApiError::bad_request("conditions must be a non-empty array"));
    }
    let preview = broadcast::preview(&state.db, &body.conditions).await?;
    Ok(Json(preview).into_response())
}

/// Request body for POST /api/segments/send.
#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    #[serde(default)]
    pub conditions: Vec<SegmentCondition>,
    pub message: BroadcastMessage,
}

/// The broadcast message payload. Text is the only supported kind.
#[derive(Debug, Deserialize)]
pub struct BroadcastMessage {
    pub text: String,
}

/// POST /api/segments/send
pub async fn send_broadcast(
    State(state): State<AppState>,
    Json(body): Json<BroadcastRequest>,
) -> Result<Response, ApiError> {
    if body.conditions.is_empty() {
        return Err(ApiError::bad_request("conditions must be a non-empty array"));
    }
    if body.message.text.trim().is_empty() {
        return Err(ApiError::bad_request("message.text is required"));
    }
    let outcome = broadcast::send(
        &state.db,
        state.platform.as_ref(),
        &body.conditions,
        &body.message.text,
    )
    .await?;
    Ok(Json(outcome).into_response())
}

/// Query parameters for GET /api/segments/history.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

/// GET /api/segments/history
pub async fn broadcast_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, ApiError> {
    let page = broadcast::history(&state.db, query.page, query.limit).await?;
    Ok(Json(page).into_response())
}

/// Query parameters for GET /api/escalations.
#[derive(Debug, Deserialize)]
pub struct EscalationQuery {
    #[serde(default)]
    pub status: Option<EscalationStatus>,
}

/// GET /api/escalations
pub async fn list_escalations(
    State(state): State<AppState>,
    Query(query): Query<EscalationQuery>,
) -> Result<Json<Vec<Escalation>>, ApiError> {
    Ok(Json(ai_logs::list_escalations(&state.db, query.status).await?))
}

/// PUT /api/escalations/{id}
///
/// Partial update; at least one field must be present. Setting status to
/// `resolved` stamps `resolved_at`.
pub async fn update_escalation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<EscalationUpdate>,
) -> Result<Json<Escalation>, ApiError> {
    if update.status.is_none()
        && update.priority.is_none()
        && update.assigned_to.is_none()
        && update.note.is_none()
    {
        return Err(ApiError::bad_request("no fields to update"));
    }

    let escalation = ai_logs::update_escalation(&state.db, &EscalationId::from(id), &update)
        .await?
        .ok_or_else(|| ApiError::not_found("escalation not found"))?;
    Ok(Json(escalation))
}
