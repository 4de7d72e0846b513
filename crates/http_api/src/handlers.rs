use axum::{
    Extension,
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use quitpath_api::{
    DeletedResponse, EventBatchRequest, InsertedResponse, MetricsSummaryRequest,
    MetricsSummaryResponse, RecordDeleteRequest, RecordGetRequest, RecordListRequest,
    RecordListResponse, RecordMaybeResponse, RecordResponse, RecordUpsertRequest,
};
use quitpath_app::RangeParams;

use crate::{
    errors::HttpError,
    state::{HttpState, SessionUser},
};

pub async fn records_upsert(
    State(state): State<HttpState>,
    Extension(user): Extension<SessionUser>,
    Json(req): Json<RecordUpsertRequest>,
) -> Result<impl IntoResponse, HttpError> {
    require_owner(&user, &req.owner_id)?;
    let record = state
        .app
        .services
        .records
        .upsert(&req.owner_id, &req.natural_key, &req.payload)?;
    Ok(Json(RecordResponse { record }))
}

pub async fn records_get(
    State(state): State<HttpState>,
    Extension(user): Extension<SessionUser>,
    Json(req): Json<RecordGetRequest>,
) -> Result<impl IntoResponse, HttpError> {
    require_owner(&user, &req.owner_id)?;
    let record = state
        .app
        .services
        .records
        .get(&req.owner_id, &req.natural_key)?;
    Ok(Json(RecordMaybeResponse { record }))
}

pub async fn records_list(
    State(state): State<HttpState>,
    Extension(user): Extension<SessionUser>,
    Json(req): Json<RecordListRequest>,
) -> Result<impl IntoResponse, HttpError> {
    require_owner(&user, &req.owner_id)?;
    let records = state.app.services.records.list(&req.owner_id)?;
    Ok(Json(RecordListResponse { records }))
}

pub async fn records_delete(
    State(state): State<HttpState>,
    Extension(user): Extension<SessionUser>,
    Json(req): Json<RecordDeleteRequest>,
) -> Result<impl IntoResponse, HttpError> {
    require_owner(&user, &req.owner_id)?;
    let deleted = state
        .app
        .services
        .records
        .delete(&req.owner_id, &req.natural_key)?;
    Ok(Json(DeletedResponse { deleted }))
}

pub async fn events_ingest(
    State(state): State<HttpState>,
    Json(req): Json<EventBatchRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let inserted = state.app.services.events.ingest(&req.events)?;
    Ok(Json(InsertedResponse { inserted }))
}

pub async fn metrics_summary(
    State(state): State<HttpState>,
    Json(req): Json<MetricsSummaryRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let cache_key = format!(
        "{}|{}|{}",
        req.range.as_deref().unwrap_or(""),
        req.start.as_deref().unwrap_or(""),
        req.end.as_deref().unwrap_or("")
    );
    let range = quitpath_app::resolve_range(&RangeParams {
        range: req.range,
        start: req.start,
        end: req.end,
    })?;
    let (summaries, degraded) = state.app.services.metrics.summaries(&cache_key, &range);
    Ok(Json(MetricsSummaryResponse {
        summaries,
        degraded,
    }))
}

pub async fn health() -> impl IntoResponse {
    Json(quitpath_api::ok())
}

fn require_owner(user: &SessionUser, owner_id: &str) -> Result<(), HttpError> {
    if user.0 != owner_id {
        return Err(HttpError::new(
            StatusCode::FORBIDDEN,
            "record owner does not match session user",
            Some("forbidden".to_string()),
        ));
    }
    Ok(())
}
