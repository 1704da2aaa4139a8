//! REST handlers over the ledger.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use voxledger_core::{day_key, parse_day_key, AccountingRecord, LedgerError, SubjectId};
use voxledger_ledger::VoiceTimeReport;

use crate::server::GatewayState;

#[derive(Debug, Deserialize)]
pub struct VoiceTimeParams {
    pub subject: String,
    /// `YYYY-MM-DD`; today (UTC) when absent.
    pub date: Option<String>,
}

fn status_for(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::InvalidDate(_) => StatusCode::BAD_REQUEST,
        LedgerError::ActorClosed(_) | LedgerError::StoreUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// `GET /api/health`
pub async fn health(State(state): State<GatewayState>) -> Json<Value> {
    let (status, records) = match state.ledger.query_all_records().await {
        Ok(records) => ("ok", Some(records.len())),
        Err(_) => ("degraded", None),
    };
    Json(json!({
        "status": status,
        "service": "voxledger",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "records": records,
    }))
}

/// `GET /api/voice-time?subject=..&date=..`
pub async fn voice_time(
    State(state): State<GatewayState>,
    Query(params): Query<VoiceTimeParams>,
) -> Result<Json<VoiceTimeReport>, StatusCode> {
    let day = match params.date.as_deref() {
        Some(raw) => parse_day_key(raw).map_err(|e| status_for(&e))?,
        None => day_key(state.clock.now()),
    };
    let subject = SubjectId::new(params.subject);
    match state.ledger.query_voice_time(&subject, &day).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            error!(subject = %subject, error = %e, "Failed to fetch voice time");
            Err(status_for(&e))
        }
    }
}

/// `GET /api/voice-data`
pub async fn voice_data(
    State(state): State<GatewayState>,
) -> Result<Json<Vec<AccountingRecord>>, StatusCode> {
    match state.ledger.query_all_records().await {
        Ok(records) => Ok(Json(records)),
        Err(e) => {
            error!(error = %e, "Failed to fetch voice data");
            Err(status_for(&e))
        }
    }
}
