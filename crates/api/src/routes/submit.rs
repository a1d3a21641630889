//! Crash submission route.
//!
//! `POST /submit` accepts a breakpad-style multipart crash report. The
//! happy path answers `200` with `CrashID=bp-<id>` once the report is
//! durable; whether the announcement also went through is invisible to
//! the client by design.

use axum::{
    Router,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use crashbay_shared::AppError;
use tracing::{error, info, warn};

use crate::AppState;
use crate::payload::extract_payload;

/// Creates the submission routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/submit", post(submit_crash))
}

/// Failure response in the shape breakpad-ish clients already parse:
/// `Busy=1` under saturation, `Discarded=1; reason=<code>` otherwise.
fn reject(err: &AppError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status == StatusCode::SERVICE_UNAVAILABLE {
        (status, "Busy=1\n").into_response()
    } else {
        (status, format!("Discarded=1; reason={}\n", err.reason_code())).into_response()
    }
}

/// POST `/submit`
/// Accept one crash submission: admit, decode, persist, announce.
async fn submit_crash(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    // Wrong or missing content type never reaches the decoder.
    let Ok(mut multipart) = multipart else {
        return reject(&AppError::Client("wrong_content_type"));
    };

    // Load shedding happens before any expensive work.
    let mut permit = match state.governor.try_admit() {
        Ok(permit) => permit,
        Err(e) => {
            warn!(error = %e, "submission shed");
            return reject(&AppError::from(e));
        }
    };

    let payload = match extract_payload(&mut multipart, &state.limits, &mut permit).await {
        Ok(payload) => payload,
        // Permit drops here: a rejected submission releases its slot
        // without any storage work.
        Err(e) => {
            info!(error = %e, "submission rejected");
            return reject(&AppError::from(e));
        }
    };

    // Persist and announce in a spawned task: a client hangup stops the
    // response, not durability or a pending announcement. The response
    // goes out as soon as the report is finalized; announce retries
    // continue in the task, which keeps the permit until the submission
    // reaches its terminal state.
    let coordinator = state.coordinator.clone();
    let (durable_tx, durable_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let _permit = permit;
        match coordinator.persist(payload).await {
            Ok(persisted) => {
                let _ = durable_tx.send(Ok(persisted.crash_id()));
                coordinator.announce(persisted).await;
            }
            Err(e) => {
                let _ = durable_tx.send(Err(AppError::from(e)));
            }
        }
    });

    match durable_rx.await {
        Ok(Ok(crash_id)) => {
            info!(crash_id = %crash_id, "submission accepted");
            (
                StatusCode::OK,
                format!("CrashID={}{crash_id}\n", state.limits.dump_id_prefix),
            )
                .into_response()
        }
        Ok(Err(e)) => {
            error!(error = %e, "submission failed");
            reject(&e)
        }
        Err(_) => {
            error!("ingest task dropped before reporting durability");
            reject(&AppError::PermanentInfrastructure("ingest task failed".into()))
        }
    }
}
