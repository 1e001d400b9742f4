use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::warn;
use uuid::Uuid;

use crate::{
    app::AppState,
    scheduler::{JobContext, jobs::JobStart},
};

pub(crate) async fn retry_jobs(State(state): State<AppState>) -> impl IntoResponse {
    state.telemetry().record_admin_retry_invocation();
    let genres = state.config().recap_genres().to_vec();
    let job = JobContext::new(Uuid::new_v4(), genres);
    match state.scheduler().trigger_job(job, "admin").await {
        Ok(JobStart::Started) => StatusCode::ACCEPTED.into_response(),
        Ok(JobStart::LockContended) => StatusCode::CONFLICT.into_response(),
        Err(error) => {
            warn!(error = %error, "failed to retry recap job");
            (StatusCode::NOT_IMPLEMENTED, error.to_string()).into_response()
        }
    }
}
