pub(crate) mod admin;
pub(crate) mod fetch;
pub(crate) mod generate;
pub(crate) mod health;
pub(crate) mod learning;
pub(crate) mod metrics;

use axum::{
    Router,
    routing::{get, post},
};

use crate::app::AppState;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .route("/metrics", get(metrics::exporter))
        .route("/admin/jobs/retry", post(admin::retry_jobs))
        .route(
            "/admin/genre-learning",
            post(learning::receive_genre_learning),
        )
        .route(
            "/v1/generate/recaps/{window}",
            post(generate::trigger_recap),
        )
        .route("/v1/recaps/{window}", get(fetch::get_recap))
        .with_state(state)
}

/// Parses a `{window_days}d` path segment (e.g. `"7d"`) into its numeric day count.
pub(crate) fn parse_window_days(segment: &str) -> Option<u32> {
    segment.strip_suffix('d')?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::parse_window_days;

    #[test]
    fn parses_valid_window_segment() {
        assert_eq!(parse_window_days("7d"), Some(7));
        assert_eq!(parse_window_days("14d"), Some(14));
    }

    #[test]
    fn rejects_malformed_window_segment() {
        assert_eq!(parse_window_days("7days"), None);
        assert_eq!(parse_window_days("d"), None);
        assert_eq!(parse_window_days("-1d"), None);
        assert_eq!(parse_window_days(""), None);
    }
}
