//! HTTP surface: the scrape endpoint, a landing page and a health check.

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use isilon_core::metrics::exposition::{CONTENT_TYPE, render};

use crate::config::HEALTH_PATH;
use crate::state::AppState;

const SCRAPE_TIMEOUT_HEADER: &str = "x-prometheus-scrape-timeout-seconds";
const COLLECT_PARAM: &str = "collect[]";

pub(crate) fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route(&state.telemetry_path, get(handle_metrics))
        .route(HEALTH_PATH, get(handle_health));
    if state.telemetry_path != "/" {
        app = app.route("/", get(handle_landing));
    }
    app.layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================
// Scrape
// ============================================================

/// Runs one collection pass and renders it.
///
/// `collect[]` parameters restrict the pass to the named collectors; an
/// unknown or disabled name is answered with 400 before anything runs.
pub(crate) async fn handle_metrics(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    let filters: Vec<String> = params
        .into_iter()
        .filter(|(key, _)| key == COLLECT_PARAM)
        .map(|(_, value)| value)
        .collect();

    let orchestrator = match state.registry.build(&filters) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            warn!(error = %e, "rejecting scrape request");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let budget = state.timing.budget(
        headers
            .get(SCRAPE_TIMEOUT_HEADER)
            .and_then(|v| v.to_str().ok()),
    );
    let deadline = tokio::time::Instant::now() + budget;
    let outcome = orchestrator.run_pass(Some(deadline)).await;

    let failed = outcome.runs.iter().filter(|r| !r.success()).count();
    debug!(
        collectors = outcome.runs.len(),
        failed,
        samples = outcome.samples.len(),
        budget_seconds = budget.as_secs_f64(),
        "scrape finished"
    );

    match render(&outcome.samples, &state.const_labels) {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

// ============================================================
// Landing page and health
// ============================================================

pub(crate) async fn handle_landing(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>\n<head><title>OneFS Exporter</title></head>\n<body>\n\
         <h1>OneFS Exporter</h1>\n\
         <p>Cluster: {cluster}</p>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n\
         </body>\n</html>\n",
        cluster = state.const_labels.cluster,
        path = state.telemetry_path,
    ))
}

pub(crate) async fn handle_health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use isilon_core::client::StatClient;
    use isilon_core::client::mock::MockTransport;
    use isilon_core::collector::{CollectorSettings, Registry};
    use isilon_core::metrics::ConstLabels;

    use super::*;
    use crate::config::ScrapeTiming;
    use crate::state::AppInner;

    fn app() -> Router {
        router(Arc::new(AppInner {
            registry: Registry::new(
                StatClient::new(MockTransport::typical_cluster()),
                CollectorSettings::default(),
            ),
            const_labels: ConstLabels {
                cluster: "isilon-prod".into(),
                site: "lab".into(),
            },
            telemetry_path: "/metrics".into(),
            timing: ScrapeTiming {
                offset: Duration::from_millis(500),
                max: Duration::from_secs(30),
            },
        }))
    }

    async fn get(uri: &str) -> (StatusCode, Option<String>, String) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, _, body) = get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_landing_links_metrics() {
        let (status, _, body) = get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("href=\"/metrics\""));
        assert!(body.contains("isilon-prod"));
    }

    #[tokio::test]
    async fn test_full_scrape() {
        let (status, content_type, body) = get("/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some(CONTENT_TYPE));
        assert!(body.contains("# TYPE isilon_cluster_health gauge"));
        assert!(body.contains("isilon_cluster_health{cluster=\"isilon-prod\",site=\"lab\"} 0\n"));
        assert!(body.contains(
            "isilon_scrape_collector_success{cluster=\"isilon-prod\",collector=\"cpu\",site=\"lab\"} 1\n"
        ));
        assert!(body.contains("isilon_exporter_build_info{version="));
        // disabled by default
        assert!(!body.contains("collector=\"quota\""));
    }

    #[tokio::test]
    async fn test_collect_filter() {
        let (status, _, body) = get("/metrics?collect%5B%5D=cpu&collect%5B%5D=memory").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("isilon_node_cpu_count{cluster=\"isilon-prod\",node=\"1\""));
        assert!(body.contains("isilon_node_memory_used{cluster=\"isilon-prod\",node=\"2\""));
        assert!(!body.contains("isilon_cluster_health{"));
        assert_eq!(body.matches("isilon_scrape_collector_success{").count(), 2);
    }

    #[tokio::test]
    async fn test_bad_filters() {
        let (status, _, body) = get("/metrics?collect%5B%5D=bogus").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "missing collector: bogus");

        let (status, _, body) = get("/metrics?collect%5B%5D=quota").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "disabled collector: quota");
    }

    #[tokio::test]
    async fn test_scrape_timeout_header_accepted() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/metrics?collect%5B%5D=statfs")
                    .header("X-Prometheus-Scrape-Timeout-Seconds", "10")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("isilon_ifs_statfs_block_size{cluster=\"isilon-prod\",mount=\"/ifs\""));
    }
}
