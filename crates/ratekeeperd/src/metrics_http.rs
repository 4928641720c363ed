//! `GET /metrics` in Prometheus text format.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use ratekeeper_metrics::{GaugeRegistry, render_prometheus};

pub fn build_router(registry: GaugeRegistry) -> Router {
    Router::new()
        .route("/metrics", get(prometheus_metrics))
        .with_state(registry)
}

/// GET /metrics
async fn prometheus_metrics(State(registry): State<GaugeRegistry>) -> impl IntoResponse {
    let body = render_prometheus(&registry.snapshot());
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Serve the metrics router until `shutdown` flips to `true`.
pub async fn serve(
    listener: TcpListener,
    registry: GaugeRegistry,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "metrics endpoint listening");
    axum::serve(listener, build_router(registry))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;
    info!("metrics endpoint stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use ratekeeper_control::MetricsSink;
    use tower::ServiceExt;

    #[tokio::test]
    async fn metrics_endpoint_returns_text() {
        let registry = GaugeRegistry::new(Some("prod".to_string()));
        registry.set_target("logs-2024.06.01");
        registry.record_measurement_failure(1);

        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = build_router(registry).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.contains("text/plain"));

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains(
            "ratekeeper_sample_index{cluster=\"prod\",sample_index=\"logs-2024.06.01\"} 1"
        ));
        assert!(text.contains("ratekeeper_retrieval_error_count{cluster=\"prod\"} 1"));
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let resp = build_router(GaugeRegistry::default()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown_signal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(serve(listener, GaugeRegistry::default(), rx));

        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }
}
