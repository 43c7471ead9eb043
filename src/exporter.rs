//! Exporter mode: periodic checks published over HTTP as metrics.
//!
//! The HTTP server and the tick loop share one shutdown signal. Cycles run
//! inline in the tick loop, so a slow cycle delays the next tick instead of
//! overlapping with it; ticks missed meanwhile are skipped.

use crate::app::App;
use crate::error::{Error, Result};
use crate::metrics::{handler_for, Metrics, DEFAULT_METRICS_PATH};
use axum::{http::StatusCode, response::Html, routing::get, Router};
use std::future::Future;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn index() -> Html<String> {
    Html(format!(
        "<html>\n<head><title>promcheck exporter</title></head>\n<body>\n<h1>promcheck exporter</h1>\n<p><a href=\"{}\">see metrics</a></p>\n</body>\n</html>\n",
        DEFAULT_METRICS_PATH
    ))
}

/// Health, index and metrics routes.
pub fn router(metrics: &dyn Metrics) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/healthz", get(health))
        .merge(handler_for(metrics))
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}

/// Bind the configured address and run until Ctrl+C or SIGTERM.
pub async fn run(app: App) -> Result<()> {
    let addr = app.config().listen_addr.clone();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Server(format!("failed to bind {}: {}", addr, e)))?;
    serve(app, listener, shutdown_signal()).await
}

/// Serve metrics on `listener` and check on every tick until `shutdown`
/// resolves.
pub async fn serve<F>(mut app: App, listener: TcpListener, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics = app
        .metrics()
        .ok_or_else(|| Error::Configuration("exporter mode requires a metrics backend".into()))?;
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown.await;
        let _ = stop_tx.send(true);
    });

    let addr = listener.local_addr()?;
    let routes = router(metrics.as_ref());
    let mut server_stop = stop_rx.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, routes)
            .with_graceful_shutdown(async move {
                let _ = server_stop.changed().await;
            })
            .await
    });
    info!(addr = %addr, "running http server");

    let mut ticker = interval(app.config().interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stop = stop_rx;
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = ticker.tick() => {
                info!("executing check cycle");
                tokio::select! {
                    res = app.check() => {
                        if let Err(e) = res {
                            warn!(error = %e, "check cycle failed");
                        }
                    }
                    _ = stop.changed() => break,
                }
            }
        }
    }

    match server.await {
        Ok(res) => res.map_err(|e| Error::Server(e.to_string())),
        Err(e) => Err(Error::Server(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::RunArgs;
    use crate::config::resolve_effective;
    use crate::probe::Prober;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::sync::oneshot;

    struct EmptyProber;

    #[async_trait]
    impl Prober for EmptyProber {
        async fn probe_selector(&self, _selector: &str) -> crate::error::Result<f64> {
            Ok(0.0)
        }
    }

    #[tokio::test]
    async fn test_exporter_serves_health_and_metrics() {
        let dir = tempdir().unwrap();
        let args = RunArgs {
            check_expression: vec!["up".into()],
            ..Default::default()
        };
        let config = resolve_effective(dir.path(), &args, None).unwrap();
        let app = App::exporter(config).unwrap().with_prober(Arc::new(EmptyProber));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve(app, listener, async move {
            let _ = rx.await;
        }));

        let client = reqwest::Client::new();
        for path in ["/health", "/healthz", "/"] {
            let resp = client.get(format!("{}{}", base, path)).send().await.unwrap();
            assert_eq!(resp.status(), 200, "{}", path);
        }
        let resp = client.get(format!("{}/metrics/unknown", base)).send().await.unwrap();
        assert_eq!(resp.status(), 404);

        let expected =
            r#"promcheck_validation_selectors_total{file="[manual]",group="[inline]",rule="query-0",status="failed"} 1"#;
        let mut found = false;
        for _ in 0..50 {
            let body = client
                .get(format!("{}/metrics", base))
                .send()
                .await
                .unwrap()
                .text()
                .await
                .unwrap();
            if body.contains(expected) {
                found = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(found);

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
