use anyhow::Result;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use log::{error, info};
use serde_derive::Serialize;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use warrenmq_consumer::{Broker, Connection};

/// Something whose state is reported on the health endpoint.
pub(crate) trait HealthCheck: Send + Sync + 'static {
    fn check(&self) -> Result<()>;

    /// Release the checked resource.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

impl<C: Connection> HealthCheck for Broker<C> {
    fn check(&self) -> Result<()> {
        self.health_check()
    }

    async fn close(&self) {
        Broker::close(self).await
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthReport {
    pub(crate) healthy: bool,
    /// "ok" or the error message of a check.
    pub(crate) healthchecks: BTreeMap<String, String>,
}

impl HealthReport {
    pub(crate) fn new(checks: &[(&str, Result<()>)]) -> Self {
        let healthchecks: BTreeMap<String, String> = checks
            .iter()
            .map(|(name, result)| {
                let status = match result {
                    Ok(()) => "ok".to_string(),
                    Err(e) => format!("{:#}", e),
                };

                (name.to_string(), status)
            })
            .collect();

        HealthReport {
            healthy: checks.iter().all(|(_, result)| result.is_ok()),
            healthchecks,
        }
    }

    fn status(&self) -> StatusCode {
        if self.healthy {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

fn response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));

    *response.status_mut() = status;

    response
}

pub(crate) fn health_response(report: &HealthReport) -> Response<Full<Bytes>> {
    match serde_json::to_string(report) {
        Ok(body) => {
            let mut response = response(report.status(), body);

            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

            response
        }
        Err(e) => response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub(crate) async fn route<H: HealthCheck>(
    req: Request<Incoming>,
    broker: Arc<H>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/health") => {
            let report = HealthReport::new(&[("broker", broker.check())]);

            Ok(health_response(&report))
        }
        _ => Ok(response(StatusCode::NOT_FOUND, String::new())),
    }
}

/// Start the health endpoint, if it cannot be started the broker is closed and the error is
/// returned.
pub(crate) async fn serve_health<H: HealthCheck>(url: &str, broker: Arc<H>) -> Result<()> {
    if let Err(e) = start_http(url, broker.clone()).await {
        error!("Cannot start HTTP health endpoint on {} {:#}", url, e);

        broker.close().await;

        return Err(e);
    }

    Ok(())
}

/// Start serving the health endpoint in the background.
pub(crate) async fn start_http<H: HealthCheck>(url: &str, broker: Arc<H>) -> Result<()> {
    let http_addr: SocketAddr = url.parse()?;
    let listener = TcpListener::bind(http_addr).await?;

    info!("Start HTTP health endpoint on {}", url);

    tokio::spawn(async move {
        loop {
            let stream = match listener.accept().await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    error!("Error accepting HTTP connection {:?}", e);
                    continue;
                }
            };

            let broker = broker.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| route(req, broker.clone()));

                if let Err(e) = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await {
                    error!("HTTP error {:?}", e);
                }
            });
        }
    });

    Ok(())
}
