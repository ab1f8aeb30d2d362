//! Metrics collection and Prometheus export module.
//!
//! This module provides:
//! - Rate limiting and bearer authentication for the HTTP endpoint
//! - The Prometheus/health HTTP server
//! - Metric recording functions used across the bot

use anyhow::Result;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use parking_lot::Mutex;
use sqlx::PgPool;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

use crate::observability_config::ObservabilityConfig;

/// Simple rate limiter for HTTP requests
#[derive(Debug)]
pub struct RateLimiter {
    requests: Mutex<HashMap<String, Vec<Instant>>>,
    max_requests: u32,
    window_secs: u64,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
            max_requests,
            window_secs,
        }
    }

    /// Check if request is allowed for the given IP
    pub fn is_allowed(&self, ip: &str) -> bool {
        let now = Instant::now();
        let window = Duration::from_secs(self.window_secs);

        let mut requests = self.requests.lock();
        let client_requests = requests.entry(ip.to_string()).or_default();

        client_requests.retain(|&time| now.duration_since(time) < window);

        if client_requests.len() >= self.max_requests as usize {
            return false;
        }

        client_requests.push(now);
        true
    }
}

/// Check a bearer token against `expected`. No expected token means open access.
pub fn is_authorized(authorization: Option<&str>, expected: Option<&str>) -> bool {
    let expected = match expected {
        Some(token) if !token.is_empty() => token,
        _ => return true,
    };

    authorization
        .and_then(|header| header.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected)
}

/// Check authentication token from Authorization header
pub fn check_auth(req: &hyper::Request<hyper::body::Incoming>) -> bool {
    let expected = std::env::var("METRICS_AUTH_TOKEN").ok();
    let header = req
        .headers()
        .get("authorization")
        .and_then(|value| value.to_str().ok());
    is_authorized(header, expected.as_deref())
}

/// Check request size limit
pub fn check_request_size(req: &hyper::Request<hyper::body::Incoming>) -> bool {
    content_length_allowed(
        req.headers()
            .get("content-length")
            .map(|value| value.to_str().unwrap_or("")),
    )
}

fn content_length_allowed(content_length: Option<&str>) -> bool {
    const MAX_REQUEST_SIZE: u64 = 1024 * 1024; // 1MB

    match content_length {
        Some(raw) => raw.parse::<u64>().is_ok_and(|size| size <= MAX_REQUEST_SIZE),
        None => true,
    }
}

/// Initialize metrics collection with Prometheus exporter and configuration
pub fn init_metrics_with_config(config: &ObservabilityConfig) -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    tracing::info!(
        metrics_enabled = %config.enable_metrics_export,
        "Metrics collection initialized"
    );
    Ok(handle)
}

fn text_response(status: hyper::StatusCode, body: impl Into<String>) -> hyper::Response<String> {
    let mut response = hyper::Response::new(body.into());
    *response.status_mut() = status;
    response
}

/// Start the metrics server with liveness and readiness endpoints
pub async fn start_metrics_server(
    metrics_handle: PrometheusHandle,
    port: u16,
    db_pool: Option<Arc<PgPool>>,
    bot_token: Option<String>,
) -> Result<()> {
    // localhost unless explicitly opened up
    let bind_all = std::env::var("METRICS_BIND_ALL_INTERFACES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    let addr = if bind_all {
        SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port)
    } else {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    };

    tracing::info!(
        "Starting metrics server with health checks on {} (bind_all: {})",
        addr,
        bind_all
    );

    // 10 requests per minute per IP
    let rate_limiter = Arc::new(RateLimiter::new(10, 60));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on {}", addr);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let metrics_handle = metrics_handle.clone();
                    let db_pool = db_pool.clone();
                    let bot_token = bot_token.clone();
                    let rate_limiter = rate_limiter.clone();

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);

                        let service = hyper::service::service_fn(
                            move |req: hyper::Request<hyper::body::Incoming>| {
                                let metrics_handle = metrics_handle.clone();
                                let db_pool = db_pool.clone();
                                let bot_token = bot_token.clone();
                                let peer_ip = peer_addr.ip().to_string();
                                let rate_limiter = rate_limiter.clone();
                                async move {
                                    let start = Instant::now();
                                    let response = route_request(
                                        &req,
                                        &peer_ip,
                                        &rate_limiter,
                                        &metrics_handle,
                                        db_pool,
                                        bot_token,
                                    )
                                    .await;
                                    record_request_metrics(
                                        req.method().as_str(),
                                        response.status().as_u16(),
                                        start.elapsed(),
                                    );
                                    Ok::<_, std::convert::Infallible>(response)
                                }
                            },
                        );

                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await
                        {
                            tracing::warn!(
                                error = %err,
                                peer = %peer_addr,
                                "Error serving metrics connection"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, addr = %addr, "Error accepting metrics connection");
                }
            }
        }
    });

    Ok(())
}

async fn route_request(
    req: &hyper::Request<hyper::body::Incoming>,
    peer_ip: &str,
    rate_limiter: &RateLimiter,
    metrics_handle: &PrometheusHandle,
    db_pool: Option<Arc<PgPool>>,
    bot_token: Option<String>,
) -> hyper::Response<String> {
    if !rate_limiter.is_allowed(peer_ip) {
        return text_response(hyper::StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded");
    }

    if !check_request_size(req) {
        return text_response(hyper::StatusCode::PAYLOAD_TOO_LARGE, "Request too large");
    }

    if !check_auth(req) {
        let mut response = text_response(hyper::StatusCode::UNAUTHORIZED, "Unauthorized");
        response.headers_mut().insert(
            "www-authenticate",
            hyper::header::HeaderValue::from_static("Bearer"),
        );
        return response;
    }

    match (req.method(), req.uri().path()) {
        (&hyper::Method::GET, "/metrics") => {
            let mut response = hyper::Response::new(metrics_handle.render());
            response.headers_mut().insert(
                "content-type",
                hyper::header::HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
            );
            response
        }
        (&hyper::Method::GET, "/health/live") => text_response(hyper::StatusCode::OK, "OK"),
        (&hyper::Method::GET, "/health/ready") => {
            let (status, body) =
                match super::health_checks::perform_readiness_checks(db_pool, bot_token).await {
                    Ok(()) => (
                        hyper::StatusCode::OK,
                        serde_json::json!({ "status": "ready" }),
                    ),
                    Err(e) => (
                        hyper::StatusCode::SERVICE_UNAVAILABLE,
                        serde_json::json!({ "status": "not_ready", "error": e.to_string() }),
                    ),
                };
            let mut response = text_response(status, body.to_string());
            response.headers_mut().insert(
                "content-type",
                hyper::header::HeaderValue::from_static("application/json"),
            );
            response
        }
        _ => text_response(hyper::StatusCode::NOT_FOUND, "Not Found"),
    }
}

/// Record database operation metrics
pub fn record_db_metrics(operation: &str, duration: std::time::Duration) {
    let operation = operation.to_string();
    metrics::counter!("db_operations_total", "operation" => operation).increment(1);
    metrics::histogram!("db_operation_duration_seconds").record(duration.as_secs_f64());
}

/// Record request metrics
pub fn record_request_metrics(method: &str, status: u16, duration: std::time::Duration) {
    let method = method.to_string();
    let status = status.to_string();
    metrics::counter!("requests_total", "method" => method, "status" => status).increment(1);
    metrics::histogram!("request_duration_seconds").record(duration.as_secs_f64());
}

/// Record health check metrics
pub fn record_health_check_metrics(check_type: &str, success: bool, duration: std::time::Duration) {
    let check_type = check_type.to_string();
    let result = if success { "success" } else { "failure" };
    metrics::counter!("health_checks_total", "type" => check_type.clone(), "result" => result)
        .increment(1);
    metrics::histogram!("health_check_duration_seconds", "type" => check_type.clone())
        .record(duration.as_secs_f64());
    metrics::gauge!("health_check_status", "type" => check_type).set(if success {
        1.0
    } else {
        0.0
    });
}

/// Record error rate metrics
pub fn record_error_metrics(error_type: &str, component: &str) {
    let error_type = error_type.to_string();
    let component = component.to_string();
    metrics::counter!("errors_total", "type" => error_type, "component" => component).increment(1);
}

/// Record application startup metrics
pub fn record_startup_metrics(duration: std::time::Duration) {
    metrics::histogram!("application_startup_duration_seconds").record(duration.as_secs_f64());
    metrics::counter!("application_starts_total").increment(1);
}

/// Record Telegram update processing metrics
pub fn record_telegram_message(message_type: &str) {
    let message_type = message_type.to_string();
    metrics::counter!("telegram_messages_total", "type" => message_type).increment(1);
}

/// Provisioning state machine transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningTransition {
    PlanSelected,
    SelectionCancelled,
    PaymentSubmitted,
    PaymentApproved,
    PaymentRejected,
    TokenRejected,
    CloneActivated,
}

impl ProvisioningTransition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisioningTransition::PlanSelected => "plan_selected",
            ProvisioningTransition::SelectionCancelled => "selection_cancelled",
            ProvisioningTransition::PaymentSubmitted => "payment_submitted",
            ProvisioningTransition::PaymentApproved => "payment_approved",
            ProvisioningTransition::PaymentRejected => "payment_rejected",
            ProvisioningTransition::TokenRejected => "token_rejected",
            ProvisioningTransition::CloneActivated => "clone_activated",
        }
    }
}

/// Record a provisioning state machine transition
pub fn record_provisioning_transition(transition: ProvisioningTransition) {
    metrics::counter!("provisioning_transitions_total", "transition" => transition.as_str())
        .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_window() {
        let limiter = RateLimiter::new(2, 60);
        assert!(limiter.is_allowed("10.0.0.1"));
        assert!(limiter.is_allowed("10.0.0.1"));
        assert!(!limiter.is_allowed("10.0.0.1"));
        // other clients have their own budget
        assert!(limiter.is_allowed("10.0.0.2"));
    }

    #[test]
    fn test_is_authorized() {
        assert!(is_authorized(None, None));
        assert!(is_authorized(None, Some("")));
        assert!(is_authorized(Some("Bearer secret"), Some("secret")));
        assert!(!is_authorized(Some("Bearer wrong"), Some("secret")));
        assert!(!is_authorized(Some("secret"), Some("secret")));
        assert!(!is_authorized(None, Some("secret")));
    }

    #[test]
    fn test_content_length_allowed() {
        assert!(content_length_allowed(None));
        assert!(content_length_allowed(Some("512")));
        assert!(!content_length_allowed(Some("2097152")));
        assert!(!content_length_allowed(Some("lots")));
    }

    #[test]
    fn test_transition_labels() {
        assert_eq!(ProvisioningTransition::CloneActivated.as_str(), "clone_activated");
        assert_eq!(ProvisioningTransition::PaymentSubmitted.as_str(), "payment_submitted");
    }
}
