//! Prometheus metrics for the auth server.
//!
//! Recording goes through the `metrics` facade and is a no-op until
//! [`init_metrics`] installs the exporter, so handlers can record
//! unconditionally.
//!
//! # Metrics
//!
//! - `http_requests_total{method,path,status}`
//! - `registrations_total{outcome}`
//! - `login_attempts_total{outcome}`
//! - `gate_rejections_total{stage}`
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use gk_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", "/api/auth/login", 200);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Auth Metrics
// ============================================================================

/// Outcome label shared by registration and login counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Bad field shape or duplicate account
    Rejected,
    /// Unknown email or wrong password
    InvalidCredentials,
    /// Infrastructure failure
    Error,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Rejected => "rejected",
            Outcome::InvalidCredentials => "invalid_credentials",
            Outcome::Error => "error",
        }
    }
}

/// Increment registrations counter.
pub fn registrations_total(outcome: Outcome) {
    metrics::counter!("registrations_total", "outcome" => outcome.as_str()).increment(1);
}

/// Increment login attempts counter.
pub fn login_attempts_total(outcome: Outcome) {
    metrics::counter!("login_attempts_total", "outcome" => outcome.as_str()).increment(1);
}

/// Increment gate rejections counter, labelled with the last stage passed.
pub fn gate_rejections_total(stage: &'static str) {
    metrics::counter!("gate_rejections_total", "stage" => stage).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter_is_noop() {
        http_requests_total("GET", "/api/health", 200);
        registrations_total(Outcome::Success);
        login_attempts_total(Outcome::InvalidCredentials);
        gate_rejections_total("no_token");
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Success.as_str(), "success");
        assert_eq!(Outcome::InvalidCredentials.as_str(), "invalid_credentials");
    }
}
