use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rate_limited_requests: u64,
    pub average_response_time: Duration,
    pub last_request_time: Option<SystemTime>,
    pub requests_by_endpoint: HashMap<String, EndpointMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointMetrics {
    pub request_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub total_response_time: Duration,
    pub min_response_time: Duration,
    pub max_response_time: Duration,
}

#[derive(Debug, Clone)]
pub struct RequestMetrics {
    pub endpoint: String,
    pub method: String,
    pub status_code: Option<u16>,
    pub response_time: Duration,
    pub success: bool,
    pub rate_limited: bool,
    pub error_type: Option<String>,
}

impl EndpointMetrics {
    fn new() -> Self {
        Self {
            request_count: 0,
            success_count: 0,
            error_count: 0,
            total_response_time: Duration::ZERO,
            min_response_time: Duration::MAX,
            max_response_time: Duration::ZERO,
        }
    }

    fn update(&mut self, metrics: &RequestMetrics) {
        self.request_count += 1;
        self.total_response_time += metrics.response_time;
        self.min_response_time = self.min_response_time.min(metrics.response_time);
        self.max_response_time = self.max_response_time.max(metrics.response_time);

        if metrics.success {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
    }

    pub fn average_response_time(&self) -> Duration {
        if self.request_count == 0 {
            Duration::ZERO
        } else {
            self.total_response_time / self.request_count as u32
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.request_count as f64
        }
    }
}

#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: Arc<RwLock<ApiMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_request(&self, request_metrics: RequestMetrics) {
        let mut metrics = self.metrics.write().await;

        metrics.total_requests += 1;
        metrics.last_request_time = Some(SystemTime::now());

        if request_metrics.success {
            metrics.successful_requests += 1;
        } else {
            metrics.failed_requests += 1;
        }

        if request_metrics.rate_limited {
            metrics.rate_limited_requests += 1;
        }

        // Running mean over all requests
        let previous_total = metrics.average_response_time * (metrics.total_requests - 1) as u32;
        metrics.average_response_time =
            (previous_total + request_metrics.response_time) / metrics.total_requests as u32;

        metrics
            .requests_by_endpoint
            .entry(request_metrics.endpoint.clone())
            .or_insert_with(EndpointMetrics::new)
            .update(&request_metrics);

        if let Some(error_type) = &request_metrics.error_type {
            tracing::debug!(
                "Recorded failed {} {} ({})",
                request_metrics.method,
                request_metrics.endpoint,
                error_type
            );
        }
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.metrics.read().await.clone()
    }

    pub async fn get_endpoint_metrics(&self, endpoint: &str) -> Option<EndpointMetrics> {
        let metrics = self.metrics.read().await;
        metrics.requests_by_endpoint.get(endpoint).cloned()
    }

    pub async fn reset_metrics(&self) {
        *self.metrics.write().await = ApiMetrics::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(endpoint: &str, millis: u64, success: bool) -> RequestMetrics {
        RequestMetrics {
            endpoint: endpoint.to_string(),
            method: "GET".to_string(),
            status_code: Some(if success { 200 } else { 500 }),
            response_time: Duration::from_millis(millis),
            success,
            rate_limited: false,
            error_type: if success {
                None
            } else {
                Some("server_error".to_string())
            },
        }
    }

    #[tokio::test]
    async fn test_metrics_collector() {
        let collector = MetricsCollector::new();

        collector.record_request(request("/r/Depresion/new", 100, true)).await;
        collector.record_request(request("/r/Depresion/new", 300, false)).await;

        let metrics = collector.get_metrics().await;
        assert_eq!(metrics.total_requests, 2);
        assert_eq!(metrics.successful_requests, 1);
        assert_eq!(metrics.failed_requests, 1);
        assert_eq!(metrics.average_response_time, Duration::from_millis(200));
        assert!(metrics.last_request_time.is_some());
    }

    #[tokio::test]
    async fn test_endpoint_specific_metrics() {
        let collector = MetricsCollector::new();
        collector.record_request(request("/r/rust/new", 200, true)).await;

        let endpoint = collector.get_endpoint_metrics("/r/rust/new").await.unwrap();
        assert_eq!(endpoint.request_count, 1);
        assert_eq!(endpoint.success_rate(), 1.0);
        assert_eq!(endpoint.average_response_time(), Duration::from_millis(200));
        assert_eq!(endpoint.min_response_time, Duration::from_millis(200));

        assert!(collector.get_endpoint_metrics("/r/other/new").await.is_none());
    }

    #[tokio::test]
    async fn test_reset_metrics() {
        let collector = MetricsCollector::new();
        collector.record_request(request("/r/rust/new", 50, true)).await;
        collector.reset_metrics().await;

        assert_eq!(collector.get_metrics().await.total_requests, 0);
    }
}
