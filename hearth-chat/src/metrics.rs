//! Latency and throughput figures for a single generation.

use std::time::Instant;

use crate::types::GenerationMetrics;

/// Captures start, first-token and end instants for one generation.
///
/// A fresh collector is created per generation; nothing carries over.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    start: Instant,
    first_token: Option<Instant>,
    token_count: usize,
}

impl MetricsCollector {
    pub fn start() -> Self {
        Self::started_at(Instant::now())
    }

    pub fn started_at(start: Instant) -> Self {
        Self {
            start,
            first_token: None,
            token_count: 0,
        }
    }

    /// Record the cumulative token count reported by the runtime.
    pub fn record_tokens(&mut self, token_count: usize) {
        self.record_tokens_at(token_count, Instant::now());
    }

    pub fn record_tokens_at(&mut self, token_count: usize, at: Instant) {
        if token_count > 0 && self.first_token.is_none() {
            self.first_token = Some(at);
        }
        self.token_count = self.token_count.max(token_count);
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }

    pub fn finish(&self) -> GenerationMetrics {
        self.finish_at(Instant::now())
    }

    pub fn finish_at(&self, end: Instant) -> GenerationMetrics {
        let since_start = |at: Instant| at.saturating_duration_since(self.start).as_secs_f64();
        from_timestamps(
            0.0,
            self.first_token.map(since_start),
            since_start(end),
            self.token_count,
        )
    }
}

/// Derive metrics from timestamps in seconds.
///
/// `ttft_ms = (first - start) * 1000`, `tps = tokens / (end - start)`.
/// Throughput is only reported when at least one token was produced and
/// some time elapsed.
pub fn from_timestamps(
    start: f64,
    first_token: Option<f64>,
    end: f64,
    token_count: usize,
) -> GenerationMetrics {
    let total = (end - start).max(0.0);
    let produced = token_count > 0;

    GenerationMetrics {
        time_to_first_token_ms: first_token
            .filter(|_| produced)
            .map(|first| (first - start).max(0.0) * 1000.0),
        tokens_per_second: (produced && total > 0.0).then(|| token_count as f64 / total),
        total_tokens: produced.then_some(token_count),
        total_time_seconds: Some(total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_synthetic_timestamps() {
        let metrics = from_timestamps(10.0, Some(10.25), 12.0, 40);
        assert_eq!(metrics.time_to_first_token_ms, Some(250.0));
        assert_eq!(metrics.tokens_per_second, Some(20.0));
        assert_eq!(metrics.total_tokens, Some(40));
        assert_eq!(metrics.total_time_seconds, Some(2.0));
    }

    #[test]
    fn test_no_tokens_means_no_rates() {
        let metrics = from_timestamps(0.0, None, 1.5, 0);
        assert_eq!(metrics.time_to_first_token_ms, None);
        assert_eq!(metrics.tokens_per_second, None);
        assert_eq!(metrics.total_tokens, None);
        assert_eq!(metrics.total_time_seconds, Some(1.5));
    }

    #[test]
    fn test_zero_duration_does_not_divide() {
        let metrics = from_timestamps(3.0, Some(3.0), 3.0, 5);
        assert_eq!(metrics.tokens_per_second, None);
        assert_eq!(metrics.time_to_first_token_ms, Some(0.0));
    }

    #[test]
    fn test_collector_uses_first_nonzero_count() {
        let start = Instant::now();
        let mut collector = MetricsCollector::started_at(start);
        collector.record_tokens_at(0, start + Duration::from_millis(50));
        collector.record_tokens_at(1, start + Duration::from_millis(100));
        collector.record_tokens_at(2, start + Duration::from_millis(300));

        let metrics = collector.finish_at(start + Duration::from_millis(500));
        let ttft = metrics.time_to_first_token_ms.unwrap();
        assert!((ttft - 100.0).abs() < 1e-6);
        let tps = metrics.tokens_per_second.unwrap();
        assert!((tps - 4.0).abs() < 1e-6);
        assert_eq!(collector.token_count(), 2);
    }
}
