#![allow(clippy::expect_used)]

use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ==== Pipeline Metrics ====
    pub static ref LPR_IMAGES_PROCESSED: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "lpr_images_processed_total",
                "Total number of images run through the plate pipeline",
            ),
            &["outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref LPR_PROCESS_LATENCY: Histogram = {
        let metric = Histogram::with_opts(
            HistogramOpts::new(
                "lpr_process_latency_seconds",
                "End-to-end latency of one pipeline call",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref LPR_CANDIDATE_CONFIDENCE: Histogram = {
        let metric = Histogram::with_opts(
            HistogramOpts::new(
                "lpr_candidate_confidence",
                "Combined confidence of the selected plate candidate",
            )
            .buckets(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0]),
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Detection Metrics ====
    pub static ref LPR_REGIONS_DETECTED: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "lpr_regions_detected_total",
                "Total number of candidate regions returned by each strategy",
            ),
            &["strategy"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref LPR_STRATEGY_FAILURES: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "lpr_strategy_failures_total",
                "Total number of detection strategy failures",
            ),
            &["strategy"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Recognition Metrics ====
    pub static ref LPR_RECOGNITION_FAILURES: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "lpr_recognition_failures_total",
                "Total number of recognition engine failures on a variant",
            ),
            &["engine"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref LPR_INFERENCE_TIME: HistogramVec = {
        let metric = HistogramVec::new(
            HistogramOpts::new(
                "lpr_inference_time_seconds",
                "Time spent on model inference (excluding pre/post processing)",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0]),
            &["model", "execution_provider"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };
}

/// Helper function to encode metrics for Prometheus scraping
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_metrics_accessible() {
        LPR_REGIONS_DETECTED
            .with_label_values(&["metrics_test_strategy"])
            .inc_by(3);
        assert_eq!(
            LPR_REGIONS_DETECTED
                .with_label_values(&["metrics_test_strategy"])
                .get(),
            3
        );
    }

    #[test]
    fn test_recognition_metrics_accessible() {
        LPR_RECOGNITION_FAILURES
            .with_label_values(&["metrics_test_engine"])
            .inc();
        assert_eq!(
            LPR_RECOGNITION_FAILURES
                .with_label_values(&["metrics_test_engine"])
                .get(),
            1
        );
    }

    #[test]
    fn test_encode_metrics_succeeds() {
        LPR_PROCESS_LATENCY.observe(0.02);
        let encoded = encode_metrics().expect("metrics should encode");
        assert!(encoded.contains("lpr_process_latency_seconds"));
    }
}
