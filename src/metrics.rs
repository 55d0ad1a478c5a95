//! Prometheus metrics for the channel forwarder.
//!
//! Exposes:
//! - `channel_forwarder_messages_forwarded_total` (counter per source)
//! - `channel_forwarder_messages_dropped_total` (counter per source)
//! - `channel_forwarder_fetch_errors_total` (counter per source)
//! - `channel_forwarder_flood_wait_seconds_total` (counter)
//! - `channel_forwarder_sweep_duration_seconds` (histogram)
//! - process metrics via the `process` collector

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram, register_int_counter, register_int_counter_vec, Encoder,
    Histogram, IntCounter, IntCounterVec, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static MESSAGES_FORWARDED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "channel_forwarder_messages_forwarded_total",
        "Messages forwarded to the destination, by source channel",
        &["channel"]
    )
    .expect("failed to register forwarded counter")
});

static MESSAGES_DROPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "channel_forwarder_messages_dropped_total",
        "Messages dropped after a send failure, by source channel",
        &["channel"]
    )
    .expect("failed to register dropped counter")
});

static FETCH_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "channel_forwarder_fetch_errors_total",
        "Failed message fetches, by source channel",
        &["channel"]
    )
    .expect("failed to register fetch error counter")
});

static FLOOD_WAIT_SECONDS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "channel_forwarder_flood_wait_seconds_total",
        "Total seconds spent honoring platform flood waits"
    )
    .expect("failed to register flood wait counter")
});

static SWEEP_DURATION: Lazy<Histogram> = Lazy::new(|| {
    // Exponential buckets from 10ms up to ~80s.
    let buckets =
        prometheus::exponential_buckets(0.01, 2.0, 14).expect("failed to create histogram buckets");
    register_histogram!(
        "channel_forwarder_sweep_duration_seconds",
        "Duration of one polling sweep over all source channels",
        buckets
    )
    .expect("failed to register sweep duration histogram")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&MESSAGES_FORWARDED);
    Lazy::force(&MESSAGES_DROPPED);
    Lazy::force(&FETCH_ERRORS);
    Lazy::force(&FLOOD_WAIT_SECONDS);
    Lazy::force(&SWEEP_DURATION);
}

pub fn record_forwarded(channel: i64) {
    init_collectors();
    MESSAGES_FORWARDED
        .with_label_values(&[&channel.to_string()])
        .inc();
}

pub fn record_dropped(channel: i64) {
    init_collectors();
    MESSAGES_DROPPED
        .with_label_values(&[&channel.to_string()])
        .inc();
}

pub fn record_fetch_error(channel: i64) {
    init_collectors();
    FETCH_ERRORS.with_label_values(&[&channel.to_string()]).inc();
}

pub fn record_flood_wait(seconds: u64) {
    init_collectors();
    FLOOD_WAIT_SECONDS.inc_by(seconds);
}

pub fn record_sweep(duration: Duration) {
    init_collectors();
    SWEEP_DURATION.observe(duration.as_secs_f64());
}

async fn metrics_response() -> Result<Response<Full<Bytes>>, Infallible> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", err);
        return Ok(Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Full::from("encode error"))
            .unwrap());
    }

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(hyper::header::CONTENT_TYPE, encoder.format_type())
        .body(Full::from(buffer))
        .unwrap())
}

async fn handle_request(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    match req.uri().path() {
        "/metrics" => metrics_response().await,
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::new()))
            .unwrap()),
    }
}

async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Prometheus metrics endpoint started");

    loop {
        let (stream, peer) = listener.accept().await?;
        let service = service_fn(handle_request);
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Metrics connection error: {}", err);
            }
        });
    }
}

/// Spawn the metrics HTTP endpoint on the given address.
pub fn spawn_metrics_server(addr: SocketAddr) {
    init_collectors();
    tokio::spawn(async move {
        if let Err(err) = serve(addr).await {
            error!(%addr, "Metrics server failed: {}", err);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn forwarded_and_dropped_counted_per_channel() {
        record_forwarded(-100111);
        record_forwarded(-100111);
        record_dropped(-100111);

        assert!(
            MESSAGES_FORWARDED
                .with_label_values(&["-100111"])
                .get()
                >= 2
        );
        assert!(MESSAGES_DROPPED.with_label_values(&["-100111"]).get() >= 1);
    }

    #[test]
    fn flood_wait_seconds_accumulate() {
        let before = FLOOD_WAIT_SECONDS.get();
        record_flood_wait(3);
        record_flood_wait(5);
        assert!(FLOOD_WAIT_SECONDS.get() >= before + 8);
    }

    #[test]
    fn sweep_duration_recorded() {
        let before = SWEEP_DURATION.get_sample_count();
        record_sweep(Duration::from_millis(120));
        assert!(SWEEP_DURATION.get_sample_count() > before);
    }

    #[tokio::test]
    async fn metrics_response_contains_registered_metrics() {
        record_forwarded(-100222);
        record_fetch_error(-100222);

        let response = metrics_response().await.expect("metrics response");
        assert_eq!(response.status(), StatusCode::OK);

        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect metrics body")
            .to_bytes();
        let text = String::from_utf8(body_bytes.to_vec()).expect("utf-8 metrics body");
        assert!(text.contains("channel_forwarder_messages_forwarded_total"));
        assert!(text.contains("channel_forwarder_fetch_errors_total"));
    }

    #[tokio::test]
    async fn metrics_response_has_text_content_type() {
        let response = metrics_response().await.expect("metrics response");

        let content_type = response.headers().get(hyper::header::CONTENT_TYPE);
        assert!(content_type.is_some());
        assert!(content_type.unwrap().to_str().unwrap().contains("text/"));
    }

    #[test]
    fn init_collectors_can_be_called_multiple_times() {
        init_collectors();
        init_collectors();
        init_collectors();
    }
}
