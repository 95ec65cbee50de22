//! Prometheus metrics (§1 ambient stack), served on a separate port
//! from the query API, mirroring the teacher's `metrics` module: one
//! `LazyLock` per metric, a plain `/metrics` axum route.

use axum::{http::StatusCode, routing};
use prometheus::{
    opts, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::net::SocketAddr;

pub const RESPONSE_TIME_BUCKETS: &[f64] = &[
    0.0001, // 0.1 ms
    0.0005, // 0.5 ms
    0.0010, // 1   ms
    0.0025, // 2.5 ms
    0.0050, // 5   ms
    0.0075, // 7.5 ms
    0.0100, // 10  ms
    0.0250, // 25  ms
    0.0500, // 50  ms
    0.0750, // 75  ms
    0.1000, // 100 ms
    0.2500, // 250 ms
    0.5000, // 500 ms
    1.0000, // 1    s
    2.5000, // 2.5  s
];

pub const BUILD_TIME_BUCKETS: &[f64] = &[
    1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0,
];

pub static QUERY_REQUESTS_TOTAL: std::sync::LazyLock<IntCounterVec> = std::sync::LazyLock::new(|| {
    register_int_counter_vec!(
        opts!(
            "urlindex_query_requests_total",
            "Total number of query requests received, whether valid or invalid."
        ),
        &["operation"]
    )
    .unwrap()
});

pub static QUERY_REQUESTS_REFUSED_TOTAL: std::sync::LazyLock<IntCounterVec> =
    std::sync::LazyLock::new(|| {
        register_int_counter_vec!(
            opts!(
                "urlindex_query_requests_refused_total",
                "Total number of query requests refused as malformed."
            ),
            &["operation", "reason"]
        )
        .unwrap()
    });

pub static QUERY_RESPONSE_TIME_SECONDS: std::sync::LazyLock<HistogramVec> =
    std::sync::LazyLock::new(|| {
        register_histogram_vec!(
            "urlindex_query_response_time_seconds",
            "Response time of query requests, whether valid or invalid.",
            &["operation"],
            RESPONSE_TIME_BUCKETS.to_vec()
        )
        .unwrap()
    });

pub static QUERY_PARTIAL_RESULTS_TOTAL: std::sync::LazyLock<IntCounter> =
    std::sync::LazyLock::new(|| {
        register_int_counter!(opts!(
            "urlindex_query_partial_results_total",
            "Total number of urls_of responses truncated by the request deadline rather than the page limit."
        ))
        .unwrap()
    });

pub static POSTINGS_CACHE_HIT_TOTAL: std::sync::LazyLock<IntCounter> = std::sync::LazyLock::new(|| {
    register_int_counter!(opts!(
        "urlindex_postings_cache_hit_total",
        "Total number of postings-cache hits."
    ))
    .unwrap()
});

pub static POSTINGS_CACHE_MISS_TOTAL: std::sync::LazyLock<IntCounter> = std::sync::LazyLock::new(|| {
    register_int_counter!(opts!(
        "urlindex_postings_cache_miss_total",
        "Total number of postings-cache misses."
    ))
    .unwrap()
});

pub static ROW_GROUP_CACHE_HIT_TOTAL: std::sync::LazyLock<IntCounter> = std::sync::LazyLock::new(|| {
    register_int_counter!(opts!(
        "urlindex_row_group_cache_hit_total",
        "Total number of row-group-cache hits."
    ))
    .unwrap()
});

pub static ROW_GROUP_CACHE_MISS_TOTAL: std::sync::LazyLock<IntCounter> = std::sync::LazyLock::new(|| {
    register_int_counter!(opts!(
        "urlindex_row_group_cache_miss_total",
        "Total number of row-group-cache misses."
    ))
    .unwrap()
});

pub static POSTINGS_CACHE_SIZE: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
    register_int_gauge!(opts!(
        "urlindex_postings_cache_size",
        "Number of entries currently in the postings cache."
    ))
    .unwrap()
});

pub static ROW_GROUP_CACHE_SIZE: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
    register_int_gauge!(opts!(
        "urlindex_row_group_cache_size",
        "Number of entries currently in the row-group cache."
    ))
    .unwrap()
});

pub static BUILD_DURATION_SECONDS: std::sync::LazyLock<HistogramVec> = std::sync::LazyLock::new(|| {
    register_histogram_vec!(
        "urlindex_build_duration_seconds",
        "Duration of full and incremental index builds.",
        &["mode"],
        BUILD_TIME_BUCKETS.to_vec()
    )
    .unwrap()
});

pub static BUILD_DOMAINS_ADDED_TOTAL: std::sync::LazyLock<IntCounter> = std::sync::LazyLock::new(|| {
    register_int_counter!(opts!(
        "urlindex_build_domains_added_total",
        "Total number of new domains added to the dictionary across all builds."
    ))
    .unwrap()
});

pub static CURRENT_INDEX_VERSION: std::sync::LazyLock<prometheus::GaugeVec> =
    std::sync::LazyLock::new(|| {
        prometheus::register_gauge_vec!(
            opts!(
                "urlindex_current_index_version_info",
                "Always 1; the `version` label names the currently published index version."
            ),
            &["version"]
        )
        .unwrap()
    });

async fn get_metrics() -> (StatusCode, String) {
    match TextEncoder::new().encode_to_string(&prometheus::gather()) {
        Ok(metrics_str) => (StatusCode::OK, metrics_str),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

pub async fn serve_prometheus_endpoint_task(address: SocketAddr) -> std::io::Result<()> {
    let app = axum::Router::new().route("/metrics", routing::get(get_metrics));
    let listener = tokio::net::TcpListener::bind(address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
