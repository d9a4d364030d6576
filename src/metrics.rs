use tracing::trace;

// Lightweight metrics helpers; the Prometheus recorder in main picks up
// whatever the exporter layer is configured to scrape.

pub fn inc_requests(route: &'static str) {
    trace!(
        target = "mercurio.metrics",
        route = route,
        "requests_total_inc"
    );
}

pub fn sync_elapsed(platform: &str, elapsed_ms: u128) {
    trace!(
        target = "mercurio.metrics",
        platform = platform,
        elapsed_ms = elapsed_ms as u64,
        "sync_elapsed"
    );
}
