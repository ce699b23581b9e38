use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static SCHEDULES_GENERATED_TOTAL: OnceLock<IntCounter> = OnceLock::new();
pub static SETTLEMENTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static SETTLED_AMOUNT_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static GATEWAY_FAILURES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Install the Prometheus recorder and register the ledger counters.
///
/// Called once at process start-up; a second call is a no-op.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    if METRICS_HANDLE.set(handle).is_err() {
        return;
    }

    let registry = Registry::new();

    let schedules = IntCounter::with_opts(Opts::new(
        "ledger_schedules_generated_total",
        "Total payment schedules generated from leases",
    ))
    .expect("Failed to create ledger_schedules_generated_total metric");

    let settlements = IntCounterVec::new(
        Opts::new(
            "ledger_settlements_total",
            "Total payment records settled by method",
        ),
        &["method"],
    )
    .expect("Failed to create ledger_settlements_total metric");

    // In smallest currency unit
    let settled_amount = IntCounterVec::new(
        Opts::new(
            "ledger_settled_amount_minor_total",
            "Total settled base rent by method (in smallest unit)",
        ),
        &["method"],
    )
    .expect("Failed to create ledger_settled_amount_minor_total metric");

    let gateway_failures = IntCounterVec::new(
        Opts::new(
            "ledger_gateway_failures_total",
            "Payment gateway failures by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create ledger_gateway_failures_total metric");

    registry
        .register(Box::new(schedules.clone()))
        .expect("Failed to register ledger_schedules_generated_total");
    registry
        .register(Box::new(settlements.clone()))
        .expect("Failed to register ledger_settlements_total");
    registry
        .register(Box::new(settled_amount.clone()))
        .expect("Failed to register ledger_settled_amount_minor_total");
    registry
        .register(Box::new(gateway_failures.clone()))
        .expect("Failed to register ledger_gateway_failures_total");

    let _ = PROMETHEUS_REGISTRY.set(registry);
    let _ = SCHEDULES_GENERATED_TOTAL.set(schedules);
    let _ = SETTLEMENTS_TOTAL.set(settlements);
    let _ = SETTLED_AMOUNT_TOTAL.set(settled_amount);
    let _ = GATEWAY_FAILURES_TOTAL.set(gateway_failures);
}

pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    // Append custom prometheus metrics
    if let Some(registry) = PROMETHEUS_REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}

pub fn record_schedule_generated() {
    if let Some(counter) = SCHEDULES_GENERATED_TOTAL.get() {
        counter.inc();
    }
}

/// Record settled records and their base amount.
pub fn record_settlement(method: &str, records: u64, amount_minor: u64) {
    if let Some(counter) = SETTLEMENTS_TOTAL.get() {
        counter.with_label_values(&[method]).inc_by(records);
    }
    if let Some(counter) = SETTLED_AMOUNT_TOTAL.get() {
        counter.with_label_values(&[method]).inc_by(amount_minor);
    }
}

pub fn record_gateway_failure(reason: &str) {
    if let Some(counter) = GATEWAY_FAILURES_TOTAL.get() {
        counter.with_label_values(&[reason]).inc();
    }
}
