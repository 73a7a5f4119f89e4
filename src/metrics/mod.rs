/*!
 * # Metrics Module
 *
 * Prometheus counters for the transfer lifecycle and the stock ledger,
 * exposed in text format at `/metrics`. Database-level timings go through
 * the `metrics` facade in `db.rs`.
 */

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

lazy_static! {
    pub static ref REGISTRY: Registry = {
        let registry = Registry::new_custom(Some("office_transfer".into()), None)
            .expect("registry can be created");
        registry
            .register(Box::new(TRANSFERS_CREATED.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(TRANSFER_TRANSITIONS.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(LEDGER_FAILURES.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(OFFICE_DISTRIBUTIONS.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(PURCHASED_UNITS.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(INVENTORY_ADJUSTMENTS.clone()))
            .expect("collector can be registered");
        registry
    };

    pub static ref TRANSFERS_CREATED: IntCounter = IntCounter::new(
        "transfers_created_total",
        "Total number of transfers created"
    )
    .expect("metric can be created");

    pub static ref TRANSFER_TRANSITIONS: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "transfer_transitions_total",
            "Transfers reaching a terminal status, by status"
        ),
        &["status"]
    )
    .expect("metric can be created");

    pub static ref LEDGER_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "ledger_failures_total",
            "Ledger operations refused, by reason"
        ),
        &["reason"]
    )
    .expect("metric can be created");

    pub static ref OFFICE_DISTRIBUTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "office_distributions_total",
            "Immediate parent/child stock movements, by kind"
        ),
        &["kind"]
    )
    .expect("metric can be created");

    pub static ref PURCHASED_UNITS: IntCounter = IntCounter::new(
        "purchased_units_total",
        "Item instances created by purchase intake"
    )
    .expect("metric can be created");

    pub static ref INVENTORY_ADJUSTMENTS: IntCounter = IntCounter::new(
        "inventory_adjustments_total",
        "Total number of manual inventory adjustments"
    )
    .expect("metric can be created");
}

/// Renders every registered collector in the Prometheus text format.
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// `GET /metrics`
pub async fn metrics_handler() -> Response {
    match render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_export() {
        TRANSFER_TRANSITIONS.with_label_values(&["COMPLETED"]).inc();
        let text = render().unwrap();
        assert!(text.contains("office_transfer_transfer_transitions_total"));
        assert!(text.contains("status=\"COMPLETED\""));
    }
}
