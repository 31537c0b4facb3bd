/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
#![allow(clippy::expect_used)]

use prometheus::{
    opts, register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

pub static TOTAL_TELEMETRY_SAMPLES: once_cell::sync::Lazy<IntCounter> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter!("total_telemetry_samples", "Total Telemetry Samples")
            .expect("Failed to register total telemetry samples metrics")
    });

pub static DETECTION_LATENCY: once_cell::sync::Lazy<HistogramVec> =
    once_cell::sync::Lazy::new(|| {
        register_histogram_vec!(
            opts!("detection_duration_seconds", "Per sample detection latency").into(),
            &["detector"]
        )
        .expect("Failed to register detection latency metrics")
    });

pub static DETECTION_EVENTS: once_cell::sync::Lazy<IntCounterVec> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter_vec!(
            opts!("detection_events", "Detection events raised"),
            &["event"]
        )
        .expect("Failed to register detection events metrics")
    });

pub static COLLABORATOR_FAILURES: once_cell::sync::Lazy<IntCounterVec> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter_vec!(
            opts!(
                "collaborator_failures",
                "Swallowed persistence and notification failures"
            ),
            &["collaborator", "operation"]
        )
        .expect("Failed to register collaborator failures metrics")
    });

pub static CALL_EXTERNAL_API: once_cell::sync::Lazy<HistogramVec> =
    once_cell::sync::Lazy::new(|| {
        register_histogram_vec!(
            opts!("external_request_duration", "Call external API requests").into(),
            &["method", "host", "service", "status"]
        )
        .expect("Failed to register call external API metrics")
    });

/// Observes how long one detector took to process a single sample.
///
/// * `$detector` - Name of the detector (e.g. `route_deviation`).
/// * `$start` - `std::time::Instant` taken before the detector ran.
#[macro_export]
macro_rules! detection_latency {
    ($detector:expr, $start:expr) => {
        let duration = $start.elapsed().as_secs_f64();
        $crate::tools::prometheus::DETECTION_LATENCY
            .with_label_values(&[$detector])
            .observe(duration);
    };
}

#[macro_export]
macro_rules! detection_event {
    ($event:expr) => {
        $crate::tools::prometheus::DETECTION_EVENTS
            .with_label_values(&[$event])
            .inc();
    };
}

/// Counts a persistence or notification failure that was logged and swallowed.
///
/// * `$collaborator` - `storage` or `notifier`.
/// * `$operation` - The collaborator call that failed (e.g. `persist_idle`).
#[macro_export]
macro_rules! collaborator_failure {
    ($collaborator:expr, $operation:expr) => {
        $crate::tools::prometheus::COLLABORATOR_FAILURES
            .with_label_values(&[$collaborator, $operation])
            .inc();
    };
}

/// Observes the duration of external API calls.
///
/// * `$method` - The HTTP method of the external request.
/// * `$host` - The host or domain of the external service.
/// * `$path` - The path or endpoint of the external service.
/// * `$status` - The HTTP status code of the response from the external service.
/// * `$start` - The time when the external request was initiated.
#[macro_export]
macro_rules! call_external_api {
    ($method:expr, $host:expr, $path:expr, $status:expr, $start:expr) => {
        let duration = $start.elapsed().as_secs_f64();
        $crate::tools::prometheus::CALL_EXTERNAL_API
            .with_label_values(&[$method, $host, $path, $status])
            .observe(duration);
    };
}

/// Renders every registered metric in the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&prometheus::gather(), &mut buffer) {
        return format!("# failed to encode metrics : {err}");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
