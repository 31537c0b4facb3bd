/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::common::types::*;
use crate::outbound::Notifier;
use crate::tools::prometheus::TOTAL_TELEMETRY_SAMPLES;
use crate::{collaborator_failure, detection_event, detection_latency};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::error;

mod idle;
mod route_deviation;

pub use idle::{DeviceIdleState, IdleDetectionEngine, IdleTransition, IdleWindow};
pub use route_deviation::RouteDeviationDetector;

/// A detector consuming the position stream of every device.
#[async_trait]
pub trait TelemetryDetector: Send + Sync {
    /// Name of the detection type, used as a metrics label.
    fn name(&self) -> &'static str;

    /// Runs the detector for one sample and returns the events it raised.
    async fn process(&self, sample: &TelemetrySample) -> Vec<DetectionEvent>;
}

/// Registry fanning each sample out to every registered detector, in registration order.
pub struct DetectionRegistry {
    detectors: Vec<Arc<dyn TelemetryDetector>>,
}

impl DetectionRegistry {
    pub fn new() -> Self {
        Self {
            detectors: Vec::new(),
        }
    }

    pub fn register_detector<D>(&mut self, detector: D)
    where
        D: TelemetryDetector + 'static,
    {
        self.detectors.push(Arc::new(detector));
    }

    pub fn register_shared(&mut self, detector: Arc<dyn TelemetryDetector>) {
        self.detectors.push(detector);
    }

    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|detector| detector.name()).collect()
    }

    pub async fn dispatch(&self, sample: &TelemetrySample) -> Vec<DetectionEvent> {
        TOTAL_TELEMETRY_SAMPLES.inc();

        let mut events = Vec::new();
        for detector in self.detectors.iter() {
            let start = std::time::Instant::now();
            events.extend(detector.process(sample).await);
            detection_latency!(detector.name(), start);
        }
        events
    }
}

impl Default for DetectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Notifies about a freshly raised event. Failures are logged and counted, never returned.
pub(crate) async fn notify(notifier: &dyn Notifier, event: &DetectionEvent) {
    detection_event!(event.label());
    if let Err(err) = notifier.dispatch(event).await {
        collaborator_failure!("notifier", event.label());
        error!(
            tag = "[Notification]",
            device_id = %event.device_id(),
            event = event.label(),
            "Failed to notify : {}",
            err.message()
        );
    }
}
