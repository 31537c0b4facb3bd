/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use super::{notify, TelemetryDetector};
use crate::collaborator_failure;
use crate::common::{device_cache::DeviceStateCache, types::*, utils::haversine_distance};
use crate::environment::DetectionSettings;
use crate::outbound::Notifier;
use crate::storage::{EventStore, RouteLookup};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

/// Recent positions of a device, all within the idle radius of the anchor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdleWindow {
    anchor: Option<Point>,
    samples: Vec<IdleSample>,
}

impl IdleWindow {
    pub fn anchor(&self) -> Option<Point> {
        self.anchor
    }

    pub fn samples(&self) -> &[IdleSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn reset_at(&mut self, sample: IdleSample) {
        self.anchor = Some(sample.position);
        self.samples.clear();
        self.samples.push(sample);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceIdleState {
    pub window: IdleWindow,
    pub open_event: Option<IdleEvent>,
    pub truck_id: Option<TruckId>,
}

/// Outcome of feeding one sample to the idle engine.
#[derive(Debug, Clone, PartialEq)]
pub enum IdleTransition {
    /// The sample became the anchor of a fresh window.
    Anchored,
    /// The sample stayed within the radius; the window now holds this many samples.
    Accumulating(usize),
    Started(IdleEvent),
    Extended(IdleEvent),
    Resolved(IdleEvent),
}

impl IdleTransition {
    pub fn into_event(self) -> Option<DetectionEvent> {
        match self {
            IdleTransition::Started(event) => Some(DetectionEvent::IdleStarted(event)),
            IdleTransition::Extended(event) => Some(DetectionEvent::IdleExtended(event)),
            IdleTransition::Resolved(event) => Some(DetectionEvent::IdleResolved(event)),
            IdleTransition::Anchored | IdleTransition::Accumulating(_) => None,
        }
    }
}

pub struct IdleDetectionEngine {
    settings: DetectionSettings,
    route_lookup: Arc<dyn RouteLookup>,
    event_store: Arc<dyn EventStore>,
    notifier: Arc<dyn Notifier>,
    devices: DeviceStateCache<DeviceIdleState>,
}

impl IdleDetectionEngine {
    pub fn new(
        settings: DetectionSettings,
        route_lookup: Arc<dyn RouteLookup>,
        event_store: Arc<dyn EventStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            settings,
            route_lookup,
            event_store,
            notifier,
            devices: DeviceStateCache::new(),
        }
    }

    pub async fn on_position(
        &self,
        device_id: &DeviceId,
        position: Point,
        timestamp: TimeStamp,
    ) -> IdleTransition {
        let state = match self.devices.get(device_id).await {
            Some(state) => state,
            None => {
                let hydrated = self.hydrate(device_id).await;
                self.devices
                    .get_or_insert_with(device_id, || hydrated)
                    .await
            }
        };

        let transition = {
            let mut state = state.lock().await;
            advance(
                &mut state,
                &self.settings,
                device_id,
                IdleSample {
                    position,
                    timestamp,
                },
            )
        };

        match &transition {
            IdleTransition::Started(event) => {
                info!(
                    tag = "[Idle Detection]",
                    device_id = %device_id,
                    idle_id = %event.id.inner(),
                    "Idle confirmed since {}",
                    event.start_time.inner()
                );
                if let Err(err) = self.event_store.persist_idle(event).await {
                    self.storage_failure(device_id, "persist_idle", err.message());
                }
                notify(
                    self.notifier.as_ref(),
                    &DetectionEvent::IdleStarted(event.to_owned()),
                )
                .await;
            }
            IdleTransition::Extended(event) => {
                if let Err(err) = self.event_store.update_idle(event).await {
                    self.storage_failure(device_id, "update_idle", err.message());
                }
                notify(
                    self.notifier.as_ref(),
                    &DetectionEvent::IdleExtended(event.to_owned()),
                )
                .await;
            }
            IdleTransition::Resolved(event) => {
                info!(
                    tag = "[Idle Detection]",
                    device_id = %device_id,
                    idle_id = %event.id.inner(),
                    "Idle resolved after {} seconds",
                    event.duration.inner()
                );
                if let Err(err) = self.event_store.update_idle(event).await {
                    self.storage_failure(device_id, "update_idle", err.message());
                }
                notify(
                    self.notifier.as_ref(),
                    &DetectionEvent::IdleResolved(event.to_owned()),
                )
                .await;
            }
            IdleTransition::Anchored | IdleTransition::Accumulating(_) => {}
        }

        transition
    }

    /// Copy of the device's window and open idle event, if the device has been seen.
    pub async fn snapshot(&self, device_id: &DeviceId) -> Option<DeviceIdleState> {
        let state = self.devices.get(device_id).await?;
        let snapshot = state.lock().await.clone();
        Some(snapshot)
    }

    pub async fn tracked_devices(&self) -> usize {
        self.devices.len().await
    }

    /// Starting state for a device seen for the first time by this process.
    async fn hydrate(&self, device_id: &DeviceId) -> DeviceIdleState {
        let open_event = match self.event_store.find_unresolved_idle(device_id).await {
            Ok(open_event) => open_event,
            Err(err) => {
                self.storage_failure(device_id, "find_unresolved_idle", err.message());
                None
            }
        };

        let truck_id = match self.route_lookup.find_truck_id(device_id).await {
            Ok(truck_id) => truck_id,
            Err(err) => {
                error!(
                    tag = "[Idle Detection]",
                    device_id = %device_id,
                    "Failed to look up truck : {}",
                    err.message()
                );
                None
            }
        }
        .or_else(|| open_event.as_ref().and_then(|event| event.truck_id.to_owned()));

        DeviceIdleState {
            window: IdleWindow::default(),
            open_event,
            truck_id,
        }
    }

    fn storage_failure(&self, device_id: &DeviceId, operation: &str, message: String) {
        collaborator_failure!("storage", operation);
        error!(
            tag = "[Idle Detection]",
            device_id = %device_id,
            operation = operation,
            "Storage call failed : {}",
            message
        );
    }
}

/// Applies one sample to the device state.
fn advance(
    state: &mut DeviceIdleState,
    settings: &DetectionSettings,
    device_id: &DeviceId,
    sample: IdleSample,
) -> IdleTransition {
    let Some(anchor) = state.window.anchor else {
        state.window.reset_at(sample);
        return IdleTransition::Anchored;
    };

    let distance = haversine_distance(
        &anchor,
        &sample.position,
        settings.geometry.earth_radius_meters,
    );

    if distance > settings.idle.idle_radius_meters {
        state.window.reset_at(sample);
        return match state.open_event.take() {
            Some(mut open_event) => {
                open_event.resolve_at(sample.timestamp);
                IdleTransition::Resolved(open_event)
            }
            None => IdleTransition::Anchored,
        };
    }

    state.window.samples.push(sample);
    if state.window.len() < settings.idle.idle_detection_count {
        return IdleTransition::Accumulating(state.window.len());
    }

    let transition = match state.open_event.as_mut() {
        Some(open_event) => {
            open_event.extend_to(sample.timestamp);
            IdleTransition::Extended(open_event.to_owned())
        }
        None => {
            let start_time = state
                .window
                .samples
                .first()
                .map(|first| first.timestamp)
                .unwrap_or(sample.timestamp);
            let event = IdleEvent {
                id: EventId::generate(),
                device_id: device_id.to_owned(),
                truck_id: state.truck_id.to_owned(),
                position: anchor,
                start_time,
                end_time: sample.timestamp,
                duration: seconds_between(start_time, sample.timestamp),
                resolved: false,
            };
            state.open_event = Some(event.to_owned());
            IdleTransition::Started(event)
        }
    };

    state.window.reset_at(sample);
    transition
}

#[async_trait]
impl TelemetryDetector for IdleDetectionEngine {
    fn name(&self) -> &'static str {
        "idle"
    }

    async fn process(&self, sample: &TelemetrySample) -> Vec<DetectionEvent> {
        self.on_position(&sample.device_id, sample.point(), sample.timestamp)
            .await
            .into_event()
            .into_iter()
            .collect()
    }
}
