/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use super::{EventStore, RouteLookup};
use crate::common::types::*;
use crate::tools::error::AppError;
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::RwLock;
use tracing::info;

pub const DEFAULT_DEVIATION_CAPACITY: usize = 10_000;

/// Process local event store for development runs and tests.
///
/// Deviations are not deduplicated upstream, so only the most recent `deviation_capacity` of them
/// are retained. Idle events are kept in full, one per idle episode.
pub struct InMemoryEventStore {
    deviation_capacity: usize,
    deviations: RwLock<VecDeque<DeviationEvent>>,
    idle_events: RwLock<FxHashMap<EventId, IdleEvent>>,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::with_deviation_capacity(DEFAULT_DEVIATION_CAPACITY)
    }
}

impl InMemoryEventStore {
    pub fn with_deviation_capacity(deviation_capacity: usize) -> Self {
        Self {
            deviation_capacity,
            deviations: RwLock::new(VecDeque::new()),
            idle_events: RwLock::new(FxHashMap::default()),
        }
    }

    /// Retained deviations, oldest first.
    pub async fn deviations(&self) -> Vec<DeviationEvent> {
        self.deviations.read().await.iter().cloned().collect()
    }

    pub async fn deviation_count(&self) -> usize {
        self.deviations.read().await.len()
    }

    pub async fn deviations_for(&self, device_id: &DeviceId) -> Vec<DeviationEvent> {
        self.deviations
            .read()
            .await
            .iter()
            .filter(|event| &event.device_id == device_id)
            .cloned()
            .collect()
    }

    /// Idle events of a device, oldest first.
    pub async fn idle_events_for(&self, device_id: &DeviceId) -> Vec<IdleEvent> {
        let mut events: Vec<IdleEvent> = self
            .idle_events
            .read()
            .await
            .values()
            .filter(|event| &event.device_id == device_id)
            .cloned()
            .collect();
        events.sort_by_key(|event| event.start_time);
        events
    }

    pub async fn idle_event_count(&self) -> usize {
        self.idle_events.read().await.len()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn persist_deviation(&self, event: &DeviationEvent) -> Result<(), AppError> {
        let mut deviations = self.deviations.write().await;
        deviations.push_back(event.to_owned());
        while deviations.len() > self.deviation_capacity {
            deviations.pop_front();
        }
        Ok(())
    }

    async fn persist_idle(&self, event: &IdleEvent) -> Result<(), AppError> {
        let mut idle_events = self.idle_events.write().await;
        if idle_events.contains_key(&event.id) {
            return Err(AppError::PersistenceFailed(format!(
                "idle event {} already exists",
                event.id.inner()
            )));
        }
        idle_events.insert(event.id.to_owned(), event.to_owned());
        Ok(())
    }

    async fn update_idle(&self, event: &IdleEvent) -> Result<(), AppError> {
        self.idle_events
            .write()
            .await
            .insert(event.id.to_owned(), event.to_owned());
        Ok(())
    }

    async fn find_unresolved_idle(
        &self,
        device_id: &DeviceId,
    ) -> Result<Option<IdleEvent>, AppError> {
        Ok(self
            .idle_events
            .read()
            .await
            .values()
            .filter(|event| &event.device_id == device_id && !event.resolved)
            .max_by_key(|event| event.start_time)
            .cloned())
    }
}

/// One row of the route table file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteAssignment {
    pub route_id: RouteId,
    pub driver_id: DriverId,
    pub device_id: DeviceId,
    pub truck_id: Option<TruckId>,
    #[serde(alias = "routeGeometry")]
    pub polyline: String,
    pub status: RouteStatus,
}

impl From<&RouteAssignment> for RouteReference {
    fn from(assignment: &RouteAssignment) -> Self {
        RouteReference {
            route_id: assignment.route_id.to_owned(),
            driver_id: assignment.driver_id.to_owned(),
            polyline: assignment.polyline.to_owned(),
            status: assignment.status,
        }
    }
}

#[derive(Default)]
pub struct InMemoryRouteLookup {
    assignments: RwLock<FxHashMap<RouteId, RouteAssignment>>,
}

impl InMemoryRouteLookup {
    pub fn new(assignments: Vec<RouteAssignment>) -> Self {
        Self {
            assignments: RwLock::new(
                assignments
                    .into_iter()
                    .map(|assignment| (assignment.route_id.to_owned(), assignment))
                    .collect(),
            ),
        }
    }

    pub async fn from_file(path: &str) -> Result<Self, AppError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| AppError::InternalError(format!("Failed to read {path} : {err}")))?;
        let assignments: Vec<RouteAssignment> = serde_json::from_str(&contents)
            .map_err(|err| AppError::DeserializationError(format!("{path} : {err}")))?;
        info!(
            tag = "[Route Table]",
            "Loaded {} route assignments from {}",
            assignments.len(),
            path
        );
        Ok(Self::new(assignments))
    }

    /// Inserts or replaces the assignment with the same route id.
    pub async fn upsert(&self, assignment: RouteAssignment) {
        self.assignments
            .write()
            .await
            .insert(assignment.route_id.to_owned(), assignment);
    }

    pub async fn remove(&self, route_id: &RouteId) -> Option<RouteAssignment> {
        self.assignments.write().await.remove(route_id)
    }
}

#[async_trait]
impl RouteLookup for InMemoryRouteLookup {
    async fn find_active_routes(
        &self,
        device_id: &DeviceId,
    ) -> Result<Vec<RouteReference>, AppError> {
        Ok(self
            .assignments
            .read()
            .await
            .values()
            .filter(|assignment| {
                &assignment.device_id == device_id && assignment.status == RouteStatus::Active
            })
            .map(RouteReference::from)
            .collect())
    }

    async fn find_truck_id(&self, device_id: &DeviceId) -> Result<Option<TruckId>, AppError> {
        let assignments = self.assignments.read().await;
        let mut owned: Vec<&RouteAssignment> = assignments
            .values()
            .filter(|assignment| &assignment.device_id == device_id)
            .collect();
        owned.sort_by(|a, b| a.route_id.cmp(&b.route_id));
        Ok(owned
            .into_iter()
            .find_map(|assignment| assignment.truck_id.to_owned()))
    }
}
