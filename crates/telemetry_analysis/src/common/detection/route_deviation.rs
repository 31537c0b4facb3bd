/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use super::{notify, TelemetryDetector};
use crate::collaborator_failure;
use crate::common::{
    geometry::{decode_polyline, distance_point_to_polyline},
    types::*,
};
use crate::environment::DetectionSettings;
use crate::outbound::Notifier;
use crate::storage::{EventStore, RouteLookup};
use crate::tools::error::AppError;
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

struct CachedPolyline {
    encoded: String,
    polyline: Arc<Polyline>,
}

pub struct RouteDeviationDetector {
    settings: DetectionSettings,
    route_lookup: Arc<dyn RouteLookup>,
    event_store: Arc<dyn EventStore>,
    notifier: Arc<dyn Notifier>,
    polylines: RwLock<FxHashMap<RouteId, CachedPolyline>>,
    followed_routes: RwLock<FxHashMap<DeviceId, RouteId>>,
}

impl RouteDeviationDetector {
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
            polylines: RwLock::new(FxHashMap::default()),
            followed_routes: RwLock::new(FxHashMap::default()),
        }
    }

    /// Checks one position against the device's active route.
    ///
    /// Returns the raised event when the position is at least the configured threshold away from
    /// the route. Lookup, decode, persistence and notification failures never surface here.
    pub async fn on_position(
        &self,
        device_id: &DeviceId,
        position: Point,
        timestamp: TimeStamp,
    ) -> Option<DeviationEvent> {
        let route = match self.active_route(device_id).await {
            Ok(route) => route,
            Err(err) => {
                error!(
                    tag = "[Route Deviation]",
                    device_id = %device_id,
                    "Failed to look up active route : {}",
                    err.message()
                );
                return None;
            }
        };
        self.follow_route(device_id, route.as_ref().map(|route| &route.route_id))
            .await;

        let route = route?;
        let polyline = self.route_polyline(&route).await?;

        if polyline.is_empty() {
            return None;
        }

        let projection = distance_point_to_polyline(
            &position,
            &polyline,
            self.settings.geometry.earth_radius_meters,
        );

        let Meters(distance) = projection.distance;
        if distance < self.settings.route_deviation.deviation_threshold_meters {
            return None;
        }

        let event = DeviationEvent {
            id: EventId::generate(),
            device_id: device_id.to_owned(),
            route_id: route.route_id,
            driver_id: route.driver_id,
            position,
            reference_point: projection.closest_point,
            distance: projection.distance,
            segment_index: projection.segment_index,
            timestamp,
        };

        info!(
            tag = "[Route Deviation]",
            device_id = %device_id,
            route_id = %event.route_id,
            segment_index = event.segment_index,
            "Device is {:.1} meters off its route",
            distance
        );

        if let Err(err) = self.event_store.persist_deviation(&event).await {
            collaborator_failure!("storage", "persist_deviation");
            error!(
                tag = "[Route Deviation]",
                device_id = %device_id,
                "Failed to persist deviation : {}",
                err.message()
            );
        }

        notify(
            self.notifier.as_ref(),
            &DetectionEvent::RouteDeviated(event.to_owned()),
        )
        .await;

        Some(event)
    }

    /// Drops the cached decode of a route, forcing the next sample to decode it again.
    pub async fn invalidate_route(&self, route_id: &RouteId) {
        self.polylines.write().await.remove(route_id);
    }

    pub async fn cached_polyline(&self, route_id: &RouteId) -> Option<Arc<Polyline>> {
        self.polylines
            .read()
            .await
            .get(route_id)
            .map(|cached| cached.polyline.to_owned())
    }

    /// Records the route the device currently follows and drops the decode of the route it left,
    /// unless another device still follows it.
    async fn follow_route(&self, device_id: &DeviceId, route_id: Option<&RouteId>) {
        let left = {
            let mut followed_routes = self.followed_routes.write().await;
            let previous = match route_id {
                Some(route_id) => {
                    followed_routes.insert(device_id.to_owned(), route_id.to_owned())
                }
                None => followed_routes.remove(device_id),
            };
            match previous {
                Some(previous)
                    if Some(&previous) != route_id
                        && !followed_routes.values().any(|followed| followed == &previous) =>
                {
                    previous
                }
                _ => return,
            }
        };

        self.invalidate_route(&left).await;
    }

    async fn active_route(
        &self,
        device_id: &DeviceId,
    ) -> Result<Option<RouteReference>, AppError> {
        let routes = self.route_lookup.find_active_routes(device_id).await?;

        let mut active: Vec<RouteReference> = routes
            .into_iter()
            .filter(|route| route.status == RouteStatus::Active)
            .collect();
        active.sort_by(|a, b| a.route_id.cmp(&b.route_id));

        if active.len() > 1 {
            warn!(
                tag = "[Route Deviation]",
                device_id = %device_id,
                routes = ?active.iter().map(|route| route.route_id.inner()).collect::<Vec<String>>(),
                "Multiple active routes, using the lowest route id"
            );
        }

        Ok(active.into_iter().next())
    }

    async fn route_polyline(&self, route: &RouteReference) -> Option<Arc<Polyline>> {
        if let Some(cached) = self.polylines.read().await.get(&route.route_id) {
            if cached.encoded == route.polyline {
                return Some(cached.polyline.to_owned());
            }
        }

        match decode_polyline(
            &route.polyline,
            self.settings.geometry.polyline_precision,
            self.settings.geometry.polyline_dimensions,
        ) {
            Ok(polyline) => {
                let polyline = Arc::new(polyline);
                self.polylines.write().await.insert(
                    route.route_id.to_owned(),
                    CachedPolyline {
                        encoded: route.polyline.to_owned(),
                        polyline: polyline.to_owned(),
                    },
                );
                Some(polyline)
            }
            Err(err) => {
                self.polylines.write().await.remove(&route.route_id);
                warn!(
                    tag = "[Route Deviation]",
                    route_id = %route.route_id,
                    "Skipping route with undecodable geometry : {}",
                    err.message()
                );
                None
            }
        }
    }
}

#[async_trait]
impl TelemetryDetector for RouteDeviationDetector {
    fn name(&self) -> &'static str {
        "route_deviation"
    }

    async fn process(&self, sample: &TelemetrySample) -> Vec<DetectionEvent> {
        self.on_position(&sample.device_id, sample.point(), sample.timestamp)
            .await
            .map(DetectionEvent::RouteDeviated)
            .into_iter()
            .collect()
    }
}
