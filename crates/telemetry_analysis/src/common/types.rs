/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

#[derive(Deserialize, Serialize, Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
#[macros::impl_getter]
pub struct DeviceId(pub String);
#[derive(Deserialize, Serialize, Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
#[macros::impl_getter]
pub struct RouteId(pub String);
#[derive(Deserialize, Serialize, Clone, Debug, Eq, Hash, PartialEq)]
#[macros::impl_getter]
pub struct DriverId(pub String);
#[derive(Deserialize, Serialize, Clone, Debug, Eq, Hash, PartialEq)]
#[macros::impl_getter]
pub struct TruckId(pub String);
#[derive(Deserialize, Serialize, Clone, Debug, Eq, Hash, PartialEq)]
#[macros::impl_getter]
pub struct EventId(pub String);
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Copy)]
#[macros::impl_getter]
pub struct Latitude(pub f64);
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Copy)]
#[macros::impl_getter]
pub struct Longitude(pub f64);
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Hash, Ord)]
#[macros::impl_getter]
pub struct TimeStamp(pub DateTime<Utc>);
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, PartialOrd)]
#[macros::impl_getter]
pub struct Meters(pub f64);
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[macros::impl_getter]
pub struct Seconds(pub i64);

impl EventId {
    pub fn generate() -> Self {
        EventId(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for RouteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub lat: Latitude,
    pub lon: Longitude,
}

impl Point {
    pub fn new(lat: f64, lon: f64) -> Self {
        Point {
            lat: Latitude(lat),
            lon: Longitude(lon),
        }
    }
}

/// Ordered route geometry, decoded once per encoded path and never mutated afterwards.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    pub fn new(points: Vec<Point>) -> Self {
        Polyline(points)
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(
    Debug, Clone, Copy, EnumString, Display, Serialize, Deserialize, Eq, Hash, PartialEq,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RouteStatus {
    Planned,
    Active,
    Completed,
    Cancelled,
}

/// A route assignment as owned by the route planning subsystem. Read-only here.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteReference {
    pub route_id: RouteId,
    pub driver_id: DriverId,
    #[serde(alias = "routeGeometry")]
    pub polyline: String,
    pub status: RouteStatus,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviationEvent {
    pub id: EventId,
    pub device_id: DeviceId,
    pub route_id: RouteId,
    pub driver_id: DriverId,
    pub position: Point,
    pub reference_point: Point,
    pub distance: Meters,
    pub segment_index: i64,
    pub timestamp: TimeStamp,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct IdleSample {
    pub position: Point,
    pub timestamp: TimeStamp,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdleEvent {
    pub id: EventId,
    pub device_id: DeviceId,
    pub truck_id: Option<TruckId>,
    pub position: Point,
    pub start_time: TimeStamp,
    pub end_time: TimeStamp,
    pub duration: Seconds,
    pub resolved: bool,
}

impl IdleEvent {
    /// Moves the end of the episode to `end_time`, recomputing the duration from the original start.
    pub fn extend_to(&mut self, end_time: TimeStamp) {
        self.end_time = end_time;
        self.duration = seconds_between(self.start_time, end_time);
    }

    pub fn resolve_at(&mut self, end_time: TimeStamp) {
        self.extend_to(end_time);
        self.resolved = true;
    }
}

/// Whole seconds from `start` to `end`, never negative.
pub fn seconds_between(TimeStamp(start): TimeStamp, TimeStamp(end): TimeStamp) -> Seconds {
    Seconds(std::cmp::max(0, end.signed_duration_since(start).num_seconds()))
}

/// What the detectors hand to the notification collaborators.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", content = "event", rename_all = "snake_case")]
pub enum DetectionEvent {
    RouteDeviated(DeviationEvent),
    IdleStarted(IdleEvent),
    IdleExtended(IdleEvent),
    IdleResolved(IdleEvent),
}

impl DetectionEvent {
    pub fn device_id(&self) -> &DeviceId {
        match self {
            DetectionEvent::RouteDeviated(event) => &event.device_id,
            DetectionEvent::IdleStarted(event)
            | DetectionEvent::IdleExtended(event)
            | DetectionEvent::IdleResolved(event) => &event.device_id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DetectionEvent::RouteDeviated(_) => "route_deviation",
            DetectionEvent::IdleStarted(_) => "idle_started",
            DetectionEvent::IdleExtended(_) => "idle_extended",
            DetectionEvent::IdleResolved(_) => "idle_resolved",
        }
    }
}

/// One decoded position report, as delivered by the ingestion side.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    #[serde(alias = "mac_id", alias = "device_id")]
    pub device_id: DeviceId,
    pub latitude: Latitude,
    pub longitude: Longitude,
    pub timestamp: TimeStamp,
}

impl TelemetrySample {
    pub fn point(&self) -> Point {
        Point {
            lat: self.latitude,
            lon: self.longitude,
        }
    }
}
