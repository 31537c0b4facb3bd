/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use serde::{Deserialize, Serialize};

use crate::common::types::*;

// Push notification request for the notification service
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PushNotificationReq {
    pub title: String,
    pub message: String,
    pub url: String,
    #[serde(rename = "targetRoles")]
    pub target_roles: Vec<String>,
    #[serde(rename = "targetUserIDs")]
    pub target_user_ids: Vec<DriverId>,
}

// Live dashboard message, one JSON object per event
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveViewMessage {
    RouteDeviation {
        mac_id: DeviceId,
        route_id: RouteId,
        driver_id: DriverId,
        latitude: Latitude,
        longitude: Longitude,
        distance: Meters,
        timestamp: TimeStamp,
    },
    IdleDetection {
        mac_id: DeviceId,
        #[serde(skip_serializing_if = "Option::is_none")]
        plate_number: Option<TruckId>,
        latitude: Latitude,
        longitude: Longitude,
        start_time: TimeStamp,
        duration: Seconds,
    },
    IdleResolved {
        mac_id: DeviceId,
        #[serde(skip_serializing_if = "Option::is_none")]
        plate_number: Option<TruckId>,
        idle_id: EventId,
        duration: Seconds,
        timestamp: TimeStamp,
    },
}

impl From<&DetectionEvent> for LiveViewMessage {
    fn from(event: &DetectionEvent) -> Self {
        match event {
            DetectionEvent::RouteDeviated(deviation) => LiveViewMessage::RouteDeviation {
                mac_id: deviation.device_id.to_owned(),
                route_id: deviation.route_id.to_owned(),
                driver_id: deviation.driver_id.to_owned(),
                latitude: deviation.position.lat,
                longitude: deviation.position.lon,
                distance: deviation.distance,
                timestamp: deviation.timestamp,
            },
            DetectionEvent::IdleStarted(idle) | DetectionEvent::IdleExtended(idle) => {
                LiveViewMessage::IdleDetection {
                    mac_id: idle.device_id.to_owned(),
                    plate_number: idle.truck_id.to_owned(),
                    latitude: idle.position.lat,
                    longitude: idle.position.lon,
                    start_time: idle.start_time,
                    duration: idle.duration,
                }
            }
            DetectionEvent::IdleResolved(idle) => LiveViewMessage::IdleResolved {
                mac_id: idle.device_id.to_owned(),
                plate_number: idle.truck_id.to_owned(),
                idle_id: idle.id.to_owned(),
                duration: idle.duration,
                timestamp: idle.end_time,
            },
        }
    }
}
