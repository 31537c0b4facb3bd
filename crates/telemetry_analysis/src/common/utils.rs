/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use super::types::*;
use rustc_hash::FxHasher;
use std::f64::consts::PI;
use std::hash::{Hash, Hasher};

/// Mean Earth radius used by every distance computation unless configured otherwise.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

pub fn deg2rad(degrees: f64) -> f64 {
    degrees * PI / 180.0
}

pub fn distance_between_in_meters(latlong1: &Point, latlong2: &Point) -> f64 {
    haversine_distance(latlong1, latlong2, EARTH_RADIUS_METERS)
}

/// Great circle distance between two points on a sphere of radius `earth_radius` meters.
pub fn haversine_distance(latlong1: &Point, latlong2: &Point, earth_radius: f64) -> f64 {
    let Latitude(lat1) = latlong1.lat;
    let Longitude(lon1) = latlong1.lon;
    let Latitude(lat2) = latlong2.lat;
    let Longitude(lon2) = latlong2.lon;

    let dlat = deg2rad(lat2 - lat1);
    let dlon = deg2rad(lon2 - lon1);

    let rlat1 = deg2rad(lat1);
    let rlat2 = deg2rad(lat2);

    let sq = |x: f64| x * x;

    // Floating point error can push h just outside [0, 1] for antipodal points.
    let h = (sq((dlat / 2.0).sin()) + rlat1.cos() * rlat2.cos() * sq((dlon / 2.0).sin()))
        .clamp(0.0, 1.0);

    2.0 * earth_radius * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Stable shard for a device, used to pin all samples of one device to one worker.
pub fn device_shard(DeviceId(device_id): &DeviceId, shards: usize) -> usize {
    let mut hasher = FxHasher::default();
    device_id.hash(&mut hasher);
    (hasher.finish() % std::cmp::max(1, shards) as u64) as usize
}
