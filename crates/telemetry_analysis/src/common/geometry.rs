/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use super::types::*;
use super::utils::{deg2rad, haversine_distance};
use crate::tools::error::AppError;
use serde::{Deserialize, Serialize};

/// Number of interleaved channels per point in an encoded path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolylineDimensions {
    LatLng,
    /// Routing engine output, where every point carries an elevation value after lat/lng.
    LatLngElevation,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolylineProjection {
    pub distance: Meters,
    pub closest_point: Point,
    /// Index of the segment `[i, i + 1]` holding the closest point, `-1` for an empty polyline.
    pub segment_index: i64,
}

/// Decodes a delta encoded path (the Google polyline algorithm) into ordered points.
///
/// Each value is a zig-zag signed integer written as 5 bit chunks offset by 63, with 0x20 marking
/// continuation. Values are deltas from the previous point, scaled by `10^precision`.
/// With `PolylineDimensions::LatLngElevation` the elevation value is decoded and dropped; it may be
/// missing after the last point.
///
/// # Errors
///
/// * `AppError::EmptyPath` for an empty string.
/// * `AppError::MalformedPath` when a value is cut off before its last chunk, a point has no longitude,
///   a byte is outside `?`..=`~`, or a value overflows.
pub fn decode_polyline(
    encoded: &str,
    precision: u32,
    dimensions: PolylineDimensions,
) -> Result<Polyline, AppError> {
    let bytes = encoded.as_bytes();
    if bytes.is_empty() {
        return Err(AppError::EmptyPath);
    }

    let factor = 10_f64.powi(precision as i32);
    let mut index = 0;
    let (mut lat, mut lng) = (0_i64, 0_i64);
    let mut points = Vec::new();

    while index < bytes.len() {
        let dlat = read_value(bytes, &mut index)?.ok_or_else(|| {
            AppError::MalformedPath(format!("missing latitude at byte {index}"))
        })?;
        let dlng = read_value(bytes, &mut index)?.ok_or_else(|| {
            AppError::MalformedPath(format!(
                "missing longitude for point {} at byte {index}",
                points.len()
            ))
        })?;

        if dimensions == PolylineDimensions::LatLngElevation {
            let _ = read_value(bytes, &mut index)?;
        }

        lat = accumulate(lat, dlat)?;
        lng = accumulate(lng, dlng)?;

        points.push(Point::new(lat as f64 / factor, lng as f64 / factor));
    }

    Ok(Polyline::new(points))
}

/// Reads one zig-zag varint. `Ok(None)` means the input was already exhausted.
fn read_value(bytes: &[u8], index: &mut usize) -> Result<Option<i64>, AppError> {
    if *index >= bytes.len() {
        return Ok(None);
    }

    let mut result: u64 = 0;
    let mut shift = 0;

    loop {
        let byte = *bytes.get(*index).ok_or_else(|| {
            AppError::MalformedPath(format!("value truncated at byte {}", *index))
        })?;
        if !(63..=126).contains(&byte) {
            return Err(AppError::MalformedPath(format!(
                "invalid character {:?} at byte {}",
                byte as char, *index
            )));
        }
        if shift > 60 {
            return Err(AppError::MalformedPath(format!(
                "value overflows 64 bits at byte {}",
                *index
            )));
        }

        let chunk = u64::from(byte - 63);
        *index += 1;
        result |= (chunk & 0x1f) << shift;
        shift += 5;

        if chunk < 0x20 {
            break;
        }
    }

    let value = if result & 1 == 1 {
        !(result >> 1) as i64
    } else {
        (result >> 1) as i64
    };

    Ok(Some(value))
}

fn accumulate(total: i64, delta: i64) -> Result<i64, AppError> {
    total
        .checked_add(delta)
        .ok_or_else(|| AppError::MalformedPath("coordinate overflow".to_string()))
}

/// Shortest distance from `point` to the segment `start`-`end`, with the closest point on it.
///
/// The projection runs in an equirectangular frame (longitude scaled by the cosine of latitude), which
/// is accurate for segments a few kilometers long. The parameter is clamped to the segment and the
/// resulting point is measured with the Haversine formula.
pub fn distance_point_to_segment(
    point: &Point,
    start: &Point,
    end: &Point,
    earth_radius: f64,
) -> (Meters, Point) {
    if start == end {
        return (
            Meters(haversine_distance(point, start, earth_radius)),
            *start,
        );
    }

    let flatten = |p: &Point| (p.lat.inner(), p.lon.inner() * deg2rad(p.lat.inner()).cos());

    let (x1, y1) = flatten(start);
    let (x2, y2) = flatten(end);
    let (x, y) = flatten(point);

    let dx = x2 - x1;
    let dy = y2 - y1;
    let len_sq = dx * dx + dy * dy;

    let param = if len_sq != 0.0 {
        ((x - x1) * dx + (y - y1) * dy) / len_sq
    } else {
        0.0
    };

    if param <= 0.0 {
        return (
            Meters(haversine_distance(point, start, earth_radius)),
            *start,
        );
    }
    if param >= 1.0 {
        return (Meters(haversine_distance(point, end, earth_radius)), *end);
    }

    let closest_lat = x1 + param * dx;
    let closest_lon = (y1 + param * dy) / deg2rad(closest_lat).cos();
    let closest = Point::new(closest_lat, closest_lon);

    (
        Meters(haversine_distance(point, &closest, earth_radius)),
        closest,
    )
}

/// Shortest distance from `point` to any segment of `polyline`.
///
/// The earliest segment wins ties. A single point polyline measures against that point (segment 0);
/// an empty one yields an infinite distance with segment index `-1`, meaning nothing to compare against.
pub fn distance_point_to_polyline(
    point: &Point,
    polyline: &Polyline,
    earth_radius: f64,
) -> PolylineProjection {
    match polyline.points() {
        [] => PolylineProjection {
            distance: Meters(f64::INFINITY),
            closest_point: *point,
            segment_index: -1,
        },
        [only] => PolylineProjection {
            distance: Meters(haversine_distance(point, only, earth_radius)),
            closest_point: *only,
            segment_index: 0,
        },
        points => points.windows(2).enumerate().fold(
            PolylineProjection {
                distance: Meters(f64::INFINITY),
                closest_point: *point,
                segment_index: -1,
            },
            |closest, (segment_index, segment)| {
                let (distance, closest_point) =
                    distance_point_to_segment(point, &segment[0], &segment[1], earth_radius);
                if distance.inner() < closest.distance.inner() {
                    PolylineProjection {
                        distance,
                        closest_point,
                        segment_index: segment_index as i64,
                    }
                } else {
                    closest
                }
            },
        ),
    }
}
