/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::common::types::*;
use crate::tools::error::AppError;
use async_trait::async_trait;

pub mod memory;

/// Durable home of the events the detectors raise.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn persist_deviation(&self, event: &DeviationEvent) -> Result<(), AppError>;

    async fn persist_idle(&self, event: &IdleEvent) -> Result<(), AppError>;

    /// Overwrites a previously persisted idle event with the same id.
    async fn update_idle(&self, event: &IdleEvent) -> Result<(), AppError>;

    /// The most recent idle event of the device that has not been resolved yet.
    async fn find_unresolved_idle(&self, device_id: &DeviceId)
        -> Result<Option<IdleEvent>, AppError>;
}

/// Read-only view over route assignments, owned by route planning.
#[async_trait]
pub trait RouteLookup: Send + Sync {
    async fn find_active_routes(&self, device_id: &DeviceId)
        -> Result<Vec<RouteReference>, AppError>;

    async fn find_truck_id(&self, device_id: &DeviceId) -> Result<Option<TruckId>, AppError>;
}
