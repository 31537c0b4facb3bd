/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use super::types::DeviceId;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Process wide map from device to that device's guarded state.
///
/// The map lock is only taken for writing when a device is seen for the first time; every other
/// access takes it for reading just long enough to clone the entry's `Arc`. Callers then lock the
/// per-device `Mutex` for their read-modify-write, so two devices never contend on each other.
pub struct DeviceStateCache<T> {
    entries: RwLock<FxHashMap<DeviceId, Arc<Mutex<T>>>>,
}

impl<T> DeviceStateCache<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
        }
    }

    pub async fn get(&self, device_id: &DeviceId) -> Option<Arc<Mutex<T>>> {
        self.entries.read().await.get(device_id).cloned()
    }

    /// Returns the device's entry, inserting `init()` when absent.
    ///
    /// If two callers race on a new device, the first insert wins and both get the same entry.
    pub async fn get_or_insert_with<F>(&self, device_id: &DeviceId, init: F) -> Arc<Mutex<T>>
    where
        F: FnOnce() -> T,
    {
        if let Some(entry) = self.get(device_id).await {
            return entry;
        }

        self.entries
            .write()
            .await
            .entry(device_id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(init())))
            .clone()
    }

    pub async fn remove(&self, device_id: &DeviceId) -> Option<Arc<Mutex<T>>> {
        self.entries.write().await.remove(device_id)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<T> Default for DeviceStateCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
