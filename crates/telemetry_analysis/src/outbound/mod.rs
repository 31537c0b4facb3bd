/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::common::types::DetectionEvent;
use crate::tools::error::AppError;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::error;

pub mod external;
pub mod live_view;
pub mod types;

/// Best-effort delivery of detection events to humans and dashboards.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn dispatch(&self, event: &DetectionEvent) -> Result<(), AppError>;
}

/// Hands every event to all inner notifiers concurrently.
///
/// A failing notifier does not stop the others; every failure is logged and the first one is
/// returned.
pub struct FanoutNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    fn name(&self) -> &'static str {
        "fanout"
    }

    async fn dispatch(&self, event: &DetectionEvent) -> Result<(), AppError> {
        let results = join_all(
            self.notifiers
                .iter()
                .map(|notifier| async move { (notifier.name(), notifier.dispatch(event).await) }),
        )
        .await;

        let mut first_failure = None;
        for (name, result) in results {
            if let Err(err) = result {
                error!(
                    tag = "[Notification]",
                    notifier = name,
                    event = event.label(),
                    device_id = %event.device_id(),
                    "Notifier failed : {}",
                    err.message()
                );
                first_failure.get_or_insert(err);
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
