/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use super::{types::LiveViewMessage, Notifier};
use crate::common::types::DetectionEvent;
use crate::tools::error::AppError;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

/// Publishes every detection event as JSON to live dashboard subscribers.
#[derive(Clone)]
pub struct LiveViewNotifier {
    sender: broadcast::Sender<String>,
}

impl LiveViewNotifier {
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(std::cmp::max(1, buffer));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl Notifier for LiveViewNotifier {
    fn name(&self) -> &'static str {
        "live_view"
    }

    async fn dispatch(&self, event: &DetectionEvent) -> Result<(), AppError> {
        let message = serde_json::to_string(&LiveViewMessage::from(event))
            .map_err(|err| AppError::SerializationError(err.to_string()))?;

        match self.sender.send(message) {
            Ok(clients) => {
                debug!(
                    tag = "[Live View]",
                    "Broadcasted {} to {} clients",
                    event.label(),
                    clients
                );
            }
            Err(_) => {
                debug!(
                    tag = "[Live View]",
                    "No live view clients connected, {} not broadcasted",
                    event.label()
                );
            }
        }
        Ok(())
    }
}
