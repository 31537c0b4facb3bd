/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use super::{types::*, Notifier};
use crate::common::types::*;
use crate::tools::{callapi::call_api, error::AppError};
use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use std::time::Duration;

const PUSH_SEND_PATH: &str = "api/v1/push/send";
pub const PUSH_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const MANAGEMENT_ROLE: &str = "management";

/// Sends mobile push notifications through the notification service.
///
/// Only new deviations and newly confirmed idle episodes are pushed; extensions and resolutions
/// are live view only.
pub struct PushNotifier {
    client: Client,
    push_url: Url,
}

impl PushNotifier {
    /// Pushes run inline on a dispatcher worker, so every request is bounded by `request_timeout`.
    pub fn new(
        notification_service_url: &Url,
        request_timeout: Duration,
    ) -> Result<Self, AppError> {
        let push_url = Url::parse(&format!(
            "{}/{}",
            notification_service_url.as_str().trim_end_matches('/'),
            PUSH_SEND_PATH
        ))
        .map_err(|err| AppError::InvalidConfiguration(format!("Invalid push url : {err}")))?;

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| {
                AppError::InternalError(format!("Failed to build push client : {err}"))
            })?;

        Ok(Self { client, push_url })
    }

    pub fn push_url(&self) -> &Url {
        &self.push_url
    }
}

fn dashboard_url(DeviceId(mac_id): &DeviceId) -> String {
    format!("/management/dashboard?truck={mac_id}")
}

pub fn push_notification_req(event: &DetectionEvent) -> Option<PushNotificationReq> {
    match event {
        DetectionEvent::RouteDeviated(deviation) => Some(PushNotificationReq {
            title: "Route Deviation Alert".to_string(),
            message: format!(
                "Vehicle {} operated by driver {} is deviating from its planned route by {:.0} meters.",
                deviation.device_id.inner(),
                deviation.driver_id.inner(),
                deviation.distance.inner()
            ),
            url: dashboard_url(&deviation.device_id),
            target_roles: vec![MANAGEMENT_ROLE.to_string()],
            target_user_ids: vec![deviation.driver_id.to_owned()],
        }),
        DetectionEvent::IdleStarted(idle) => {
            let plate_number = idle
                .truck_id
                .as_ref()
                .map(|truck_id| truck_id.inner())
                .unwrap_or_else(|| idle.device_id.inner());
            Some(PushNotificationReq {
                title: "Vehicle Idle Alert".to_string(),
                message: format!(
                    "Vehicle {} has been idle for {} minutes.",
                    plate_number,
                    idle.duration.inner() / 60
                ),
                url: dashboard_url(&idle.device_id),
                target_roles: vec![MANAGEMENT_ROLE.to_string()],
                target_user_ids: Vec::new(),
            })
        }
        DetectionEvent::IdleExtended(_) | DetectionEvent::IdleResolved(_) => None,
    }
}

#[async_trait]
impl Notifier for PushNotifier {
    fn name(&self) -> &'static str {
        "push"
    }

    async fn dispatch(&self, event: &DetectionEvent) -> Result<(), AppError> {
        let Some(request) = push_notification_req(event) else {
            return Ok(());
        };

        call_api::<PushNotificationReq>(
            &self.client,
            Method::POST,
            &self.push_url,
            vec![("content-type", "application/json")],
            Some(request),
        )
        .await
        .map_err(|err| AppError::NotificationFailed(err.message()))
    }
}
