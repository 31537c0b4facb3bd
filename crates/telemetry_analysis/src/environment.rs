/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::sync::Arc;

use crate::{
    common::{
        detection::{DetectionRegistry, IdleDetectionEngine, RouteDeviationDetector},
        geometry::PolylineDimensions,
        utils::EARTH_RADIUS_METERS,
    },
    outbound::{
        external::{PushNotifier, PUSH_REQUEST_TIMEOUT},
        live_view::LiveViewNotifier,
        FanoutNotifier, Notifier,
    },
    storage::{
        memory::{InMemoryEventStore, InMemoryRouteLookup},
        EventStore, RouteLookup,
    },
    tools::{error::AppError, logger::LoggerConfig},
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub logger_cfg: LoggerConfig,
    pub detection_cfg: DetectionSettings,
    pub dispatcher_cfg: DispatcherConfig,
    pub routes_path: Option<String>,
    pub notification_service_url: Option<String>,
    pub live_view_buffer: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct RouteDeviationConfig {
    pub deviation_threshold_meters: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct IdleDetectionConfig {
    pub idle_radius_meters: f64,
    pub idle_detection_count: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct GeometryConfig {
    pub earth_radius_meters: f64,
    /// Decimal digits per encoded unit, 5 meaning 1e-5 degrees.
    pub polyline_precision: u32,
    pub polyline_dimensions: PolylineDimensions,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct DetectionSettings {
    pub route_deviation: RouteDeviationConfig,
    pub idle: IdleDetectionConfig,
    pub geometry: GeometryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub struct DispatcherConfig {
    pub workers: usize,
    pub queue_size: usize,
}

impl Default for RouteDeviationConfig {
    fn default() -> Self {
        Self {
            deviation_threshold_meters: 35.0,
        }
    }
}

impl Default for IdleDetectionConfig {
    fn default() -> Self {
        Self {
            idle_radius_meters: 15.0,
            idle_detection_count: 12,
        }
    }
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            earth_radius_meters: EARTH_RADIUS_METERS,
            polyline_precision: 5,
            polyline_dimensions: PolylineDimensions::LatLngElevation,
        }
    }
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            route_deviation: RouteDeviationConfig::default(),
            idle: IdleDetectionConfig::default(),
            geometry: GeometryConfig::default(),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_size: 1024,
        }
    }
}

impl DetectionSettings {
    pub fn validate(&self) -> Result<(), AppError> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(AppError::InvalidConfiguration(format!(
                    "{name} must be a positive number, got {value}"
                )))
            }
        };

        positive(
            "deviation_threshold_meters",
            self.route_deviation.deviation_threshold_meters,
        )?;
        positive("idle_radius_meters", self.idle.idle_radius_meters)?;
        positive("earth_radius_meters", self.geometry.earth_radius_meters)?;

        if self.idle.idle_detection_count < 2 {
            return Err(AppError::InvalidConfiguration(format!(
                "idle_detection_count must be at least 2, got {}",
                self.idle.idle_detection_count
            )));
        }
        // 10^precision has to stay exactly representable.
        if self.geometry.polyline_precision > 15 {
            return Err(AppError::InvalidConfiguration(format!(
                "polyline_precision must be at most 15, got {}",
                self.geometry.polyline_precision
            )));
        }

        Ok(())
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.workers == 0 || self.queue_size == 0 {
            return Err(AppError::InvalidConfiguration(
                "dispatcher workers and queue_size must be non zero".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn read_dhall_config(config_path: &str) -> Result<AppConfig, AppError> {
    let config = serde_dhall::from_file(config_path)
        .parse::<AppConfig>()
        .map_err(|err| AppError::InvalidConfiguration(format!("Error reading config: {err}")))?;
    config.detection_cfg.validate()?;
    config.dispatcher_cfg.validate()?;
    Ok(config)
}

pub struct AppState {
    pub registry: Arc<DetectionRegistry>,
    pub event_store: Arc<InMemoryEventStore>,
    pub live_view: LiveViewNotifier,
    pub dispatcher_cfg: DispatcherConfig,
}

impl AppState {
    pub async fn new(app_config: AppConfig) -> Result<AppState, AppError> {
        let route_lookup = match &app_config.routes_path {
            Some(routes_path) => InMemoryRouteLookup::from_file(routes_path).await?,
            None => InMemoryRouteLookup::default(),
        };
        let route_lookup: Arc<dyn RouteLookup> = Arc::new(route_lookup);

        let event_store = Arc::new(InMemoryEventStore::default());

        let live_view = LiveViewNotifier::new(app_config.live_view_buffer);
        let mut notifiers: Vec<Arc<dyn Notifier>> = vec![Arc::new(live_view.clone())];
        if let Some(url) = &app_config.notification_service_url {
            let url = Url::parse(url).map_err(|err| {
                AppError::InvalidConfiguration(format!(
                    "Failed to parse notification_service_url : {err}"
                ))
            })?;
            notifiers.push(Arc::new(PushNotifier::new(&url, PUSH_REQUEST_TIMEOUT)?));
        } else {
            info!(
                tag = "[Push Notifications]",
                "notification_service_url not set, push notifications disabled"
            );
        }
        let notifier: Arc<dyn Notifier> = Arc::new(FanoutNotifier::new(notifiers));

        let store: Arc<dyn EventStore> = event_store.clone();
        let settings = app_config.detection_cfg;

        let mut registry = DetectionRegistry::new();
        registry.register_detector(RouteDeviationDetector::new(
            settings,
            route_lookup.clone(),
            store.clone(),
            notifier.clone(),
        ));
        registry.register_detector(IdleDetectionEngine::new(
            settings,
            route_lookup,
            store,
            notifier,
        ));

        Ok(AppState {
            registry: Arc::new(registry),
            event_store,
            live_view,
            dispatcher_cfg: app_config.dispatcher_cfg,
        })
    }
}
