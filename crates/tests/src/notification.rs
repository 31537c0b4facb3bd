/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::support::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use telemetry_analysis::{
    common::types::*,
    environment::{AppConfig, AppState, DetectionSettings, DispatcherConfig},
    outbound::{external::PushNotifier, FanoutNotifier, Notifier},
    tools::{error::AppError, logger::LoggerConfig},
};

fn idle_started() -> DetectionEvent {
    DetectionEvent::IdleStarted(IdleEvent {
        id: EventId::generate(),
        device_id: device("mac-1"),
        truck_id: None,
        position: Point::new(-6.2, 106.8),
        start_time: at(0),
        end_time: at(720),
        duration: Seconds(720),
        resolved: false,
    })
}

#[tokio::test]
async fn fanout_reaches_every_notifier_and_reports_failure() {
    let recording = Arc::new(RecordingNotifier::default());
    let failing = Arc::new(FailingNotifier::default());
    let fanout = FanoutNotifier::new(vec![failing.clone(), recording.clone()]);

    let result = fanout.dispatch(&idle_started()).await;

    assert!(matches!(result, Err(AppError::NotificationFailed(_))));
    assert_eq!(failing.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(recording.labels().await, vec!["idle_started"]);
}

#[tokio::test]
async fn app_state_streams_events_to_live_view() {
    let app_state = AppState::new(AppConfig {
        logger_cfg: LoggerConfig::default(),
        detection_cfg: DetectionSettings::default(),
        dispatcher_cfg: DispatcherConfig::default(),
        routes_path: None,
        notification_service_url: None,
        live_view_buffer: 64,
    })
    .await
    .unwrap();
    let mut live_view = app_state.live_view.subscribe();

    let parked = Point::new(-6.2088, 106.8456);
    let mut events = Vec::new();
    for i in 0..12 {
        events.extend(
            app_state
                .registry
                .dispatch(&sample("mac-live", parked, i * 30))
                .await,
        );
    }
    events.extend(
        app_state
            .registry
            .dispatch(&sample("mac-live", north_of(parked, 25.0), 400))
            .await,
    );

    let labels: Vec<&str> = events.iter().map(|event| event.label()).collect();
    assert_eq!(labels, vec!["idle_started", "idle_resolved"]);
    assert_eq!(
        app_state
            .event_store
            .idle_events_for(&device("mac-live"))
            .await
            .len(),
        1
    );

    let started: serde_json::Value =
        serde_json::from_str(&live_view.recv().await.unwrap()).unwrap();
    assert_eq!(started["type"], "idle_detection");
    assert_eq!(started["mac_id"], "mac-live");
    assert_eq!(started["duration"], 330);

    let resolved: serde_json::Value =
        serde_json::from_str(&live_view.recv().await.unwrap()).unwrap();
    assert_eq!(resolved["type"], "idle_resolved");
    assert_eq!(resolved["duration"], 400);
}

#[tokio::test]
async fn invalid_push_url_is_rejected() {
    let result = AppState::new(AppConfig {
        logger_cfg: LoggerConfig::default(),
        detection_cfg: DetectionSettings::default(),
        dispatcher_cfg: DispatcherConfig::default(),
        routes_path: None,
        notification_service_url: Some("not a url".to_string()),
        live_view_buffer: 8,
    })
    .await;

    assert!(matches!(result, Err(AppError::InvalidConfiguration(_))));
}

#[test]
fn telemetry_accepts_mac_id_field() {
    let sample: TelemetrySample = serde_json::from_str(
        r#"{"mac_id": "A4:CF:12:9B:00:01", "latitude": -6.2, "longitude": 106.8, "timestamp": "2024-03-01T08:00:00Z"}"#,
    )
    .unwrap();
    assert_eq!(sample.device_id, device("A4:CF:12:9B:00:01"));
    assert_eq!(sample.point(), Point::new(-6.2, 106.8));
}

#[tokio::test]
async fn unresponsive_push_service_times_out() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    // Accepts connections and never answers.
    let server = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let base = reqwest::Url::parse(&format!("http://{address}")).unwrap();
    let notifier = PushNotifier::new(&base, Duration::from_millis(200)).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), notifier.dispatch(&idle_started()))
        .await
        .expect("push request must give up on its own");

    assert!(matches!(result, Err(AppError::NotificationFailed(_))));
    server.abort();
}
