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
use telemetry_analysis::{
    common::{detection::IdleTransition, types::*, utils::distance_between_in_meters},
    environment::DetectionSettings,
    storage::{memory::InMemoryEventStore, EventStore},
};

const DEPOT: (f64, f64) = (-6.2088, 106.8456);

fn depot() -> Point {
    Point::new(DEPOT.0, DEPOT.1)
}

/// Small jitter around the depot, always well within the idle radius.
fn parked(i: i64) -> Point {
    north_of(depot(), (i % 3) as f64 * 2.0)
}

#[tokio::test]
async fn twelve_close_samples_confirm_idle_and_twenty_meters_resolves_it() {
    let store = Arc::new(InMemoryEventStore::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let detectors = detectors(
        DetectionSettings::default(),
        Arc::new(StaticRouteLookup::default()),
        store.clone(),
        notifier.clone(),
    );
    let mac = device("mac-idle");

    for i in 0..11 {
        let transition = detectors.idle.on_position(&mac, parked(i), at(i * 30)).await;
        assert!(!matches!(transition, IdleTransition::Started(_)));
    }
    let IdleTransition::Started(started) =
        detectors.idle.on_position(&mac, parked(11), at(330)).await
    else {
        panic!("twelfth sample should confirm idle");
    };

    let stored = store.idle_events_for(&mac).await;
    assert_eq!(stored, vec![started.clone()]);
    assert!(!started.resolved);
    assert_eq!(started.start_time, at(0));
    assert_eq!(started.duration, Seconds(330));
    assert_eq!(started.position, depot());

    let IdleTransition::Resolved(resolved) = detectors
        .idle
        .on_position(&mac, north_of(depot(), 20.0), at(600))
        .await
    else {
        panic!("sample 20 m away should resolve idle");
    };

    assert_eq!(resolved.id, started.id);
    assert!(resolved.resolved);
    assert_eq!(resolved.end_time, at(600));
    assert_eq!(resolved.duration, Seconds(600));
    assert_eq!(store.idle_events_for(&mac).await, vec![resolved]);
    assert_eq!(store.find_unresolved_idle(&mac).await.unwrap(), None);
    assert_eq!(notifier.labels().await, vec!["idle_started", "idle_resolved"]);

    let snapshot = detectors.idle.snapshot(&mac).await.unwrap();
    assert!(snapshot.open_event.is_none());
    assert_eq!(snapshot.window.len(), 1);
    assert_eq!(snapshot.window.anchor(), Some(north_of(depot(), 20.0)));
}

#[tokio::test]
async fn continued_idling_extends_the_same_event() {
    let store = Arc::new(InMemoryEventStore::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let detectors = detectors(
        DetectionSettings::default(),
        Arc::new(StaticRouteLookup::default()),
        store.clone(),
        notifier.clone(),
    );
    let mac = device("mac-idle");

    let mut transitions = Vec::new();
    for i in 0..24 {
        transitions.push(detectors.idle.on_position(&mac, depot(), at(i * 60)).await);
    }

    let started = transitions
        .iter()
        .filter(|transition| matches!(transition, IdleTransition::Started(_)))
        .count();
    let extended: Vec<&IdleEvent> = transitions
        .iter()
        .filter_map(|transition| match transition {
            IdleTransition::Extended(event) => Some(event),
            _ => None,
        })
        .collect();
    assert_eq!(started, 1);
    assert_eq!(extended.len(), 1);

    let stored = store.idle_events_for(&mac).await;
    assert_eq!(stored.len(), 1);
    let event = &stored[0];
    assert_eq!(&event, &extended[0]);
    assert_eq!(event.start_time, at(0));
    assert!(event.end_time > at(11 * 60));
    assert_eq!(
        event.duration,
        seconds_between(event.start_time, event.end_time)
    );
    assert!(!event.resolved);
    assert!(notifier.labels().await.contains(&"idle_extended"));

    let snapshot = detectors.idle.snapshot(&mac).await.unwrap();
    assert!(snapshot.window.len() <= 12);
    assert_eq!(snapshot.open_event.as_ref(), Some(event));
}

#[tokio::test]
async fn open_idle_is_picked_up_from_the_store_after_restart() {
    let store = Arc::new(InMemoryEventStore::default());
    let mac = device("mac-restarted");
    let before_restart = IdleEvent {
        id: EventId::generate(),
        device_id: mac.clone(),
        truck_id: Some(TruckId("B 9021 KXT".to_string())),
        position: depot(),
        start_time: at(-900),
        end_time: at(-300),
        duration: Seconds(600),
        resolved: false,
    };
    store.persist_idle(&before_restart).await.unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let detectors = detectors(
        DetectionSettings::default(),
        Arc::new(StaticRouteLookup::default()),
        store.clone(),
        notifier.clone(),
    );

    let mut last = IdleTransition::Anchored;
    for i in 0..12 {
        last = detectors.idle.on_position(&mac, parked(i), at(i * 30)).await;
    }

    let IdleTransition::Extended(extended) = last else {
        panic!("hydrated idle should be extended");
    };
    assert_eq!(extended.id, before_restart.id);
    assert_eq!(extended.start_time, at(-900));
    assert_eq!(extended.end_time, at(330));
    assert_eq!(extended.duration, Seconds(1230));
    assert_eq!(store.idle_events_for(&mac).await.len(), 1);

    let IdleTransition::Resolved(resolved) = detectors
        .idle
        .on_position(&mac, north_of(depot(), 50.0), at(400))
        .await
    else {
        panic!("moving away should resolve the hydrated idle");
    };
    assert_eq!(resolved.id, before_restart.id);
    assert_eq!(notifier.labels().await, vec!["idle_extended", "idle_resolved"]);
}

#[tokio::test]
async fn storage_failures_do_not_stop_detection() {
    let store = Arc::new(FailingEventStore::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let detectors = detectors(
        DetectionSettings::default(),
        Arc::new(StaticRouteLookup::default()),
        store.clone(),
        notifier.clone(),
    );
    let mac = device("mac-offline-db");

    let mut last = IdleTransition::Anchored;
    for i in 0..12 {
        last = detectors.idle.on_position(&mac, depot(), at(i * 30)).await;
    }
    assert!(matches!(last, IdleTransition::Started(_)));
    assert!(detectors
        .idle
        .snapshot(&mac)
        .await
        .unwrap()
        .open_event
        .is_some());

    let resolved = detectors
        .idle
        .on_position(&mac, north_of(depot(), 30.0), at(500))
        .await;
    assert!(matches!(resolved, IdleTransition::Resolved(_)));

    // persist_idle and update_idle; the hydration read is not counted.
    assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
    assert_eq!(notifier.labels().await, vec!["idle_started", "idle_resolved"]);
}

#[tokio::test]
async fn notification_failures_do_not_affect_detection() {
    let store = Arc::new(InMemoryEventStore::default());
    let notifier = Arc::new(FailingNotifier::default());
    let detectors = detectors(
        DetectionSettings::default(),
        Arc::new(StaticRouteLookup::default()),
        store.clone(),
        notifier.clone(),
    );
    let mac = device("mac-no-push");

    for i in 0..12 {
        detectors.idle.on_position(&mac, depot(), at(i * 30)).await;
    }

    assert_eq!(notifier.attempts.load(Ordering::SeqCst), 1);
    assert!(store.find_unresolved_idle(&mac).await.unwrap().is_some());
}

#[tokio::test]
async fn idle_event_carries_truck_from_route_lookup() {
    let store = Arc::new(InMemoryEventStore::default());
    let detectors = detectors(
        DetectionSettings::default(),
        Arc::new(StaticRouteLookup {
            truck_id: Some(TruckId("B 7788 TRK".to_string())),
            ..Default::default()
        }),
        store.clone(),
        Arc::new(RecordingNotifier::default()),
    );
    let mac = device("mac-truck");

    for i in 0..12 {
        detectors.idle.on_position(&mac, depot(), at(i * 10)).await;
    }

    let stored = store.idle_events_for(&mac).await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].truck_id, Some(TruckId("B 7788 TRK".to_string())));
    assert_eq!(detectors.idle.tracked_devices().await, 1);
}

#[tokio::test]
async fn configured_count_and_radius_are_honoured() {
    let mut settings = DetectionSettings::default();
    settings.idle.idle_detection_count = 3;
    settings.idle.idle_radius_meters = 5.0;

    let detectors = detectors(
        settings,
        Arc::new(StaticRouteLookup::default()),
        Arc::new(InMemoryEventStore::default()),
        Arc::new(RecordingNotifier::default()),
    );
    let mac = device("mac-tight");

    assert_eq!(
        detectors.idle.on_position(&mac, depot(), at(0)).await,
        IdleTransition::Anchored
    );
    // 8 m is outside a 5 m radius.
    assert_eq!(
        detectors
            .idle
            .on_position(&mac, north_of(depot(), 8.0), at(10))
            .await,
        IdleTransition::Anchored
    );
    assert_eq!(
        detectors
            .idle
            .on_position(&mac, north_of(depot(), 9.0), at(20))
            .await,
        IdleTransition::Accumulating(2)
    );
    assert!(matches!(
        detectors
            .idle
            .on_position(&mac, north_of(depot(), 10.0), at(30))
            .await,
        IdleTransition::Started(_)
    ));
}

#[tokio::test]
async fn idle_radius_boundary_is_inclusive() {
    let at_radius = north_of(depot(), 15.0);
    let measured = distance_between_in_meters(&depot(), &at_radius);
    assert!((measured - 15.0).abs() < 1e-6);

    // Radius pinned to the measured distance so the sample sits exactly on it.
    let mut settings = DetectionSettings::default();
    settings.idle.idle_radius_meters = measured;
    let detectors = detectors(
        settings,
        Arc::new(StaticRouteLookup::default()),
        Arc::new(InMemoryEventStore::default()),
        Arc::new(RecordingNotifier::default()),
    );
    let on_edge = device("mac-edge");
    detectors.idle.on_position(&on_edge, depot(), at(0)).await;
    assert_eq!(
        detectors.idle.on_position(&on_edge, at_radius, at(30)).await,
        IdleTransition::Accumulating(2)
    );

    let beyond = device("mac-beyond");
    detectors.idle.on_position(&beyond, depot(), at(0)).await;
    assert_eq!(
        detectors
            .idle
            .on_position(&beyond, north_of(depot(), 15.01), at(30))
            .await,
        IdleTransition::Anchored
    );
}
