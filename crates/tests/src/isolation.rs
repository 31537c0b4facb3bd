/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

//! Interleaving samples of different devices across concurrent workers must give the same
//! outcome as replaying each device on its own.

use crate::support::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;
use telemetry_analysis::{
    common::types::*,
    dispatcher::spawn_dispatcher,
    environment::DetectionSettings,
    storage::memory::{InMemoryEventStore, InMemoryRouteLookup, RouteAssignment},
};

/// Event fields that do not depend on generated ids.
#[derive(Debug, PartialEq)]
struct IdleOutcome {
    position: Point,
    start_time: TimeStamp,
    end_time: TimeStamp,
    duration: Seconds,
    resolved: bool,
}

#[derive(Debug, PartialEq)]
struct DeviceOutcome {
    idle: Vec<IdleOutcome>,
    deviations: Vec<(TimeStamp, Meters, i64)>,
    window: Vec<IdleSample>,
    open_idle_start: Option<TimeStamp>,
}

fn route_lookup() -> InMemoryRouteLookup {
    let road = encode_route(&[Point::new(0.0, 0.0), Point::new(0.0, 0.02)]);
    InMemoryRouteLookup::new(
        ["mac-x", "mac-y"]
            .iter()
            .map(|mac| RouteAssignment {
                route_id: RouteId(format!("route-{mac}")),
                driver_id: DriverId(format!("driver-{mac}")),
                device_id: device(mac),
                truck_id: None,
                polyline: road.clone(),
                status: RouteStatus::Active,
            })
            .collect(),
    )
}

/// Drives along the road, parks, wanders off route, parks again and leaves.
fn journey(mac: &str, rng: &mut StdRng) -> Vec<TelemetrySample> {
    let mut samples = Vec::new();
    let mut clock = 0;
    let mut push = |position: Point, samples: &mut Vec<TelemetrySample>| {
        clock += 30;
        samples.push(sample(mac, position, clock));
    };

    for i in 0..10 {
        push(Point::new(0.0, i as f64 * 0.0005), &mut samples);
    }
    let parking = Point::new(0.0, 0.005);
    for _ in 0..rng.gen_range(12..30) {
        push(north_of(parking, rng.gen_range(0.0..5.0)), &mut samples);
    }
    for i in 0..rng.gen_range(3..8) {
        push(north_of(Point::new(0.0, 0.006), 60.0 + i as f64 * 20.0), &mut samples);
    }
    let second_stop = north_of(Point::new(0.0, 0.008), 200.0);
    for _ in 0..rng.gen_range(5..20) {
        push(north_of(second_stop, rng.gen_range(0.0..3.0)), &mut samples);
    }
    push(Point::new(0.0, 0.012), &mut samples);
    samples
}

async fn outcome(
    store: &InMemoryEventStore,
    detectors: &Detectors,
    mac: &str,
) -> DeviceOutcome {
    let mac = device(mac);
    let snapshot = detectors.idle.snapshot(&mac).await.unwrap_or_default();
    DeviceOutcome {
        idle: store
            .idle_events_for(&mac)
            .await
            .into_iter()
            .map(|event| IdleOutcome {
                position: event.position,
                start_time: event.start_time,
                end_time: event.end_time,
                duration: event.duration,
                resolved: event.resolved,
            })
            .collect(),
        deviations: store
            .deviations_for(&mac)
            .await
            .into_iter()
            .map(|event| (event.timestamp, event.distance, event.segment_index))
            .collect(),
        window: snapshot.window.samples().to_vec(),
        open_idle_start: snapshot.open_event.map(|event| event.start_time),
    }
}

async fn replay_sequentially(
    streams: &[Vec<TelemetrySample>],
) -> (Arc<InMemoryEventStore>, Detectors) {
    let store = Arc::new(InMemoryEventStore::default());
    let detectors = detectors(
        DetectionSettings::default(),
        Arc::new(route_lookup()),
        store.clone(),
        Arc::new(RecordingNotifier::default()),
    );
    for stream in streams {
        for sample in stream {
            detectors.registry.dispatch(sample).await;
        }
    }
    (store, detectors)
}

async fn replay_interleaved(
    streams: &[Vec<TelemetrySample>],
    rng: &mut StdRng,
) -> (Arc<InMemoryEventStore>, Detectors) {
    let store = Arc::new(InMemoryEventStore::default());
    let detectors = detectors(
        DetectionSettings::default(),
        Arc::new(route_lookup()),
        store.clone(),
        Arc::new(RecordingNotifier::default()),
    );
    let dispatcher = spawn_dispatcher(detectors.registry.clone(), 4, 2);

    let mut cursors = vec![0; streams.len()];
    loop {
        let pending: Vec<usize> = (0..streams.len())
            .filter(|&stream| cursors[stream] < streams[stream].len())
            .collect();
        if pending.is_empty() {
            break;
        }
        let stream = pending[rng.gen_range(0..pending.len())];
        dispatcher
            .send(streams[stream][cursors[stream]].clone())
            .await
            .unwrap();
        cursors[stream] += 1;
    }
    dispatcher.shutdown().await.unwrap();

    (store, detectors)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interleaved_devices_match_sequential_replay() {
    for seed in [7_u64, 42, 1337, 2024, 9001] {
        let mut rng = StdRng::seed_from_u64(seed);
        let streams = vec![journey("mac-x", &mut rng), journey("mac-y", &mut rng)];

        let (sequential_store, sequential) = replay_sequentially(&streams).await;
        let (interleaved_store, interleaved) = replay_interleaved(&streams, &mut rng).await;

        for mac in ["mac-x", "mac-y"] {
            let expected = outcome(&sequential_store, &sequential, mac).await;
            let actual = outcome(&interleaved_store, &interleaved, mac).await;
            assert!(!expected.idle.is_empty(), "seed {seed}: journey should idle");
            assert!(
                !expected.deviations.is_empty(),
                "seed {seed}: journey should deviate"
            );
            assert_eq!(expected, actual, "seed {seed}, device {mac}");
        }
        assert_eq!(interleaved.idle.tracked_devices().await, 2);
    }
}
