/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use crate::{
    common::{detection::DetectionRegistry, types::*, utils::device_shard},
    tools::error::AppError,
};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info};

/// Routes samples to a fixed set of workers, one device always landing on the same worker.
///
/// Samples of a device are therefore processed one at a time in arrival order, while different
/// devices proceed in parallel.
pub struct Dispatcher {
    senders: Vec<mpsc::Sender<TelemetrySample>>,
    workers: Vec<JoinHandle<()>>,
}

pub fn spawn_dispatcher(registry: Arc<DetectionRegistry>, workers: usize, buffer: usize) -> Dispatcher {
    let workers = std::cmp::max(1, workers);
    let buffer = std::cmp::max(1, buffer);

    let (senders, handles) = (0..workers)
        .map(|worker| {
            let (tx, rx) = mpsc::channel(buffer);
            let handle = tokio::spawn(run_worker(worker, rx, registry.clone()));
            (tx, handle)
        })
        .unzip();

    info!(
        tag = "[Dispatcher]",
        workers = workers,
        buffer = buffer,
        detectors = ?registry.detector_names(),
        "Dispatcher started"
    );

    Dispatcher {
        senders,
        workers: handles,
    }
}

async fn run_worker(
    worker: usize,
    mut rx: mpsc::Receiver<TelemetrySample>,
    registry: Arc<DetectionRegistry>,
) {
    let mut processed: u64 = 0;
    while let Some(sample) = rx.recv().await {
        let events = registry.dispatch(&sample).await;
        if !events.is_empty() {
            debug!(
                tag = "[Dispatcher]",
                worker = worker,
                device_id = %sample.device_id,
                events = ?events.iter().map(|event| event.label()).collect::<Vec<&str>>()
            );
        }
        processed += 1;
    }
    info!(
        tag = "[Dispatcher Worker Stopped]",
        worker = worker,
        processed = processed
    );
}

impl Dispatcher {
    /// Queues a sample on its device's worker, waiting while that worker's queue is full.
    pub async fn send(&self, sample: TelemetrySample) -> Result<(), AppError> {
        let worker = device_shard(&sample.device_id, self.senders.len());
        let sender = self
            .senders
            .get(worker)
            .ok_or_else(|| AppError::InternalError(format!("No dispatcher worker {worker}")))?;
        sender
            .send(sample)
            .await
            .map_err(|err| AppError::InternalError(format!("Dispatcher worker {worker} stopped : {err}")))
    }

    pub fn workers(&self) -> usize {
        self.senders.len()
    }

    /// Closes every queue and waits until the workers have processed what was already queued.
    pub async fn shutdown(self) -> Result<(), AppError> {
        drop(self.senders);
        for handle in self.workers {
            handle
                .await
                .map_err(|err| AppError::InternalError(format!("Dispatcher worker failed : {err}")))?;
        }
        Ok(())
    }
}
