/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use std::env::var;
use telemetry_analysis::{
    common::types::TelemetrySample,
    dispatcher::spawn_dispatcher,
    environment::{read_dhall_config, AppState},
    tools::{logger::setup_tracing, prometheus::gather_metrics},
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    signal::unix::{signal, SignalKind},
    sync::broadcast::error::RecvError,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let dhall_config_path = var("DHALL_CONFIG")
        .unwrap_or_else(|_| "./dhall-configs/dev/telemetry_analysis.dhall".to_string());
    let app_config = read_dhall_config(&dhall_config_path).unwrap_or_else(|err| {
        println!("Dhall Config Reading Error : {}", err.message());
        std::process::exit(1);
    });

    let _guard = setup_tracing(app_config.logger_cfg).unwrap_or_else(|err| {
        println!("Logger Setup Error : {}", err.message());
        std::process::exit(1);
    });

    let app_state = AppState::new(app_config).await.unwrap_or_else(|err| {
        error!(tag = "[App State]", code = %err.code(), "{}", err.message());
        std::process::exit(1);
    });

    let mut live_view = app_state.live_view.subscribe();
    tokio::spawn(async move {
        loop {
            match live_view.recv().await {
                Ok(message) => info!(tag = "[Live View Message]", message = %message),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(tag = "[Live View Message]", "Skipped {} messages", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let dispatcher = spawn_dispatcher(
        app_state.registry.clone(),
        app_state.dispatcher_cfg.workers,
        app_state.dispatcher_cfg.queue_size,
    );

    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(err), _) | (_, Err(err)) => {
                error!(tag = "[Signal Handler]", error = %err);
                std::process::exit(1);
            }
        };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<TelemetrySample>(&line) {
                            Ok(sample) => {
                                if let Err(err) = dispatcher.send(sample).await {
                                    error!(tag = "[Dispatcher]", "{}", err.message());
                                    break;
                                }
                            }
                            Err(err) => {
                                warn!(tag = "[Invalid Telemetry]", error = %err, line = %line);
                            }
                        }
                    }
                    Ok(None) => {
                        info!(tag = "[Telemetry Input Closed]");
                        break;
                    }
                    Err(err) => {
                        error!(tag = "[Telemetry Input]", error = %err);
                        break;
                    }
                }
            },
            _ = sigterm.recv() => {
                info!(tag = "[Graceful Shutting Down]", signal = "SIGTERM");
                break;
            },
            _ = sigint.recv() => {
                info!(tag = "[Graceful Shutting Down]", signal = "SIGINT");
                break;
            },
        }
    }

    if let Err(err) = dispatcher.shutdown().await {
        error!(tag = "[Graceful Shutting Down]", "{}", err.message());
    }

    let idle_events = app_state.event_store.idle_event_count().await;
    let deviations = app_state.event_store.deviation_count().await;
    info!(
        tag = "[Shutdown Summary]",
        idle_events = idle_events,
        deviations = deviations
    );
    info!(tag = "[Metrics]", "{}", gather_metrics());
}
