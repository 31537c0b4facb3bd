/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use crate::tools::error::AppError;
use serde::{Deserialize, Serialize};
use tracing::subscriber::set_global_default;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, Registry};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    TRACE,
    DEBUG,
    INFO,
    WARN,
    ERROR,
    OFF,
}

impl From<LogLevel> for LevelFilter {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::TRACE => LevelFilter::TRACE,
            LogLevel::DEBUG => LevelFilter::DEBUG,
            LogLevel::INFO => LevelFilter::INFO,
            LogLevel::WARN => LevelFilter::WARN,
            LogLevel::ERROR => LevelFilter::ERROR,
            LogLevel::OFF => LevelFilter::OFF,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub struct LoggerConfig {
    pub level: LogLevel,
    pub log_to_file: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::INFO,
            log_to_file: false,
        }
    }
}

/// Installs bunyan formatted logging on stdout, plus a daily rolling file under `logs/` when
/// `log_to_file` is set. Keep the returned guard alive, dropping it flushes and stops the writer.
///
/// Fails if a `log` bridge or a global subscriber is already installed.
pub fn setup_tracing(logger_cfg: LoggerConfig) -> Result<WorkerGuard, AppError> {
    LogTracer::init().map_err(|err| AppError::InternalError(err.to_string()))?;

    let app_name = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"));
    let (console_writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let file_layer = logger_cfg.log_to_file.then(|| {
        BunyanFormattingLayer::new(
            app_name.to_string(),
            tracing_appender::rolling::daily("logs", format!("{app_name}.log")),
        )
    });

    let subscriber = Registry::default()
        .with(LevelFilter::from(logger_cfg.level))
        .with(JsonStorageLayer)
        .with(file_layer)
        .with(BunyanFormattingLayer::new(app_name.to_string(), console_writer));

    set_global_default(subscriber).map_err(|err| AppError::InternalError(err.to_string()))?;

    Ok(guard)
}
