/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use serde::Serialize;

#[macros::add_error]
#[derive(PartialEq)]
pub enum AppError {
    InternalError(String),
    InvalidRequest(String),
    InvalidConfiguration(String),
    MalformedPath(String),
    EmptyPath,
    RouteNotFound(String),
    PersistenceFailed(String),
    NotificationFailed(String),
    ExternalAPICallError(String),
    SerializationError(String),
    DeserializationError(String),
}

impl AppError {
    pub fn message(&self) -> String {
        match self {
            AppError::InternalError(err) => err.to_string(),
            AppError::InvalidRequest(err) => err.to_string(),
            AppError::InvalidConfiguration(err) => {
                format!("Invalid Configuration : {err}")
            }
            AppError::MalformedPath(reason) => {
                format!("Malformed Encoded Path : {reason}")
            }
            AppError::EmptyPath => "Encoded path is empty".to_string(),
            AppError::RouteNotFound(device_id) => {
                format!("No active route found for device : {device_id}")
            }
            AppError::PersistenceFailed(reason) => {
                format!("Event Persistence Failed : {reason}")
            }
            AppError::NotificationFailed(reason) => {
                format!("Event Notification Failed : {reason}")
            }
            AppError::ExternalAPICallError(err) => err.to_string(),
            AppError::SerializationError(err) => err.to_string(),
            AppError::DeserializationError(err) => err.to_string(),
        }
    }

    pub fn code(&self) -> String {
        match self {
            AppError::InternalError(_) => "INTERNAL_ERROR",
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            AppError::MalformedPath(_) => "MALFORMED_PATH",
            AppError::EmptyPath => "EMPTY_PATH",
            AppError::RouteNotFound(_) => "ROUTE_NOT_FOUND",
            AppError::PersistenceFailed(_) => "PERSISTENCE_FAILED",
            AppError::NotificationFailed(_) => "NOTIFICATION_FAILED",
            AppError::ExternalAPICallError(_) => "EXTERNAL_API_CALL_ERROR",
            AppError::SerializationError(_) => "SERIALIZATION_ERROR",
            AppError::DeserializationError(_) => "DESERIALIZATION_ERROR",
        }
        .to_string()
    }
}
