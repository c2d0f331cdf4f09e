//! Plugin boundary.
//!
//! Translates host `execute(action, args, callback)` calls into daemon
//! messages and coordinator replies back into host results. Nothing here
//! holds request state.
//!
//! # Actions
//!
//! | action        | args                                          |
//! |---------------|-----------------------------------------------|
//! | `getLocation` | `[highAccuracy, maxAge, timeout, key]`        |
//! | `addWatch`    | `[key, highAccuracy, maxAge]`                 |
//! | `clearWatch`  | `[key]`                                       |

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::daemon::HostHandle;
use crate::error::{BridgeError, LocationError};
use crate::reply::{Reply, ReplyChannel, ReplyPayload};

/// A parsed host command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginCommand {
    GetLocation {
        high_accuracy: bool,
        max_age_ms: i64,
        timeout_ms: i64,
        key: String,
    },
    AddWatch {
        key: String,
        high_accuracy: bool,
        max_age_ms: i64,
    },
    ClearWatch {
        key: String,
    },
}

impl PluginCommand {
    /// Parse an action and its positional JSON arguments.
    ///
    /// Returns [`BridgeError::UnknownAction`] for actions this plugin does not
    /// handle. For `getLocation` a missing timeout means none.
    pub fn parse(action: &str, args: &Value) -> Result<Self, BridgeError> {
        let args = Args::new(action, args)?;

        match action {
            "getLocation" => Ok(PluginCommand::GetLocation {
                high_accuracy: args.bool(0)?,
                max_age_ms: args.int(1)?,
                timeout_ms: args.int_or(2, 0)?,
                key: args.string(3)?,
            }),
            "addWatch" => Ok(PluginCommand::AddWatch {
                key: args.string(0)?,
                high_accuracy: args.bool(1)?,
                max_age_ms: args.int_or(2, 0)?,
            }),
            "clearWatch" => Ok(PluginCommand::ClearWatch {
                key: args.string(0)?,
            }),
            other => Err(BridgeError::UnknownAction(other.to_string())),
        }
    }
}

/// Positional argument reader with action-aware errors.
struct Args<'a> {
    action: &'a str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    fn new(action: &'a str, args: &'a Value) -> Result<Self, BridgeError> {
        let values = args.as_array().ok_or_else(|| BridgeError::InvalidArguments {
            action: action.to_string(),
            reason: "expected an argument array".to_string(),
        })?;
        Ok(Self {
            action,
            values: values.as_slice(),
        })
    }

    fn invalid(&self, index: usize, expected: &str) -> BridgeError {
        BridgeError::InvalidArguments {
            action: self.action.to_string(),
            reason: format!("argument {} must be {}", index, expected),
        }
    }

    fn bool(&self, index: usize) -> Result<bool, BridgeError> {
        self.values
            .get(index)
            .and_then(Value::as_bool)
            .ok_or_else(|| self.invalid(index, "a boolean"))
    }

    fn int(&self, index: usize) -> Result<i64, BridgeError> {
        self.values
            .get(index)
            .and_then(Value::as_i64)
            .ok_or_else(|| self.invalid(index, "an integer"))
    }

    fn int_or(&self, index: usize, default: i64) -> Result<i64, BridgeError> {
        match self.values.get(index) {
            None | Some(Value::Null) => Ok(default),
            Some(_) => self.int(index),
        }
    }

    fn string(&self, index: usize) -> Result<String, BridgeError> {
        self.values
            .get(index)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| self.invalid(index, "a string"))
    }
}

/// Host result status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResultStatus {
    Ok,
    Error,
}

/// What the host callback receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginResult {
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    pub keep_callback: bool,
}

impl PluginResult {
    /// Render a coordinator reply.
    ///
    /// A payload that cannot be rendered becomes a SERIALIZATION_ERROR result.
    pub fn from_reply(reply: &Reply) -> Self {
        let rendered = match &reply.payload {
            ReplyPayload::Location(record) => {
                serde_json::to_value(record).map(|v| (ResultStatus::Ok, Some(v)))
            }
            ReplyPayload::Empty => Ok((ResultStatus::Ok, None)),
            ReplyPayload::Error(condition) => {
                serde_json::to_value(condition).map(|v| (ResultStatus::Error, Some(v)))
            }
        };

        match rendered {
            Ok((status, message)) => Self {
                status,
                message,
                keep_callback: reply.keep_listening,
            },
            Err(e) => {
                warn!(error = %e, "Failed to render reply");
                let condition = LocationError::SerializationError.condition();
                Self {
                    status: ResultStatus::Error,
                    message: Some(serde_json::json!({
                        "code": condition.code(),
                        "message": condition.message(),
                    })),
                    keep_callback: reply.keep_listening,
                }
            }
        }
    }

    /// Wrap a host callback as a reply channel.
    pub fn channel<F>(callback: F) -> ReplyChannel
    where
        F: Fn(PluginResult) + Send + 'static,
    {
        ReplyChannel::new(move |reply| callback(PluginResult::from_reply(&reply)))
    }

    /// The JSON object handed to the host. `message` is omitted when empty.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// Host-facing plugin.
#[derive(Debug, Clone)]
pub struct GeolocationPlugin {
    handle: HostHandle,
}

impl GeolocationPlugin {
    pub fn new(handle: HostHandle) -> Self {
        Self { handle }
    }

    /// Execute a host action.
    ///
    /// Returns `Ok(false)` for actions this plugin does not handle, so the
    /// host can try elsewhere.
    pub async fn execute(
        &self,
        action: &str,
        args: &Value,
        callback: ReplyChannel,
    ) -> Result<bool, BridgeError> {
        let command = match PluginCommand::parse(action, args) {
            Ok(command) => command,
            Err(BridgeError::UnknownAction(action)) => {
                debug!(action = %action, "Unhandled action");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        self.dispatch(command, callback).await?;
        Ok(true)
    }

    /// Forward a parsed command to the daemon.
    pub async fn dispatch(
        &self,
        command: PluginCommand,
        callback: ReplyChannel,
    ) -> Result<(), BridgeError> {
        match command {
            PluginCommand::GetLocation {
                high_accuracy,
                max_age_ms,
                timeout_ms,
                key,
            } => {
                self.handle
                    .get_location(high_accuracy, max_age_ms, timeout_ms, key, callback)
                    .await
            }
            PluginCommand::AddWatch {
                key,
                high_accuracy,
                max_age_ms,
            } => {
                self.handle
                    .add_watch(key, high_accuracy, max_age_ms, callback)
                    .await
            }
            PluginCommand::ClearWatch { key } => self.handle.clear_watch(key, callback).await,
        }
    }

    /// Host lifecycle: app moved to the background.
    pub async fn on_pause(&self) -> Result<(), BridgeError> {
        self.handle.suspend().await
    }

    /// Host lifecycle: app returned to the foreground.
    pub async fn on_resume(&self) -> Result<(), BridgeError> {
        self.handle.resume().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode, LocationSample};
    use serde_json::json;

    #[test]
    fn test_parse_get_location() {
        let command = PluginCommand::parse("getLocation", &json!([true, 3000, 10000, "k1"])).unwrap();
        assert_eq!(
            command,
            PluginCommand::GetLocation {
                high_accuracy: true,
                max_age_ms: 3000,
                timeout_ms: 10000,
                key: "k1".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_get_location_null_timeout() {
        let command = PluginCommand::parse("getLocation", &json!([false, 0, null, "k1"])).unwrap();
        assert!(matches!(command, PluginCommand::GetLocation { timeout_ms: 0, .. }));
    }

    #[test]
    fn test_parse_add_and_clear_watch() {
        assert_eq!(
            PluginCommand::parse("addWatch", &json!(["w1", false, 5000])).unwrap(),
            PluginCommand::AddWatch {
                key: "w1".to_string(),
                high_accuracy: false,
                max_age_ms: 5000,
            }
        );
        assert_eq!(
            PluginCommand::parse("clearWatch", &json!(["w1"])).unwrap(),
            PluginCommand::ClearWatch {
                key: "w1".to_string()
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_arguments() {
        let err = PluginCommand::parse("addWatch", &json!([42, false])).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArguments { .. }));

        let err = PluginCommand::parse("clearWatch", &json!({"key": "w1"})).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArguments { .. }));
    }

    #[test]
    fn test_parse_unknown_action() {
        let err = PluginCommand::parse("watchHeading", &json!([])).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownAction(a) if a == "watchHeading"));
    }

    #[test]
    fn test_result_from_location_reply() {
        let sample = LocationSample {
            longitude: 2.35,
            latitude: 48.85,
            altitude: 35.0,
            accuracy: 12.0,
            heading: 0.0,
            speed: 0.0,
            timestamp: 42,
        };
        let result = PluginResult::from_reply(&Reply::location(encode(&sample), true));

        assert_eq!(result.status, ResultStatus::Ok);
        assert!(result.keep_callback);
        let message = result.message.unwrap();
        assert_eq!(message["latitude"], 48.85);
        assert_eq!(message["timestamp"], 42);
    }

    #[test]
    fn test_result_from_error_and_empty_replies() {
        let result = PluginResult::from_reply(&Reply::error(LocationError::WatchIdNotFound, false));
        assert_eq!(
            result.to_json().unwrap(),
            json!({
                "status": "ERROR",
                "message": { "code": 104, "message": "Watch id not found" },
                "keepCallback": false,
            })
        );

        let result = PluginResult::from_reply(&Reply::empty());
        assert_eq!(result.status, ResultStatus::Ok);
        assert!(result.message.is_none());
        assert_eq!(
            result.to_json().unwrap(),
            json!({ "status": "OK", "keepCallback": false })
        );
    }

    #[test]
    fn test_channel_renders_replies() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let channel = PluginResult::channel(move |result| {
            let _ = tx.send(result);
        });

        channel.send(Reply::error(LocationError::LocationNull, true));

        let result = rx.try_recv().unwrap();
        assert_eq!(result.status, ResultStatus::Error);
        assert!(result.keep_callback);
    }
}
