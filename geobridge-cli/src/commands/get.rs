//! Get command - request a single location fix.

use serde_json::json;
use tracing::info;

use geobridge::BridgeConfig;

use super::common::{print_result, result_channel, Session};
use crate::error::CliError;

/// Arguments for the get command.
pub struct GetArgs {
    pub high_accuracy: bool,
    pub max_age_ms: i64,
    pub timeout_ms: i64,
    pub key: String,
}

/// Run the get command.
pub async fn run(config: BridgeConfig, args: GetArgs) -> Result<(), CliError> {
    let session = Session::start(config)?;
    let (callback, mut results) = result_channel();

    session
        .plugin
        .execute(
            "getLocation",
            &json!([args.high_accuracy, args.max_age_ms, args.timeout_ms, args.key]),
            callback,
        )
        .await?;

    tokio::select! {
        _ = session.shutdown.cancelled() => {
            info!("Interrupted before a result arrived");
        }
        Some(result) = results.recv() => {
            print_result(&result);
        }
    }

    session.finish().await;
    Ok(())
}
