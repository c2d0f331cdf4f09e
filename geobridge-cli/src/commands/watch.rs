//! Watch command - stream location fixes.

use serde_json::json;
use tracing::info;

use geobridge::BridgeConfig;

use super::common::{print_result, result_channel, Session};
use crate::error::CliError;

const WATCH_KEY: &str = "cli-watch";

/// Arguments for the watch command.
pub struct WatchArgs {
    pub high_accuracy: bool,
    pub interval_ms: i64,
    /// Stop after this many results; `None` runs until Ctrl-C.
    pub count: Option<usize>,
}

/// Run the watch command.
pub async fn run(config: BridgeConfig, args: WatchArgs) -> Result<(), CliError> {
    let session = Session::start(config)?;
    let (callback, mut results) = result_channel();

    session
        .plugin
        .execute(
            "addWatch",
            &json!([WATCH_KEY, args.high_accuracy, args.interval_ms]),
            callback,
        )
        .await?;

    let mut received = 0usize;
    let mut active = true;
    loop {
        tokio::select! {
            _ = session.shutdown.cancelled() => {
                info!(received, "Watch interrupted");
                break;
            }
            next = results.recv() => {
                let Some(result) = next else {
                    active = false;
                    break;
                };
                print_result(&result);
                received += 1;

                if !result.keep_callback {
                    active = false;
                    break;
                }
                if args.count.is_some_and(|n| received >= n) {
                    break;
                }
            }
        }
    }

    if active && !session.shutdown.is_cancelled() {
        let (callback, mut cleared) = result_channel();
        session
            .plugin
            .execute("clearWatch", &json!([WATCH_KEY]), callback)
            .await?;
        if let Some(result) = cleared.recv().await {
            print_result(&result);
        }
    }

    session.finish().await;
    Ok(())
}
