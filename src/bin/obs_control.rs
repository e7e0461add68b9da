//! OBS配信制御のワンショットCLI
//!
//! 設定のOBSエンドポイントに接続し、シーン選択 → 配信開始 → 配信停止を
//! 順に実行して切断します。接続できない場合は終了コード1で終わります。

use std::path::PathBuf;

use BigKahuna::application::streaming::{is_connection_failure, run_control_sequence};
use BigKahuna::domain::config::AppConfig;
use BigKahuna::infrastructure::obs_control::ObsWebSocketAdapter;
use BigKahuna::logging::init_logging;

fn main() {
    let log_dir = PathBuf::from("logs");
    let _guard = init_logging("info", false, Some(log_dir));

    tracing::info!("OBS control starting...");

    let config = match AppConfig::from_file("config.toml") {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Failed to load config.toml: {:?}, using defaults", e);
            AppConfig::default()
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let mut adapter = ObsWebSocketAdapter::from_config(&config.control);

    match run_control_sequence(&mut adapter, &config.control.scene_name) {
        Ok(outcome) => {
            tracing::info!(
                "Control sequence completed: {:?} (disconnected: {})",
                outcome.executed,
                outcome.disconnected
            );
        }
        Err(e) => {
            tracing::error!("Control sequence failed: {}", e);
            eprintln!("Control sequence failed: {}", e);
            if is_connection_failure(&e) {
                std::process::exit(1);
            }
            std::process::exit(2);
        }
    }
}
