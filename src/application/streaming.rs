//! 配信制御モジュール
//!
//! リモート制御エンドポイントに対するワンショットのコマンド列:
//! 接続 → シーン選択 → 配信開始 → 配信停止 → 切断。
//! 接続失敗なら制御コマンドは1つも送らない。切断はどの経路でも必ず1回試行する。

use crate::domain::{DomainError, DomainResult, StreamControlPort};

/// 制御シーケンスの実行結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlOutcome {
    /// 送信に成功したコマンド名（実行順）
    pub executed: Vec<&'static str>,
    /// 切断の試行が成功したか
    pub disconnected: bool,
}

/// 制御シーケンスを1回実行する
///
/// # Returns
/// - `Ok(ControlOutcome)`: 全コマンド成功
/// - `Err(DomainError::ControlConnection)`: 接続に失敗（コマンドは未送信）
/// - `Err(DomainError::ControlCommand)`: 途中のコマンドが失敗（以降は送信しない）
///
/// どのエラー経路でも切断は1回だけ試行済み。切断自体のエラーはログに残すだけで
/// 元のエラーを上書きしない。
pub fn run_control_sequence<S: StreamControlPort>(
    control: &mut S,
    scene_name: &str,
) -> DomainResult<ControlOutcome> {
    tracing::info!("Connecting to stream control endpoint...");
    if let Err(e) = control.connect() {
        tracing::error!("Control connection failed: {}", e);
        attempt_disconnect(control);
        return Err(e);
    }

    let result = send_commands(control, scene_name);
    let disconnected = attempt_disconnect(control);

    result.map(|executed| ControlOutcome {
        executed,
        disconnected,
    })
}

/// 接続確立後のコマンド列を順に送る
///
/// 失敗したコマンドで打ち切り、後続は送らない。
fn send_commands<S: StreamControlPort>(
    control: &mut S,
    scene_name: &str,
) -> DomainResult<Vec<&'static str>> {
    let mut executed = Vec::new();

    tracing::info!("Selecting scene: {}", scene_name);
    control.select_scene(scene_name).map_err(|e| {
        tracing::error!("Scene selection failed: {}", e);
        e
    })?;
    executed.push("select_scene");

    tracing::info!("Starting stream");
    control.start_stream().map_err(|e| {
        tracing::error!("Stream start failed: {}", e);
        e
    })?;
    executed.push("start_stream");

    tracing::info!("Stopping stream");
    control.stop_stream().map_err(|e| {
        tracing::error!("Stream stop failed: {}", e);
        e
    })?;
    executed.push("stop_stream");

    Ok(executed)
}

/// 切断を1回試行する（エラーはログのみ）
fn attempt_disconnect<S: StreamControlPort>(control: &mut S) -> bool {
    match control.disconnect() {
        Ok(()) => {
            tracing::info!("Disconnected from stream control endpoint");
            true
        }
        Err(e) => {
            tracing::warn!("Disconnect error: {}", e);
            false
        }
    }
}

/// 接続失敗かどうかの判別（プロセス終了コードの決定用）
pub fn is_connection_failure(error: &DomainError) -> bool {
    matches!(error, DomainError::ControlConnection(_))
}
