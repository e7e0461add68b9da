/// エラー型定義
///
/// Domain層の統一エラー型。thiserrorを使用して型安全なエラー処理を提供します。
///
/// # 設計方針
/// - unwrap()の使用を禁止し、明示的なエラーハンドリングを強制
/// - Result型でエラー伝播を明示化
/// - 失敗の扱いをエラー型で表現（起動前の致命的エラー vs ループ終端 vs 空値への縮退）
/// - どこにも自動リトライは存在しない

use thiserror::Error;

/// Domain層の統一エラー型
#[derive(Error, Debug)]
pub enum DomainError {
    /// 利用可能なカメラが1台も見つからない（起動前の致命的エラー）
    #[error("No camera device found")]
    NoDeviceFound,

    /// カメラのオープン失敗（起動前の致命的エラー）
    #[error("Failed to open camera device {index}: {reason}")]
    DeviceOpen { index: i32, reason: String },

    /// フレーム読み取り失敗（ループ終端条件。上位には伝播させない）
    #[error("Frame read failed: {0}")]
    FrameRead(String),

    /// 検出処理のエラー（該当イテレーションのみ生フレームに縮退）
    #[error("Detection error: {0}")]
    Detection(String),

    /// 表示関連のエラー
    #[error("Display error: {0}")]
    Display(String),

    /// 音声キャプチャのエラー（バックグラウンドタスク内で回復）
    #[error("Audio capture error: {0}")]
    Audio(String),

    /// 音声認識サービスのエラー（空字幕に縮退）
    #[error("Speech recognition error: {0}")]
    Recognition(String),

    /// OBS WebSocketへの接続失敗（コマンドは発行しない。切断は試行する）
    #[error("Control connection failed: {0}")]
    ControlConnection(String),

    /// OBS制御コマンドの失敗（報告し、後続コマンドは中止。切断は試行する）
    #[error("Control command '{command}' failed: {reason}")]
    ControlCommand { command: String, reason: String },

    /// 設定関連のエラー
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Domain層の統一Result型
pub type DomainResult<T> = Result<T, DomainError>;
