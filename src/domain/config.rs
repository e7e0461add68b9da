//! 設定管理
//!
//! TOML設定ファイルの読み込みとDomain型への変換。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::domain::{DomainError, DomainResult, HsvRange};

/// 検出モード
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DetectorMode {
    /// 検出なし（生フレーム＋字幕のみ）
    #[default]
    None,
    /// HSV色検知（高速、モデル不要）
    Color,
    /// YOLO物体検出（OpenCV DNN、ONNXモデルが必要）
    Yolo,
}

/// キャプチャバックエンド
///
/// プラットフォーム固有のバックエンド選択は保証ではなくヒューリスティクスのため、
/// ハードコードせず設定で公開する。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CaptureBackend {
    /// OpenCVの自動選択
    #[default]
    Auto,
    /// DirectShow（Windows、OBS仮想カメラと相性が良い）
    Dshow,
    /// Media Foundation（Windows）
    Msmf,
    /// Video4Linux2（Linux）
    V4l2,
    /// AVFoundation（macOS）
    Avfoundation,
}

/// アプリケーション設定のルート構造
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AppConfig {
    /// カメラ設定
    #[serde(default)]
    pub camera: CameraConfig,
    /// 検出設定
    #[serde(default)]
    pub detector: DetectorConfig,
    /// 表示設定
    #[serde(default)]
    pub display: DisplayConfig,
    /// 字幕設定
    #[serde(default)]
    pub subtitles: SubtitleConfig,
    /// OBS配信制御設定
    #[serde(default)]
    pub control: ControlConfig,
}

/// カメラ設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CameraConfig {
    /// 探索するデバイスインデックスの上限（0..probe_limit を走査）
    ///
    /// デフォルト: 10
    pub probe_limit: i32,

    /// 仮想カメラとして優先するインデックスのヒント
    ///
    /// OBS仮想カメラは慣習的にインデックス1に現れることが多いが、
    /// これは環境依存の慣習であり保証ではない。生存していれば優先される。
    /// デフォルト: 1
    #[serde(default = "default_preferred_index")]
    pub preferred_index: Option<i32>,

    /// 使用するデバイスインデックスの固定指定
    ///
    /// 指定した場合は探索結果の対話選択をスキップする。省略時はプロンプトで選択。
    #[serde(default)]
    pub index: Option<i32>,

    /// キャプチャバックエンド
    ///
    /// 選択肢: "auto", "dshow", "msmf", "v4l2", "avfoundation"
    /// デフォルト: "auto"
    #[serde(default)]
    pub backend: CaptureBackend,

    /// 要求するキャプチャ幅（ピクセル）
    ///
    /// デフォルト: 1280
    pub width: u32,

    /// 要求するキャプチャ高さ（ピクセル）
    ///
    /// デフォルト: 720
    pub height: u32,
}

fn default_preferred_index() -> Option<i32> {
    Some(CameraConfig::DEFAULT_PREFERRED_INDEX)
}

impl CameraConfig {
    /// デフォルトの探索上限
    pub const DEFAULT_PROBE_LIMIT: i32 = 10;
    /// OBS仮想カメラの慣習的なインデックス
    pub const DEFAULT_PREFERRED_INDEX: i32 = 1;
    /// デフォルトのキャプチャ幅
    pub const DEFAULT_WIDTH: u32 = 1280;
    /// デフォルトのキャプチャ高さ
    pub const DEFAULT_HEIGHT: u32 = 720;
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            probe_limit: Self::DEFAULT_PROBE_LIMIT,
            preferred_index: Some(Self::DEFAULT_PREFERRED_INDEX),
            index: None,
            backend: CaptureBackend::default(),
            width: Self::DEFAULT_WIDTH,
            height: Self::DEFAULT_HEIGHT,
        }
    }
}

/// 検出設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DetectorConfig {
    /// 検出モード
    ///
    /// 選択肢: "none" (検出なし), "color" (HSV色検知), "yolo" (YOLO + OpenCV DNN)
    /// デフォルト: "none"
    #[serde(default)]
    pub mode: DetectorMode,

    /// ONNXモデルファイルのパス（mode = "yolo" の場合のみ有効）
    ///
    /// デフォルト: "yolov8n.onnx"
    pub model_path: String,

    /// クラス名リストのパス（1行1クラス。省略時は "object {id}" 表記）
    #[serde(default)]
    pub labels_path: Option<String>,

    /// 信頼度しきい値 [0.0-1.0]（mode = "yolo" のみ）
    ///
    /// デフォルト: 0.25
    pub confidence_threshold: f32,

    /// NMS（非最大値抑制）しきい値 [0.0-1.0]（mode = "yolo" のみ）
    ///
    /// デフォルト: 0.45
    pub nms_threshold: f32,

    /// モデル入力の一辺サイズ（ピクセル、mode = "yolo" のみ）
    ///
    /// デフォルト: 640
    pub input_size: u32,

    /// HSVレンジ設定（mode = "color" のみ）
    pub hsv_range: HsvRangeConfig,

    /// 最小検出面積（ピクセル数、これ未満は無視。mode = "color" のみ）
    ///
    /// デフォルト: 100
    pub min_detection_area: u32,
}

impl DetectorConfig {
    /// デフォルトのモデルパス
    pub const DEFAULT_MODEL_PATH: &'static str = "yolov8n.onnx";
    /// デフォルトの信頼度しきい値
    pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
    /// デフォルトのNMSしきい値
    pub const DEFAULT_NMS_THRESHOLD: f32 = 0.45;
    /// デフォルトのモデル入力サイズ
    pub const DEFAULT_INPUT_SIZE: u32 = 640;
    /// デフォルトの最小検出面積（ピクセル）
    pub const DEFAULT_MIN_DETECTION_AREA: u32 = 100;
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            mode: DetectorMode::None,
            model_path: Self::DEFAULT_MODEL_PATH.to_string(),
            labels_path: None,
            confidence_threshold: Self::DEFAULT_CONFIDENCE_THRESHOLD,
            nms_threshold: Self::DEFAULT_NMS_THRESHOLD,
            input_size: Self::DEFAULT_INPUT_SIZE,
            hsv_range: HsvRangeConfig::default(),
            min_detection_area: Self::DEFAULT_MIN_DETECTION_AREA,
        }
    }
}

/// HSVレンジ設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HsvRangeConfig {
    /// H（色相）の最小値
    ///
    /// OpenCV準拠: H [0-180]
    pub h_min: u8,

    /// H（色相）の最大値
    ///
    /// OpenCV準拠: H [0-180]
    pub h_max: u8,

    /// S（彩度）の最小値
    ///
    /// OpenCV準拠: S [0-255]
    pub s_min: u8,

    /// S（彩度）の最大値
    ///
    /// OpenCV準拠: S [0-255]
    pub s_max: u8,

    /// V（明度）の最小値
    ///
    /// OpenCV準拠: V [0-255]
    pub v_min: u8,

    /// V（明度）の最大値
    ///
    /// OpenCV準拠: V [0-255]
    pub v_max: u8,
}

impl Default for HsvRangeConfig {
    fn default() -> Self {
        // デフォルト: 黄色系（H:25-45, S:80-255, V:80-255）
        Self {
            h_min: 25,
            h_max: 45,
            s_min: 80,
            s_max: 255,
            v_min: 80,
            v_max: 255,
        }
    }
}

impl From<HsvRangeConfig> for HsvRange {
    fn from(config: HsvRangeConfig) -> Self {
        HsvRange::new(
            config.h_min,
            config.h_max,
            config.s_min,
            config.s_max,
            config.v_min,
            config.v_max,
        )
    }
}

/// 表示設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DisplayConfig {
    /// ウィンドウタイトル
    pub window_name: String,

    /// ウィンドウ幅（ピクセル）
    ///
    /// デフォルト: 640
    pub window_width: i32,

    /// ウィンドウ高さ（ピクセル）
    ///
    /// デフォルト: 360
    pub window_height: i32,

    /// キー入力のポーリング待ち時間（ミリ秒）
    ///
    /// デフォルト: 1ms
    pub key_poll_ms: u64,

    /// 終了キー
    ///
    /// デフォルト: "q"
    pub quit_key: char,

    /// 統計情報の出力間隔（秒）
    pub stats_interval_sec: u64,
}

impl DisplayConfig {
    /// デフォルトのウィンドウタイトル
    pub const DEFAULT_WINDOW_NAME: &'static str = "BigKahuna";
    /// デフォルトのウィンドウ幅
    pub const DEFAULT_WINDOW_WIDTH: i32 = 640;
    /// デフォルトのウィンドウ高さ
    pub const DEFAULT_WINDOW_HEIGHT: i32 = 360;
    /// デフォルトのキーポーリング間隔（ミリ秒）
    pub const DEFAULT_KEY_POLL_MS: u64 = 1;
    /// デフォルトの終了キー
    pub const DEFAULT_QUIT_KEY: char = 'q';
    /// デフォルトの統計出力間隔（秒）
    pub const DEFAULT_STATS_INTERVAL_SEC: u64 = 10;
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            window_name: Self::DEFAULT_WINDOW_NAME.to_string(),
            window_width: Self::DEFAULT_WINDOW_WIDTH,
            window_height: Self::DEFAULT_WINDOW_HEIGHT,
            key_poll_ms: Self::DEFAULT_KEY_POLL_MS,
            quit_key: Self::DEFAULT_QUIT_KEY,
            stats_interval_sec: Self::DEFAULT_STATS_INTERVAL_SEC,
        }
    }
}

impl DisplayConfig {
    pub fn key_poll(&self) -> Duration {
        Duration::from_millis(self.key_poll_ms)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_sec)
    }
}

/// 字幕設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SubtitleConfig {
    /// 字幕機能を有効にするか
    ///
    /// デフォルト: false
    #[serde(default)]
    pub enabled: bool,

    /// 発話開始を待つ最大時間（ミリ秒）
    ///
    /// デフォルト: 2000ms
    pub listen_timeout_ms: u64,

    /// 1セグメントの最大長（ミリ秒）
    ///
    /// デフォルト: 3000ms
    pub phrase_limit_ms: u64,

    /// 音声認識APIのエンドポイント（OpenAI互換の転写API）
    pub endpoint: String,

    /// 使用するモデル名
    pub model: String,

    /// 認識言語（ISO-639-1、省略時はサービス側の自動判定）
    #[serde(default)]
    pub language: Option<String>,

    /// APIキーを読み込む環境変数名
    pub api_key_env: String,
}

impl SubtitleConfig {
    /// デフォルトの発話待ちタイムアウト（ミリ秒）
    pub const DEFAULT_LISTEN_TIMEOUT_MS: u64 = 2000;
    /// デフォルトのセグメント最大長（ミリ秒）
    pub const DEFAULT_PHRASE_LIMIT_MS: u64 = 3000;
    /// デフォルトのエンドポイント
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1/audio/transcriptions";
    /// デフォルトのモデル名
    pub const DEFAULT_MODEL: &'static str = "whisper-1";
    /// デフォルトのAPIキー環境変数名
    pub const DEFAULT_API_KEY_ENV: &'static str = "OPENAI_API_KEY";
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_timeout_ms: Self::DEFAULT_LISTEN_TIMEOUT_MS,
            phrase_limit_ms: Self::DEFAULT_PHRASE_LIMIT_MS,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            language: None,
            api_key_env: Self::DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

impl SubtitleConfig {
    pub fn listen_timeout(&self) -> Duration {
        Duration::from_millis(self.listen_timeout_ms)
    }

    pub fn phrase_limit(&self) -> Duration {
        Duration::from_millis(self.phrase_limit_ms)
    }
}

/// OBS配信制御設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControlConfig {
    /// OBS WebSocketのホスト
    pub host: String,

    /// OBS WebSocketのポート（obs-websocket 4.x のデフォルトは4444）
    pub port: u16,

    /// WebSocketパスワード（空文字列で認証なし）
    #[serde(default)]
    pub password: String,

    /// 切り替え先のシーン名
    pub scene_name: String,
}

impl ControlConfig {
    /// デフォルトのホスト
    pub const DEFAULT_HOST: &'static str = "localhost";
    /// obs-websocket 4.x のデフォルトポート
    pub const DEFAULT_PORT: u16 = 4444;
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            host: Self::DEFAULT_HOST.to_string(),
            port: Self::DEFAULT_PORT,
            password: String::new(),
            scene_name: "Scene".to_string(),
        }
    }
}

impl AppConfig {
    /// TOMLファイルから設定を読み込む
    pub fn from_file<P: AsRef<Path>>(path: P) -> DomainResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DomainError::Configuration(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content)
            .map_err(|e| DomainError::Configuration(format!("Failed to parse config file: {}", e)))
    }

    /// デフォルト設定をTOMLファイルに書き出す
    pub fn write_default<P: AsRef<Path>>(path: P) -> DomainResult<()> {
        let config = Self::default();
        let content = toml::to_string_pretty(&config).map_err(|e| {
            DomainError::Configuration(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, content)
            .map_err(|e| DomainError::Configuration(format!("Failed to write config file: {}", e)))
    }

    /// 設定の妥当性を検証
    pub fn validate(&self) -> DomainResult<()> {
        // カメラ設定の検証
        if self.camera.probe_limit <= 0 {
            return Err(DomainError::Configuration(
                "Camera probe_limit must be greater than 0".to_string(),
            ));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(DomainError::Configuration(
                "Camera width and height must be greater than 0".to_string(),
            ));
        }
        if let Some(index) = self.camera.index {
            if index < 0 {
                return Err(DomainError::Configuration(
                    "Camera index must be non-negative".to_string(),
                ));
            }
        }

        // 検出設定の検証
        let det = &self.detector;
        if !(0.0..=1.0).contains(&det.confidence_threshold) {
            return Err(DomainError::Configuration(
                "confidence_threshold must be in [0.0, 1.0]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&det.nms_threshold) {
            return Err(DomainError::Configuration(
                "nms_threshold must be in [0.0, 1.0]".to_string(),
            ));
        }
        if det.mode == DetectorMode::Yolo && det.input_size == 0 {
            return Err(DomainError::Configuration(
                "detector input_size must be greater than 0".to_string(),
            ));
        }

        // HSVレンジの検証
        let hsv = &det.hsv_range;
        if hsv.h_min > 180 || hsv.h_max > 180 || hsv.h_min > hsv.h_max {
            return Err(DomainError::Configuration(
                "Invalid HSV H range (must be 0-180, min <= max)".to_string(),
            ));
        }
        if hsv.s_min > hsv.s_max || hsv.v_min > hsv.v_max {
            return Err(DomainError::Configuration(
                "Invalid HSV S/V range (min must be <= max)".to_string(),
            ));
        }

        // 表示設定の検証
        if self.display.window_width <= 0 || self.display.window_height <= 0 {
            return Err(DomainError::Configuration(
                "Window size must be greater than 0".to_string(),
            ));
        }
        if self.display.key_poll_ms == 0 {
            return Err(DomainError::Configuration(
                "key_poll_ms must be greater than 0".to_string(),
            ));
        }

        // 字幕設定の検証
        if self.subtitles.enabled {
            if self.subtitles.listen_timeout_ms == 0 || self.subtitles.phrase_limit_ms == 0 {
                return Err(DomainError::Configuration(
                    "Subtitle listen_timeout_ms and phrase_limit_ms must be greater than 0"
                        .to_string(),
                ));
            }
            if self.subtitles.endpoint.is_empty() {
                return Err(DomainError::Configuration(
                    "Subtitle endpoint must not be empty".to_string(),
                ));
            }
        }

        // 制御設定の検証
        if self.control.host.is_empty() {
            return Err(DomainError::Configuration(
                "Control host must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
