mod application;
mod domain;
mod infrastructure;
mod logging;

use std::io::Write;
use std::path::PathBuf;

use crate::application::locator::{CameraLocator, LocatedCameras};
use crate::application::subtitle::{SubtitleProducer, SubtitleSlot};
use crate::application::viewer::{LoopExit, Viewer, ViewerOptions};
use crate::domain::config::AppConfig;
use crate::infrastructure::camera::{OpenCvCameraAdapter, OpenCvProbe};
use crate::infrastructure::detect::DetectorSelector;
use crate::infrastructure::display::HighguiDisplayAdapter;
use crate::infrastructure::microphone::CpalMicrophoneAdapter;
use crate::infrastructure::recognizer::CloudRecognizerAdapter;
use crate::logging::init_logging;

fn main() {
    // ログシステムの初期化（非同期ファイル出力）
    let log_dir = PathBuf::from("logs");
    let _guard = init_logging("info", false, Some(log_dir));
    // 注意: _guardはmain終了まで保持する必要がある（Dropでログスレッドが終了）

    tracing::info!("BigKahuna starting...");

    match run() {
        Ok(_) => {
            tracing::info!("BigKahuna terminated gracefully.");
        }
        Err(e) => {
            tracing::error!("Fatal error: {:?}", e);
            eprintln!("Fatal error: {}", e);
            std::process::exit(1);
        }
    }
}

/// アプリケーションのメイン処理
fn run() -> Result<(), Box<dyn std::error::Error>> {
    // 設定ファイルの読み込み（存在しない場合はデフォルト設定を使用）
    let config = match AppConfig::from_file("config.toml") {
        Ok(config) => {
            tracing::info!("Loaded configuration from config.toml");
            config
        }
        Err(e) => {
            tracing::warn!("Failed to load config.toml: {:?}, using defaults", e);
            AppConfig::default()
        }
    };

    config.validate()?;
    tracing::info!("Configuration validated successfully");
    tracing::info!(
        "Camera: probe_limit={}, preferred={:?}, capture={}x{}",
        config.camera.probe_limit,
        config.camera.preferred_index,
        config.camera.width,
        config.camera.height
    );

    // カメラ探索
    let locator = CameraLocator::new(config.camera.probe_limit, config.camera.preferred_index);
    let mut probe = OpenCvProbe::new(config.camera.backend);
    let located = locator.locate(&mut probe)?;

    let index = choose_index(&config, &located);
    let name = located
        .cameras
        .iter()
        .find(|c| c.index == index)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| format!("Camera Index {}", index));

    // カメラオープン（失敗は致命的）
    let camera = OpenCvCameraAdapter::open(
        index,
        config.camera.backend,
        config.camera.width,
        config.camera.height,
        name,
    )?;

    // 検出器（無効ならNone）
    let detector = DetectorSelector::from_config(&config.detector)?;

    // 字幕生成スレッド（初期化失敗は致命的にせず字幕なしで続行）
    let subtitles = if config.subtitles.enabled {
        start_subtitles(&config)
    } else {
        None
    };

    let display = HighguiDisplayAdapter::create(
        config.display.window_name.clone(),
        config.display.window_width,
        config.display.window_height,
    )?;

    let options = ViewerOptions {
        key_poll: config.display.key_poll(),
        quit_key: config.display.quit_key as i32,
        stats_interval: config.display.stats_interval(),
    };

    let viewer = Viewer::new(camera, display, detector, subtitles, options);
    match viewer.run() {
        LoopExit::QuitKey => tracing::info!("Viewer exited on quit key"),
        LoopExit::ReadFailure => tracing::warn!("Viewer exited on frame read failure"),
    }

    Ok(())
}

/// 使用するデバイスインデックスを決定する
///
/// 設定で固定されていればそれを使う（生存していなければ警告の上で既定に落とす）。
/// 固定されていなければ対話プロンプトで選択させる。
fn choose_index(config: &AppConfig, located: &LocatedCameras) -> i32 {
    if let Some(index) = config.camera.index {
        if located.contains(index) {
            tracing::info!("Using configured camera index {}", index);
            return index;
        }
        tracing::warn!(
            "Configured camera index {} is not live, falling back to {}",
            index,
            located.default_index
        );
        return located.default_index;
    }

    prompt_for_index(located)
}

/// 生存デバイスの一覧を出し、使用するインデックスを標準入力から読む
///
/// 空入力・不正入力・生存していないインデックスはすべて既定値に落とす。
fn prompt_for_index(located: &LocatedCameras) -> i32 {
    println!("Available cameras:");
    for camera in &located.cameras {
        println!("  [{}] {}", camera.index, camera.name);
    }
    print!("Select camera index [{}]: ", located.default_index);
    let _ = std::io::stdout().flush();

    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return located.default_index;
    }

    let trimmed = line.trim();
    if trimmed.is_empty() {
        return located.default_index;
    }

    match trimmed.parse::<i32>() {
        Ok(index) if located.contains(index) => index,
        Ok(index) => {
            tracing::warn!(
                "Index {} is not live, using {}",
                index,
                located.default_index
            );
            located.default_index
        }
        Err(_) => {
            tracing::warn!("Invalid input '{}', using {}", trimmed, located.default_index);
            located.default_index
        }
    }
}

/// 字幕生成スレッドを起動し、共有スロットを返す
///
/// マイクや認識APIの初期化に失敗した場合はNoneを返し、本体は字幕なしで動く。
fn start_subtitles(config: &AppConfig) -> Option<SubtitleSlot> {
    let recognizer = match CloudRecognizerAdapter::from_config(&config.subtitles) {
        Ok(recognizer) => recognizer,
        Err(e) => {
            tracing::warn!("Subtitles disabled: {}", e);
            return None;
        }
    };

    let microphone = match CpalMicrophoneAdapter::open_default() {
        Ok(microphone) => microphone,
        Err(e) => {
            tracing::warn!("Subtitles disabled: {}", e);
            return None;
        }
    };

    let slot = SubtitleSlot::new();
    let producer = SubtitleProducer::new(
        microphone,
        recognizer,
        slot.clone(),
        config.subtitles.listen_timeout(),
        config.subtitles.phrase_limit(),
    );
    // スレッドはプロセス終了まで回り続けるためハンドルは保持しない
    let _ = producer.spawn();

    Some(slot)
}
