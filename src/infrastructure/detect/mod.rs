//! 検出アダプタ群
//!
//! DetectorPortの実装を選択・生成します。
//! - `color`: HSV色レンジによるルールベース検出
//! - `yolo`: ONNXモデル（YOLOv8系）によるDNN検出

pub mod color;
pub mod yolo;

use opencv::{
    core::{self, Mat},
    prelude::{MatTraitConst, MatTraitConstManual},
};

use crate::domain::{
    DetectionOutput, DetectorConfig, DetectorMode, DetectorPort, DomainError, DomainResult, Frame,
};

use color::ColorDetector;
use yolo::YoloDetector;

/// FrameのBGRバイト列からMatを構築する（検出処理用）
pub(crate) fn mat_from_frame(frame: &Frame) -> DomainResult<Mat> {
    let expected = frame.width as usize * frame.height as usize * 3;
    if frame.data.len() != expected {
        return Err(DomainError::Detection(format!(
            "Frame buffer size mismatch: {} != {}",
            frame.data.len(),
            expected
        )));
    }

    // frame.dataは呼び出し側で生存しており、try_cloneで即コピーする
    let borrowed = unsafe {
        Mat::new_rows_cols_with_data_unsafe(
            frame.height as i32,
            frame.width as i32,
            core::CV_8UC3,
            frame.data.as_ptr() as *mut std::ffi::c_void,
            core::Mat_AUTO_STEP,
        )
    }
    .map_err(|e| DomainError::Detection(format!("Failed to wrap frame: {:?}", e)))?;

    borrowed
        .try_clone()
        .map_err(|e| DomainError::Detection(format!("Failed to clone frame: {:?}", e)))
}

/// MatをFrameへ変換する（注釈済みフレームの返却用）
pub(crate) fn frame_from_mat(mat: &Mat) -> DomainResult<Frame> {
    let data = mat
        .data_bytes()
        .map_err(|e| DomainError::Detection(format!("Failed to read mat bytes: {:?}", e)))?
        .to_vec();
    Ok(Frame::new(data, mat.cols() as u32, mat.rows() as u32))
}

/// 検出バックエンドのセレクタ
///
/// 設定値に応じて実装を選択するenumディスパッチ。動的ディスパッチを避け、
/// バックエンド追加時はここに列挙子を足す。
pub enum DetectorSelector {
    Color(ColorDetector),
    Yolo(YoloDetector),
}

impl DetectorSelector {
    /// 設定から検出器を生成する
    ///
    /// # Returns
    /// - `Ok(None)`: 検出は無効（素のビューアとして動く）
    /// - `Ok(Some(selector))`: 検出器の初期化成功
    /// - `Err(DomainError::Detection)`: モデル読み込み等の初期化失敗
    pub fn from_config(config: &DetectorConfig) -> DomainResult<Option<Self>> {
        match config.mode {
            DetectorMode::None => Ok(None),
            DetectorMode::Color => {
                let detector = ColorDetector::new(
                    config.hsv_range.clone().into(),
                    config.min_detection_area,
                );
                Ok(Some(Self::Color(detector)))
            }
            DetectorMode::Yolo => {
                let detector = YoloDetector::load(config)?;
                Ok(Some(Self::Yolo(detector)))
            }
        }
    }
}

impl DetectorPort for DetectorSelector {
    fn detect(&mut self, frame: &Frame) -> DomainResult<DetectionOutput> {
        match self {
            Self::Color(detector) => detector.detect(frame),
            Self::Yolo(detector) => detector.detect(frame),
        }
    }

    fn backend_name(&self) -> &'static str {
        match self {
            Self::Color(detector) => detector.backend_name(),
            Self::Yolo(detector) => detector.backend_name(),
        }
    }
}
