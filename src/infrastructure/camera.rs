//! カメラキャプチャモジュール
//!
//! OpenCVのVideoCaptureによるデバイス探索とフレーム取得。
//! OBS仮想カメラも物理Webカメラも同じインデックス空間で扱われます。

use std::time::Instant;

use opencv::{
    core::Mat,
    prelude::{MatTraitConst, MatTraitConstManual, VideoCaptureTrait, VideoCaptureTraitConst},
    videoio,
};

use crate::domain::{
    CameraPort, CaptureBackend, DeviceInfo, DomainError, DomainResult, Frame, ProbeOutcome,
    ProbePort,
};

/// 設定上のバックエンド指定をOpenCVのAPI preference定数へ変換
fn backend_api(backend: CaptureBackend) -> i32 {
    match backend {
        CaptureBackend::Auto => videoio::CAP_ANY,
        CaptureBackend::Dshow => videoio::CAP_DSHOW,
        CaptureBackend::Msmf => videoio::CAP_MSMF,
        CaptureBackend::V4l2 => videoio::CAP_V4L2,
        CaptureBackend::Avfoundation => videoio::CAP_AVFOUNDATION,
    }
}

/// OpenCVによるデバイス生存確認
///
/// オープン成功＋1フレーム読み取り成功のデバイスだけをLiveと判定する。
/// ハンドルは判定後すぐ解放される（VideoCaptureのDropで閉じる）。
pub struct OpenCvProbe {
    backend: CaptureBackend,
}

impl OpenCvProbe {
    pub fn new(backend: CaptureBackend) -> Self {
        Self { backend }
    }
}

impl ProbePort for OpenCvProbe {
    fn probe(&mut self, index: i32) -> ProbeOutcome {
        let mut capture = match videoio::VideoCapture::new(index, backend_api(self.backend)) {
            Ok(capture) => capture,
            Err(e) => {
                tracing::debug!("VideoCapture::new({}) failed: {:?}", index, e);
                return ProbeOutcome::OpenFailed;
            }
        };

        match capture.is_opened() {
            Ok(true) => {}
            _ => return ProbeOutcome::OpenFailed,
        }

        let mut mat = Mat::default();
        let outcome = match capture.read(&mut mat) {
            Ok(true) if !mat.empty() => ProbeOutcome::Live,
            _ => ProbeOutcome::ReadFailed,
        };

        let _ = capture.release();
        outcome
    }
}

/// OpenCVカメラアダプター
///
/// open()でキャプチャ解像度を設定し、以後read_frame()でBGRフレームを返す。
pub struct OpenCvCameraAdapter {
    capture: videoio::VideoCapture,
    info: DeviceInfo,
    released: bool,
}

impl OpenCvCameraAdapter {
    /// 指定インデックスのデバイスを開く
    ///
    /// # Returns
    /// - `Ok(adapter)`: オープン成功（要求解像度を設定済み）
    /// - `Err(DomainError::DeviceOpen)`: オープン失敗（呼び出し側は続行不能）
    pub fn open(
        index: i32,
        backend: CaptureBackend,
        width: u32,
        height: u32,
        name: impl Into<String>,
    ) -> DomainResult<Self> {
        let mut capture = videoio::VideoCapture::new(index, backend_api(backend)).map_err(|e| {
            DomainError::DeviceOpen {
                index,
                reason: format!("{:?}", e),
            }
        })?;

        if !capture.is_opened().unwrap_or(false) {
            return Err(DomainError::DeviceOpen {
                index,
                reason: "device did not open".to_string(),
            });
        }

        // 解像度は要求であり保証ではない。実効値はドライバーが決める。
        let _ = capture.set(videoio::CAP_PROP_FRAME_WIDTH, width as f64);
        let _ = capture.set(videoio::CAP_PROP_FRAME_HEIGHT, height as f64);

        let actual_width = capture
            .get(videoio::CAP_PROP_FRAME_WIDTH)
            .unwrap_or(width as f64) as u32;
        let actual_height = capture
            .get(videoio::CAP_PROP_FRAME_HEIGHT)
            .unwrap_or(height as f64) as u32;

        let info = DeviceInfo {
            index,
            width: actual_width,
            height: actual_height,
            name: name.into(),
        };

        tracing::info!(
            "Opened camera {} at {}x{}",
            info.index,
            info.width,
            info.height
        );

        Ok(Self {
            capture,
            info,
            released: false,
        })
    }
}

impl CameraPort for OpenCvCameraAdapter {
    fn read_frame(&mut self) -> DomainResult<Frame> {
        let mut mat = Mat::default();
        let grabbed = self
            .capture
            .read(&mut mat)
            .map_err(|e| DomainError::FrameRead(format!("{:?}", e)))?;

        if !grabbed || mat.empty() {
            return Err(DomainError::FrameRead("empty frame".to_string()));
        }

        let width = mat.cols() as u32;
        let height = mat.rows() as u32;

        // BGRバイト列を連続メモリとして取り出す
        let data = if mat.is_continuous() {
            mat.data_bytes()
                .map_err(|e| DomainError::FrameRead(format!("{:?}", e)))?
                .to_vec()
        } else {
            let mut contiguous = Mat::default();
            mat.copy_to(&mut contiguous)
                .map_err(|e| DomainError::FrameRead(format!("{:?}", e)))?;
            contiguous
                .data_bytes()
                .map_err(|e| DomainError::FrameRead(format!("{:?}", e)))?
                .to_vec()
        };

        Ok(Frame {
            timestamp: Instant::now(),
            data,
            width,
            height,
        })
    }

    fn device_info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn release(&mut self) -> DomainResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.capture
            .release()
            .map_err(|e| DomainError::DeviceOpen {
                index: self.info.index,
                reason: format!("release failed: {:?}", e),
            })
    }
}

impl Drop for OpenCvCameraAdapter {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.capture.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_api_mapping() {
        assert_eq!(backend_api(CaptureBackend::Auto), videoio::CAP_ANY);
        assert_eq!(backend_api(CaptureBackend::Dshow), videoio::CAP_DSHOW);
        assert_eq!(backend_api(CaptureBackend::Msmf), videoio::CAP_MSMF);
        assert_eq!(backend_api(CaptureBackend::V4l2), videoio::CAP_V4L2);
        assert_eq!(
            backend_api(CaptureBackend::Avfoundation),
            videoio::CAP_AVFOUNDATION
        );
    }
}
