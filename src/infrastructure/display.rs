//! 表示モジュール
//!
//! OpenCVのhighguiによるウィンドウ表示とキー入力ポーリング。
//! オーバーレイテキストはここでフレーム上に描画されます。

use std::time::Duration;

use opencv::{
    core::{self, Mat, Point, Scalar},
    highgui,
    imgproc::{self, FONT_HERSHEY_SIMPLEX, LINE_8},
    prelude::MatTraitConst,
};

use crate::domain::{DisplayPort, DomainError, DomainResult, Frame, Overlay, OverlayColor};

/// オーバーレイテキストのフォントスケール
const FONT_SCALE: f64 = 1.0;
/// オーバーレイテキストの線の太さ
const FONT_THICKNESS: i32 = 2;

fn scalar(color: OverlayColor) -> Scalar {
    Scalar::new(color.b as f64, color.g as f64, color.r as f64, 0.0)
}

/// wait_keyの戻り値をキーコードに正規化する
///
/// 負値は「入力なし」。バックエンドによっては上位ビットに修飾キー等が
/// 乗るため、ASCII比較用に下位8bitへマスクする。
fn normalize_key(code: i32) -> Option<i32> {
    if code < 0 {
        None
    } else {
        Some(code & 0xFF)
    }
}

/// highguiウィンドウアダプター
///
/// キャプチャ解像度のままだと大きすぎるため、ウィンドウは設定されたサイズに
/// リサイズして表示する（画像データ自体は縮小しない）。
pub struct HighguiDisplayAdapter {
    window_name: String,
    closed: bool,
}

impl HighguiDisplayAdapter {
    /// ウィンドウを作成する
    pub fn create(window_name: impl Into<String>, width: i32, height: i32) -> DomainResult<Self> {
        let window_name = window_name.into();

        highgui::named_window(&window_name, highgui::WINDOW_NORMAL)
            .map_err(|e| DomainError::Display(format!("Failed to create window: {:?}", e)))?;
        highgui::resize_window(&window_name, width, height)
            .map_err(|e| DomainError::Display(format!("Failed to resize window: {:?}", e)))?;

        tracing::info!("Display window '{}' at {}x{}", window_name, width, height);

        Ok(Self {
            window_name,
            closed: false,
        })
    }

    /// FrameのBGRバイト列からMatを構築する
    ///
    /// データ長が width*height*3 に一致しない場合はエラー。
    fn frame_to_mat(frame: &Frame) -> DomainResult<Mat> {
        let expected = frame.width as usize * frame.height as usize * 3;
        if frame.data.len() != expected {
            return Err(DomainError::Display(format!(
                "Frame buffer size mismatch: {} != {}",
                frame.data.len(),
                expected
            )));
        }

        // frame.dataはこの関数のスコープ内で生存しており、try_cloneで即コピーする
        let borrowed = unsafe {
            Mat::new_rows_cols_with_data_unsafe(
                frame.height as i32,
                frame.width as i32,
                core::CV_8UC3,
                frame.data.as_ptr() as *mut std::ffi::c_void,
                core::Mat_AUTO_STEP,
            )
        }
        .map_err(|e| DomainError::Display(format!("Failed to wrap frame: {:?}", e)))?;

        borrowed
            .try_clone()
            .map_err(|e| DomainError::Display(format!("Failed to clone frame: {:?}", e)))
    }

    /// オーバーレイの全行をMat上に描画する
    fn draw_overlay(mat: &mut Mat, overlay: &Overlay) -> DomainResult<()> {
        for line in &overlay.lines {
            imgproc::put_text(
                mat,
                &line.text,
                Point::new(line.position.0, line.position.1),
                FONT_HERSHEY_SIMPLEX,
                FONT_SCALE,
                scalar(line.color),
                FONT_THICKNESS,
                LINE_8,
                false,
            )
            .map_err(|e| DomainError::Display(format!("Failed to draw text: {:?}", e)))?;
        }
        Ok(())
    }
}

impl DisplayPort for HighguiDisplayAdapter {
    fn show(&mut self, frame: &Frame, overlay: &Overlay) -> DomainResult<()> {
        let mut canvas = Self::frame_to_mat(frame)?;
        Self::draw_overlay(&mut canvas, overlay)?;

        highgui::imshow(&self.window_name, &canvas)
            .map_err(|e| DomainError::Display(format!("Failed to show frame: {:?}", e)))
    }

    fn poll_key(&mut self, timeout: Duration) -> DomainResult<Option<i32>> {
        // wait_key(0)は無期限待ちになるため最低1msを保証する
        let millis = (timeout.as_millis() as i32).max(1);
        let key = highgui::wait_key(millis)
            .map_err(|e| DomainError::Display(format!("Failed to poll key: {:?}", e)))?;

        Ok(normalize_key(key))
    }

    fn close(&mut self) -> DomainResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        highgui::destroy_window(&self.window_name)
            .map_err(|e| DomainError::Display(format!("Failed to close window: {:?}", e)))
    }
}

impl Drop for HighguiDisplayAdapter {
    fn drop(&mut self) {
        if !self.closed {
            let _ = highgui::destroy_window(&self.window_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::prelude::MatTraitConstManual;

    #[test]
    fn test_normalize_key_masks_high_bits() {
        // 修飾キー等で上位ビットが立っていてもASCIIコードとして扱えること
        assert_eq!(normalize_key('q' as i32), Some('q' as i32));
        assert_eq!(normalize_key(0x100071), Some('q' as i32));
        assert_eq!(normalize_key(0xFF), Some(0xFF));
        assert_eq!(normalize_key(-1), None);
    }

    #[test]
    fn test_scalar_is_bgr_order() {
        let s = scalar(OverlayColor::YELLOW);
        assert_eq!(s[0], 0.0);
        assert_eq!(s[1], 255.0);
        assert_eq!(s[2], 255.0);
    }

    #[test]
    fn test_frame_to_mat_rejects_size_mismatch() {
        let frame = Frame::new(vec![0u8; 10], 2, 2);
        assert!(matches!(
            HighguiDisplayAdapter::frame_to_mat(&frame),
            Err(DomainError::Display(_))
        ));
    }

    #[test]
    fn test_frame_to_mat_copies_pixels() {
        let frame = Frame::new(vec![7u8; 2 * 2 * 3], 2, 2);
        let mat = HighguiDisplayAdapter::frame_to_mat(&frame).unwrap();
        assert_eq!(mat.rows(), 2);
        assert_eq!(mat.cols(), 2);
        assert!(mat.is_continuous());
        assert_eq!(mat.data_bytes().unwrap(), frame.data.as_slice());
    }
}
