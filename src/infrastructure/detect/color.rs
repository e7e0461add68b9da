//! HSV色検知アダプタ
//!
//! BGR→HSV変換とレンジマスクで対象色の領域を抽出し、輪郭ごとに
//! バウンディングボックスを返すルールベース検出。モデル不要で動くため
//! DNN環境が整っていないマシンでの動作確認にも使えます。

use opencv::{
    core::{self, Mat, Point, Rect, Scalar, Vector},
    imgproc,
    prelude::MatTraitConst,
};

use crate::domain::{
    BoundingBox, DetectionOutput, Detections, DetectorPort, DomainError, DomainResult, Frame,
    HsvRange,
};

use super::{frame_from_mat, mat_from_frame};

/// 検出枠の描画色（緑、BGR）
const BOX_COLOR: (f64, f64, f64) = (0.0, 255.0, 0.0);

/// HSV色検知器
pub struct ColorDetector {
    range: HsvRange,
    min_area: u32,
}

impl ColorDetector {
    /// 新しい色検知器を作成
    pub fn new(range: HsvRange, min_area: u32) -> Self {
        Self { range, min_area }
    }

    /// マスク画像から面積条件を満たす輪郭の外接矩形を求める
    fn find_boxes(&self, mask: &Mat) -> DomainResult<Vec<Rect>> {
        let mut contours: Vector<Vector<Point>> = Vector::new();
        imgproc::find_contours(
            mask,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::default(),
        )
        .map_err(|e| DomainError::Detection(format!("Failed to find contours: {:?}", e)))?;

        let mut boxes = Vec::new();
        for contour in contours.iter() {
            let area = imgproc::contour_area(&contour, false)
                .map_err(|e| DomainError::Detection(format!("Failed to compute area: {:?}", e)))?;
            if area < self.min_area as f64 {
                continue;
            }
            let rect = imgproc::bounding_rect(&contour).map_err(|e| {
                DomainError::Detection(format!("Failed to compute bounding rect: {:?}", e))
            })?;
            boxes.push(rect);
        }
        Ok(boxes)
    }
}

impl DetectorPort for ColorDetector {
    fn detect(&mut self, frame: &Frame) -> DomainResult<DetectionOutput> {
        let bgr = mat_from_frame(frame)?;

        let mut hsv = Mat::default();
        imgproc::cvt_color(&bgr, &mut hsv, imgproc::COLOR_BGR2HSV, 0)
            .map_err(|e| DomainError::Detection(format!("Failed to convert to HSV: {:?}", e)))?;

        let lower = Scalar::new(
            self.range.h_min as f64,
            self.range.s_min as f64,
            self.range.v_min as f64,
            0.0,
        );
        let upper = Scalar::new(
            self.range.h_max as f64,
            self.range.s_max as f64,
            self.range.v_max as f64,
            0.0,
        );

        let mut mask = Mat::default();
        core::in_range(&hsv, &lower, &upper, &mut mask)
            .map_err(|e| DomainError::Detection(format!("Failed to create mask: {:?}", e)))?;

        let rects = self.find_boxes(&mask)?;

        let mut annotated = bgr;
        let color = Scalar::new(BOX_COLOR.0, BOX_COLOR.1, BOX_COLOR.2, 0.0);
        let mut boxes = Vec::with_capacity(rects.len());
        for rect in rects {
            imgproc::rectangle(&mut annotated, rect, color, 2, imgproc::LINE_8, 0)
                .map_err(|e| DomainError::Detection(format!("Failed to draw box: {:?}", e)))?;
            boxes.push(BoundingBox {
                x: rect.x as f32,
                y: rect.y as f32,
                width: rect.width as f32,
                height: rect.height as f32,
                label: "color-match".to_string(),
                confidence: 1.0,
            });
        }

        Ok(DetectionOutput {
            detections: Detections { boxes },
            annotated: frame_from_mat(&annotated)?,
        })
    }

    fn backend_name(&self) -> &'static str {
        "hsv-color"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 単色フレームを作成（BGR）
    fn solid_frame(b: u8, g: u8, r: u8, width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..(width * height) {
            data.extend_from_slice(&[b, g, r]);
        }
        Frame::new(data, width, height)
    }

    fn yellow_range() -> HsvRange {
        HsvRange::new(25, 45, 80, 255, 80, 255)
    }

    #[test]
    fn test_matching_color_detected() {
        // 純黄色（BGR 0,255,255）はHSVで H=30, S=255, V=255
        let frame = solid_frame(0, 255, 255, 64, 64);
        let mut detector = ColorDetector::new(yellow_range(), 100);

        let output = detector.detect(&frame).unwrap();
        assert_eq!(output.detections.count(), 1);

        let bbox = &output.detections.boxes[0];
        assert_eq!(bbox.width as u32, 64);
        assert_eq!(bbox.height as u32, 64);
    }

    #[test]
    fn test_non_matching_color_not_detected() {
        // 純青（BGR 255,0,0）は黄レンジに入らない
        let frame = solid_frame(255, 0, 0, 64, 64);
        let mut detector = ColorDetector::new(yellow_range(), 100);

        let output = detector.detect(&frame).unwrap();
        assert_eq!(output.detections.count(), 0);
        // 検出0件でもフレームは返り、画素は変化していない
        assert_eq!(output.annotated.data, frame.data);
    }

    #[test]
    fn test_small_region_filtered_by_min_area() {
        // 最小面積を全面積より大きく設定すれば全域一致でも弾かれる
        let frame = solid_frame(0, 255, 255, 8, 8);
        let mut detector = ColorDetector::new(yellow_range(), 10_000);

        let output = detector.detect(&frame).unwrap();
        assert_eq!(output.detections.count(), 0);
    }
}
