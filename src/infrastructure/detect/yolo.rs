//! DNN物体検知アダプタ
//!
//! OpenCVのdnnモジュールでONNX形式のYOLOv8系モデルを実行します。
//! 出力テンソルは [1, 4+クラス数, アンカー数] のレイアウトを前提とし、
//! 信頼度フィルタとNMSを通過したボックスだけを返します。

use std::fs;

use opencv::{
    core::{self, Mat, Point, Rect, Scalar, Size, Vector},
    dnn, imgproc,
    prelude::{MatTraitConst, MatTraitConstManual, NetTrait, NetTraitConst},
};

use crate::domain::{
    BoundingBox, DetectionOutput, Detections, DetectorConfig, DetectorPort, DomainError,
    DomainResult, Frame,
};

use super::{frame_from_mat, mat_from_frame};

/// 検出枠の描画色（緑、BGR）
const BOX_COLOR: (f64, f64, f64) = (0.0, 255.0, 0.0);

/// NMS後の候補1件
struct Candidate {
    rect: Rect,
    class_id: usize,
    confidence: f32,
}

/// ONNXモデルによる物体検知器
pub struct YoloDetector {
    net: dnn::Net,
    labels: Vec<String>,
    confidence_threshold: f32,
    nms_threshold: f32,
    input_size: i32,
}

impl YoloDetector {
    /// モデルとラベルを読み込む
    ///
    /// # Returns
    /// - `Err(DomainError::Detection)`: モデルファイルが読めない、またはONNXとして不正
    pub fn load(config: &DetectorConfig) -> DomainResult<Self> {
        let mut net = dnn::read_net_from_onnx(&config.model_path).map_err(|e| {
            DomainError::Detection(format!(
                "Failed to load model '{}': {:?}",
                config.model_path, e
            ))
        })?;

        net.set_preferable_backend(dnn::DNN_BACKEND_OPENCV)
            .map_err(|e| DomainError::Detection(format!("Failed to set backend: {:?}", e)))?;
        net.set_preferable_target(dnn::DNN_TARGET_CPU)
            .map_err(|e| DomainError::Detection(format!("Failed to set target: {:?}", e)))?;

        let labels = match &config.labels_path {
            Some(path) => fs::read_to_string(path)
                .map_err(|e| {
                    DomainError::Detection(format!("Failed to read labels '{}': {}", path, e))
                })?
                .lines()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
            None => Vec::new(),
        };

        tracing::info!(
            "Loaded detection model '{}' ({} labels)",
            config.model_path,
            labels.len()
        );

        Ok(Self {
            net,
            labels,
            confidence_threshold: config.confidence_threshold,
            nms_threshold: config.nms_threshold,
            input_size: config.input_size as i32,
        })
    }

    fn label_for(&self, class_id: usize) -> String {
        self.labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class {}", class_id))
    }

    /// 出力テンソルをデコードし、NMS済みの候補を返す
    ///
    /// 座標はモデル入力空間からフレーム空間へスケールして返す。
    fn decode(&self, output: &Mat, frame_width: u32, frame_height: u32) -> DomainResult<Vec<Candidate>> {
        let dims = output.mat_size();
        if dims.len() != 3 {
            return Err(DomainError::Detection(format!(
                "Unexpected output rank: {}",
                dims.len()
            )));
        }
        let rows = dims[1] as usize; // 4 + クラス数
        let anchors = dims[2] as usize;
        if rows <= 4 {
            return Err(DomainError::Detection(format!(
                "Unexpected output rows: {}",
                rows
            )));
        }

        let data = output
            .data_typed::<f32>()
            .map_err(|e| DomainError::Detection(format!("Failed to read output: {:?}", e)))?;

        let x_scale = frame_width as f32 / self.input_size as f32;
        let y_scale = frame_height as f32 / self.input_size as f32;

        let mut rects: Vector<Rect> = Vector::new();
        let mut scores: Vector<f32> = Vector::new();
        let mut class_ids: Vec<usize> = Vec::new();

        for anchor in 0..anchors {
            let mut best_score = 0.0f32;
            let mut best_class = 0usize;
            for class in 0..(rows - 4) {
                let score = data[(4 + class) * anchors + anchor];
                if score > best_score {
                    best_score = score;
                    best_class = class;
                }
            }
            if best_score < self.confidence_threshold {
                continue;
            }

            let cx = data[anchor];
            let cy = data[anchors + anchor];
            let w = data[2 * anchors + anchor];
            let h = data[3 * anchors + anchor];

            let rect = Rect::new(
                ((cx - w / 2.0) * x_scale) as i32,
                ((cy - h / 2.0) * y_scale) as i32,
                (w * x_scale) as i32,
                (h * y_scale) as i32,
            );
            rects.push(rect);
            scores.push(best_score);
            class_ids.push(best_class);
        }

        let mut kept: Vector<i32> = Vector::new();
        dnn::nms_boxes(
            &rects,
            &scores,
            self.confidence_threshold,
            self.nms_threshold,
            &mut kept,
            1.0,
            0,
        )
        .map_err(|e| DomainError::Detection(format!("NMS failed: {:?}", e)))?;

        let mut candidates = Vec::with_capacity(kept.len());
        for idx in kept.iter() {
            let idx = idx as usize;
            candidates.push(Candidate {
                rect: rects.get(idx).map_err(|e| {
                    DomainError::Detection(format!("NMS index out of range: {:?}", e))
                })?,
                class_id: class_ids[idx],
                confidence: scores.get(idx).map_err(|e| {
                    DomainError::Detection(format!("NMS index out of range: {:?}", e))
                })?,
            });
        }
        Ok(candidates)
    }

    /// 候補のボックスとラベルをフレームに描画する
    fn annotate(&self, mat: &mut Mat, candidates: &[Candidate]) -> DomainResult<()> {
        let color = Scalar::new(BOX_COLOR.0, BOX_COLOR.1, BOX_COLOR.2, 0.0);
        for candidate in candidates {
            imgproc::rectangle(mat, candidate.rect, color, 2, imgproc::LINE_8, 0)
                .map_err(|e| DomainError::Detection(format!("Failed to draw box: {:?}", e)))?;

            let caption = format!(
                "{} {:.2}",
                self.label_for(candidate.class_id),
                candidate.confidence
            );
            imgproc::put_text(
                mat,
                &caption,
                Point::new(candidate.rect.x, (candidate.rect.y - 5).max(15)),
                imgproc::FONT_HERSHEY_SIMPLEX,
                0.5,
                color,
                1,
                imgproc::LINE_8,
                false,
            )
            .map_err(|e| DomainError::Detection(format!("Failed to draw label: {:?}", e)))?;
        }
        Ok(())
    }
}

impl DetectorPort for YoloDetector {
    fn detect(&mut self, frame: &Frame) -> DomainResult<DetectionOutput> {
        let bgr = mat_from_frame(frame)?;

        let blob = dnn::blob_from_image(
            &bgr,
            1.0 / 255.0,
            Size::new(self.input_size, self.input_size),
            Scalar::default(),
            true,
            false,
            core::CV_32F,
        )
        .map_err(|e| DomainError::Detection(format!("Failed to build blob: {:?}", e)))?;

        self.net
            .set_input(&blob, "", 1.0, Scalar::default())
            .map_err(|e| DomainError::Detection(format!("Failed to set input: {:?}", e)))?;

        let names = self
            .net
            .get_unconnected_out_layers_names()
            .map_err(|e| DomainError::Detection(format!("Failed to query outputs: {:?}", e)))?;
        let mut outputs: Vector<Mat> = Vector::new();
        self.net
            .forward(&mut outputs, &names)
            .map_err(|e| DomainError::Detection(format!("Inference failed: {:?}", e)))?;

        let output = outputs
            .get(0)
            .map_err(|e| DomainError::Detection(format!("No output tensor: {:?}", e)))?;
        let candidates = self.decode(&output, frame.width, frame.height)?;

        let mut annotated = bgr;
        self.annotate(&mut annotated, &candidates)?;

        let boxes = candidates
            .iter()
            .map(|c| BoundingBox {
                x: c.rect.x as f32,
                y: c.rect.y as f32,
                width: c.rect.width as f32,
                height: c.rect.height as f32,
                label: self.label_for(c.class_id),
                confidence: c.confidence,
            })
            .collect();

        Ok(DetectionOutput {
            detections: Detections { boxes },
            annotated: frame_from_mat(&annotated)?,
        })
    }

    fn backend_name(&self) -> &'static str {
        "onnx-dnn"
    }
}
