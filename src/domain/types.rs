/// コア型定義
///
/// Domain層の中心となるデータ構造。
/// すべての処理で共有される不変の型。

use std::time::Instant;

/// 検出されたカメラデバイスの記述子
///
/// Locatorが実行のたびに再構築する。永続化はしない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDescriptor {
    /// デバイスインデックス（OpenCVのVideoCapture番号）
    pub index: i32,
    /// 表示名
    pub name: String,
}

impl CameraDescriptor {
    /// 新しいデバイス記述子を作成
    pub fn new(index: i32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

/// キャプチャされたフレームデータ
#[derive(Debug, Clone)]
pub struct Frame {
    /// フレーム取得時刻
    pub timestamp: Instant,
    /// フレーム画像データ（BGR形式、連続メモリ）
    pub data: Vec<u8>,
    /// 画像の幅
    pub width: u32,
    /// 画像の高さ
    pub height: u32,
}

impl Frame {
    /// 新しいフレームを作成
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            timestamp: Instant::now(),
            data,
            width,
            height,
        }
    }
}

/// 検出された1つのバウンディングボックス
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    /// 左上X座標（ピクセル）
    pub x: f32,
    /// 左上Y座標（ピクセル）
    pub y: f32,
    /// 幅（ピクセル）
    pub width: f32,
    /// 高さ（ピクセル）
    pub height: f32,
    /// クラスラベル
    pub label: String,
    /// 信頼度 [0.0-1.0]
    pub confidence: f32,
}

/// 1フレーム分の検出結果
///
/// Detectorの出力。最低限「数えられる」ことだけを要求する。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detections {
    pub boxes: Vec<BoundingBox>,
}

impl Detections {
    /// 検出なしの結果を作成
    pub fn none() -> Self {
        Self { boxes: Vec::new() }
    }

    /// 検出数を取得
    pub fn count(&self) -> usize {
        self.boxes.len()
    }
}

/// Detectorの出力: 検出結果と注釈済みフレームの組
#[derive(Debug, Clone)]
pub struct DetectionOutput {
    /// 検出結果
    pub detections: Detections,
    /// バウンディングボックス描画済みのフレーム
    pub annotated: Frame,
}

/// オーバーレイテキストの色（BGR）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayColor {
    pub b: u8,
    pub g: u8,
    pub r: u8,
}

impl OverlayColor {
    /// FPS・検出数表示用の緑
    pub const GREEN: Self = Self { b: 0, g: 255, r: 0 };
    /// 字幕表示用の黄
    pub const YELLOW: Self = Self { b: 0, g: 255, r: 255 };
}

/// オーバーレイの1行テキスト
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    /// 描画テキスト
    pub text: String,
    /// 描画位置（左下基準、ピクセル）
    pub position: (i32, i32),
    /// 色
    pub color: OverlayColor,
}

/// 1フレームに重ねるオーバーレイ
///
/// 毎イテレーション再計算される一時的な値。
/// Viewer側で構成し、Display側で描画する。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    pub lines: Vec<TextLine>,
}

impl Overlay {
    pub fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// テキスト行を追加
    pub fn push(&mut self, text: impl Into<String>, position: (i32, i32), color: OverlayColor) {
        self.lines.push(TextLine {
            text: text.into(),
            position,
            color,
        });
    }
}

/// HSV色空間のレンジ（OpenCV準拠: H[0-180], S[0-255], V[0-255]）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvRange {
    pub h_min: u8,
    pub h_max: u8,
    pub s_min: u8,
    pub s_max: u8,
    pub v_min: u8,
    pub v_max: u8,
}

impl HsvRange {
    /// 新しいHSVレンジを作成
    pub fn new(h_min: u8, h_max: u8, s_min: u8, s_max: u8, v_min: u8, v_max: u8) -> Self {
        Self {
            h_min,
            h_max,
            s_min,
            s_max,
            v_min,
            v_max,
        }
    }

    /// OpenCVのScalar形式で下限を取得 [H, S, V]
    pub fn lower_bound(&self) -> [u8; 3] {
        [self.h_min, self.s_min, self.v_min]
    }

    /// OpenCVのScalar形式で上限を取得 [H, S, V]
    pub fn upper_bound(&self) -> [u8; 3] {
        [self.h_max, self.s_max, self.v_max]
    }
}

/// マイクから取得した音声セグメント
#[derive(Debug, Clone)]
pub struct AudioSegment {
    /// PCMサンプル（16bit signed、チャンネルインターリーブ）
    pub samples: Vec<i16>,
    /// サンプリングレート（Hz）
    pub sample_rate: u32,
    /// チャンネル数
    pub channels: u16,
}

impl AudioSegment {
    /// セグメントの長さ（秒）
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}
