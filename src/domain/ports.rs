/// Port定義（Clean Architectureのインターフェース）
///
/// Domain層が外部実装に依存するための抽象trait。
/// Infrastructure層がこれらを実装し、Application層がDIで注入する。

use std::time::Duration;

use crate::domain::{AudioSegment, DetectionOutput, DomainResult, Frame, Overlay};

/// デバイス情報
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub index: i32,
    pub width: u32,
    pub height: u32,
    pub name: String,
}

/// カメラポート: フレームの取得を抽象化
///
/// 読み取り失敗はループの終端条件であり、再試行しない。
pub trait CameraPort {
    /// 1フレームを読み取る
    ///
    /// # Returns
    /// - `Ok(Frame)`: フレームの取得成功
    /// - `Err(DomainError::FrameRead)`: 読み取り失敗（呼び出し側はループを終了する）
    fn read_frame(&mut self) -> DomainResult<Frame>;

    /// カメラデバイスの情報を取得
    fn device_info(&self) -> DeviceInfo;

    /// デバイスハンドルを解放
    ///
    /// Viewerのクリーンアップパスから必ず1回だけ呼ばれる。
    fn release(&mut self) -> DomainResult<()>;
}

/// デバイス探索の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// オープンと1フレーム読み取りの両方に成功
    Live,
    /// オープンに失敗
    OpenFailed,
    /// オープンは成功したが読み取りに失敗
    ReadFailed,
}

/// 探索ポート: インデックス指定のデバイス生存確認を抽象化
///
/// 実装は結果にかかわらずハンドルを解放すること。
pub trait ProbePort {
    /// 指定インデックスのデバイスを開き、1フレーム読んで生存確認する
    fn probe(&mut self, index: i32) -> ProbeOutcome;
}

/// 検出ポート: 物体検出を抽象化
///
/// 事前学習モデルでもルールベースでも、この契約を満たせば差し替え可能。
pub trait DetectorPort {
    /// フレームを処理して検出結果と注釈済みフレームを返す
    ///
    /// # Returns
    /// - `Ok(DetectionOutput)`: 検出結果（検出0件でも注釈済みフレームは返る）
    /// - `Err(DomainError::Detection)`: 処理エラー（呼び出し側は生フレームに縮退）
    fn detect(&mut self, frame: &Frame) -> DomainResult<DetectionOutput>;

    /// 検出バックエンドの名称（ログ用）
    fn backend_name(&self) -> &'static str;
}

/// 表示ポート: ウィンドウ表示とキー入力ポーリングを抽象化
pub trait DisplayPort {
    /// オーバーレイを重ねたフレームを表示する
    ///
    /// オーバーレイの各行はフレーム上に描画される。行が空なら描画呼び出しは発生しない。
    fn show(&mut self, frame: &Frame, overlay: &Overlay) -> DomainResult<()>;

    /// 有界の待ち時間でキー入力をポーリングする
    ///
    /// # Returns
    /// - `Ok(Some(code))`: キーが押された（ASCIIコード）
    /// - `Ok(None)`: タイムアウト（入力なし）
    fn poll_key(&mut self, timeout: Duration) -> DomainResult<Option<i32>>;

    /// ウィンドウを閉じる
    ///
    /// Viewerのクリーンアップパスから必ず1回だけ呼ばれる。
    fn close(&mut self) -> DomainResult<()>;
}

/// 音声入力ポート: 有界の音声セグメント取得を抽象化
pub trait AudioSourcePort {
    /// 短い音声セグメントを取得する
    ///
    /// # Arguments
    /// - `timeout`: 発話開始を待つ最大時間
    /// - `phrase_limit`: 1セグメントの最大長
    ///
    /// # Returns
    /// - `Ok(Some(segment))`: 音声を取得
    /// - `Ok(None)`: タイムアウト（発話なし）
    /// - `Err(DomainError::Audio)`: キャプチャエラー
    fn listen(&mut self, timeout: Duration, phrase_limit: Duration) -> DomainResult<Option<AudioSegment>>;
}

/// 音声認識ポート: クラウド認識APIを抽象化
pub trait RecognizerPort {
    /// 音声セグメントをテキストに変換する
    ///
    /// # Returns
    /// - `Ok(Some(text))`: 認識成功
    /// - `Ok(None)`: 聞き取り不能（ローカルでは空文字列として扱う）
    /// - `Err(DomainError::Recognition)`: サービスエラー（ローカルでは空文字列に縮退）
    fn recognize(&mut self, segment: &AudioSegment) -> DomainResult<Option<String>>;
}

/// 配信制御ポート: リモート制御API（OBS WebSocket）を抽象化
pub trait StreamControlPort {
    /// 制御エンドポイントへ接続する（必要なら認証も行う）
    fn connect(&mut self) -> DomainResult<()>;

    /// シーンを名前で切り替える
    fn select_scene(&mut self, name: &str) -> DomainResult<()>;

    /// 配信を開始する
    fn start_stream(&mut self) -> DomainResult<()>;

    /// 配信を停止する
    fn stop_stream(&mut self) -> DomainResult<()>;

    /// 切断する
    ///
    /// 接続や各コマンドが失敗していても、クリーンアップとして必ず1回試行される。
    fn disconnect(&mut self) -> DomainResult<()>;
}
