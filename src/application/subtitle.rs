//! 字幕生成モジュール
//!
//! バックグラウンドスレッドで短い音声セグメントを取得し、認識APIに送り、
//! 結果テキストを単一スロットに発行します。表示ループとはスロット経由でのみ
//! 共有され、キューもバックプレッシャーも持ちません。

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::domain::{AudioSourcePort, RecognizerPort};

/// 字幕テキストの共有スロット
///
/// 単一スロットのlast-write-wins。読み手は「直近に完了した認識結果」を見る。
/// 表示専用の短い文字列であり、古い値が1サイクル見えることは設計上許容する
/// （偽りの同期保証は導入しない）。
#[derive(Debug, Clone, Default)]
pub struct SubtitleSlot {
    inner: Arc<Mutex<String>>,
}

impl SubtitleSlot {
    /// 空のスロットを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 現在の字幕テキストを読む（未認識なら空文字列）
    pub fn read(&self) -> String {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            // 書き手がパニックした場合でも表示ループは止めない
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// 字幕テキストを上書き発行する
    pub fn publish(&self, text: impl Into<String>) {
        let text = text.into();
        match self.inner.lock() {
            Ok(mut guard) => *guard = text,
            Err(poisoned) => *poisoned.into_inner() = text,
        }
    }
}

/// 字幕生成器
///
/// 音声入力と認識APIをポート経由で受け取り、無限ループで回す。
/// 認識サービスのエラーは捕捉・ログして「このサイクルは字幕なし」に縮退する。
pub struct SubtitleProducer<A, R>
where
    A: AudioSourcePort,
    R: RecognizerPort,
{
    audio: A,
    recognizer: R,
    slot: SubtitleSlot,
    listen_timeout: Duration,
    phrase_limit: Duration,
}

impl<A, R> SubtitleProducer<A, R>
where
    A: AudioSourcePort + Send + 'static,
    R: RecognizerPort + Send + 'static,
{
    /// 新しいSubtitleProducerを作成
    pub fn new(
        audio: A,
        recognizer: R,
        slot: SubtitleSlot,
        listen_timeout: Duration,
        phrase_limit: Duration,
    ) -> Self {
        Self {
            audio,
            recognizer,
            slot,
            listen_timeout,
            phrase_limit,
        }
    }

    /// バックグラウンドスレッドとして起動する
    ///
    /// スレッドはプロセス終了まで回り続ける（明示的なキャンセルプロトコルはない）。
    /// 返されたハンドルをjoinする必要はない。
    pub fn spawn(self) -> JoinHandle<()> {
        std::thread::spawn(move || {
            tracing::info!("Subtitle producer started");
            self.run();
        })
    }

    /// 無限ループ本体
    fn run(mut self) {
        loop {
            self.cycle();
        }
    }

    /// 1サイクル: 音声取得 → 認識 → スロット発行
    ///
    /// すべての非成功ケースは空文字列の発行に落ちる。エラーで抜けることはない。
    fn cycle(&mut self) {
        let segment = match self.audio.listen(self.listen_timeout, self.phrase_limit) {
            Ok(Some(segment)) => segment,
            Ok(None) => {
                // 発話なし（タイムアウト）
                self.slot.publish("");
                return;
            }
            Err(e) => {
                tracing::warn!("Audio capture error: {}", e);
                self.slot.publish("");
                // キャプチャ障害の連打でビジーループにならないよう小休止
                std::thread::sleep(Duration::from_millis(200));
                return;
            }
        };

        match self.recognizer.recognize(&segment) {
            Ok(Some(text)) => {
                tracing::debug!("Recognized: {}", text);
                self.slot.publish(text);
            }
            Ok(None) => {
                // 聞き取り不能
                self.slot.publish("");
            }
            Err(e) => {
                tracing::warn!("Speech recognition error: {}", e);
                self.slot.publish("");
            }
        }
    }
}
