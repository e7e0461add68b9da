//! マイク入力モジュール
//!
//! cpalの入力ストリームで常時キャプチャし、listen()呼び出しごとに
//! 有界の音声セグメントを切り出します。発話開始は振幅しきい値で判定します。

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::domain::{AudioSegment, AudioSourcePort, DomainError, DomainResult};

/// 発話開始とみなす振幅しきい値（16bit PCM）
const SPEECH_AMPLITUDE_THRESHOLD: i16 = 500;
/// 発話開始待ちのポーリング間隔
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// cpalマイクアダプター
///
/// ストリームは生成時に開始され、コールバックが共有バッファへ追記し続ける。
/// listen()はバッファを切り出すだけで、ストリームの再起動は行わない。
pub struct CpalMicrophoneAdapter {
    _stream: cpal::Stream,
    buffer: Arc<Mutex<Vec<i16>>>,
    sample_rate: u32,
    channels: u16,
}

// cpal::StreamはプラットフォームハンドルのためSendではないが、このアダプターは
// 生成後に単一の字幕スレッドでのみ使用され、ストリーム自体には触れない。
// バッファへのアクセスはMutexで保護されている。
unsafe impl Send for CpalMicrophoneAdapter {}

impl CpalMicrophoneAdapter {
    /// 既定の入力デバイスでキャプチャを開始する
    pub fn open_default() -> DomainResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| DomainError::Audio("no default input device".to_string()))?;

        let config = device
            .default_input_config()
            .map_err(|e| DomainError::Audio(format!("no input config: {}", e)))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();
        let sample_format = config.sample_format();

        tracing::info!(
            "Microphone '{}': {} Hz, {} ch, {:?}",
            device.name().unwrap_or_else(|_| "unknown".to_string()),
            sample_rate,
            channels,
            sample_format
        );

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let err_fn = |e| tracing::warn!("Audio stream error: {}", e);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => {
                let sink = buffer.clone();
                device
                    .build_input_stream(
                        &config.into(),
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            if let Ok(mut sink) = sink.lock() {
                                sink.extend(data.iter().map(|&s| {
                                    (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
                                }));
                            }
                        },
                        err_fn,
                        None,
                    )
                    .map_err(|e| DomainError::Audio(format!("stream build failed: {}", e)))?
            }
            cpal::SampleFormat::I16 => {
                let sink = buffer.clone();
                device
                    .build_input_stream(
                        &config.into(),
                        move |data: &[i16], _: &cpal::InputCallbackInfo| {
                            if let Ok(mut sink) = sink.lock() {
                                sink.extend_from_slice(data);
                            }
                        },
                        err_fn,
                        None,
                    )
                    .map_err(|e| DomainError::Audio(format!("stream build failed: {}", e)))?
            }
            other => {
                return Err(DomainError::Audio(format!(
                    "unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| DomainError::Audio(format!("stream start failed: {}", e)))?;

        Ok(Self {
            _stream: stream,
            buffer,
            sample_rate,
            channels,
        })
    }

    fn lock_buffer(&self) -> DomainResult<std::sync::MutexGuard<'_, Vec<i16>>> {
        self.buffer
            .lock()
            .map_err(|_| DomainError::Audio("audio buffer poisoned".to_string()))
    }

    /// バッファに発話相当の振幅が含まれるか
    fn has_speech(samples: &[i16]) -> bool {
        samples
            .iter()
            .any(|&s| s.saturating_abs() >= SPEECH_AMPLITUDE_THRESHOLD)
    }
}

impl AudioSourcePort for CpalMicrophoneAdapter {
    fn listen(
        &mut self,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> DomainResult<Option<AudioSegment>> {
        // 前回セグメント以降の残留データを破棄してから待つ
        self.lock_buffer()?.clear();

        let deadline = Instant::now() + timeout;
        loop {
            std::thread::sleep(POLL_INTERVAL);
            {
                let mut guard = self.lock_buffer()?;
                if Self::has_speech(&guard) {
                    break;
                }
                // 無音区間はセグメントに含めない
                guard.clear();
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
        }

        // 発話開始後はphrase_limitまで録り切る
        std::thread::sleep(phrase_limit);

        let samples = std::mem::take(&mut *self.lock_buffer()?);
        if samples.is_empty() {
            return Ok(None);
        }

        Ok(Some(AudioSegment {
            samples,
            sample_rate: self.sample_rate,
            channels: self.channels,
        }))
    }
}
