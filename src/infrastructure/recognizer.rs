//! 音声認識モジュール
//!
//! 音声セグメントをWAVにエンコードし、OpenAI互換の転写APIへ
//! multipartで送信してテキストを得ます。

use std::io::Cursor;
use std::time::Duration;

use reqwest::blocking::multipart;
use serde::Deserialize;

use crate::domain::{AudioSegment, DomainError, DomainResult, RecognizerPort, SubtitleConfig};

/// APIリクエストのタイムアウト
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// 転写APIのレスポンス
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// クラウド転写APIアダプター
pub struct CloudRecognizerAdapter {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    language: Option<String>,
    api_key: String,
}

impl CloudRecognizerAdapter {
    /// 設定からアダプターを構築する
    ///
    /// APIキーは設定された環境変数から読む。未設定なら起動時エラーにする
    /// （実行中に毎サイクル失敗し続けるより早い段階で分かる方がよい）。
    pub fn from_config(config: &SubtitleConfig) -> DomainResult<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            DomainError::Configuration(format!(
                "environment variable '{}' is not set",
                config.api_key_env
            ))
        })?;

        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DomainError::Recognition(format!("client build failed: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            language: config.language.clone(),
            api_key,
        })
    }

    /// セグメントをWAV（PCM 16bit）へエンコードする
    fn encode_wav(segment: &AudioSegment) -> DomainResult<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: segment.channels,
            sample_rate: segment.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| DomainError::Recognition(format!("WAV encode failed: {}", e)))?;
            for &sample in &segment.samples {
                writer
                    .write_sample(sample)
                    .map_err(|e| DomainError::Recognition(format!("WAV encode failed: {}", e)))?;
            }
            writer
                .finalize()
                .map_err(|e| DomainError::Recognition(format!("WAV encode failed: {}", e)))?;
        }
        Ok(cursor.into_inner())
    }
}

impl RecognizerPort for CloudRecognizerAdapter {
    fn recognize(&mut self, segment: &AudioSegment) -> DomainResult<Option<String>> {
        let wav = Self::encode_wav(segment)?;
        tracing::debug!(
            "Sending {:.2}s segment ({} bytes) for transcription",
            segment.duration_secs(),
            wav.len()
        );

        let file_part = multipart::Part::bytes(wav)
            .file_name("segment.wav")
            .mime_str("audio/wav")
            .map_err(|e| DomainError::Recognition(format!("multipart build failed: {}", e)))?;

        let mut form = multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone());
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .map_err(|e| DomainError::Recognition(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(DomainError::Recognition(format!(
                "service returned {}: {}",
                status, body
            )));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .map_err(|e| DomainError::Recognition(format!("invalid response: {}", e)))?;

        let text = parsed.text.trim().to_string();
        if text.is_empty() {
            // 認識はできたが中身がない（無音や非発話音）
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_wav_header_and_size() {
        let segment = AudioSegment {
            samples: vec![0i16; 160],
            sample_rate: 16000,
            channels: 1,
        };

        let wav = CloudRecognizerAdapter::encode_wav(&segment).unwrap();
        // RIFFヘッダ44バイト + 16bitサンプル
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(wav.len(), 44 + 160 * 2);
    }

    #[test]
    fn test_encode_wav_roundtrip_spec() {
        let segment = AudioSegment {
            samples: vec![1000, -1000, 2000, -2000],
            sample_rate: 44100,
            channels: 2,
        };

        let wav = CloudRecognizerAdapter::encode_wav(&segment).unwrap();
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.bits_per_sample, 16);
    }

    #[test]
    fn test_missing_api_key_env_is_configuration_error() {
        let config = SubtitleConfig {
            api_key_env: "BIG_KAHUNA_TEST_KEY_THAT_DOES_NOT_EXIST".to_string(),
            ..Default::default()
        };

        let result = CloudRecognizerAdapter::from_config(&config);
        assert!(matches!(result, Err(DomainError::Configuration(_))));
    }
}
