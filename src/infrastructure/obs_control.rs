//! OBS WebSocket制御アダプタ
//!
//! obs-websocketプロトコル（4.x系、既定ポート4444）のクライアント実装。
//! 認証はGetAuthRequiredで取得したsaltとchallengeから
//! base64(sha256(base64(sha256(password + salt)) + challenge)) を計算して行います。

use std::net::TcpStream;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::domain::{ControlConfig, DomainError, DomainResult, StreamControlPort};

/// 4.x系の認証レスポンスを計算する
fn auth_response(password: &str, salt: &str, challenge: &str) -> String {
    let secret_hash = Sha256::digest(format!("{}{}", password, salt).as_bytes());
    let secret = BASE64.encode(secret_hash);
    let auth_hash = Sha256::digest(format!("{}{}", secret, challenge).as_bytes());
    BASE64.encode(auth_hash)
}

/// OBS WebSocketアダプタ
pub struct ObsWebSocketAdapter {
    url: String,
    password: String,
    socket: Option<WebSocket<MaybeTlsStream<TcpStream>>>,
    next_id: u64,
}

impl ObsWebSocketAdapter {
    /// 設定からアダプタを構築する（接続はconnect()まで行わない）
    pub fn from_config(config: &ControlConfig) -> Self {
        Self {
            url: format!("ws://{}:{}", config.host, config.port),
            password: config.password.clone(),
            socket: None,
            next_id: 1,
        }
    }

    /// リクエストを送り、対応するレスポンスを待つ
    ///
    /// obs-websocketは非同期にイベントも流してくるため、message-idが一致する
    /// メッセージが来るまで読み飛ばす。
    fn request(&mut self, request_type: &str, mut fields: Value) -> DomainResult<Value> {
        let message_id = self.next_id.to_string();
        self.next_id += 1;

        let socket = self.socket.as_mut().ok_or_else(|| {
            DomainError::ControlConnection("not connected".to_string())
        })?;

        let body = fields
            .as_object_mut()
            .ok_or_else(|| DomainError::ControlCommand {
                command: request_type.to_string(),
                reason: "request fields must be an object".to_string(),
            })?;
        body.insert("request-type".to_string(), json!(request_type));
        body.insert("message-id".to_string(), json!(message_id));

        socket
            .send(Message::Text(fields.to_string()))
            .map_err(|e| DomainError::ControlCommand {
                command: request_type.to_string(),
                reason: format!("send failed: {}", e),
            })?;

        loop {
            let message = socket.read().map_err(|e| DomainError::ControlCommand {
                command: request_type.to_string(),
                reason: format!("read failed: {}", e),
            })?;

            let text = match message {
                Message::Text(text) => text,
                // PingはtungsteniteがPongを自動返送する
                _ => continue,
            };

            let parsed: Value =
                serde_json::from_str(&text).map_err(|e| DomainError::ControlCommand {
                    command: request_type.to_string(),
                    reason: format!("invalid response: {}", e),
                })?;

            // イベント等、このリクエストへの応答でないものは読み飛ばす
            if parsed.get("message-id").and_then(Value::as_str) != Some(message_id.as_str()) {
                continue;
            }

            let status = parsed.get("status").and_then(Value::as_str).unwrap_or("");
            if status != "ok" {
                let reason = parsed
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                return Err(DomainError::ControlCommand {
                    command: request_type.to_string(),
                    reason,
                });
            }

            return Ok(parsed);
        }
    }

    /// GetAuthRequiredの結果に従って認証する
    fn authenticate(&mut self) -> DomainResult<()> {
        let auth_info = self
            .request("GetAuthRequired", json!({}))
            .map_err(|e| DomainError::ControlConnection(format!("auth query failed: {}", e)))?;

        let required = auth_info
            .get("authRequired")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !required {
            return Ok(());
        }

        let salt = auth_info
            .get("salt")
            .and_then(Value::as_str)
            .ok_or_else(|| DomainError::ControlConnection("missing auth salt".to_string()))?;
        let challenge = auth_info
            .get("challenge")
            .and_then(Value::as_str)
            .ok_or_else(|| DomainError::ControlConnection("missing auth challenge".to_string()))?;

        let auth = auth_response(&self.password, salt, challenge);
        self.request("Authenticate", json!({ "auth": auth }))
            .map_err(|e| DomainError::ControlConnection(format!("authentication failed: {}", e)))?;

        tracing::info!("Authenticated with OBS");
        Ok(())
    }
}

impl StreamControlPort for ObsWebSocketAdapter {
    fn connect(&mut self) -> DomainResult<()> {
        tracing::info!("Connecting to {}", self.url);
        let (socket, _response) = tungstenite::connect(self.url.as_str())
            .map_err(|e| DomainError::ControlConnection(format!("{}", e)))?;
        self.socket = Some(socket);

        self.authenticate().inspect_err(|_| {
            self.socket = None;
        })
    }

    fn select_scene(&mut self, name: &str) -> DomainResult<()> {
        self.request("SetCurrentScene", json!({ "scene-name": name }))?;
        Ok(())
    }

    fn start_stream(&mut self) -> DomainResult<()> {
        self.request("StartStreaming", json!({}))?;
        Ok(())
    }

    fn stop_stream(&mut self) -> DomainResult<()> {
        self.request("StopStreaming", json!({}))?;
        Ok(())
    }

    fn disconnect(&mut self) -> DomainResult<()> {
        let Some(mut socket) = self.socket.take() else {
            // 未接続でも切断の試行自体は成功扱い
            return Ok(());
        };
        socket
            .close(None)
            .map_err(|e| DomainError::ControlConnection(format!("close failed: {}", e)))
    }
}
