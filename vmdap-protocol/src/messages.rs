//! DAP メッセージのエンベロープ

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// クライアントからのリクエスト
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub seq: u64,
    #[serde(rename = "type")]
    pub type_: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

impl Request {
    /// リクエストを作成する
    pub fn new(seq: u64, command: impl Into<String>, arguments: Option<Value>) -> Self {
        Self {
            seq,
            type_: "request".to_string(),
            command: command.into(),
            arguments,
        }
    }
}

/// リクエストへの応答
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub seq: u64,
    #[serde(rename = "type")]
    pub type_: &'static str,
    pub request_seq: u64,
    pub success: bool,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Response {
    /// 成功応答を作成する
    pub fn success(seq: u64, request: &Request, body: Option<Value>) -> Self {
        Self {
            seq,
            type_: "response",
            request_seq: request.seq,
            success: true,
            command: request.command.clone(),
            message: None,
            body,
        }
    }

    /// エラー応答を作成する
    ///
    /// DAP クライアントは `body.error.format` を表示に使うため、メッセージを両方に入れる。
    pub fn error(seq: u64, request: &Request, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            seq,
            type_: "response",
            request_seq: request.seq,
            success: false,
            command: request.command.clone(),
            body: Some(serde_json::json!({
                "error": { "id": 1, "format": message.clone(), "showUser": true }
            })),
            message: Some(message),
        }
    }
}

/// 非同期イベント
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub seq: u64,
    #[serde(rename = "type")]
    pub type_: &'static str,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Event {
    /// イベントを作成する
    pub fn new(seq: u64, event: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            seq,
            type_: "event",
            event: event.into(),
            body,
        }
    }
}
