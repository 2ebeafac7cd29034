//! DAP リクエストからデバッガコマンドへの変換

use crate::errors::DebugError;
use crate::execution::StepKind;
use crate::Result;
use serde::de::DeserializeOwned;
use vmdap_protocol::{
    DisconnectArguments, Request, ScopesArguments, SetBreakpointsArguments, SourceArguments,
    StackTraceArguments, ThreadArguments, VariablesArguments,
};

/// デバッガコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 初期化
    Initialize,
    /// launch / attach（どちらも既に VM に接続しているので応答だけ返す）
    Launch,
    Attach,
    ConfigurationDone,
    /// ブレークポイントを設定
    SetBreakpoints(SetBreakpointsArguments),
    /// スレッド一覧
    Threads,
    /// スタックトレース
    StackTrace(StackTraceArguments),
    Scopes(ScopesArguments),
    Variables(VariablesArguments),
    /// 逆コンパイルしたソース
    Source(SourceArguments),
    LoadedSources,
    /// 実行継続
    Continue(ThreadArguments),
    /// 一時停止
    Pause(ThreadArguments),
    /// ステップ実行（next / stepIn / stepOut）
    Step(ThreadArguments, StepKind),
    /// 切断
    Disconnect(DisconnectArguments),
    /// 対応していないリクエスト
    Unsupported(String),
}

impl Command {
    /// リクエストをパースする
    pub fn parse(request: &Request) -> Result<Self> {
        let command = match request.command.as_str() {
            "initialize" => Command::Initialize,
            "launch" => Command::Launch,
            "attach" => Command::Attach,
            "configurationDone" => Command::ConfigurationDone,
            "setBreakpoints" => Command::SetBreakpoints(required(request)?),
            "threads" => Command::Threads,
            "stackTrace" => Command::StackTrace(required(request)?),
            "scopes" => Command::Scopes(required(request)?),
            "variables" => Command::Variables(required(request)?),
            "source" => Command::Source(required(request)?),
            "loadedSources" => Command::LoadedSources,
            "continue" => Command::Continue(optional(request)?),
            "pause" => Command::Pause(optional(request)?),
            "next" => Command::Step(required(request)?, StepKind::Over),
            "stepIn" => Command::Step(required(request)?, StepKind::In),
            "stepOut" => Command::Step(required(request)?, StepKind::Out),
            "disconnect" => Command::Disconnect(optional(request)?),
            "evaluate" | "setVariable" | "setFunctionBreakpoints" | "setExceptionBreakpoints" => {
                Command::Unsupported(request.command.clone())
            }
            other => return Err(DebugError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}

/// 引数が必須のリクエスト
fn required<T: DeserializeOwned>(request: &Request) -> Result<T> {
    let arguments = request
        .arguments
        .clone()
        .ok_or_else(|| DebugError::InvalidArguments {
            command: request.command.clone(),
            message: "missing arguments".to_string(),
        })?;
    decode(request, arguments)
}

/// 引数を省略できるリクエスト
fn optional<T: DeserializeOwned + Default>(request: &Request) -> Result<T> {
    match request.arguments.clone() {
        Some(arguments) => decode(request, arguments),
        None => Ok(T::default()),
    }
}

fn decode<T: DeserializeOwned>(request: &Request, arguments: serde_json::Value) -> Result<T> {
    serde_json::from_value(arguments).map_err(|err| DebugError::InvalidArguments {
        command: request.command.clone(),
        message: err.to_string(),
    })
}
