//! DAP セッション
//!
//! リクエストを `Command` にパースして `Debugger` の操作に振り分け、応答を組み立てる。
//! エラーはすべてエラー応答に変換し、セッションを止めない。

use crate::command::Command;
use crate::debugger::Debugger;
use crate::errors::DebugError;
use crate::Result;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use vmdap_protocol::{
    ContinueResponseBody, DebugEvent, EventSink, LoadedSourcesResponseBody, Request, Response,
    ScopesResponseBody, SourceResponseBody, StackTraceResponseBody, ThreadsResponseBody,
    VariablesResponseBody,
};

/// DAP セッション
pub struct DebugSession {
    debugger: Arc<Debugger>,
    sink: Arc<dyn EventSink>,
    terminated: AtomicBool,
}

impl DebugSession {
    pub fn new(debugger: Arc<Debugger>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            debugger,
            sink,
            terminated: AtomicBool::new(false),
        }
    }

    pub fn debugger(&self) -> &Arc<Debugger> {
        &self.debugger
    }

    /// disconnect を処理済みかどうか
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// リクエストを処理して応答を返す
    ///
    /// 応答の seq は 0 のまま返す。採番は送信側で行う。
    pub fn handle(&self, request: &Request) -> Response {
        match self.dispatch(request) {
            Ok(body) => Response::success(0, request, body),
            Err(err) => {
                tracing::warn!("{} failed: {}", request.command, err);
                Response::error(0, request, err.to_string())
            }
        }
    }

    /// 応答を送った後に出すイベント
    pub fn after_response(&self, request: &Request) {
        match request.command.as_str() {
            "initialize" => self.sink.send_event(DebugEvent::Initialized),
            "disconnect" => self.sink.send_event(DebugEvent::Terminated),
            _ => {}
        }
    }

    fn dispatch(&self, request: &Request) -> Result<Option<Value>> {
        let debugger = &self.debugger;

        match Command::parse(request)? {
            Command::Initialize => body(&debugger.capabilities()),
            Command::Launch | Command::Attach | Command::ConfigurationDone => Ok(None),
            Command::SetBreakpoints(args) => body(&debugger.set_breakpoints(&args)?),
            Command::Threads => body(&ThreadsResponseBody {
                threads: debugger.threads(),
            }),
            Command::StackTrace(args) => {
                let (stack_frames, total) = debugger.stack_trace(
                    args.thread_id,
                    non_negative(args.start_frame),
                    non_negative(args.levels),
                )?;
                body(&StackTraceResponseBody {
                    stack_frames,
                    total_frames: total as i64,
                })
            }
            Command::Scopes(args) => body(&ScopesResponseBody {
                scopes: debugger.scopes(args.frame_id)?,
            }),
            Command::Variables(args) => body(&VariablesResponseBody {
                variables: debugger.variables(
                    args.variables_reference,
                    non_negative(args.start),
                    non_negative(args.count),
                )?,
            }),
            Command::Source(args) => body(&SourceResponseBody {
                content: debugger.source(&args)?,
                mime_type: Some("text/x-papyrus".to_string()),
            }),
            Command::LoadedSources => body(&LoadedSourcesResponseBody {
                sources: debugger.loaded_sources(),
            }),
            Command::Continue(_) => {
                debugger.continue_execution();
                body(&ContinueResponseBody {
                    all_threads_continued: true,
                })
            }
            Command::Pause(_) => {
                debugger.pause()?;
                Ok(None)
            }
            Command::Step(args, kind) => {
                debugger.step(args.thread_id, kind)?;
                Ok(None)
            }
            Command::Disconnect(_) => {
                debugger.disconnect();
                self.terminated.store(true, Ordering::SeqCst);
                Ok(None)
            }
            Command::Unsupported(command) => Err(DebugError::Unsupported(command)),
        }
    }
}

fn body<T: Serialize>(value: &T) -> Result<Option<Value>> {
    Ok(Some(serde_json::to_value(value)?))
}

fn non_negative(value: Option<i64>) -> usize {
    value.and_then(|v| usize::try_from(v).ok()).unwrap_or(0)
}
