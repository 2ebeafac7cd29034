//! stdio 上の DAP サーバー

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::io::{BufRead, Write};
use vmdap_core::DebugSession;
use vmdap_protocol::{read_json_message, write_json_message, DebugEvent, Event, EventSink, Request, Response};

struct WriterState<W> {
    next_seq: u64,
    out: W,
}

/// 応答とイベントの送信側
///
/// プロトコルスレッドと VM スレッドの両方から書き込まれるため、seq の採番と書き込みを
/// 同じロックの下で行う。
pub struct ProtocolWriter<W: Write + Send> {
    state: Mutex<WriterState<W>>,
}

impl<W: Write + Send> ProtocolWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            state: Mutex::new(WriterState { next_seq: 1, out }),
        }
    }

    /// 応答に seq を振って送る
    pub fn send_response(&self, mut response: Response) -> Result<()> {
        let mut state = self.state.lock();
        response.seq = state.next_seq;
        state.next_seq += 1;
        write_json_message(&mut state.out, &response).context("failed to write response")
    }

    fn write_event(&self, event: &DebugEvent) -> Result<()> {
        let mut state = self.state.lock();
        let message = Event::new(state.next_seq, event.name(), event.body());
        state.next_seq += 1;
        write_json_message(&mut state.out, &message).context("failed to write event")
    }

    /// 書き込み先を取り出す
    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.state.into_inner().out
    }
}

impl<W: Write + Send> EventSink for ProtocolWriter<W> {
    fn send_event(&self, event: DebugEvent) {
        if let Err(err) = self.write_event(&event) {
            tracing::error!("dropping {} event: {:#}", event.name(), err);
        }
    }
}

/// 入力が尽きるか disconnect を受けるまでリクエストを処理する
pub fn serve<R: BufRead, W: Write + Send>(
    mut reader: R,
    session: &DebugSession,
    writer: &ProtocolWriter<W>,
) -> Result<()> {
    loop {
        let request: Request = match read_json_message(&mut reader) {
            Ok(Some(request)) => request,
            Ok(None) => {
                tracing::info!("client closed the stream");
                break;
            }
            Err(err) => return Err(err).context("failed to read request"),
        };

        tracing::debug!("request {} ({})", request.command, request.seq);
        let response = session.handle(&request);
        writer.send_response(response)?;
        session.after_response(&request);

        if session.is_terminated() {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::io::Cursor;
    use std::sync::Arc;
    use vmdap_bytecode::{ListingDecompiler, MemoryScriptLoader};
    use vmdap_core::{Debugger, DebuggerConfig};
    use vmdap_protocol::{read_raw_message, write_raw_message};
    use vmdap_target::{DeferredTaskQueue, SimVm};

    fn frame(message: Value) -> Vec<u8> {
        let mut out = Vec::new();
        write_raw_message(&mut out, &serde_json::to_vec(&message).unwrap()).unwrap();
        out
    }

    fn read_all(bytes: Vec<u8>) -> Vec<Value> {
        let mut reader = Cursor::new(bytes);
        let mut messages = Vec::new();
        while let Some(raw) = read_raw_message(&mut reader).unwrap() {
            messages.push(serde_json::from_slice(&raw).unwrap());
        }
        messages
    }

    #[test]
    fn test_writer_numbers_every_message() {
        let writer = ProtocolWriter::new(Vec::new());
        let request = Request::new(5, "threads", None);
        writer.send_response(Response::success(0, &request, None)).unwrap();
        writer.send_event(DebugEvent::Terminated);

        let messages = read_all(writer.into_inner());
        assert_eq!(messages[0]["seq"], json!(1));
        assert_eq!(messages[0]["request_seq"], json!(5));
        assert_eq!(messages[1]["seq"], json!(2));
        assert_eq!(messages[1]["event"], json!("terminated"));
    }

    #[test]
    fn test_serve_until_disconnect() {
        let writer = Arc::new(ProtocolWriter::new(Vec::new()));
        let debugger = Debugger::attach(
            Arc::new(SimVm::new()),
            Arc::new(DeferredTaskQueue::new()),
            writer.clone(),
            Arc::new(MemoryScriptLoader::new()),
            Arc::new(ListingDecompiler),
            DebuggerConfig::default(),
        );
        let session = DebugSession::new(debugger, writer.clone());

        let mut input = Vec::new();
        input.extend(frame(json!({"seq": 1, "type": "request", "command": "initialize"})));
        input.extend(frame(json!({"seq": 2, "type": "request", "command": "threads"})));
        input.extend(frame(json!({"seq": 3, "type": "request", "command": "disconnect"})));
        input.extend(frame(json!({"seq": 4, "type": "request", "command": "threads"})));

        serve(Cursor::new(input), &session, &writer).unwrap();
        drop(session);

        let writer = Arc::try_unwrap(writer).ok().unwrap();
        let messages = read_all(writer.into_inner());
        let kinds: Vec<String> = messages
            .iter()
            .map(|m| {
                m["command"]
                    .as_str()
                    .or_else(|| m["event"].as_str())
                    .unwrap()
                    .to_string()
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["initialize", "initialized", "threads", "disconnect", "terminated"]
        );
        assert_eq!(messages[2]["body"]["threads"], json!([]));
    }
}
