//! デバッガのメインロジック
//!
//! VM への購読、各コンポーネントの組み立て、DAP リクエストに対応する操作を提供する。

use crate::breakpoint::BreakpointManager;
use crate::config::DebuggerConfig;
use crate::errors::DebugError;
use crate::execution::{DebuggerState, ExecutionController, StepKind};
use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use vmdap_bytecode::{normalize_script_name, BytecodeCache, Decompiler, ScriptLoader};
use vmdap_protocol::{
    Capabilities, DebugEvent, EventSink, LoadedSourceReason, Scope, SetBreakpointsArguments,
    SetBreakpointsResponseBody, Source, SourceArguments, StackFrame, Thread, ThreadReason,
    Variable,
};
use vmdap_state::{HandleAllocator, RuntimeState};
use vmdap_target::{LogEvent, RuntimeObserver, StackId, TaskQueue, Tasklet, VirtualMachine};

/// デバッガ
pub struct Debugger {
    /// デバッグ対象の VM
    vm: Arc<dyn VirtualMachine>,
    /// ホストのタスクキュー
    tasks: Arc<dyn TaskQueue>,
    /// イベントの送出先
    sink: Arc<dyn EventSink>,
    /// スクリプトバイナリのキャッシュ
    cache: Arc<BytecodeCache>,
    /// ブレークポイント管理
    breakpoints: Arc<BreakpointManager>,
    /// 実行制御
    execution: Arc<ExecutionController>,
    /// 状態ツリーのハンドル管理
    state: RuntimeState,
    config: DebuggerConfig,
    /// VM に購読者を登録しているか
    attached: AtomicBool,
}

impl Debugger {
    /// VM にアタッチしてデバッガを作成する
    ///
    /// スクリプトキャッシュを空にした状態から始め、VM の実行時イベントを購読する。
    pub fn attach(
        vm: Arc<dyn VirtualMachine>,
        tasks: Arc<dyn TaskQueue>,
        sink: Arc<dyn EventSink>,
        loader: Arc<dyn ScriptLoader>,
        decompiler: Arc<dyn Decompiler>,
        config: DebuggerConfig,
    ) -> Arc<Self> {
        let ids = Arc::new(HandleAllocator::new());
        let cache = Arc::new(BytecodeCache::new(loader, decompiler));
        cache.clear();

        let breakpoints = Arc::new(BreakpointManager::new(cache.clone(), ids.clone(), sink.clone()));
        let execution = Arc::new(ExecutionController::new(
            vm.clone(),
            breakpoints.clone(),
            sink.clone(),
            config.poll_interval,
        ));

        let debugger = Arc::new(Self {
            vm: vm.clone(),
            tasks,
            sink,
            cache,
            breakpoints,
            execution,
            state: RuntimeState::new(ids),
            config,
            attached: AtomicBool::new(true),
        });

        vm.set_observer(Some(Arc::new(DebuggerObserver {
            debugger: Arc::downgrade(&debugger),
        })));
        tracing::info!("debugger attached");
        debugger
    }

    /// 対応機能
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_configuration_done_request: true,
            supports_loaded_sources_request: true,
            ..Capabilities::default()
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    pub fn cache(&self) -> &Arc<BytecodeCache> {
        &self.cache
    }

    pub fn breakpoints(&self) -> &Arc<BreakpointManager> {
        &self.breakpoints
    }

    /// 現在の実行状態
    pub fn state(&self) -> DebuggerState {
        self.execution.state()
    }

    /// ブレークポイントを設定する
    pub fn set_breakpoints(&self, args: &SetBreakpointsArguments) -> Result<SetBreakpointsResponseBody> {
        let (_, breakpoints) = self
            .breakpoints
            .set_breakpoints(&args.source, &args.requested_lines())?;
        Ok(SetBreakpointsResponseBody { breakpoints })
    }

    /// 実行中のスレッド一覧
    ///
    /// フレームを持たないスタックは含めない。
    pub fn threads(&self) -> Vec<Thread> {
        let _running = self.vm.running_stacks_lock().lock();

        self.vm
            .stack_ids()
            .into_iter()
            .filter_map(|id| self.state.resolve_by_path(self.vm.as_ref(), &id.0.to_string()).ok())
            .filter_map(|resolved| {
                resolved
                    .node
                    .as_stack()
                    .filter(|node| node.stack.top().is_some())
                    .map(|node| node.serialize_thread())
            })
            .collect()
    }

    /// スタックトレースを取得する
    ///
    /// `levels` が 0 なら `start` 以降をすべて返す。戻り値の 2 番目は総フレーム数。
    pub fn stack_trace(&self, thread_id: i64, start: usize, levels: usize) -> Result<(Vec<StackFrame>, usize)> {
        let _running = self.vm.running_stacks_lock().lock();

        let frames = self
            .state
            .resolve_children_by_path(self.vm.as_ref(), &thread_id.to_string())?;
        let total = frames.len();
        let levels = if levels == 0 { total } else { levels };

        let stack_frames = frames
            .iter()
            .skip(start)
            .take(levels)
            .filter_map(|resolved| {
                resolved
                    .node
                    .as_frame()
                    .map(|frame| frame.serialize_stack_frame(resolved.handle, &self.cache))
            })
            .collect();
        Ok((stack_frames, total))
    }

    /// フレームのスコープ一覧
    pub fn scopes(&self, frame_id: i64) -> Result<Vec<Scope>> {
        let _running = self.vm.running_stacks_lock().lock();

        let children = self
            .state
            .resolve_children_by_handle(self.vm.as_ref(), handle_of("scopes", frame_id)?)?;
        Ok(children
            .iter()
            .filter_map(|child| child.to_scope(self.vm.as_ref()))
            .collect())
    }

    /// 変数一覧
    ///
    /// `count` が 0 なら `start` 以降をすべて返す。
    pub fn variables(&self, reference: i64, start: usize, count: usize) -> Result<Vec<Variable>> {
        let _running = self.vm.running_stacks_lock().lock();

        let children = self
            .state
            .resolve_children_by_handle(self.vm.as_ref(), handle_of("variables", reference)?)?;
        let count = if count == 0 { children.len() } else { count };
        Ok(children
            .iter()
            .skip(start)
            .take(count)
            .filter_map(|child| child.to_variable(self.vm.as_ref()))
            .collect())
    }

    /// 逆コンパイルしたソースを取得する
    ///
    /// 参照IDが指定されていればそれを優先し、なければ名前（またはパス）で探す。
    pub fn source(&self, args: &SourceArguments) -> Result<String> {
        let reference = args
            .source
            .as_ref()
            .and_then(|source| source.source_reference)
            .filter(|&reference| reference > 0)
            .unwrap_or(args.source_reference);

        if reference > 0 && self.cache.has_reference(reference) {
            return self
                .cache
                .get_decompiled_source_by_reference(reference)
                .map_err(|err| DebugError::Decompile {
                    script: reference.to_string(),
                    message: format!("{:#}", err),
                });
        }

        let name = args
            .source
            .as_ref()
            .and_then(crate::breakpoint::script_name_of)
            .ok_or_else(|| DebugError::ScriptNotFound(format!("reference {}", reference)))?;
        if self.cache.get_script(&name).is_none() {
            return Err(DebugError::ScriptNotFound(name));
        }

        self.cache
            .get_decompiled_source(&name)
            .map_err(|err| DebugError::Decompile {
                script: name,
                message: format!("{:#}", err),
            })
    }

    /// VM にロード済みのスクリプトのうち、バイナリが見つかるもの
    pub fn loaded_sources(&self) -> Vec<Source> {
        self.vm
            .loaded_script_names()
            .iter()
            .filter_map(|name| self.cache.get_source_data(name))
            .map(|data| Source {
                name: Some(data.name),
                path: Some(data.path),
                source_reference: Some(data.reference),
            })
            .collect()
    }

    /// 実行を再開する
    pub fn continue_execution(&self) -> bool {
        self.execution.continue_execution()
    }

    /// 一時停止を要求する
    pub fn pause(&self) -> Result<()> {
        self.execution.pause()
    }

    /// ステップ実行する
    pub fn step(&self, thread_id: i64, kind: StepKind) -> Result<()> {
        let stack = u32::try_from(thread_id).map_err(|_| DebugError::InvalidArguments {
            command: "step".to_string(),
            message: format!("invalid thread id {}", thread_id),
        })?;
        self.execution.step(StackId(stack), kind)
    }

    /// スクリプトのキャッシュを落として次回読み直させる
    ///
    /// 更新時刻が変わっていれば、次に実行されたときにブレークポイントが無効化される。
    pub fn reload_script(&self, name: &str) -> bool {
        self.cache.reload(name)
    }

    /// デタッチする
    ///
    /// 購読を解除し、ブレークポイントを破棄して、停止中の VM スレッドを解放する。
    pub fn disconnect(&self) {
        if !self.attached.swap(false, Ordering::SeqCst) {
            return;
        }

        self.vm.set_observer(None);
        self.breakpoints.clear_breakpoints(false);
        self.execution.close();
        tracing::info!("debugger detached");
    }

    fn on_instruction(&self, tasklet: &Tasklet) {
        self.execution.handle_instruction(tasklet);
    }

    /// スタック生成の遅延処理
    ///
    /// キューに積まれてから実行されるまでにデタッチされたか、スタックが消えていれば何もしない。
    fn on_stack_created(&self, id: StackId) {
        if !self.is_attached() {
            return;
        }
        let _running = self.vm.running_stacks_lock().lock();
        let Some(stack) = self.vm.stack(id) else {
            tracing::debug!("stack {} vanished before it was reported", id.0);
            return;
        };

        self.sink.send_event(DebugEvent::Thread {
            reason: ThreadReason::Started,
            thread_id: i64::from(id.0),
        });

        let Some(frame) = stack.top() else {
            return;
        };

        let name = normalize_script_name(&frame.owning_type);
        if self.cache.has_script(&name) {
            return;
        }
        if let Some(data) = self.cache.get_source_data(&name) {
            self.sink.send_event(DebugEvent::LoadedSource {
                reason: LoadedSourceReason::New,
                source: Source {
                    name: Some(data.name),
                    path: Some(data.path),
                    source_reference: Some(data.reference),
                },
            });
        }
    }

    fn on_stack_cleaned_up(&self, id: StackId) {
        if !self.is_attached() {
            return;
        }
        self.sink.send_event(DebugEvent::Thread {
            reason: ThreadReason::Exited,
            thread_id: i64::from(id.0),
        });
    }

    fn on_log(&self, event: &LogEvent) {
        if !self.config.forward_logs {
            return;
        }
        self.sink.send_event(DebugEvent::Output {
            category: "console".to_string(),
            output: format_log(event),
        });
    }
}

impl Drop for Debugger {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// VM のログを output イベントの本文にする
pub fn format_log(event: &LogEvent) -> String {
    match &event.source {
        Some(source) => format!("{} - {} - {}\r\n", source, event.severity.as_str(), event.message),
        None => format!("{} - {}\r\n", event.severity.as_str(), event.message),
    }
}

fn handle_of(command: &str, reference: i64) -> Result<u32> {
    u32::try_from(reference).map_err(|_| DebugError::InvalidArguments {
        command: command.to_string(),
        message: format!("invalid reference {}", reference),
    })
}

/// VM に登録する購読者
///
/// デバッガとの循環参照を避けるため弱参照で持つ。
struct DebuggerObserver {
    debugger: Weak<Debugger>,
}

impl RuntimeObserver for DebuggerObserver {
    fn instruction_executed(&self, tasklet: &Tasklet) {
        if let Some(debugger) = self.debugger.upgrade() {
            debugger.on_instruction(tasklet);
        }
    }

    fn stack_created(&self, stack: StackId) {
        let Some(debugger) = self.debugger.upgrade() else {
            return;
        };
        let weak = self.debugger.clone();
        debugger.tasks.add_task(Box::new(move || {
            if let Some(debugger) = weak.upgrade() {
                debugger.on_stack_created(stack);
            }
        }));
    }

    fn stack_cleaned_up(&self, stack: StackId) {
        let Some(debugger) = self.debugger.upgrade() else {
            return;
        };
        let weak = self.debugger.clone();
        debugger.tasks.add_task(Box::new(move || {
            if let Some(debugger) = weak.upgrade() {
                debugger.on_stack_cleaned_up(stack);
            }
        }));
    }

    fn log_event(&self, event: &LogEvent) {
        if let Some(debugger) = self.debugger.upgrade() {
            debugger.on_log(event);
        }
    }
}
