//! 実行制御
//!
//! VM の命令実行通知を受けて、停止・再開・ステップ実行を決める。
//! 停止中は通知してきた VM スレッドを待機ループに留め、他の VM スレッドは
//! 命令ロックの手前で待たせる。

use crate::breakpoint::BreakpointManager;
use crate::errors::DebugError;
use crate::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vmdap_protocol::{DebugEvent, EventSink, StoppedReason};
use vmdap_target::{FrameId, StackId, Tasklet, VirtualMachine};

/// デバッガの実行状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebuggerState {
    Running,
    Paused,
    Stepping,
}

/// ステップ実行の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// 次の命令で止まる
    In,
    /// 基準フレームかその呼び出し元に戻ったら止まる
    Over,
    /// 基準フレームから抜けたら止まる
    Out,
}

#[derive(Debug, Clone, Copy)]
struct StepTarget {
    stack: StackId,
    kind: StepKind,
    /// ステップ開始時のトップフレーム
    frame: Option<FrameId>,
}

#[derive(Debug)]
struct ExecState {
    state: DebuggerState,
    step: Option<StepTarget>,
    /// 最後に停止したスタック
    last_stopped: Option<StackId>,
}

impl ExecState {
    fn pause_on(&mut self, stack: StackId) {
        self.state = DebuggerState::Paused;
        self.step = None;
        self.last_stopped = Some(stack);
    }
}

/// 実行制御
pub struct ExecutionController {
    vm: Arc<dyn VirtualMachine>,
    breakpoints: Arc<BreakpointManager>,
    sink: Arc<dyn EventSink>,
    poll_interval: Duration,
    /// 命令実行通知を直列化する（停止中の VM スレッドが保持し続ける）
    instruction_lock: Mutex<()>,
    exec: Mutex<ExecState>,
    closed: AtomicBool,
}

impl ExecutionController {
    pub fn new(
        vm: Arc<dyn VirtualMachine>,
        breakpoints: Arc<BreakpointManager>,
        sink: Arc<dyn EventSink>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            vm,
            breakpoints,
            sink,
            poll_interval,
            instruction_lock: Mutex::new(()),
            exec: Mutex::new(ExecState {
                state: DebuggerState::Running,
                step: None,
                last_stopped: None,
            }),
            closed: AtomicBool::new(false),
        }
    }

    /// 現在の実行状態
    pub fn state(&self) -> DebuggerState {
        self.exec.lock().state
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 実行を再開する
    ///
    /// 何度呼んでも状態は Running になる。
    pub fn continue_execution(&self) -> bool {
        let thread_id = {
            let mut exec = self.exec.lock();
            exec.state = DebuggerState::Running;
            exec.step = None;
            exec.last_stopped.map_or(0, |stack| i64::from(stack.0))
        };

        self.sink.send_event(DebugEvent::Continued { thread_id });
        true
    }

    /// 一時停止を要求する
    ///
    /// 実際の停止は、次に命令を実行したスタックで起こる。
    pub fn pause(&self) -> Result<()> {
        let mut exec = self.exec.lock();
        if exec.state == DebuggerState::Paused {
            return Err(DebugError::AlreadyPaused);
        }

        exec.state = DebuggerState::Paused;
        exec.step = None;
        tracing::info!("pause requested");
        Ok(())
    }

    /// ステップ実行を開始する
    ///
    /// 停止中でなければ失敗する。
    pub fn step(&self, stack: StackId, kind: StepKind) -> Result<()> {
        let mut exec = self.exec.lock();
        if exec.state != DebuggerState::Paused {
            return Err(DebugError::NotPaused);
        }

        let frame = {
            let _running = self.vm.running_stacks_lock().lock();
            let target = self
                .vm
                .stack(stack)
                .ok_or(DebugError::StackNotFound(stack.0))?;
            target.top().map(|frame| frame.id)
        };

        exec.state = DebuggerState::Stepping;
        exec.step = Some(StepTarget { stack, kind, frame });
        tracing::debug!("step {:?} on stack {}", kind, stack.0);
        Ok(())
    }

    /// 命令実行通知を処理する
    ///
    /// 停止すると判断した場合、再開されるかクローズされるまで戻らない。
    pub fn handle_instruction(&self, tasklet: &Tasklet) {
        let _instruction = self.instruction_lock.lock();
        if self.is_closed() {
            return;
        }

        let Some(frame) = tasklet.top_frame() else {
            return;
        };
        let stack_id = tasklet.stack.id;
        let mut events = Vec::new();

        {
            let mut exec = self.exec.lock();

            // 一時停止要求を受けた後の最初の命令
            if exec.state == DebuggerState::Paused {
                exec.pause_on(stack_id);
                events.push(stopped(StoppedReason::Pause, stack_id));
            } else if self
                .breakpoints
                .is_at_valid_breakpoint(&frame.owning_type, &frame.function, frame.ip)
            {
                exec.pause_on(stack_id);
                events.push(stopped(StoppedReason::Breakpoint, stack_id));
            }

            if let (DebuggerState::Stepping, Some(step)) = (exec.state, exec.step) {
                if self.vm.stack(step.stack).is_none() {
                    // ステップ対象のスタックが終了した
                    exec.state = DebuggerState::Running;
                    exec.step = None;
                    events.push(DebugEvent::Continued {
                        thread_id: i64::from(step.stack.0),
                    });
                } else if step.stack == stack_id && should_stop_stepping(tasklet, &step) {
                    exec.pause_on(stack_id);
                    events.push(stopped(StoppedReason::Step, stack_id));
                }
            }
        }

        for event in events {
            if let DebugEvent::Stopped { reason, thread_id } = &event {
                tracing::info!("stopped ({}) on stack {}", reason.as_str(), thread_id);
            }
            self.sink.send_event(event);
        }

        while !self.is_closed() && self.exec.lock().state == DebuggerState::Paused {
            std::thread::sleep(self.poll_interval);
        }
    }

    /// 制御を終了する
    ///
    /// 待機中の VM スレッドが抜けるまで戻らない。
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _instruction = self.instruction_lock.lock();

        let mut exec = self.exec.lock();
        exec.state = DebuggerState::Running;
        exec.step = None;
        tracing::info!("execution controller closed");
    }
}

fn stopped(reason: StoppedReason, stack: StackId) -> DebugEvent {
    DebugEvent::Stopped {
        reason,
        thread_id: i64::from(stack.0),
    }
}

/// ステップ実行中に、この命令で止まるべきかどうか
///
/// 開始時に基準フレームが無かった場合は止まらない。
fn should_stop_stepping(tasklet: &Tasklet, step: &StepTarget) -> bool {
    let Some(frame) = step.frame else {
        return false;
    };
    let index = tasklet
        .stack
        .frame_index(frame)
        .map_or(-1, |index| index as i64);

    match step.kind {
        StepKind::In => true,
        StepKind::Out => index < 0,
        StepKind::Over => index <= 0,
    }
}
