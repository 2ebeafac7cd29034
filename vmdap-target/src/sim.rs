//! インメモリ VM
//!
//! 実エンジンの代わりにスタックやオブジェクトを直接組み立てて動かす VM。
//! テストとシナリオリプレイで使う。`exec` は呼び出したスレッド上で
//! 命令実行通知を同期的に配送するため、デバッガが停止を決めるとそのスレッドがブロックする。

use crate::stack::{Frame, FrameId, Function, Stack, StackId, Tasklet};
use crate::value::{FormView, ScriptObject, Value};
use crate::vm::{LogEvent, RuntimeObserver, VirtualMachine};
use crate::Result;
use anyhow::anyhow;
use parking_lot::{ReentrantMutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// インメモリ VM
pub struct SimVm {
    stacks_lock: ReentrantMutex<()>,
    stacks: RwLock<BTreeMap<StackId, Stack>>,
    scripts: RwLock<Vec<String>>,
    forms: RwLock<HashMap<u64, Vec<FormView>>>,
    observer: RwLock<Option<Arc<dyn RuntimeObserver>>>,
    next_frame: AtomicU64,
}

impl SimVm {
    pub fn new() -> Self {
        Self {
            stacks_lock: ReentrantMutex::new(()),
            stacks: RwLock::new(BTreeMap::new()),
            scripts: RwLock::new(Vec::new()),
            forms: RwLock::new(HashMap::new()),
            observer: RwLock::new(None),
            next_frame: AtomicU64::new(1),
        }
    }

    fn observer(&self) -> Option<Arc<dyn RuntimeObserver>> {
        self.observer.read().clone()
    }

    /// スタックを作成して購読者に通知する
    pub fn create_stack(&self, id: StackId) -> Result<()> {
        {
            let _guard = self.stacks_lock.lock();
            let mut stacks = self.stacks.write();
            if stacks.contains_key(&id) {
                return Err(anyhow!("stack {} already exists", id.0));
            }
            stacks.insert(id, Stack::new(id));
        }

        if let Some(observer) = self.observer() {
            observer.stack_created(id);
        }
        Ok(())
    }

    /// スタックを破棄して購読者に通知する
    pub fn cleanup_stack(&self, id: StackId) -> Result<()> {
        {
            let _guard = self.stacks_lock.lock();
            self.stacks
                .write()
                .remove(&id)
                .ok_or_else(|| anyhow!("stack {} not found", id.0))?;
        }

        if let Some(observer) = self.observer() {
            observer.stack_cleaned_up(id);
        }
        Ok(())
    }

    /// 関数呼び出しを模してフレームを積む
    pub fn push_frame(
        &self,
        stack: StackId,
        function: Arc<Function>,
        owning_type: &str,
        self_value: Value,
    ) -> Result<FrameId> {
        let id = FrameId(self.next_frame.fetch_add(1, Ordering::SeqCst));
        let mut frame = Frame::new(id, function, owning_type);
        frame.self_value = self_value;

        {
            let _guard = self.stacks_lock.lock();
            let mut stacks = self.stacks.write();
            let target = stacks
                .get_mut(&stack)
                .ok_or_else(|| anyhow!("stack {} not found", stack.0))?;
            target.frames.insert(0, frame);
        }

        self.add_loaded_script(owning_type);
        Ok(id)
    }

    /// トップフレームを取り除く
    pub fn pop_frame(&self, stack: StackId) -> Result<Frame> {
        let _guard = self.stacks_lock.lock();
        let mut stacks = self.stacks.write();
        let target = stacks
            .get_mut(&stack)
            .ok_or_else(|| anyhow!("stack {} not found", stack.0))?;
        if target.frames.is_empty() {
            return Err(anyhow!("stack {} has no frames", stack.0));
        }
        Ok(target.frames.remove(0))
    }

    fn with_top_frame<R>(&self, stack: StackId, f: impl FnOnce(&mut Frame) -> R) -> Result<R> {
        let _guard = self.stacks_lock.lock();
        let mut stacks = self.stacks.write();
        let frame = stacks
            .get_mut(&stack)
            .and_then(|s| s.frames.first_mut())
            .ok_or_else(|| anyhow!("stack {} has no top frame", stack.0))?;
        Ok(f(frame))
    }

    /// トップフレームのローカル変数を書き換える
    pub fn set_local(&self, stack: StackId, name: &str, value: Value) -> Result<()> {
        self.with_top_frame(stack, |frame| {
            let index = frame
                .function
                .slots
                .iter()
                .position(|slot| slot.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| anyhow!("no local named {name}"))?;
            frame.locals[index] = value;
            Ok(())
        })?
    }

    /// トップフレームで命令を実行する
    ///
    /// 購読者が停止を決めた場合、再開されるまでこの呼び出しは戻らない。
    pub fn exec(&self, stack: StackId, ip: u32) -> Result<()> {
        self.with_top_frame(stack, |frame| frame.ip = ip)?;

        let snapshot = self
            .stack(stack)
            .ok_or_else(|| anyhow!("stack {} not found", stack.0))?;

        if let Some(observer) = self.observer() {
            observer.instruction_executed(&Tasklet { stack: snapshot });
        }
        Ok(())
    }

    /// ログを出力する
    pub fn log(&self, event: LogEvent) {
        if let Some(observer) = self.observer() {
            observer.log_event(&event);
        }
    }

    /// スクリプトをロード済みとして登録する
    pub fn add_loaded_script(&self, name: &str) {
        let mut scripts = self.scripts.write();
        if !scripts.iter().any(|s| s.eq_ignore_ascii_case(name)) {
            scripts.push(name.to_string());
        }
    }

    /// オブジェクトハンドルにネイティブフォームの射影を結び付ける
    pub fn bind_forms(&self, handle: u64, views: Vec<FormView>) {
        self.forms.write().insert(handle, views);
    }

    /// 購読者が設定されているかどうか
    pub fn has_observer(&self) -> bool {
        self.observer.read().is_some()
    }
}

impl Default for SimVm {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualMachine for SimVm {
    fn running_stacks_lock(&self) -> &ReentrantMutex<()> {
        &self.stacks_lock
    }

    fn stack_ids(&self) -> Vec<StackId> {
        self.stacks.read().keys().copied().collect()
    }

    fn stack(&self, id: StackId) -> Option<Stack> {
        self.stacks.read().get(&id).cloned()
    }

    fn loaded_script_names(&self) -> Vec<String> {
        self.scripts.read().clone()
    }

    fn form_views(&self, object: &ScriptObject) -> Vec<FormView> {
        self.forms
            .read()
            .get(&object.handle)
            .cloned()
            .unwrap_or_default()
    }

    fn set_observer(&self, observer: Option<Arc<dyn RuntimeObserver>>) {
        *self.observer.write() = observer;
    }
}
