//! ホストタスクキューの実装

use crate::vm::TaskQueue;
use crate::Result;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::mpsc;
use std::thread::JoinHandle;

/// キューに積まれるタスク
pub type Task = Box<dyn FnOnce() + Send>;

/// 明示的に `run_pending` を呼ぶまで実行しないキュー
///
/// ホストのメインループに相当するものを呼び出し側が回す。
#[derive(Default)]
pub struct DeferredTaskQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl DeferredTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 積まれているタスクの数
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// 積まれているタスクをすべて実行し、実行した数を返す
    ///
    /// 実行中に追加されたタスクも同じ呼び出しで処理する。
    pub fn run_pending(&self) -> usize {
        let mut count = 0;
        loop {
            // タスク実行中はロックを持たない
            let Some(task) = self.tasks.lock().pop_front() else {
                return count;
            };
            task();
            count += 1;
        }
    }
}

impl TaskQueue for DeferredTaskQueue {
    fn add_task(&self, task: Task) {
        self.tasks.lock().push_back(task);
    }
}

/// 専用スレッドでタスクを順に実行するキュー
pub struct WorkerTaskQueue {
    sender: Mutex<Option<mpsc::Sender<Task>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerTaskQueue {
    /// ワーカースレッドを起動する
    pub fn spawn(name: &str) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Task>();
        let worker = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Ok(task) = receiver.recv() {
                    task();
                }
                tracing::debug!("task queue worker finished");
            })?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// 新しいタスクの受け付けを止め、残りを実行し終えるまで待つ
    pub fn shutdown(&self) {
        self.sender.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::error!("task queue worker panicked");
            }
        }
    }
}

impl TaskQueue for WorkerTaskQueue {
    fn add_task(&self, task: Task) {
        match self.sender.lock().as_ref() {
            Some(sender) => {
                if sender.send(task).is_err() {
                    tracing::warn!("task queue worker is gone, dropping task");
                }
            }
            None => tracing::warn!("task queue is shut down, dropping task"),
        }
    }
}

impl Drop for WorkerTaskQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}
