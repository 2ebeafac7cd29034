//! vmdap スクリプト VM インターフェース
//!
//! このクレートは、デバッグ対象のスクリプト VM とデバッガコアの境界を定義します。
//! コールスタック、フレーム、値、オブジェクト型のデータモデルと、
//! VM が満たすべきトレイト（`VirtualMachine`、`RuntimeObserver`、`TaskQueue`）、
//! およびテストやリプレイに使うインメモリ VM を提供します。

pub mod sim;
pub mod stack;
pub mod tasks;
pub mod value;
pub mod vm;

pub use sim::SimVm;
pub use stack::{Frame, FrameId, Function, Stack, StackId, Tasklet};
pub use tasks::{DeferredTaskQueue, Task, WorkerTaskQueue};
pub use value::{
    FormView, ObjectType, ScriptArray, ScriptObject, ScriptStruct, StructType, TypeInfo, Value,
    VariableDecl,
};
pub use vm::{LogEvent, RuntimeObserver, Severity, TaskQueue, VirtualMachine};

/// VM 操作の結果型
pub type Result<T> = anyhow::Result<T>;
