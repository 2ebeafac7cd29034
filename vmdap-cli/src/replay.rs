//! シナリオリプレイ
//!
//! JSON で書かれたスクリプトバイナリ・型・VM 操作の列を読み込み、インメモリ VM 上で
//! 順に再生する。再生は専用スレッドで行い、ブレークポイントで止まればそのスレッドが待つ。

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use vmdap_bytecode::{MemoryScriptLoader, ScriptBinary};
use vmdap_core::Debugger;
use vmdap_target::{
    Function, LogEvent, ObjectType, ScriptObject, Severity, SimVm, StackId, TypeInfo, Value,
    VariableDecl,
};

/// シナリオファイル
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// 読み込めるスクリプトバイナリ
    pub scripts: Vec<ScriptBinary>,
    /// オブジェクト型（親は先に定義しておく）
    pub types: Vec<TypeDef>,
    pub functions: Vec<FunctionDef>,
    pub steps: Vec<Step>,
    /// 再生開始前に待つ時間（クライアントがブレークポイントを設定する猶予）
    pub start_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypeDef {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub variables: Vec<VariableDecl>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    /// 定義しているスクリプト名
    pub owner: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub native: bool,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default)]
    pub slots: Vec<VariableDecl>,
}

/// シナリオ中の値
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ValueDef {
    Null,
    Bool(bool),
    Int(i32),
    Float(f32),
    String(String),
    Array(Vec<ValueDef>),
    Object {
        object: String,
        handle: u64,
        #[serde(default)]
        values: Vec<ValueDef>,
    },
}

/// VM 操作
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    CreateStack {
        stack: u32,
    },
    Call {
        stack: u32,
        function: String,
        owner: String,
        #[serde(default, rename = "self")]
        self_value: Option<ValueDef>,
    },
    SetLocal {
        stack: u32,
        name: String,
        value: ValueDef,
    },
    Exec {
        stack: u32,
        ip: u32,
    },
    Return {
        stack: u32,
    },
    Cleanup {
        stack: u32,
    },
    Log {
        severity: Severity,
        message: String,
        #[serde(default)]
        source: Option<String>,
    },
    /// スクリプトを差し替える（ホットリロード）
    Reload {
        script: ScriptBinary,
    },
    Sleep {
        ms: u64,
    },
}

impl Scenario {
    /// ファイルから読み込む
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid scenario {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// シナリオのバイナリを入れたローダーを作る
    pub fn loader(&self) -> Arc<MemoryScriptLoader> {
        let loader = Arc::new(MemoryScriptLoader::new());
        for script in &self.scripts {
            loader.insert(&script.script_name, script.clone());
        }
        loader
    }
}

/// シナリオの再生器
pub struct Replayer {
    vm: Arc<SimVm>,
    loader: Arc<MemoryScriptLoader>,
    types: HashMap<String, Arc<ObjectType>>,
    functions: HashMap<(String, String), Arc<Function>>,
}

impl Replayer {
    /// 型と関数を組み立てる
    pub fn new(vm: Arc<SimVm>, loader: Arc<MemoryScriptLoader>, scenario: &Scenario) -> Result<Self> {
        let mut types: HashMap<String, Arc<ObjectType>> = HashMap::new();
        for def in &scenario.types {
            let parent = match &def.parent {
                Some(parent) => Some(
                    types
                        .get(&parent.to_lowercase())
                        .cloned()
                        .ok_or_else(|| anyhow!("type {} must be defined before {}", parent, def.name))?,
                ),
                None => None,
            };
            let mut ty = ObjectType::new(&def.name, parent);
            ty.variables = def.variables.clone();
            types.insert(def.name.to_lowercase(), Arc::new(ty));
        }

        let functions = scenario
            .functions
            .iter()
            .map(|def| {
                let mut function = Function::new(&def.name);
                function.state = def.state.clone();
                function.is_native = def.native;
                function.is_static = def.is_static;
                function.slots = def.slots.clone();
                (
                    (def.owner.to_lowercase(), def.name.to_lowercase()),
                    Arc::new(function),
                )
            })
            .collect();

        Ok(Self {
            vm,
            loader,
            types,
            functions,
        })
    }

    /// すべての操作を順に実行する
    pub fn run(&self, steps: &[Step], debugger: &Debugger) -> Result<()> {
        for (index, step) in steps.iter().enumerate() {
            self.apply(step, debugger)
                .with_context(|| format!("step {} ({:?}) failed", index, step))?;
        }
        tracing::info!("replay finished ({} steps)", steps.len());
        Ok(())
    }

    fn apply(&self, step: &Step, debugger: &Debugger) -> Result<()> {
        match step {
            Step::CreateStack { stack } => self.vm.create_stack(StackId(*stack))?,
            Step::Call {
                stack,
                function,
                owner,
                self_value,
            } => {
                let key = (owner.to_lowercase(), function.to_lowercase());
                let function = self
                    .functions
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| Arc::new(Function::new(function.as_str())));
                let this = match self_value {
                    Some(def) => self.value(def)?,
                    None => Value::None,
                };
                self.vm.push_frame(StackId(*stack), function, owner, this)?;
            }
            Step::SetLocal { stack, name, value } => {
                self.vm.set_local(StackId(*stack), name, self.value(value)?)?
            }
            Step::Exec { stack, ip } => self.vm.exec(StackId(*stack), *ip)?,
            Step::Return { stack } => {
                self.vm.pop_frame(StackId(*stack))?;
            }
            Step::Cleanup { stack } => self.vm.cleanup_stack(StackId(*stack))?,
            Step::Log {
                severity,
                message,
                source,
            } => self.vm.log(LogEvent {
                severity: *severity,
                message: message.clone(),
                source: source.clone(),
            }),
            Step::Reload { script } => {
                self.loader.insert(&script.script_name, script.clone());
                debugger.reload_script(&script.script_name);
            }
            Step::Sleep { ms } => std::thread::sleep(Duration::from_millis(*ms)),
        }
        Ok(())
    }

    /// シナリオの値を VM の値にする
    fn value(&self, def: &ValueDef) -> Result<Value> {
        let value = match def {
            ValueDef::Null => Value::None,
            ValueDef::Bool(b) => Value::Bool(*b),
            ValueDef::Int(i) => Value::Int(*i),
            ValueDef::Float(f) => Value::Float(*f),
            ValueDef::String(s) => Value::String(s.clone()),
            ValueDef::Array(items) => {
                let values = items.iter().map(|item| self.value(item)).collect::<Result<Vec<_>>>()?;
                Value::array(element_type(&values), values)
            }
            ValueDef::Object {
                object,
                handle,
                values,
            } => {
                let class = self
                    .types
                    .get(&object.to_lowercase())
                    .cloned()
                    .ok_or_else(|| anyhow!("unknown type {}", object))?;
                let mut instance = ScriptObject::new(*handle, class);
                for (slot, def) in instance.values.iter_mut().zip(values) {
                    *slot = self.value(def)?;
                }
                Value::object(Arc::new(instance))
            }
        };
        Ok(value)
    }
}

/// 配列の要素型（先頭要素から決める）
fn element_type(values: &[Value]) -> TypeInfo {
    match values.first() {
        Some(Value::Bool(_)) => TypeInfo::Bool,
        Some(Value::Int(_)) => TypeInfo::Int,
        Some(Value::Float(_)) => TypeInfo::Float,
        Some(Value::String(_)) => TypeInfo::String,
        Some(Value::Object { class, .. }) => TypeInfo::Object(class.name.clone()),
        _ => TypeInfo::Var,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmdap_bytecode::ListingDecompiler;
    use vmdap_core::DebuggerConfig;
    use vmdap_protocol::{CollectingSink, DebugEvent};
    use vmdap_target::{DeferredTaskQueue, VirtualMachine};

    const SCENARIO: &str = r#"{
        "scripts": [{
            "script_name": "MyQuest",
            "modification_time": 1,
            "functions": [{"object": "MyQuest", "name": "OnInit", "line_numbers": [10, 11, 12]}]
        }],
        "types": [
            {"name": "Quest", "variables": [{"name": "::stage_var", "type": {"kind": "int"}}]},
            {"name": "MyQuest", "parent": "Quest",
             "variables": [{"name": "::count_var", "type": {"kind": "int"}}]}
        ],
        "functions": [
            {"name": "OnInit", "owner": "MyQuest",
             "slots": [{"name": "items", "type": {"kind": "var"}}]}
        ],
        "steps": [
            {"op": "create_stack", "stack": 1},
            {"op": "call", "stack": 1, "function": "OnInit", "owner": "MyQuest",
             "self": {"object": "MyQuest", "handle": 20, "values": [10, 3]}},
            {"op": "set_local", "stack": 1, "name": "items", "value": [1, 2, 3]},
            {"op": "exec", "stack": 1, "ip": 0},
            {"op": "log", "severity": "warning", "message": "low stage", "source": "MyQuest"},
            {"op": "exec", "stack": 1, "ip": 1},
            {"op": "return", "stack": 1},
            {"op": "cleanup", "stack": 1}
        ]
    }"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::parse(SCENARIO).unwrap();
        assert_eq!(scenario.scripts.len(), 1);
        assert_eq!(scenario.types.len(), 2);
        assert_eq!(scenario.steps.len(), 8);
        assert!(matches!(scenario.steps[0], Step::CreateStack { stack: 1 }));
        assert!(matches!(
            scenario.steps[4],
            Step::Log {
                severity: Severity::Warning,
                ..
            }
        ));
        assert!(scenario.loader().remove("myquest").is_some());
    }

    #[test]
    fn test_value_conversion() {
        let scenario = Scenario::parse(SCENARIO).unwrap();
        let vm = Arc::new(SimVm::new());
        let replayer = Replayer::new(vm, scenario.loader(), &scenario).unwrap();

        let object = replayer
            .value(&ValueDef::Object {
                object: "MyQuest".to_string(),
                handle: 20,
                values: vec![ValueDef::Int(10), ValueDef::Int(3)],
            })
            .unwrap();
        match object {
            Value::Object {
                object: Some(object),
                ..
            } => {
                assert_eq!(object.handle, 20);
                assert_eq!(object.values, vec![Value::Int(10), Value::Int(3)]);
            }
            other => panic!("unexpected value {:?}", other),
        }

        assert!(replayer
            .value(&ValueDef::Object {
                object: "Unknown".to_string(),
                handle: 1,
                values: Vec::new(),
            })
            .is_err());
        assert_eq!(
            element_type(&[Value::Float(1.0)]),
            TypeInfo::Float
        );
    }

    #[test]
    fn test_undefined_parent_is_rejected() {
        let scenario = Scenario::parse(r#"{"types": [{"name": "MyQuest", "parent": "Quest"}]}"#).unwrap();
        let result = Replayer::new(Arc::new(SimVm::new()), scenario.loader(), &scenario);
        assert!(result.is_err());
    }

    #[test]
    fn test_run_without_breakpoints() {
        let scenario = Scenario::parse(SCENARIO).unwrap();
        let vm = Arc::new(SimVm::new());
        let loader = scenario.loader();
        let sink = Arc::new(CollectingSink::new());
        let tasks = Arc::new(DeferredTaskQueue::new());
        let debugger = Debugger::attach(
            vm.clone(),
            tasks.clone(),
            sink.clone(),
            loader.clone(),
            Arc::new(ListingDecompiler),
            DebuggerConfig::default(),
        );

        let replayer = Replayer::new(vm.clone(), loader, &scenario).unwrap();
        replayer.run(&scenario.steps, &debugger).unwrap();
        tasks.run_pending();

        assert!(vm.stack_ids().is_empty());
        assert_eq!(sink.count("stopped"), 0);
        assert_eq!(sink.count("thread"), 2);
        assert!(sink.events().contains(&DebugEvent::Output {
            category: "console".to_string(),
            output: "MyQuest - WARNING - low stage\r\n".to_string(),
        }));
    }
}
