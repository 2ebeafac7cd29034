//! デバッガ全体の動作テスト
//!
//! インメモリ VM を別スレッドで動かし、停止・ステップ・再開の流れを確認する。

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use vmdap_bytecode::{
    script_reference, FunctionInfo, LineTable, ListingDecompiler, MemoryScriptLoader, ScriptBinary,
};
use vmdap_core::{DebugError, Debugger, DebuggerConfig, DebuggerState, StepKind};
use vmdap_protocol::{
    CollectingSink, DebugEvent, LoadedSourceReason, SetBreakpointsArguments, Source,
    SourceArguments, SourceBreakpoint, StoppedReason, ThreadReason,
};
use vmdap_state::StateError;
use vmdap_target::{
    DeferredTaskQueue, Function, LogEvent, ObjectType, ScriptObject, Severity, SimVm, StackId,
    TypeInfo, Value, VariableDecl,
};

const STACK: StackId = StackId(1);

struct Fixture {
    vm: Arc<SimVm>,
    tasks: Arc<DeferredTaskQueue>,
    sink: Arc<CollectingSink>,
    loader: Arc<MemoryScriptLoader>,
    debugger: Arc<Debugger>,
}

fn function(name: &str, lines: &[u32]) -> FunctionInfo {
    FunctionInfo {
        object: "MyQuest".to_string(),
        state: String::new(),
        name: name.to_string(),
        line_numbers: LineTable(lines.to_vec()),
        instructions: Vec::new(),
    }
}

/// OnInit は 10,10,12,15 行、Run は 20,21 行
fn my_quest_binary(modification_time: u64) -> ScriptBinary {
    ScriptBinary {
        script_name: "MyQuest".to_string(),
        source_file_name: "Quests/MyQuest.psc".to_string(),
        modification_time,
        functions: vec![function("OnInit", &[10, 10, 12, 15]), function("Run", &[20, 21])],
    }
}

fn fixture() -> Fixture {
    let vm = Arc::new(SimVm::new());
    let tasks = Arc::new(DeferredTaskQueue::new());
    let sink = Arc::new(CollectingSink::new());
    let loader = Arc::new(MemoryScriptLoader::new());
    loader.insert("MyQuest", my_quest_binary(1));

    let debugger = Debugger::attach(
        vm.clone(),
        tasks.clone(),
        sink.clone(),
        loader.clone(),
        Arc::new(ListingDecompiler),
        DebuggerConfig::default().with_poll_interval(Duration::from_millis(1)),
    );

    Fixture {
        vm,
        tasks,
        sink,
        loader,
        debugger,
    }
}

/// スタック 1 に MyQuest.OnInit を積む
fn push_on_init(vm: &SimVm) {
    let class = Arc::new(ObjectType::new("MyQuest", None).with_variable("::stage_var", TypeInfo::Int));
    let mut object = ScriptObject::new(0x2a, class);
    object.values = vec![Value::Int(10)];

    let mut on_init = Function::new("OnInit");
    on_init.slots = vec![VariableDecl::new("count", TypeInfo::Int)];

    vm.create_stack(STACK).unwrap();
    vm.push_frame(STACK, Arc::new(on_init), "MyQuest", Value::object(Arc::new(object)))
        .unwrap();
    vm.set_local(STACK, "count", Value::Int(3)).unwrap();
}

fn set_breakpoints(debugger: &Debugger, name: &str, lines: &[i64]) -> Result<Vec<bool>, DebugError> {
    let args = SetBreakpointsArguments {
        source: Source::named(name),
        breakpoints: Some(
            lines
                .iter()
                .map(|&line| SourceBreakpoint { line, column: None })
                .collect(),
        ),
        lines: None,
    };
    let body = debugger.set_breakpoints(&args)?;
    Ok(body.breakpoints.iter().map(|bp| bp.verified).collect())
}

/// 停止イベントが `count` 個になるまで待つ
fn wait_for_stops(sink: &CollectingSink, count: usize) -> Vec<StoppedReason> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let reasons: Vec<StoppedReason> = sink
            .events()
            .into_iter()
            .filter_map(|event| match event {
                DebugEvent::Stopped { reason, .. } => Some(reason),
                _ => None,
            })
            .collect();
        if reasons.len() >= count {
            return reasons;
        }
        assert!(Instant::now() < deadline, "timed out waiting for stop #{count}");
        thread::sleep(Duration::from_millis(2));
    }
}

fn top_frame(debugger: &Debugger) -> (String, i64) {
    let (frames, _) = debugger.stack_trace(1, 0, 1).unwrap();
    (frames[0].name.clone(), frames[0].line)
}

/// OnInit を 0..=2 まで実行し、Run を呼んで戻り、OnInit の 3 を実行する
fn spawn_vm(vm: Arc<SimVm>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for ip in 0..=2 {
            vm.exec(STACK, ip).unwrap();
        }
        vm.push_frame(STACK, Arc::new(Function::new("Run")), "MyQuest", Value::None)
            .unwrap();
        vm.exec(STACK, 0).unwrap();
        vm.exec(STACK, 1).unwrap();
        vm.pop_frame(STACK).unwrap();
        vm.exec(STACK, 3).unwrap();
    })
}

#[test]
fn test_breakpoint_verification() {
    let f = fixture();
    let verified = set_breakpoints(&f.debugger, "MyQuest", &[10, 11, 15]).unwrap();
    assert_eq!(verified, vec![true, false, true]);
    assert_eq!(
        f.debugger.breakpoints().breakpoints_for(script_reference("MyQuest")).len(),
        3
    );
}

#[test]
fn test_breakpoints_on_missing_script() {
    let f = fixture();
    set_breakpoints(&f.debugger, "MyQuest", &[10]).unwrap();

    let err = set_breakpoints(&f.debugger, "MissingScript", &[1]).unwrap_err();
    assert!(matches!(err, DebugError::NoPexData(_)));
    assert_eq!(f.debugger.breakpoints().script_count(), 1);
}

#[test]
fn test_threads_skip_empty_stacks() {
    let f = fixture();
    push_on_init(&f.vm);
    f.vm.create_stack(StackId(2)).unwrap();

    let threads = f.debugger.threads();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].id, 1);
    assert_eq!(threads[0].name, "MyQuest (1)");
}

#[test]
fn test_stack_scopes_and_variables() {
    let f = fixture();
    push_on_init(&f.vm);

    let (frames, total) = f.debugger.stack_trace(1, 0, 0).unwrap();
    assert_eq!(total, 1);
    assert_eq!(frames[0].name, "OnInit");
    assert_eq!(frames[0].line, 10);
    let source = frames[0].source.clone().unwrap();
    assert_eq!(source.path.as_deref(), Some("Quests/MyQuest.psc"));

    let scopes = f.debugger.scopes(frames[0].id).unwrap();
    assert_eq!(scopes.len(), 1);
    assert_eq!(scopes[0].name, "Local");

    let variables = f.debugger.variables(scopes[0].variables_reference, 0, 0).unwrap();
    let names: Vec<&str> = variables.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["self", "count"]);
    assert_eq!(variables[1].value, "3");

    let members = f.debugger.variables(variables[0].variables_reference, 0, 0).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].name, "stage");
    assert_eq!(members[0].value, "10");

    let page = f.debugger.variables(scopes[0].variables_reference, 1, 1).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].name, "count");
}

#[test]
fn test_state_lookup_failures() {
    let f = fixture();
    push_on_init(&f.vm);

    assert!(matches!(
        f.debugger.stack_trace(99, 0, 0),
        Err(DebugError::State(StateError::StackNotFound(99)))
    ));
    assert!(matches!(
        f.debugger.variables(12345, 0, 0),
        Err(DebugError::State(StateError::UnknownHandle(12345)))
    ));
}

#[test]
fn test_source_by_reference_and_name() {
    let f = fixture();
    set_breakpoints(&f.debugger, "MyQuest", &[10]).unwrap();

    let by_reference = f
        .debugger
        .source(&SourceArguments {
            source: None,
            source_reference: script_reference("MyQuest"),
        })
        .unwrap();
    assert!(by_reference.starts_with("ScriptName MyQuest ; Quests/MyQuest.psc"));

    let by_name = f
        .debugger
        .source(&SourceArguments {
            source: Some(Source::named("myquest")),
            source_reference: 0,
        })
        .unwrap();
    assert_eq!(by_name, by_reference);

    let missing = f.debugger.source(&SourceArguments {
        source: Some(Source::named("MissingScript")),
        source_reference: 0,
    });
    assert!(matches!(missing, Err(DebugError::ScriptNotFound(_))));
}

#[test]
fn test_loaded_sources() {
    let f = fixture();
    push_on_init(&f.vm);
    f.vm.add_loaded_script("NoBinary");

    let sources = f.debugger.loaded_sources();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].name.as_deref(), Some("MyQuest"));
    assert_eq!(sources[0].source_reference, Some(script_reference("MyQuest")));
}

#[test]
fn test_lifecycle_events_are_deferred() {
    let f = fixture();
    push_on_init(&f.vm);
    assert_eq!(f.sink.count("thread"), 0);

    f.tasks.run_pending();
    let events = f.sink.take();
    assert!(events.contains(&DebugEvent::Thread {
        reason: ThreadReason::Started,
        thread_id: 1
    }));
    assert!(events.iter().any(|event| matches!(
        event,
        DebugEvent::LoadedSource { reason: LoadedSourceReason::New, source }
            if source.name.as_deref() == Some("MyQuest")
    )));

    // 2 つ目のスタックでは同じスクリプトを通知しない
    f.vm.create_stack(StackId(2)).unwrap();
    f.vm.push_frame(StackId(2), Arc::new(Function::new("Run")), "MyQuest", Value::None)
        .unwrap();
    f.tasks.run_pending();
    f.vm.cleanup_stack(StackId(2)).unwrap();
    f.tasks.run_pending();
    let events = f.sink.take();
    assert_eq!(
        events,
        vec![
            DebugEvent::Thread {
                reason: ThreadReason::Started,
                thread_id: 2
            },
            DebugEvent::Thread {
                reason: ThreadReason::Exited,
                thread_id: 2
            },
        ]
    );
}

#[test]
fn test_vanished_stack_is_not_reported_as_started() {
    let f = fixture();
    f.vm.create_stack(StackId(3)).unwrap();
    f.vm.cleanup_stack(StackId(3)).unwrap();
    assert_eq!(f.tasks.len(), 2);

    f.tasks.run_pending();
    assert_eq!(
        f.sink.take(),
        vec![DebugEvent::Thread {
            reason: ThreadReason::Exited,
            thread_id: 3
        }]
    );
}

#[test]
fn test_no_lifecycle_events_after_disconnect() {
    let f = fixture();
    f.vm.create_stack(StackId(3)).unwrap();
    f.vm.cleanup_stack(StackId(3)).unwrap();
    push_on_init(&f.vm);

    // 積まれたままのタスクはデタッチ後に実行されても通知しない
    f.debugger.disconnect();
    assert!(f.tasks.run_pending() > 0);
    assert_eq!(f.sink.count("thread"), 0);
    assert_eq!(f.sink.count("loadedSource"), 0);
}

#[test]
fn test_step_target_stack_ending_resumes() {
    let f = fixture();
    push_on_init(&f.vm);
    f.vm.create_stack(StackId(2)).unwrap();
    f.vm.push_frame(StackId(2), Arc::new(Function::new("Run")), "MyQuest", Value::None)
        .unwrap();
    set_breakpoints(&f.debugger, "MyQuest", &[10]).unwrap();

    let vm = f.vm.clone();
    let (step_started, wait_for_step) = std::sync::mpsc::channel::<()>();
    let vm_thread = thread::spawn(move || {
        vm.exec(STACK, 0).unwrap();
        wait_for_step.recv().unwrap();
        // ステップ対象のスタックが終わり、別のスタックが命令を実行する
        vm.pop_frame(STACK).unwrap();
        vm.cleanup_stack(STACK).unwrap();
        vm.exec(StackId(2), 1).unwrap();
    });

    assert_eq!(wait_for_stops(&f.sink, 1), vec![StoppedReason::Breakpoint]);
    f.debugger.step(1, StepKind::Over).unwrap();
    assert_eq!(f.debugger.state(), DebuggerState::Stepping);
    step_started.send(()).unwrap();
    vm_thread.join().unwrap();

    assert_eq!(f.debugger.state(), DebuggerState::Running);
    let events: Vec<DebugEvent> = f
        .sink
        .events()
        .into_iter()
        .filter(|event| matches!(event, DebugEvent::Stopped { .. } | DebugEvent::Continued { .. }))
        .collect();
    assert_eq!(
        events,
        vec![
            DebugEvent::Stopped {
                reason: StoppedReason::Breakpoint,
                thread_id: 1
            },
            DebugEvent::Continued { thread_id: 1 },
        ]
    );
}

#[test]
fn test_log_becomes_output() {
    let f = fixture();
    f.vm.log(LogEvent {
        severity: Severity::Info,
        message: "hello".to_string(),
        source: Some("MyQuest".to_string()),
    });

    assert_eq!(
        f.sink.take(),
        vec![DebugEvent::Output {
            category: "console".to_string(),
            output: "MyQuest - INFO - hello\r\n".to_string(),
        }]
    );
}

#[test]
fn test_reload_invalidates_breakpoints() {
    let f = fixture();
    push_on_init(&f.vm);
    set_breakpoints(&f.debugger, "MyQuest", &[10, 15]).unwrap();

    f.loader.insert("MyQuest", my_quest_binary(2));
    assert!(f.debugger.reload_script("MyQuest"));

    // 無効化されているので停止しない
    f.vm.exec(STACK, 0).unwrap();
    assert_eq!(f.sink.count("stopped"), 0);
    assert_eq!(f.sink.count("breakpoint"), 2);
    assert_eq!(f.debugger.breakpoints().script_count(), 0);
}

#[test]
fn test_step_over_skips_callee() {
    let f = fixture();
    push_on_init(&f.vm);
    set_breakpoints(&f.debugger, "MyQuest", &[12]).unwrap();

    let vm_thread = spawn_vm(f.vm.clone());
    assert_eq!(wait_for_stops(&f.sink, 1), vec![StoppedReason::Breakpoint]);
    assert_eq!(f.debugger.state(), DebuggerState::Paused);
    assert_eq!(top_frame(&f.debugger), ("OnInit".to_string(), 12));

    f.debugger.step(1, StepKind::Over).unwrap();
    assert_eq!(wait_for_stops(&f.sink, 2)[1], StoppedReason::Step);
    assert_eq!(top_frame(&f.debugger), ("OnInit".to_string(), 15));

    f.debugger.continue_execution();
    vm_thread.join().unwrap();
    assert_eq!(f.debugger.state(), DebuggerState::Running);
}

#[test]
fn test_step_in_then_out() {
    let f = fixture();
    push_on_init(&f.vm);
    set_breakpoints(&f.debugger, "MyQuest", &[12]).unwrap();

    let vm_thread = spawn_vm(f.vm.clone());
    wait_for_stops(&f.sink, 1);

    f.debugger.step(1, StepKind::In).unwrap();
    wait_for_stops(&f.sink, 2);
    assert_eq!(top_frame(&f.debugger), ("Run".to_string(), 20));

    f.debugger.step(1, StepKind::Out).unwrap();
    assert_eq!(wait_for_stops(&f.sink, 3)[2], StoppedReason::Step);
    assert_eq!(top_frame(&f.debugger), ("OnInit".to_string(), 15));

    f.debugger.continue_execution();
    vm_thread.join().unwrap();
}

#[test]
fn test_pause_stops_next_instruction() {
    let f = fixture();
    push_on_init(&f.vm);
    f.debugger.pause().unwrap();
    assert!(matches!(f.debugger.pause(), Err(DebugError::AlreadyPaused)));

    let vm = f.vm.clone();
    let vm_thread = thread::spawn(move || vm.exec(STACK, 0).unwrap());
    assert_eq!(wait_for_stops(&f.sink, 1), vec![StoppedReason::Pause]);

    f.debugger.continue_execution();
    vm_thread.join().unwrap();
    assert!(f.sink.events().contains(&DebugEvent::Continued { thread_id: 1 }));
}

#[test]
fn test_step_while_running_fails() {
    let f = fixture();
    push_on_init(&f.vm);
    assert!(matches!(
        f.debugger.step(1, StepKind::Over),
        Err(DebugError::NotPaused)
    ));
}

#[test]
fn test_disconnect_releases_parked_thread() {
    let f = fixture();
    push_on_init(&f.vm);
    set_breakpoints(&f.debugger, "MyQuest", &[12]).unwrap();

    let vm_thread = spawn_vm(f.vm.clone());
    wait_for_stops(&f.sink, 1);

    f.debugger.disconnect();
    vm_thread.join().unwrap();

    assert!(!f.vm.has_observer());
    assert!(!f.debugger.is_attached());
    assert_eq!(f.debugger.breakpoints().script_count(), 0);
    assert_eq!(f.sink.count("stopped"), 1);
}
