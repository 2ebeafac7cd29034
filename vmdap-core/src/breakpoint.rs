//! ブレークポイント管理

use crate::errors::DebugError;
use crate::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use vmdap_bytecode::{normalize_script_name, script_reference, BytecodeCache, ScriptReference};
use vmdap_protocol::{self as protocol, BreakpointReason, DebugEvent, EventSink, Source};
use vmdap_state::HandleAllocator;
use vmdap_target::Function;

/// ブレークポイントID
pub type BreakpointId = u32;

/// ブレークポイント情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub id: BreakpointId,
    /// 要求されたソース行
    pub line: i64,
    /// 解決先の (関数インデックス, 命令インデックス)
    pub location: Option<(usize, u32)>,
}

impl Breakpoint {
    /// 命令に解決できたかどうか
    pub fn verified(&self) -> bool {
        self.location.is_some()
    }

    fn to_protocol(&self, source: &Source) -> protocol::Breakpoint {
        protocol::Breakpoint {
            id: Some(i64::from(self.id)),
            verified: self.verified(),
            message: (!self.verified()).then(|| format!("No code at line {}", self.line)),
            source: Some(source.clone()),
            line: Some(self.line),
            instruction_reference: self.location.map(|(_, ip)| ip.to_string()),
            offset: None,
        }
    }

    fn to_changed(&self, source: &Source) -> protocol::Breakpoint {
        protocol::Breakpoint {
            verified: false,
            message: Some("Script was reloaded".to_string()),
            ..self.to_protocol(source)
        }
    }
}

/// 1 スクリプト分のブレークポイント
struct ScriptBreakpoints {
    source: Source,
    /// 設定時点のバイナリの更新時刻
    modification_time: u64,
    breakpoints: Vec<Breakpoint>,
    by_location: HashMap<(usize, u32), BreakpointId>,
}

/// DAP の Source からスクリプト名を取り出す
///
/// `name` があればそれを使い、なければパスのファイル名部分を使う。
pub fn script_name_of(source: &Source) -> Option<String> {
    if let Some(name) = source.name.as_deref().filter(|n| !n.trim().is_empty()) {
        return Some(normalize_script_name(name));
    }

    source
        .path
        .as_deref()
        .and_then(|path| Path::new(path).file_stem())
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(normalize_script_name)
}

/// ブレークポイントマネージャー
///
/// プロトコルスレッドからの設定と VM スレッドからの照会が競合するため、内部でロックを持つ。
pub struct BreakpointManager {
    cache: Arc<BytecodeCache>,
    ids: Arc<HandleAllocator>,
    sink: Arc<dyn EventSink>,
    scripts: Mutex<HashMap<ScriptReference, ScriptBreakpoints>>,
}

impl BreakpointManager {
    pub fn new(cache: Arc<BytecodeCache>, ids: Arc<HandleAllocator>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            cache,
            ids,
            sink,
            scripts: Mutex::new(HashMap::new()),
        }
    }

    /// スクリプトのブレークポイントを丸ごと置き換える
    ///
    /// 失敗した場合、保持しているブレークポイントは変更しない。
    pub fn set_breakpoints(
        &self,
        source: &Source,
        lines: &[i64],
    ) -> Result<(Source, Vec<protocol::Breakpoint>)> {
        let name = script_name_of(source).ok_or_else(|| DebugError::InvalidArguments {
            command: "setBreakpoints".to_string(),
            message: "source has neither name nor path".to_string(),
        })?;

        let binary = self.cache.get_script(&name).ok_or_else(|| {
            tracing::warn!("no PEX data for {}", name);
            DebugError::NoPexData(name.clone())
        })?;
        if !binary.has_debug_info() {
            tracing::warn!("no debug info in {}", name);
            return Err(DebugError::NoDebugInfo(name));
        }

        let reference = script_reference(&name);
        let mut resolved_source = source.clone();
        resolved_source.name = Some(name.clone());
        resolved_source.source_reference = Some(reference);
        if resolved_source.path.is_none() {
            resolved_source.path = self.cache.get_source_data(&name).map(|data| data.path);
        }

        let breakpoints: Vec<Breakpoint> = lines
            .iter()
            .map(|&line| Breakpoint {
                id: self.ids.next(),
                line,
                location: u32::try_from(line)
                    .ok()
                    .and_then(|line| binary.find_first_instruction(line)),
            })
            .collect();
        let by_location = breakpoints
            .iter()
            .filter_map(|bp| bp.location.map(|location| (location, bp.id)))
            .collect();
        let response = breakpoints
            .iter()
            .map(|bp| bp.to_protocol(&resolved_source))
            .collect();

        tracing::info!(
            "set {} breakpoints in {} ({} verified)",
            breakpoints.len(),
            name,
            breakpoints.iter().filter(|bp| bp.verified()).count()
        );

        self.scripts.lock().insert(
            reference,
            ScriptBreakpoints {
                source: resolved_source.clone(),
                modification_time: binary.modification_time,
                breakpoints,
                by_location,
            },
        );

        Ok((resolved_source, response))
    }

    /// 命令位置にブレークポイントがあるかどうか
    ///
    /// スクリプトが再ロードされて更新時刻が変わっていた場合、そのスクリプトの
    /// ブレークポイントはすべて破棄し、changed イベントを送る。
    pub fn is_at_valid_breakpoint(&self, script: &str, function: &Function, ip: u32) -> bool {
        if function.is_native {
            return false;
        }

        let reference = script_reference(script);
        let mut scripts = self.scripts.lock();
        let Some(expected) = scripts.get(&reference).map(|entry| entry.modification_time) else {
            return false;
        };

        let binary = match self.cache.get_script(script) {
            Some(binary) if binary.modification_time == expected => binary,
            _ => {
                let stale = scripts.remove(&reference);
                drop(scripts);
                if let Some(stale) = stale {
                    tracing::info!(
                        "script {} changed, dropping {} breakpoints",
                        script,
                        stale.breakpoints.len()
                    );
                    self.emit_changed(&stale);
                }
                return false;
            }
        };

        let Some(index) = binary.find_function(&function.state, &function.name) else {
            return false;
        };
        scripts
            .get(&reference)
            .is_some_and(|entry| entry.by_location.contains_key(&(index, ip)))
    }

    /// すべてのブレークポイントを破棄する
    pub fn clear_breakpoints(&self, emit_changed: bool) {
        let removed: Vec<ScriptBreakpoints> = self.scripts.lock().drain().map(|(_, v)| v).collect();
        if emit_changed {
            for entry in &removed {
                self.emit_changed(entry);
            }
        }
    }

    /// スクリプトに設定済みのブレークポイント
    pub fn breakpoints_for(&self, reference: ScriptReference) -> Vec<Breakpoint> {
        self.scripts
            .lock()
            .get(&reference)
            .map(|entry| entry.breakpoints.clone())
            .unwrap_or_default()
    }

    /// ブレークポイントを持つスクリプト数
    pub fn script_count(&self) -> usize {
        self.scripts.lock().len()
    }

    fn emit_changed(&self, entry: &ScriptBreakpoints) {
        for bp in &entry.breakpoints {
            self.sink.send_event(DebugEvent::Breakpoint {
                reason: BreakpointReason::Changed,
                breakpoint: bp.to_changed(&entry.source),
            });
        }
    }
}
