//! スクリプトバイナリのローダー

use crate::binary::ScriptBinary;
use crate::names::normalize_script_name;
use crate::Result;
use anyhow::Context;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// スクリプト名からバイナリを読み込む
pub trait ScriptLoader: Send + Sync {
    /// バイナリを読み込む
    ///
    /// リソースが存在しない場合は `Ok(None)` を返す。
    fn load(&self, name: &str) -> Result<Option<ScriptBinary>>;
}

/// バイト列をスクリプトバイナリに変換する
pub trait BinaryDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<ScriptBinary>;
}

/// JSON 形式のバイナリ記述を読むデコーダ
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonBinaryDecoder;

impl BinaryDecoder for JsonBinaryDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<ScriptBinary> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// ディレクトリからバイナリを読み込むローダー
///
/// `Quests:MyQuest` は `<root>/Quests/MyQuest.<extension>` に対応する。
pub struct FsScriptLoader {
    root: PathBuf,
    extension: String,
    decoder: Box<dyn BinaryDecoder>,
}

impl FsScriptLoader {
    pub fn new(root: impl Into<PathBuf>, extension: &str, decoder: Box<dyn BinaryDecoder>) -> Self {
        Self {
            root: root.into(),
            extension: extension.trim_start_matches('.').to_string(),
            decoder,
        }
    }

    /// JSON 記述を読むローダーを作成する
    pub fn json(root: impl Into<PathBuf>) -> Self {
        Self::new(root, "json", Box::new(JsonBinaryDecoder))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// スクリプト名に対応するファイルパス
    pub fn path_for(&self, name: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in normalize_script_name(name).split(':') {
            path.push(part);
        }
        path.set_extension(&self.extension);
        path
    }
}

impl ScriptLoader for FsScriptLoader {
    fn load(&self, name: &str) -> Result<Option<ScriptBinary>> {
        let path = self.path_for(name);
        if !path.is_file() {
            tracing::debug!("script binary not found: {}", path.display());
            return Ok(None);
        }

        let bytes = std::fs::read(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let binary = self
            .decoder
            .decode(&bytes)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        Ok(Some(binary))
    }
}

/// メモリ上のバイナリを返すローダー
///
/// `insert` で差し替えるとホットリロードを再現できる。
#[derive(Default)]
pub struct MemoryScriptLoader {
    scripts: RwLock<HashMap<String, ScriptBinary>>,
}

impl MemoryScriptLoader {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str) -> String {
        normalize_script_name(name).to_lowercase()
    }

    /// バイナリを登録する（同名があれば置き換える）
    pub fn insert(&self, name: &str, binary: ScriptBinary) {
        self.scripts.write().insert(Self::key(name), binary);
    }

    /// バイナリを取り除く
    pub fn remove(&self, name: &str) -> Option<ScriptBinary> {
        self.scripts.write().remove(&Self::key(name))
    }
}

impl ScriptLoader for MemoryScriptLoader {
    fn load(&self, name: &str) -> Result<Option<ScriptBinary>> {
        Ok(self.scripts.read().get(&Self::key(name)).cloned())
    }
}
