//! vmdap スクリプトバイナリ解析
//!
//! このクレートは、コンパイル済みスクリプトバイナリの読み込みとキャッシュを提供します。
//! スクリプト名の正規化、名前から導出する安定した参照ID、関数ごとの行番号テーブル、
//! 逆コンパイルによるソーステキストの生成を扱います。

pub mod binary;
pub mod cache;
pub mod decompile;
pub mod lines;
pub mod loader;
pub mod names;

pub use binary::{FunctionInfo, ScriptBinary};
pub use cache::{BytecodeCache, SourceData};
pub use decompile::{Decompiler, ListingDecompiler};
pub use lines::LineTable;
pub use loader::{BinaryDecoder, FsScriptLoader, JsonBinaryDecoder, MemoryScriptLoader, ScriptLoader};
pub use names::{
    demangle_name, normalize_script_name, script_name_to_source_path, script_reference,
    ScriptReference,
};

/// バイナリ解析の結果型
pub type Result<T> = anyhow::Result<T>;
