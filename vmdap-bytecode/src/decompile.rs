//! 逆コンパイル

use crate::binary::ScriptBinary;
use crate::names::script_name_to_source_path;
use crate::Result;
use anyhow::anyhow;

/// バイナリからソーステキストを復元する
pub trait Decompiler: Send + Sync {
    /// 行の並びとしてソースを返す
    fn decompile(&self, binary: &ScriptBinary) -> Result<Vec<String>>;
}

/// 関数ごとの命令リストとしてソースを描画する逆コンパイラ
///
/// 各命令に元のソース行番号を併記する。
#[derive(Debug, Default, Clone, Copy)]
pub struct ListingDecompiler;

impl Decompiler for ListingDecompiler {
    fn decompile(&self, binary: &ScriptBinary) -> Result<Vec<String>> {
        if binary.script_name.is_empty() && binary.functions.is_empty() {
            return Err(anyhow!("script binary is empty"));
        }

        let source = if binary.source_file_name.is_empty() {
            script_name_to_source_path(&binary.script_name)
        } else {
            binary.source_file_name.clone()
        };

        let mut lines = vec![format!("ScriptName {} ; {}", binary.script_name, source)];
        for function in &binary.functions {
            lines.push(String::new());
            if !function.state.is_empty() {
                lines.push(format!("State {}", function.state));
            }
            lines.push(format!("Function {}()", function.name));
            for (ip, line) in function.line_numbers.iter() {
                let text = function
                    .instructions
                    .get(ip as usize)
                    .map(String::as_str)
                    .unwrap_or("");
                lines.push(format!("  {ip:>4}  ; line {line:<5} {text}").trim_end().to_string());
            }
            lines.push("EndFunction".to_string());
            if !function.state.is_empty() {
                lines.push("EndState".to_string());
            }
        }
        Ok(lines)
    }
}
