//! スクリプトバイナリのモデル

use crate::lines::LineTable;
use serde::{Deserialize, Serialize};

/// 関数のデバッグ情報
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionInfo {
    /// 所属オブジェクト名
    pub object: String,
    /// 所属ステート名（空文字は既定ステート）
    pub state: String,
    pub name: String,
    pub line_numbers: LineTable,
    /// 命令ごとの逆アセンブル結果
    pub instructions: Vec<String>,
}

/// 解析済みのスクリプトバイナリ
///
/// 一度ロードしたら変更しない。リロード時は丸ごと差し替える。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptBinary {
    pub script_name: String,
    /// ヘッダに埋め込まれたソースファイル名
    pub source_file_name: String,
    /// コンパイル時刻（リロード検出に使う）
    pub modification_time: u64,
    pub functions: Vec<FunctionInfo>,
}

impl ScriptBinary {
    /// 関数ごとの行番号テーブルを持つかどうか
    pub fn has_debug_info(&self) -> bool {
        self.functions.iter().any(|f| !f.line_numbers.is_empty())
    }

    /// ステート名と関数名から関数インデックスを探す（大文字小文字を区別しない）
    pub fn find_function(&self, state: &str, name: &str) -> Option<usize> {
        self.functions.iter().position(|f| {
            f.state.eq_ignore_ascii_case(state) && f.name.eq_ignore_ascii_case(name)
        })
    }

    /// 指定した行に対応する最初の (関数インデックス, 命令インデックス)
    ///
    /// 関数の並び順、命令の並び順で最初に見つかったものを返す。
    pub fn find_first_instruction(&self, line: u32) -> Option<(usize, u32)> {
        self.functions.iter().enumerate().find_map(|(index, f)| {
            f.line_numbers
                .first_instruction_for_line(line)
                .map(|ip| (index, ip))
        })
    }

    /// 関数の命令に対応するソース行
    pub fn line_for(&self, function: usize, ip: u32) -> Option<u32> {
        self.functions
            .get(function)
            .and_then(|f| f.line_numbers.line_for_instruction(ip))
    }
}
