//! 行番号テーブル

use serde::{Deserialize, Serialize};

/// 関数ごとの行番号テーブル
///
/// `n` 番目の要素が `n` 番目の命令に対応するソース行。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineTable(pub Vec<u32>);

impl LineTable {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 指定した行に完全一致する最初の命令インデックス
    pub fn first_instruction_for_line(&self, line: u32) -> Option<u32> {
        self.0.iter().position(|&l| l == line).map(|ip| ip as u32)
    }

    /// 命令インデックスからソース行を求める
    ///
    /// テーブルの範囲外なら、それより手前で最も近い命令の行を返す。
    pub fn line_for_instruction(&self, ip: u32) -> Option<u32> {
        self.0
            .get(ip as usize)
            .or_else(|| self.0.last())
            .copied()
    }

    /// 命令インデックスとソース行の組を列挙する
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.0.iter().enumerate().map(|(ip, &line)| (ip as u32, line))
    }
}
