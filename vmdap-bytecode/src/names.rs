//! スクリプト名の正規化と参照ID

use regex::Regex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

/// スクリプト参照ID（DAP の sourceReference）
pub type ScriptReference = i64;

static EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(psc|pex)$").expect("valid extension pattern"));

static MANGLED_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^::(.+)_var$").expect("valid mangled name pattern"));

/// スクリプト名を正規化する
///
/// パス区切り（`\` と `/`）を名前空間区切り `:` に揃え、拡張子を取り除く。
/// 大文字小文字はそのまま残す（比較や参照IDの計算時に畳み込む）。
pub fn normalize_script_name(name: &str) -> String {
    let name = name.trim().replace('\\', "/").replace('/', ":");
    EXTENSION.replace(&name, "").into_owned()
}

/// スクリプト名から参照IDを求める
///
/// 正規化した名前を小文字化してハッシュし、`1..=i32::MAX` に収める。
/// 同じ名前からは常に同じ値になる。異なる名前の衝突は検出しない。
pub fn script_reference(name: &str) -> ScriptReference {
    let normalized = normalize_script_name(name).to_lowercase();

    let mut hasher = DefaultHasher::new();
    normalized.hash(&mut hasher);
    (hasher.finish() % i32::MAX as u64) as ScriptReference + 1
}

/// スクリプト名から表示用のソースパスを合成する
///
/// `Quests:MyQuest` → `Quests/MyQuest.psc`
pub fn script_name_to_source_path(name: &str) -> String {
    let path = normalize_script_name(name).replace(':', "/");
    format!("{path}.psc")
}

/// コンパイラが生成した変数名を元に戻す
///
/// `::count_var` → `count`。それ以外の名前はそのまま返す。
pub fn demangle_name(name: &str) -> String {
    match MANGLED_VARIABLE.captures(name) {
        Some(caps) => caps[1].to_string(),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_script_name() {
        assert_eq!(normalize_script_name("MyQuest.psc"), "MyQuest");
        assert_eq!(normalize_script_name("Quests\\MyQuest.PEX"), "Quests:MyQuest");
        assert_eq!(normalize_script_name("Quests/Sub/MyQuest"), "Quests:Sub:MyQuest");
        // 途中の .psc は拡張子ではない
        assert_eq!(normalize_script_name("a.psc.b"), "a.psc.b");
    }

    #[test]
    fn test_script_reference_is_case_insensitive() {
        let a = script_reference("Quests:MyQuest");
        assert_eq!(a, script_reference("quests/myquest.psc"));
        assert_eq!(a, script_reference("QUESTS\\MYQUEST"));
        assert!(a >= 1 && a <= i32::MAX as i64);
        assert_ne!(a, script_reference("Quests:OtherQuest"));
    }

    #[test]
    fn test_source_path() {
        assert_eq!(script_name_to_source_path("Quests:MyQuest"), "Quests/MyQuest.psc");
        assert_eq!(script_name_to_source_path("MyQuest.pex"), "MyQuest.psc");
    }

    #[test]
    fn test_demangle_name() {
        assert_eq!(demangle_name("::count_var"), "count");
        assert_eq!(demangle_name("::Alias_Player_var"), "Alias_Player");
        assert_eq!(demangle_name("count"), "count");
        assert_eq!(demangle_name("::temp0"), "::temp0");
    }
}
