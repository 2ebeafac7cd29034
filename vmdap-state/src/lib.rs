//! vmdap 実行時状態ツリー
//!
//! このクレートは、VM の生きたデータ（スタック → フレーム → スコープ → 変数）を
//! ドット区切りのパスで辿れるツリーとして公開します。
//! ノードは要求のたびに VM から作り直し、パスとハンドルの対応だけをセッション中保持します。

pub mod array;
pub mod error;
pub mod frame;
pub mod ids;
pub mod meta;
pub mod node;
pub mod object;
pub mod path_table;
pub mod runtime;
pub mod scope;
pub mod stack;
pub mod structure;
pub mod value;

pub use array::ArrayNode;
pub use error::StateError;
pub use frame::FrameNode;
pub use ids::HandleAllocator;
pub use meta::MetaNode;
pub use node::{ResolvedNode, ScopeSerializable, StateNode, StructuredState, VariableSerializable};
pub use object::ObjectNode;
pub use path_table::PathTable;
pub use runtime::{create_node_for_variable, RuntimeState};
pub use scope::LocalScopeNode;
pub use stack::StackNode;
pub use structure::StructNode;
pub use value::{NullNode, ValueNode};

/// 状態ツリー操作の結果型
pub type Result<T> = std::result::Result<T, StateError>;
