//! Hierarchy engine: tree assembly, cascading mutation, combo validation,
//! and leaf collection over the flat category records.

pub mod builder;
pub mod cascade;
pub mod combo;
pub mod leaves;
pub mod tree;

pub use builder::TreeBuilder;
pub use cascade::CascadeOperator;
pub use combo::{ComboService, ComboValidator};
pub use leaves::{collect_leaves, LeafPath};
pub use tree::{CategoryTree, CategoryTreeView};
