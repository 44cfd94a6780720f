//! Git operations for the merge assistant.

pub mod client;
pub mod inspector;
pub mod parser;

pub use client::GitClient;
pub use inspector::{work_tree_root, RepositoryInspector};
