//! Process-tree termination.

mod tree;

pub use tree::{KillPolicy, kill_process_tree};
