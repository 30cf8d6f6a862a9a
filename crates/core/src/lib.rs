//! SSA control-flow-graph IR: procedures, blocks, instructions and the graph primitives
//! obfuscation transforms are built on.

pub mod cfg_ir;

pub use cfg_ir::{Module, Procedure};
