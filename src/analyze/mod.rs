// src/analyze/mod.rs
//! Oracle-backed narrowing: prompt construction, the oracle adapter and the two stages.

pub mod narrow;
pub mod oracle;
pub mod prompt;

// Re-export convenient types.
pub use crate::analyze::narrow::{parse_id_list, NarrowStage, Narrower};
pub use crate::analyze::oracle::{build_oracle, DynOracle, MockOracle, OpenAiOracle, Oracle};
