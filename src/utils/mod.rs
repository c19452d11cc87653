//! Utility modules providing cross-cutting functionality.
//!
//! Currently this hosts the conditional parallel-processing layer used by the
//! multi-structure matching pipeline.

pub mod parallel;
