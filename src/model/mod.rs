//! Core data structures modeling molecular structures handed to the matching engine.
//!
//! A [`structure::Structure`] is a flat atom list with explicit bonds. It is the
//! collaborator that graph construction reads from and that computed superpositions are
//! written back to.

pub mod atom;
pub mod structure;
pub mod topology;
pub mod types;
