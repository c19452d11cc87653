//! Optimal rigid-body superposition.
//!
//! [`OptimalTransformation`] solves the least-squares rotation between two ordered point
//! sets with a quaternion eigen-problem; [`EigenWorkspace`] holds the scratch space so
//! every worker thread can reuse one buffer across millions of calls.

pub mod eigen;
mod transform;

pub use eigen::EigenWorkspace;
pub use transform::OptimalTransformation;
