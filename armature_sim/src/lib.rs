// armature_sim/src/lib.rs

// The simulator-facing adapter around `armature_core`: bridge options, the
// `RigidBodyWorld` seam, and the bridge that exchanges poses every step.

// This prelude is for convenience for users of the adapter crate.
pub mod prelude;

pub mod bridge;
pub mod config;
pub mod error;
pub mod telemetry;
