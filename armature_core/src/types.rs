// armature_core/src/types.rs

use nalgebra::DVector;
use std::fmt;

// --- Core Type Aliases ---
/// A generalized-coordinate vector (the global `q`, or one joint's slice of it).
pub type JointState = DVector<f64>;

// --- Core Identifier ---
/// Stable index of a frame inside its owning `Configuration`.
///
/// Ids are never reused: deleting a frame leaves a hole in the arena, so an id
/// handed out once keeps pointing at "that frame or nothing".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FrameId(pub usize);

impl FrameId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<usize> for FrameId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}
