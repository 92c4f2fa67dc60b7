// armature_sim/src/prelude.rs

// Re-export the entire armature_core prelude so callers get the tree types too.
pub use armature_core::prelude::*;

pub use crate::bridge::{
    BodyDesc, BodyHandle, BodyShape, BodyVelocity, FrameVelocities, PhysicsBridge, RigidBodyWorld,
};
pub use crate::config::BridgeOptions;
pub use crate::error::BridgeError;
pub use crate::telemetry::init_tracing;
