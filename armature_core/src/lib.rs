// armature_core/src/lib.rs

// The kinematic core: frames, joints and the configuration that owns them.
// Pure library; it logs through `tracing` but never installs a subscriber.
pub mod attachments;
pub mod configuration;
pub mod error;
pub mod frame;
pub mod joint;
pub mod links;
pub mod prelude;
pub mod records;
pub mod transformation;
pub mod types;
