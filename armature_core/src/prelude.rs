// armature_core/src/prelude.rs

// --- Core data structures ---
pub use crate::configuration::Configuration;
pub use crate::frame::Frame;
pub use crate::types::{FrameId, JointState};

// --- Joints ---
pub use crate::joint::{CoordinateSource, Joint, JointType};

// --- Transforms ---
pub use crate::transformation::{Transformation, TransformationExt};

// --- Attachments and persistence ---
pub use crate::attachments::{AttributeValue, Attributes, BodyType, Inertia, Shape, ShapeType};
pub use crate::records::{FrameRecord, InertiaRecord, JointRecord};

// --- Errors ---
pub use crate::error::{KinematicsError, Result};
