// armature_sim/src/error.rs

use armature_core::attachments::BodyType;
use armature_core::error::KinematicsError;
use armature_core::types::FrameId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Kinematics(#[from] KinematicsError),

    #[error("failed to load bridge options: {0}")]
    Options(#[from] figment::Error),

    #[error("failed to render bridge options: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("time step must be positive and finite, got {0}")]
    InvalidTimeStep(f64),

    #[error("frame {0} has no simulated body")]
    NoBody(FrameId),

    #[error("bodies can only be switched to kinematic or dynamic, not {0:?}")]
    UnsupportedBodyType(BodyType),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
