// armature_core/src/error.rs

use crate::types::FrameId;
use thiserror::Error;

/// Every way a kinematic operation can be refused.
///
/// Operations that fail leave the `Configuration` exactly as it was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KinematicsError {
    #[error("frame {0} does not exist (never created or already deleted)")]
    UnknownFrame(FrameId),

    #[error("no frame named '{0}'")]
    UnknownName(String),

    #[error("reparenting {frame} under {new_parent} would create a loop")]
    WouldCreateLoop { frame: FrameId, new_parent: FrameId },

    #[error("dimension mismatch on {frame}: expected {expected} coordinates, got {got}")]
    DimensionMismatch {
        frame: FrameId,
        expected: usize,
        got: usize,
    },

    #[error("q-vector has {got} entries but the configuration has {expected} coordinates")]
    StateDimensionMismatch { expected: usize, got: usize },

    #[error("frame {0} has no joint attached")]
    NoJoint(FrameId),

    /// Mimic relations may only be one level deep.
    #[error("{frame} cannot mimic {source_frame}: {reason}")]
    MimicChain {
        frame: FrameId,
        source_frame: FrameId,
        reason: &'static str,
    },

    #[error("joint on {0} already mimics another joint (pass unset_previous to replace it)")]
    MimicAlreadySet(FrameId),

    #[error("joint on {0} mimics another joint; its state can only be written through its source")]
    MimicJoint(FrameId),

    #[error("frame {frame} still has {children} children; detach them or delete the subtree")]
    HasChildren { frame: FrameId, children: usize },

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),
}

pub type Result<T> = std::result::Result<T, KinematicsError>;
