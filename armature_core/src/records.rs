// armature_core/src/records.rs

//! Flat, serde-friendly records of a configuration, as exchanged with an
//! external key/value graph container. References between frames (parent,
//! mimic source) are by name.

use crate::attachments::{Attributes, BodyType, Inertia, Shape};
use crate::configuration::Configuration;
use crate::error::{KinematicsError, Result};
use crate::joint::{Joint, JointType};
use crate::transformation::{Transformation, TransformationExt};
use crate::types::{FrameId, JointState};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

fn default_one() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointRecord {
    #[serde(rename = "type")]
    pub joint_type: JointType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub q0: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub limits: Vec<f64>,
    #[serde(default = "default_one")]
    pub scale: f64,
    #[serde(default = "default_one")]
    pub h_cost: f64,
    /// Name of the frame whose joint this one mimics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimic: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InertiaRecord {
    pub mass: f64,
    #[serde(default)]
    pub com: [f64; 3],
    /// Row-major tensor about `com`.
    #[serde(default)]
    pub matrix: [[f64; 3]; 3],
    #[serde(default)]
    pub body_type: BodyType,
}

impl From<&Inertia> for InertiaRecord {
    fn from(inertia: &Inertia) -> Self {
        let m = &inertia.matrix;
        Self {
            mass: inertia.mass,
            com: [inertia.com.x, inertia.com.y, inertia.com.z],
            matrix: [
                [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
                [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
                [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
            ],
            body_type: inertia.body_type,
        }
    }
}

impl From<&InertiaRecord> for Inertia {
    fn from(record: &InertiaRecord) -> Self {
        Self {
            mass: record.mass,
            com: Vector3::from(record.com),
            matrix: Matrix3::from_fn(|r, c| record.matrix[r][c]),
            body_type: record.body_type,
        }
    }
}

/// One frame: its name, parent name, relative pose `[x, y, z, qw, qx, qy, qz]`
/// and attachments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default = "identity_pose")]
    pub pose: [f64; 7],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joint: Option<JointRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Shape>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inertia: Option<InertiaRecord>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

fn identity_pose() -> [f64; 7] {
    Transformation::identity().to_pose7()
}

impl Configuration {
    /// Every live frame as a record, in arena order.
    pub fn to_records(&self) -> Vec<FrameRecord> {
        let name_of = |id: FrameId| self.frame(id).map(|f| f.name.clone()).ok();
        self.frames()
            .map(|f| FrameRecord {
                name: f.name.clone(),
                parent: f.parent.and_then(name_of),
                pose: f.q.to_pose7(),
                joint: f.joint.as_ref().map(|j| JointRecord {
                    joint_type: j.joint_type(),
                    q0: j.q0.iter().copied().collect(),
                    limits: j.limits.clone(),
                    scale: j.scale,
                    h_cost: j.h_cost,
                    mimic: j.mimic_source().and_then(name_of),
                    active: j.is_active(),
                }),
                shape: f.shape.clone(),
                inertia: f.inertia.as_ref().map(InertiaRecord::from),
                attributes: f.attributes.clone(),
            })
            .collect()
    }

    /// Rebuilds a configuration from records. Frame names must be unique;
    /// parents and mimic sources are resolved after every frame exists, so
    /// records may come in any order. Siblings keep record order.
    pub fn from_records(records: &[FrameRecord]) -> Result<Configuration> {
        let mut cfg = Configuration::new();
        let mut by_name: HashMap<&str, FrameId> = HashMap::with_capacity(records.len());
        for record in records {
            let id = cfg.push_frame(record.name.clone(), None);
            if by_name.insert(record.name.as_str(), id).is_some() {
                return Err(KinematicsError::InvalidRecord(format!(
                    "duplicate frame name '{}'",
                    record.name
                )));
            }
        }
        let lookup = |name: &str, role: &str, owner: &str| {
            by_name.get(name).copied().ok_or_else(|| {
                KinematicsError::InvalidRecord(format!("frame '{owner}' names unknown {role} '{name}'"))
            })
        };

        for (index, record) in records.iter().enumerate() {
            let id = FrameId(index);
            if let Some(parent) = record.parent.as_deref() {
                let parent = lookup(parent, "parent", &record.name)?;
                cfg.set_parent(id, parent, false, true)?;
            }
            cfg.set_relative(id, Transformation::from_pose7(&record.pose))?;

            let frame = cfg.frame_mut(id)?;
            frame.shape = record.shape.clone();
            frame.inertia = record.inertia.as_ref().map(Inertia::from);
            frame.attributes = record.attributes.clone();

            if let Some(jr) = &record.joint {
                cfg.attach_joint(id, joint_from_record(jr, &record.name)?)?;
            }
        }

        for (index, record) in records.iter().enumerate() {
            if let Some(source) = record.joint.as_ref().and_then(|j| j.mimic.as_deref()) {
                let source = lookup(source, "mimic source", &record.name)?;
                cfg.set_mimic(FrameId(index), source, false)?;
            }
        }
        debug!(frames = records.len(), q_dim = cfg.q_dim(), "configuration built from records");
        Ok(cfg)
    }
}

fn joint_from_record(record: &JointRecord, owner: &str) -> Result<Joint> {
    let dim = record.joint_type.dim();
    if !record.q0.is_empty() && record.q0.len() != dim {
        return Err(KinematicsError::InvalidRecord(format!(
            "joint on '{owner}' has q0 of length {} for a {} joint of dimension {dim}",
            record.q0.len(),
            record.joint_type
        )));
    }
    let mut joint = Joint::new(record.joint_type)
        .with_limits(record.limits.clone())
        .with_scale(record.scale);
    if !record.q0.is_empty() {
        joint.q0 = JointState::from_column_slice(&record.q0);
    }
    joint.h_cost = record.h_cost;
    joint.active = record.active;
    Ok(joint)
}
