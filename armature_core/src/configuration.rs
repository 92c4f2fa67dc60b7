// armature_core/src/configuration.rs

//! The frame forest and the global generalized-coordinate vector.
//!
//! Frames live in an index-stable arena; parent/child links are `FrameId`s.
//! The q-vector is the concatenation, in arena order, of every active joint
//! that owns its coordinates. Mimic joints read their source's slice.

use crate::error::{KinematicsError, Result};
use crate::frame::Frame;
use crate::joint::{CoordinateSource, Joint, JointType};
use crate::transformation::Transformation;
use crate::types::{FrameId, JointState};
use nalgebra::{Unit, Vector3};
use tracing::{debug, trace, warn};

/// Owns every frame of a kinematic forest.
///
/// Not internally synchronised: even `ensure_absolute` writes the cache, so a
/// configuration is driven from one thread at a time. Parallel rollouts work
/// on clones, which are full deep copies.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    pub(crate) frames: Vec<Option<Frame>>,
    q_dim: usize,
    pub(crate) pose_recomputations: usize,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Frame access ---

    pub fn frame(&self, id: FrameId) -> Result<&Frame> {
        self.frames
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(KinematicsError::UnknownFrame(id))
    }

    /// Mutable access to a frame's name and attachments. Poses and links are
    /// only writable through the configuration.
    pub fn frame_mut(&mut self, id: FrameId) -> Result<&mut Frame> {
        self.frames
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(KinematicsError::UnknownFrame(id))
    }

    /// Ids of all live frames, in arena order.
    pub fn frame_ids(&self) -> impl Iterator<Item = FrameId> + '_ {
        self.frames.iter().flatten().map(|f| f.id)
    }

    pub fn frames(&self) -> impl Iterator<Item = &Frame> + '_ {
        self.frames.iter().flatten()
    }

    pub fn roots(&self) -> Vec<FrameId> {
        self.frames().filter(|f| f.parent.is_none()).map(|f| f.id).collect()
    }

    /// First frame with the given name.
    pub fn frame_by_name(&self, name: &str) -> Result<FrameId> {
        self.frames()
            .find(|f| f.name == name)
            .map(|f| f.id)
            .ok_or_else(|| KinematicsError::UnknownName(name.to_string()))
    }

    /// Number of live frames.
    pub fn len(&self) -> usize {
        self.frames().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many cached absolute poses have been recomputed so far.
    pub fn pose_recomputations(&self) -> usize {
        self.pose_recomputations
    }

    // --- Creation / destruction ---

    /// Creates a frame with identity `Q`, appended to `parent`'s children.
    pub fn add_frame(&mut self, name: impl Into<String>, parent: Option<FrameId>) -> Result<FrameId> {
        if let Some(p) = parent {
            self.frame(p)?;
        }
        let id = self.push_frame(name.into(), parent);
        if let Some(p) = parent {
            let parent_frame = self.frame_mut(p)?;
            parent_frame.children.push(id);
            // Identity Q: a fresh child sits exactly on a valid parent.
            let inherited = parent_frame.x_is_valid.then_some(parent_frame.x);
            if let (Some(x), Some(frame)) = (inherited, self.frames[id.0].as_mut()) {
                frame.x = x;
                frame.x_is_valid = true;
            }
        }
        trace!(frame = %id, "added frame");
        Ok(id)
    }

    pub fn add_frame_with_pose(
        &mut self,
        name: impl Into<String>,
        parent: Option<FrameId>,
        relative: Transformation,
    ) -> Result<FrameId> {
        let id = self.add_frame(name, parent)?;
        self.set_relative(id, relative)?;
        Ok(id)
    }

    /// Allocates an arena slot. The caller is responsible for the parent's
    /// children list.
    pub(crate) fn push_frame(&mut self, name: String, parent: Option<FrameId>) -> FrameId {
        let id = FrameId(self.frames.len());
        self.frames.push(Some(Frame::new(id, name, parent)));
        id
    }

    /// Deletes a leaf frame. Frames with children are refused; detach them
    /// first or use [`Configuration::delete_subtree`].
    pub fn delete_frame(&mut self, id: FrameId) -> Result<()> {
        let frame = self.frame(id)?;
        if !frame.children.is_empty() {
            return Err(KinematicsError::HasChildren {
                frame: id,
                children: frame.children.len(),
            });
        }
        if let Some(p) = frame.parent {
            self.frame_mut(p)?.children.retain(|c| *c != id);
        }
        self.release_mimickers(id);
        self.frames[id.0] = None;
        self.reindex_q();
        debug!(frame = %id, "deleted frame");
        Ok(())
    }

    /// Deletes `id` and everything below it. Returns how many frames went away.
    pub fn delete_subtree(&mut self, id: FrameId) -> Result<usize> {
        let mut doomed = self.subtree(id)?;
        // Pre-order reversed: every frame comes before its ancestors.
        doomed.reverse();
        doomed.push(id);
        for fid in &doomed {
            self.delete_frame(*fid)?;
        }
        Ok(doomed.len())
    }

    // --- Joints ---

    pub fn joint(&self, id: FrameId) -> Result<&Joint> {
        self.frame(id)?
            .joint
            .as_ref()
            .ok_or(KinematicsError::NoJoint(id))
    }

    /// Mutable access to a joint's derived data (limits, q0, costs, scale).
    /// Type and coordinate source stay with the configuration.
    pub fn joint_mut(&mut self, id: FrameId) -> Result<&mut Joint> {
        self.frame_mut(id)?
            .joint
            .as_mut()
            .ok_or(KinematicsError::NoJoint(id))
    }

    /// Articulates `id` with `joint`, replacing any previous joint. `Q` is left
    /// as is; the joint's coordinates are read back from it.
    pub fn attach_joint(&mut self, id: FrameId, joint: Joint) -> Result<()> {
        let old_dim = self.frame(id)?.joint.as_ref().map(Joint::dim);
        if old_dim.is_some_and(|d| d != joint.dim()) {
            self.release_mimickers(id);
        }
        debug!(frame = %id, joint_type = %joint.joint_type(), "attached joint");
        self.frame_mut(id)?.joint = Some(joint);
        self.reindex_q();
        Ok(())
    }

    /// Changes the type of the joint on `id`. On a change of dimension the
    /// joint stops mimicking, its mimickers are released, and q0/limits are
    /// reset; the q-vector is reindexed either way.
    pub fn set_joint_type(&mut self, id: FrameId, joint_type: JointType) -> Result<()> {
        let old = self.joint(id)?.joint_type();
        if old.dim() != joint_type.dim() {
            self.release_mimickers(id);
            let joint = self.joint_mut(id)?;
            if joint.is_mimic() {
                joint.source = CoordinateSource::Owned { q_index: None };
            }
        }
        self.joint_mut(id)?.set_type(joint_type);
        self.reindex_q();
        debug!(frame = %id, from = %old, to = %joint_type, "changed joint type");
        Ok(())
    }

    pub fn make_rigid(&mut self, id: FrameId) -> Result<()> {
        self.set_joint_type(id, JointType::Rigid)
    }

    pub fn make_free(&mut self, id: FrameId, h_cost: f64) -> Result<()> {
        self.set_joint_type(id, JointType::Free)?;
        self.joint_mut(id)?.h_cost = h_cost;
        Ok(())
    }

    /// Removes the joint from `id`, making its edge rigid.
    pub fn remove_joint(&mut self, id: FrameId) -> Result<Option<Joint>> {
        self.frame(id)?;
        self.release_mimickers(id);
        let joint = self.frame_mut(id)?.joint.take();
        self.reindex_q();
        Ok(joint)
    }

    /// Adds or removes the joint from the q-vector.
    pub fn set_active(&mut self, id: FrameId, active: bool) -> Result<()> {
        self.joint_mut(id)?.active = active;
        self.reindex_q();
        Ok(())
    }

    /// Makes the joint on `id` mimic the joint on `source`, scaled by the
    /// joint's own `scale`.
    ///
    /// Refused when `source` itself mimics something, when `id` is already a
    /// mimic source, or (unless `unset_previous`) when `id` already mimics.
    pub fn set_mimic(&mut self, id: FrameId, source: FrameId, unset_previous: bool) -> Result<()> {
        let joint = self.joint(id)?;
        let source_joint = self.joint(source)?;
        let chain = |reason| KinematicsError::MimicChain {
            frame: id,
            source_frame: source,
            reason,
        };
        if id == source {
            return Err(chain("a joint cannot mimic itself"));
        }
        if source_joint.is_mimic() {
            return Err(chain("the source already mimics another joint"));
        }
        if joint.is_mimic() && !unset_previous {
            return Err(KinematicsError::MimicAlreadySet(id));
        }
        if joint.dim() != source_joint.dim() {
            return Err(KinematicsError::DimensionMismatch {
                frame: id,
                expected: source_joint.dim(),
                got: joint.dim(),
            });
        }
        let scale = joint.scale;
        if !self.mimickers(id).is_empty() {
            return Err(chain("the joint is itself a mimic source"));
        }

        let source_state = self.calc_dofs_from_config(source)?;
        let joint = self.joint_mut(id)?;
        joint.source = CoordinateSource::MimicOf { source, scale };
        let relative = joint.transform_from_dofs(source_state.as_slice());
        self.set_relative(id, relative)?;
        self.reindex_q();
        debug!(frame = %id, source = %source, scale, "set mimic");
        Ok(())
    }

    /// Turns a mimic back into a joint owning its coordinates.
    pub fn unset_mimic(&mut self, id: FrameId) -> Result<()> {
        let joint = self.joint_mut(id)?;
        if joint.is_mimic() {
            joint.source = CoordinateSource::Owned { q_index: None };
            self.reindex_q();
        }
        Ok(())
    }

    /// Frames whose joint mimics `source`.
    pub fn mimickers(&self, source: FrameId) -> Vec<FrameId> {
        self.frames()
            .filter(|f| f.joint.as_ref().and_then(Joint::mimic_source) == Some(source))
            .map(|f| f.id)
            .collect()
    }

    /// Clears every mimic reference pointing at `source`.
    fn release_mimickers(&mut self, source: FrameId) {
        for frame in self.frames.iter_mut().flatten() {
            if let Some(joint) = frame.joint.as_mut() {
                if joint.mimic_source() == Some(source) {
                    warn!(frame = %frame.id, source = %source, "mimic source removed; joint now owns its coordinates");
                    joint.source = CoordinateSource::Owned { q_index: None };
                }
            }
        }
    }

    /// World-frame axis of a single-axis joint.
    pub fn joint_axis_world(&mut self, id: FrameId) -> Result<Option<Unit<Vector3<f64>>>> {
        let Some(axis) = self.joint(id)?.local_axis() else {
            return Ok(None);
        };
        let x = self.ensure_absolute(id)?;
        Ok(Some(x.rotation * axis))
    }

    // --- The q-vector ---

    fn reindex_q(&mut self) {
        let mut next = 0;
        for frame in self.frames.iter_mut().flatten() {
            let Some(joint) = frame.joint.as_mut() else {
                continue;
            };
            let dim = joint.dim();
            let active = joint.active;
            if let CoordinateSource::Owned { q_index } = &mut joint.source {
                if active {
                    *q_index = Some(next);
                    next += dim;
                } else {
                    *q_index = None;
                }
            }
        }
        self.q_dim = next;
    }

    /// Length of the q-vector.
    pub fn q_dim(&self) -> usize {
        self.q_dim
    }

    /// Frames owning a slice of the q-vector, in q order.
    pub fn q_frames(&self) -> Vec<FrameId> {
        self.frames()
            .filter(|f| f.joint.as_ref().and_then(Joint::q_index).is_some())
            .map(|f| f.id)
            .collect()
    }

    /// Frames with an active joint, mimics included.
    pub fn joint_frames(&self) -> Vec<FrameId> {
        self.frames()
            .filter(|f| f.joint.as_ref().is_some_and(Joint::is_active))
            .map(|f| f.id)
            .collect()
    }

    pub fn q_index(&self, id: FrameId) -> Result<Option<usize>> {
        Ok(self.joint(id)?.q_index())
    }

    /// Where a joint reads its coordinates from in the q-vector.
    fn q_start(&self, joint: &Joint, offset: Option<usize>) -> Result<Option<usize>> {
        Ok(match joint.source {
            CoordinateSource::MimicOf { source, .. } => self.joint(source)?.q_index(),
            CoordinateSource::Owned { q_index } => offset.or(q_index),
        })
    }

    /// Sets the joint on `id` from `global_q`.
    ///
    /// Owned joints read `dim` values at `offset` (default: their own q
    /// index); mimics always read at their source's index. A slice that runs
    /// past the end of `global_q` is a [`KinematicsError::DimensionMismatch`].
    /// Values written to an owned joint are forwarded to its mimics.
    pub fn set_dofs(&mut self, id: FrameId, global_q: &[f64], offset: Option<usize>) -> Result<()> {
        let joint = self.joint(id)?;
        let dim = joint.dim();
        let values = match self.q_start(joint, offset)? {
            Some(start) => {
                let end = start.checked_add(dim).filter(|end| *end <= global_q.len()).ok_or(
                    KinematicsError::DimensionMismatch {
                        frame: id,
                        expected: start.saturating_add(dim),
                        got: global_q.len(),
                    },
                )?;
                JointState::from_column_slice(&global_q[start..end])
            }
            None => match joint.source {
                // Source is out of the q-vector; follow its current state.
                CoordinateSource::MimicOf { source, .. } => self.calc_dofs_from_config(source)?,
                CoordinateSource::Owned { .. } => {
                    if global_q.len() != dim {
                        return Err(KinematicsError::DimensionMismatch {
                            frame: id,
                            expected: dim,
                            got: global_q.len(),
                        });
                    }
                    JointState::from_column_slice(global_q)
                }
            },
        };
        let relative = self.joint(id)?.transform_from_dofs(values.as_slice());
        self.set_relative(id, relative)?;
        self.forward_to_mimickers(id, values.as_slice())
    }

    /// Sets every mimic of `source` from the source's q-vector values.
    fn forward_to_mimickers(&mut self, source: FrameId, q: &[f64]) -> Result<()> {
        for mimic in self.mimickers(source) {
            let relative = self.joint(mimic)?.transform_from_dofs(q);
            self.set_relative(mimic, relative)?;
        }
        Ok(())
    }

    /// Recovers the joint's q-vector values from its current relative transform.
    ///
    /// Periodic and redundant parameterizations are canonicalised: angles in
    /// `(-π, π]`, quaternions with `w >= 0`.
    pub fn calc_dofs_from_config(&self, id: FrameId) -> Result<JointState> {
        let frame = self.frame(id)?;
        let joint = frame.joint.as_ref().ok_or(KinematicsError::NoJoint(id))?;
        Ok(joint.dofs_from_transform(&frame.q))
    }

    /// Alias of [`Configuration::calc_dofs_from_config`] for callers thinking in joint terms.
    pub fn joint_state(&self, id: FrameId) -> Result<JointState> {
        self.calc_dofs_from_config(id)
    }

    /// Writes one joint's coordinates and forwards them to its mimics.
    pub fn set_joint_state(&mut self, id: FrameId, q: &[f64]) -> Result<()> {
        let joint = self.joint(id)?;
        if joint.is_mimic() {
            return Err(KinematicsError::MimicJoint(id));
        }
        if q.len() != joint.dim() {
            return Err(KinematicsError::DimensionMismatch {
                frame: id,
                expected: joint.dim(),
                got: q.len(),
            });
        }
        let relative = joint.transform_from_dofs(q);
        self.set_relative(id, relative)?;
        self.forward_to_mimickers(id, q)
    }

    /// The global q-vector, read back from every owning joint.
    pub fn assemble_q(&self) -> JointState {
        let mut q = JointState::zeros(self.q_dim);
        for frame in self.frames() {
            let Some(joint) = frame.joint.as_ref() else {
                continue;
            };
            if let Some(start) = joint.q_index() {
                let values = joint.dofs_from_transform(&frame.q);
                q.rows_mut(start, values.len()).copy_from(&values);
            }
        }
        q
    }

    /// Writes the whole q-vector, then recomputes every absolute pose in one
    /// top-down pass instead of leaving the tree to lazy revalidation.
    pub fn scatter_q(&mut self, q: &[f64]) -> Result<()> {
        if q.len() != self.q_dim {
            return Err(KinematicsError::StateDimensionMismatch {
                expected: self.q_dim,
                got: q.len(),
            });
        }
        let mut updates = Vec::new();
        for frame in self.frames() {
            let Some(joint) = frame.joint.as_ref().filter(|j| j.is_active()) else {
                continue;
            };
            if let Some(start) = self.q_start(joint, None)? {
                updates.push((frame.id, joint.transform_from_dofs(&q[start..start + joint.dim()])));
            }
        }
        for (id, relative) in updates {
            self.frame_mut(id)?.q = relative;
        }
        self.compute_all_absolute();
        Ok(())
    }

    /// Recomputes and validates every absolute pose, parents before children.
    pub fn compute_all_absolute(&mut self) {
        let mut stack: Vec<(FrameId, Transformation)> = self
            .roots()
            .into_iter()
            .map(|r| (r, Transformation::identity()))
            .collect();
        let mut touched = 0;
        while let Some((id, parent_x)) = stack.pop() {
            let Some(frame) = self.frames.get_mut(id.0).and_then(Option::as_mut) else {
                continue;
            };
            frame.x = parent_x * frame.q;
            frame.x_is_valid = true;
            touched += 1;
            for &child in &frame.children {
                stack.push((child, frame.x));
            }
        }
        self.pose_recomputations += touched;
        trace!(frames = touched, "batch pose recomputation");
    }

    /// Null positions in q order; joints without a usable `q0` contribute
    /// their identity coordinates.
    pub fn null_q(&self) -> JointState {
        let mut q = JointState::zeros(self.q_dim);
        for frame in self.frames() {
            let Some(joint) = frame.joint.as_ref() else {
                continue;
            };
            if let Some(start) = joint.q_index() {
                let q0 = if joint.q0.len() == joint.dim() {
                    joint.q0.clone()
                } else {
                    joint.joint_type().zero_coordinates()
                };
                q.rows_mut(start, q0.len()).copy_from(&q0);
            }
        }
        q
    }

    // --- Diagnostics ---

    /// Verifies the structural invariants: a forest with agreeing
    /// parent/children links, a stale-implies-stale-descendants cache,
    /// one-level mimics, and a dense q-vector layout.
    pub fn check_consistency(&self) -> Result<()> {
        let fail = |msg: String| Err(KinematicsError::Inconsistent(msg));
        let n = self.frames.len();
        for (index, slot) in self.frames.iter().enumerate() {
            let Some(f) = slot else { continue };
            if f.id.0 != index {
                return fail(format!("frame at slot {index} claims id {}", f.id));
            }
            if let Some(p) = f.parent {
                let Ok(parent) = self.frame(p) else {
                    return fail(format!("{} has dead parent {p}", f.id));
                };
                let hits = parent.children.iter().filter(|c| **c == f.id).count();
                if hits != 1 {
                    return fail(format!("{} listed {hits} times under {p}", f.id));
                }
                if f.x_is_valid && !parent.x_is_valid {
                    return fail(format!("{} is valid below stale parent {p}", f.id));
                }
            }
            for c in &f.children {
                match self.frame(*c) {
                    Ok(child) if child.parent == Some(f.id) => {}
                    _ => return fail(format!("{} lists {c} as child but it disagrees", f.id)),
                }
            }
            let mut cursor = f.parent;
            let mut hops = 0;
            while let Some(p) = cursor {
                hops += 1;
                if hops > n {
                    return fail(format!("{} sits on a cycle", f.id));
                }
                cursor = self.frame(p)?.parent;
            }
            if let Some(source) = f.joint.as_ref().and_then(Joint::mimic_source) {
                match self.frame(source).ok().and_then(|s| s.joint.as_ref()) {
                    Some(sj) if !sj.is_mimic() => {}
                    _ => return fail(format!("{} mimics {source}, which is not an owning joint", f.id)),
                }
            }
        }

        let mut slices: Vec<(usize, usize)> = self
            .frames()
            .filter_map(|f| f.joint.as_ref())
            .filter_map(|j| j.q_index().map(|i| (i, j.dim())))
            .collect();
        slices.sort_unstable();
        let mut expected = 0;
        for (start, dim) in slices {
            if start != expected {
                return fail(format!("q slice starts at {start}, expected {expected}"));
            }
            expected += dim;
        }
        if expected != self.q_dim {
            return fail(format!("q slices cover {expected} of {} entries", self.q_dim));
        }
        Ok(())
    }
}
