// armature_core/src/frame.rs

//! Frames and the lazily maintained world-pose cache.
//!
//! Every frame stores its relative transform `Q` (always authoritative) and a
//! cached absolute pose `X` with a validity flag. The tree keeps one invariant
//! that the rest of this file leans on: a stale frame only ever has stale
//! descendants. Invalidation can therefore stop as soon as it meets a frame
//! that is already stale, and revalidation only has to walk up to the nearest
//! valid ancestor.

use crate::attachments::{Attributes, Inertia, Shape};
use crate::configuration::Configuration;
use crate::error::{KinematicsError, Result};
use crate::joint::Joint;
use crate::transformation::{quat_from_wxyz, Transformation};
use crate::types::FrameId;
use nalgebra::{Translation3, UnitQuaternion, Vector3};
use tracing::{debug, trace};

/// A node of the kinematic tree. Owned by a [`Configuration`]; structural and
/// pose edits go through the configuration so the cache stays coherent.
#[derive(Debug, Clone)]
pub struct Frame {
    pub(crate) id: FrameId,
    pub name: String,
    pub(crate) parent: Option<FrameId>,
    pub(crate) children: Vec<FrameId>,
    /// Relative transform to the parent (absolute for roots).
    pub(crate) q: Transformation,
    /// Cached absolute pose, meaningful only while `x_is_valid`.
    pub(crate) x: Transformation,
    pub(crate) x_is_valid: bool,
    pub(crate) joint: Option<Joint>,
    pub shape: Option<Shape>,
    pub inertia: Option<Inertia>,
    pub attributes: Attributes,
}

impl Frame {
    pub(crate) fn new(id: FrameId, name: String, parent: Option<FrameId>) -> Self {
        Self {
            id,
            name,
            parent,
            children: Vec::new(),
            q: Transformation::identity(),
            x: Transformation::identity(),
            // A root at identity is trivially valid; a child has to be derived first.
            x_is_valid: parent.is_none(),
            joint: None,
            shape: None,
            inertia: None,
            attributes: Attributes::new(),
        }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<FrameId> {
        self.parent
    }

    pub fn children(&self) -> &[FrameId] {
        &self.children
    }

    pub fn relative(&self) -> &Transformation {
        &self.q
    }

    /// The cached absolute pose, or `None` while it is stale.
    pub fn cached_absolute(&self) -> Option<&Transformation> {
        self.x_is_valid.then_some(&self.x)
    }

    pub fn is_absolute_valid(&self) -> bool {
        self.x_is_valid
    }

    pub fn joint(&self) -> Option<&Joint> {
        self.joint.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

// --- Pose cache ---

impl Configuration {
    /// Current world pose of `id`, recomputing it if stale.
    ///
    /// Only the path from the nearest valid ancestor down to `id` is touched,
    /// and every frame on it is left valid.
    pub fn ensure_absolute(&mut self, id: FrameId) -> Result<Transformation> {
        let frame = self.frame(id)?;
        if frame.x_is_valid {
            return Ok(frame.x);
        }

        // Climb until we hit a valid ancestor (or fall off the root).
        let mut stale_path = vec![id];
        let mut base = Transformation::identity();
        let mut cursor = frame.parent;
        while let Some(parent) = cursor {
            let p = self.frame(parent)?;
            if p.x_is_valid {
                base = p.x;
                break;
            }
            stale_path.push(parent);
            if stale_path.len() > self.frames.len() {
                return Err(KinematicsError::Inconsistent(format!("{id} sits on a parent cycle")));
            }
            cursor = p.parent;
        }

        for fid in stale_path.into_iter().rev() {
            let f = self.frame_mut(fid)?;
            base *= f.q;
            f.x = base;
            f.x_is_valid = true;
            self.pose_recomputations += 1;
        }
        Ok(base)
    }

    /// The relative transform, which is never stale.
    pub fn relative(&self, id: FrameId) -> Result<Transformation> {
        Ok(self.frame(id)?.q)
    }

    pub fn is_absolute_valid(&self, id: FrameId) -> Result<bool> {
        Ok(self.frame(id)?.x_is_valid)
    }

    /// Writes `Q(id)` and invalidates the absolute pose of `id` and its subtree.
    pub fn set_relative(&mut self, id: FrameId, relative: Transformation) -> Result<()> {
        self.frame_mut(id)?.q = relative;
        self.invalidate_subtree(id);
        Ok(())
    }

    /// Writes `X(id)` directly.
    ///
    /// Equivalent to storing `Q = inverse(X(parent)) ∘ X`; `id` itself stays
    /// valid with exactly the given pose while its descendants go stale.
    pub fn set_absolute(&mut self, id: FrameId, absolute: Transformation) -> Result<()> {
        let parent = self.frame(id)?.parent;
        let relative = match parent {
            Some(p) => self.ensure_absolute(p)?.inv_mul(&absolute),
            None => absolute,
        };
        let frame = self.frame_mut(id)?;
        frame.q = relative;
        frame.x = absolute;
        frame.x_is_valid = true;
        let children = frame.children.clone();
        for child in children {
            self.invalidate_subtree(child);
        }
        Ok(())
    }

    /// Marks `id` and all of its descendants stale.
    pub(crate) fn invalidate_subtree(&mut self, id: FrameId) {
        let mut stack = vec![id];
        while let Some(fid) = stack.pop() {
            let Some(frame) = self.frames.get_mut(fid.0).and_then(Option::as_mut) else {
                continue;
            };
            // Stale frames only have stale descendants.
            if !frame.x_is_valid {
                continue;
            }
            frame.x_is_valid = false;
            stack.extend(frame.children.iter().copied());
        }
    }

    // --- Convenience setters/getters on top of the two write paths ---

    pub fn position(&mut self, id: FrameId) -> Result<Vector3<f64>> {
        Ok(self.ensure_absolute(id)?.translation.vector)
    }

    pub fn quaternion(&mut self, id: FrameId) -> Result<UnitQuaternion<f64>> {
        Ok(self.ensure_absolute(id)?.rotation)
    }

    pub fn set_position(&mut self, id: FrameId, position: Vector3<f64>) -> Result<()> {
        let mut x = self.ensure_absolute(id)?;
        x.translation = Translation3::from(position);
        self.set_absolute(id, x)
    }

    /// `wxyz`; normalized on the way in.
    pub fn set_quaternion(&mut self, id: FrameId, wxyz: [f64; 4]) -> Result<()> {
        let mut x = self.ensure_absolute(id)?;
        x.rotation = quat_from_wxyz(wxyz[0], wxyz[1], wxyz[2], wxyz[3]);
        self.set_absolute(id, x)
    }

    pub fn set_relative_position(&mut self, id: FrameId, position: Vector3<f64>) -> Result<()> {
        let mut q = self.relative(id)?;
        q.translation = Translation3::from(position);
        self.set_relative(id, q)
    }

    pub fn set_relative_quaternion(&mut self, id: FrameId, wxyz: [f64; 4]) -> Result<()> {
        let mut q = self.relative(id)?;
        q.rotation = quat_from_wxyz(wxyz[0], wxyz[1], wxyz[2], wxyz[3]);
        self.set_relative(id, q)
    }
}

// --- Structural edits ---

impl Configuration {
    /// Splices a new frame between `id` and its parent.
    ///
    /// The new frame gets `Q = a` and `id` gets `Q = inverse(a) ∘ Q_old`, so
    /// no absolute pose moves. Returns the new frame.
    pub fn insert_pre_link(&mut self, id: FrameId, a: Transformation) -> Result<FrameId> {
        let (parent, old_q, name) = {
            let f = self.frame(id)?;
            (f.parent, f.q, format!("{}_pre", f.name))
        };
        let link = self.push_frame(name, parent);
        if let Some(p) = parent {
            // Take over `id`'s slot so sibling order is preserved.
            let siblings = &mut self.frame_mut(p)?.children;
            if let Some(slot) = siblings.iter_mut().find(|c| **c == id) {
                *slot = link;
            }
        }
        {
            let l = self.frame_mut(link)?;
            l.children.push(id);
            l.q = a;
            l.x_is_valid = false;
        }
        {
            let f = self.frame_mut(id)?;
            f.parent = Some(link);
            f.q = a.inv_mul(&old_q);
        }
        self.invalidate_subtree(id);
        debug!(frame = %id, link = %link, "inserted pre-link");
        Ok(link)
    }

    /// Splices a new frame between `id` and all of its children.
    ///
    /// The new frame gets `Q = b` and every former child gets
    /// `Q = inverse(b) ∘ Q_old`. Returns the new frame.
    pub fn insert_post_link(&mut self, id: FrameId, b: Transformation) -> Result<FrameId> {
        let name = format!("{}_post", self.frame(id)?.name);
        let link = self.push_frame(name, Some(id));
        let children = std::mem::take(&mut self.frame_mut(id)?.children);
        for &child in &children {
            let c = self.frame_mut(child)?;
            c.parent = Some(link);
            c.q = b.inv_mul(&c.q);
        }
        for &child in &children {
            self.invalidate_subtree(child);
        }
        {
            let l = self.frame_mut(link)?;
            l.q = b;
            l.children = children;
        }
        self.frame_mut(id)?.children.push(link);
        self.invalidate_subtree(id);
        debug!(frame = %id, link = %link, "inserted post-link");
        Ok(link)
    }

    /// Detaches `id` from its parent; it becomes a root with its current `Q`
    /// as absolute pose. Children stay attached. No-op on roots.
    pub fn unlink(&mut self, id: FrameId) -> Result<()> {
        let Some(parent) = self.frame(id)?.parent else {
            trace!(frame = %id, "unlink on a root frame");
            return Ok(());
        };
        self.frame_mut(parent)?.children.retain(|c| *c != id);
        self.frame_mut(id)?.parent = None;
        self.invalidate_subtree(id);
        debug!(frame = %id, former_parent = %parent, "unlinked");
        Ok(())
    }

    /// Reattaches `id` under `new_parent`.
    ///
    /// With `keep_absolute_pose` the world pose is held and `Q` recomputed;
    /// otherwise `Q` is held and the world pose follows the new parent. With
    /// `check_for_loop` the call walks `new_parent`'s ancestors and refuses,
    /// without touching anything, if `id` is among them. Without it the caller
    /// guarantees `new_parent` is not below `id`; only direct self-parenting
    /// is still refused. A cycle slipped in this way is reported by
    /// `ensure_absolute` and `check_consistency` as
    /// [`KinematicsError::Inconsistent`].
    pub fn set_parent(
        &mut self,
        id: FrameId,
        new_parent: FrameId,
        keep_absolute_pose: bool,
        check_for_loop: bool,
    ) -> Result<()> {
        self.frame(id)?;
        self.frame(new_parent)?;
        if new_parent == id || (check_for_loop && self.is_ancestor(id, new_parent)?) {
            return Err(KinematicsError::WouldCreateLoop {
                frame: id,
                new_parent,
            });
        }

        let kept = if keep_absolute_pose {
            let x = self.ensure_absolute(id)?;
            let parent_x = self.ensure_absolute(new_parent)?;
            Some(parent_x.inv_mul(&x))
        } else {
            None
        };

        if let Some(old) = self.frame(id)?.parent {
            self.frame_mut(old)?.children.retain(|c| *c != id);
        }
        self.frame_mut(new_parent)?.children.push(id);
        let f = self.frame_mut(id)?;
        f.parent = Some(new_parent);
        if let Some(q) = kept {
            f.q = q;
        }
        self.invalidate_subtree(id);
        debug!(frame = %id, parent = %new_parent, keep_absolute_pose, "reparented");
        Ok(())
    }

    /// True iff `other` is reachable from `id` within `order` parent hops.
    pub fn is_child_of(&self, id: FrameId, other: FrameId, order: usize) -> Result<bool> {
        self.frame(other)?;
        let mut cursor = self.frame(id)?.parent;
        for _ in 0..order {
            match cursor {
                Some(p) if p == other => return Ok(true),
                Some(p) => cursor = self.frame(p)?.parent,
                None => return Ok(false),
            }
        }
        Ok(false)
    }

    /// True iff `ancestor` lies strictly above `id`.
    pub fn is_ancestor(&self, ancestor: FrameId, id: FrameId) -> Result<bool> {
        let mut cursor = self.frame(id)?.parent;
        while let Some(p) = cursor {
            if p == ancestor {
                return Ok(true);
            }
            cursor = self.frame(p)?.parent;
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformation::{from_axis_angle, from_translation, TransformationExt};
    use approx::assert_abs_diff_eq;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-9;

    /// Composes `Q` from the root down without touching the cache.
    fn explicit_absolute(cfg: &Configuration, id: FrameId) -> Transformation {
        cfg.path_to_root(id)
            .unwrap()
            .iter()
            .fold(Transformation::identity(), |acc, f| acc * cfg.relative(*f).unwrap())
    }

    /// root -> a -> b -> c, plus root -> s (a sibling branch).
    fn chain() -> (Configuration, [FrameId; 5]) {
        let mut cfg = Configuration::new();
        let root = cfg.add_frame("root", None).unwrap();
        let a = cfg.add_frame_with_pose("a", Some(root), from_translation(1.0, 0.0, 0.0)).unwrap();
        let b = cfg
            .add_frame_with_pose("b", Some(a), from_axis_angle(&Vector3::z(), FRAC_PI_2))
            .unwrap();
        let c = cfg.add_frame_with_pose("c", Some(b), from_translation(0.0, 2.0, 0.0)).unwrap();
        let s = cfg.add_frame_with_pose("s", Some(root), from_translation(0.0, 0.0, 5.0)).unwrap();
        (cfg, [root, a, b, c, s])
    }

    #[test]
    fn test_new_root_is_valid_identity() {
        let mut cfg = Configuration::new();
        let root = cfg.add_frame("root", None).unwrap();
        assert!(cfg.is_absolute_valid(root).unwrap());
        assert_eq!(cfg.ensure_absolute(root).unwrap(), Transformation::identity());
    }

    #[test]
    fn test_ensure_absolute_matches_explicit_composition() {
        let (mut cfg, [_, _, _, c, _]) = chain();
        let x = cfg.ensure_absolute(c).unwrap();
        assert!(x.approx_eq(&explicit_absolute(&cfg, c), EPS));
        // b rotates c's offset (0,2,0) into (-2,0,0); a adds (1,0,0).
        assert_abs_diff_eq!(x.translation.vector.x, -1.0, epsilon = EPS);
        assert_abs_diff_eq!(x.translation.vector.y, 0.0, epsilon = EPS);
    }

    #[test]
    fn test_second_ensure_does_no_work() {
        let (mut cfg, [_, _, _, c, _]) = chain();
        let first = cfg.ensure_absolute(c).unwrap();
        let count = cfg.pose_recomputations();
        let second = cfg.ensure_absolute(c).unwrap();
        assert_eq!(first, second);
        assert_eq!(cfg.pose_recomputations(), count);
    }

    #[test]
    fn test_revalidation_stops_at_nearest_valid_ancestor() {
        let (mut cfg, [_, a, b, c, _]) = chain();
        cfg.ensure_absolute(c).unwrap();
        cfg.set_relative(b, from_translation(0.0, 0.0, 1.0)).unwrap();
        let before = cfg.pose_recomputations();
        cfg.ensure_absolute(c).unwrap();
        // Only b and c are recomputed; a was still valid.
        assert_eq!(cfg.pose_recomputations() - before, 2);
        assert!(cfg.is_absolute_valid(a).unwrap());
    }

    #[test]
    fn test_set_relative_invalidates_descendants_only() {
        let (mut cfg, ids) = chain();
        let [root, a, b, c, s] = ids;
        for id in ids {
            cfg.ensure_absolute(id).unwrap();
        }
        cfg.set_relative(a, from_translation(3.0, 0.0, 0.0)).unwrap();
        assert!(cfg.is_absolute_valid(root).unwrap());
        assert!(cfg.is_absolute_valid(s).unwrap());
        assert!(!cfg.is_absolute_valid(a).unwrap());
        assert!(!cfg.is_absolute_valid(b).unwrap());
        assert!(!cfg.is_absolute_valid(c).unwrap());
        let x = cfg.ensure_absolute(c).unwrap();
        assert!(x.approx_eq(&explicit_absolute(&cfg, c), EPS));
    }

    #[test]
    fn test_set_absolute_is_consistent_with_relative() {
        let (mut cfg, [_, a, b, c, _]) = chain();
        let target = Transformation::from_pose7(&[0.5, -0.5, 2.0, 0.9, 0.1, 0.3, -0.2]);
        cfg.ensure_absolute(c).unwrap();
        cfg.set_absolute(b, target).unwrap();

        assert!(cfg.is_absolute_valid(b).unwrap());
        assert!(!cfg.is_absolute_valid(c).unwrap());
        let parent_x = cfg.ensure_absolute(a).unwrap();
        assert!(parent_x.compose(&cfg.relative(b).unwrap()).approx_eq(&target, EPS));
        assert!(cfg.ensure_absolute(b).unwrap().approx_eq(&target, EPS));
        let expected_c = target.compose(&from_translation(0.0, 2.0, 0.0));
        assert!(cfg.ensure_absolute(c).unwrap().approx_eq(&expected_c, EPS));
    }

    #[test]
    fn test_set_absolute_on_root_stores_pose_as_relative() {
        let (mut cfg, [root, ..]) = chain();
        let target = from_translation(0.0, 7.0, 0.0);
        cfg.set_absolute(root, target).unwrap();
        assert_eq!(cfg.relative(root).unwrap(), target);
    }

    #[test]
    fn test_insert_links_keep_absolute_poses() {
        let (mut cfg, ids) = chain();
        let [_, _, b, c, _] = ids;
        let before: Vec<_> = ids.iter().map(|id| cfg.ensure_absolute(*id).unwrap()).collect();

        let offset = Transformation::from_pose7(&[0.2, 0.4, -1.0, 0.7, 0.7, 0.0, 0.1]);
        let pre = cfg.insert_pre_link(b, offset).unwrap();
        let post = cfg.insert_post_link(b, offset.inverse()).unwrap();

        for (id, x) in ids.iter().zip(&before) {
            assert!(cfg.ensure_absolute(*id).unwrap().approx_eq(x, EPS), "{id} moved");
        }
        assert_eq!(cfg.frame(b).unwrap().parent(), Some(pre));
        assert_eq!(cfg.frame(c).unwrap().parent(), Some(post));
        assert_eq!(cfg.frame(b).unwrap().children(), &[post]);
        cfg.check_consistency().unwrap();
    }

    #[test]
    fn test_pre_link_takes_over_sibling_slot() {
        let (mut cfg, [root, a, _, _, s]) = chain();
        let pre = cfg.insert_pre_link(a, from_translation(0.0, 1.0, 0.0)).unwrap();
        assert_eq!(cfg.frame(root).unwrap().children(), &[pre, s]);
    }

    #[test]
    fn test_set_parent_into_descendant_is_rejected() {
        let (mut cfg, [root, a, _, c, _]) = chain();
        let before = cfg.clone();
        let err = cfg.set_parent(a, c, false, true).unwrap_err();
        assert_eq!(err, KinematicsError::WouldCreateLoop { frame: a, new_parent: c });
        assert_eq!(cfg.frame(a).unwrap().parent(), Some(root));
        for id in before.frame_ids() {
            assert_eq!(cfg.frame(id).unwrap().children(), before.frame(id).unwrap().children());
        }
        assert!(cfg.set_parent(a, a, false, true).is_err());
    }

    #[test]
    fn test_unchecked_cycle_is_reported_not_looped() {
        let (mut cfg, [_, a, _, c, _]) = chain();
        assert!(matches!(
            cfg.set_parent(a, a, false, false),
            Err(KinematicsError::WouldCreateLoop { .. })
        ));
        cfg.set_parent(a, c, false, false).unwrap();
        assert!(matches!(cfg.ensure_absolute(c), Err(KinematicsError::Inconsistent(_))));
        assert!(cfg.check_consistency().is_err());
    }

    #[test]
    fn test_set_parent_keep_absolute_pose() {
        let (mut cfg, [_, _, _, c, s]) = chain();
        let x = cfg.ensure_absolute(c).unwrap();
        cfg.set_parent(c, s, true, true).unwrap();
        assert!(cfg.ensure_absolute(c).unwrap().approx_eq(&x, EPS));
        assert!(cfg.is_child_of(c, s, 1).unwrap());
    }

    #[test]
    fn test_set_parent_keep_relative_pose() {
        let (mut cfg, [_, _, _, c, s]) = chain();
        let q = cfg.relative(c).unwrap();
        cfg.set_parent(c, s, false, true).unwrap();
        assert_eq!(cfg.relative(c).unwrap(), q);
        let expected = cfg.ensure_absolute(s).unwrap().compose(&q);
        assert!(cfg.ensure_absolute(c).unwrap().approx_eq(&expected, EPS));
    }

    #[test]
    fn test_unlink_makes_root_and_keeps_children() {
        let (mut cfg, [_, a, b, c, _]) = chain();
        cfg.unlink(b).unwrap();
        assert!(cfg.frame(b).unwrap().is_root());
        assert!(!cfg.frame(a).unwrap().children().contains(&b));
        assert_eq!(cfg.frame(c).unwrap().parent(), Some(b));
        assert_eq!(cfg.ensure_absolute(b).unwrap(), cfg.relative(b).unwrap());
        cfg.unlink(b).unwrap();
    }

    #[test]
    fn test_is_child_of_respects_order() {
        let (cfg, [root, a, b, c, _]) = chain();
        assert!(cfg.is_child_of(c, b, 1).unwrap());
        assert!(!cfg.is_child_of(c, a, 1).unwrap());
        assert!(cfg.is_child_of(c, a, 2).unwrap());
        assert!(cfg.is_child_of(c, root, 3).unwrap());
        assert!(!cfg.is_child_of(root, c, 10).unwrap());
    }

    #[test]
    fn test_position_and_quaternion_setters() {
        let (mut cfg, [_, _, b, c, _]) = chain();
        cfg.set_position(b, Vector3::new(4.0, 4.0, 4.0)).unwrap();
        assert_abs_diff_eq!(cfg.position(b).unwrap().x, 4.0, epsilon = EPS);
        cfg.set_quaternion(b, [1.0, 0.0, 0.0, 0.0]).unwrap();
        let x = cfg.ensure_absolute(c).unwrap();
        assert_abs_diff_eq!(x.translation.vector.y, 6.0, epsilon = EPS);

        cfg.set_relative_position(c, Vector3::new(0.0, 0.0, 1.0)).unwrap();
        cfg.set_relative_quaternion(c, [0.0, 0.0, 0.0, 2.0]).unwrap();
        let q = cfg.relative(c).unwrap();
        assert_abs_diff_eq!(q.rotation.angle(), std::f64::consts::PI, epsilon = EPS);
        assert_abs_diff_eq!(cfg.position(c).unwrap().z, 5.0, epsilon = EPS);
    }

    #[test]
    fn test_random_edit_sequences_match_explicit_composition() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut cfg = Configuration::new();
        let mut ids = vec![cfg.add_frame("f0", None).unwrap()];
        for i in 1..24 {
            let parent = ids[rng.gen_range(0..ids.len())];
            let id = cfg.add_frame(format!("f{i}"), Some(parent)).unwrap();
            ids.push(id);
        }

        for step in 0..400 {
            let id = ids[rng.gen_range(0..ids.len())];
            let pose = Transformation::from_pose7(&[
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ]);
            match rng.gen_range(0..5) {
                0 => cfg.set_relative(id, pose).unwrap(),
                1 => cfg.set_absolute(id, pose).unwrap(),
                2 => {
                    let target = ids[rng.gen_range(0..ids.len())];
                    let keep = rng.gen_bool(0.5);
                    // Loops are refused; anything else must succeed.
                    match cfg.set_parent(id, target, keep, true) {
                        Ok(()) | Err(KinematicsError::WouldCreateLoop { .. }) => {}
                        Err(e) => panic!("unexpected error at step {step}: {e}"),
                    }
                }
                3 => cfg.unlink(id).unwrap(),
                _ => {
                    let sample = ids[rng.gen_range(0..ids.len())];
                    let x = cfg.ensure_absolute(sample).unwrap();
                    assert!(x.approx_eq(&explicit_absolute(&cfg, sample), 1e-8), "step {step}");
                }
            }
        }
        cfg.check_consistency().unwrap();
        for id in ids {
            let x = cfg.ensure_absolute(id).unwrap();
            assert!(x.approx_eq(&explicit_absolute(&cfg, id), 1e-8));
        }
    }
}
