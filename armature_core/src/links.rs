// armature_core/src/links.rs

//! Structure queries over the frame forest, and the coalescing of rigid
//! chains into links.
//!
//! A *link* is a root or an articulated frame. Every joint-less frame below it
//! belongs to the same rigid body, however many named frames that body has.

use crate::attachments::Inertia;
use crate::configuration::Configuration;
use crate::error::Result;
use crate::frame::Frame;
use crate::transformation::Transformation;
use crate::types::FrameId;

/// Whether walking onto `frame` crosses into a different body.
fn is_boundary(frame: &Frame, until_part_break: bool) -> bool {
    match frame.joint.as_ref() {
        Some(joint) => !until_part_break || joint.is_part_break(),
        None => false,
    }
}

impl Configuration {
    pub fn root_of(&self, id: FrameId) -> Result<FrameId> {
        let mut current = id;
        while let Some(p) = self.frame(current)?.parent {
            current = p;
        }
        Ok(current)
    }

    /// Root first, `id` last.
    pub fn path_to_root(&self, id: FrameId) -> Result<Vec<FrameId>> {
        let mut path = vec![id];
        let mut cursor = self.frame(id)?.parent;
        while let Some(p) = cursor {
            path.push(p);
            cursor = self.frame(p)?.parent;
        }
        path.reverse();
        Ok(path)
    }

    /// All descendants of `id` in pre-order, excluding `id`.
    pub fn subtree(&self, id: FrameId) -> Result<Vec<FrameId>> {
        let mut out = self.prefix_subtree(id)?;
        out.remove(0);
        Ok(out)
    }

    /// `id` followed by its descendants, parents always before children.
    pub fn prefix_subtree(&self, id: FrameId) -> Result<Vec<FrameId>> {
        self.collect_below(id, |_| true)
    }

    /// Descendants reachable without crossing a joint.
    pub fn rigid_sub_frames(&self, id: FrameId) -> Result<Vec<FrameId>> {
        let mut out = self.collect_below(id, |f| f.joint.is_none())?;
        out.remove(0);
        Ok(out)
    }

    /// Descendants reachable without crossing a part break.
    pub fn part_sub_frames(&self, id: FrameId) -> Result<Vec<FrameId>> {
        let mut out = self.collect_below(id, |f| !is_boundary(f, true))?;
        out.remove(0);
        Ok(out)
    }

    /// Pre-order walk from `id`, descending only into children accepted by `enter`.
    fn collect_below(&self, id: FrameId, enter: impl Fn(&Frame) -> bool) -> Result<Vec<FrameId>> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(fid) = stack.pop() {
            let frame = self.frame(fid)?;
            out.push(fid);
            for &child in frame.children.iter().rev() {
                if enter(self.frame(child)?) {
                    stack.push(child);
                }
            }
        }
        Ok(out)
    }

    /// Climbs joint-less edges to the frame carrying this body's joint (or
    /// its root). With `until_part_break`, only rigid/free joints stop the climb.
    ///
    /// Returns the link and `Q_total` with `X(id) = X(link) ∘ Q_total`.
    pub fn upward_link(&self, id: FrameId, until_part_break: bool) -> Result<(FrameId, Transformation)> {
        let mut current = self.frame(id)?;
        let mut total = Transformation::identity();
        while let Some(p) = current.parent {
            if is_boundary(current, until_part_break) {
                break;
            }
            total = current.q * total;
            current = self.frame(p)?;
        }
        Ok((current.id, total))
    }

    /// Follows single-child, joint-less edges down from `id`.
    ///
    /// Returns the last frame of the chain and `Q_total` with
    /// `X(result) = X(id) ∘ Q_total`.
    pub fn downward_link(&self, id: FrameId, until_part_break: bool) -> Result<(FrameId, Transformation)> {
        let mut current = self.frame(id)?;
        let mut total = Transformation::identity();
        while let [only] = current.children[..] {
            let child = self.frame(only)?;
            if is_boundary(child, until_part_break) {
                break;
            }
            total *= child.q;
            current = child;
        }
        Ok((current.id, total))
    }

    /// Frames from `id`'s upward link down to `id`, inclusive at both ends.
    pub fn path_to_upward_link(&self, id: FrameId, until_part_break: bool) -> Result<Vec<FrameId>> {
        let (link, _) = self.upward_link(id, until_part_break)?;
        let mut path = vec![id];
        let mut current = id;
        while current != link {
            match self.frame(current)?.parent {
                Some(p) => {
                    path.push(p);
                    current = p;
                }
                None => break,
            }
        }
        path.reverse();
        Ok(path)
    }

    /// Roots and articulated frames, in arena order.
    pub fn links(&self) -> Vec<FrameId> {
        self.frames()
            .filter(|f| f.parent.is_none() || f.joint.is_some())
            .map(|f| f.id)
            .collect()
    }

    /// Mass properties of the rigid body rooted at `id`, expressed in `id`'s frame.
    ///
    /// Sums `id`'s own inertia with every rigid sub-frame's; frames without
    /// inertia contribute nothing. The body type is taken from `id`.
    pub fn compound_inertia(&self, id: FrameId) -> Result<Inertia> {
        let own = self.frame(id)?.inertia.clone();
        let mut total = own.clone().unwrap_or_default();
        let mut stack: Vec<(FrameId, Transformation)> = Vec::new();
        for &child in &self.frame(id)?.children {
            stack.push((child, Transformation::identity()));
        }
        while let Some((fid, parent_rel)) = stack.pop() {
            let frame = self.frame(fid)?;
            if frame.joint.is_some() {
                continue;
            }
            let rel = parent_rel * frame.q;
            if let Some(inertia) = frame.inertia.as_ref() {
                total.add(inertia, &rel);
            }
            for &child in &frame.children {
                stack.push((child, rel));
            }
        }
        if let Some(own) = own {
            total.body_type = own.body_type;
        }
        Ok(total)
    }
}
