// armature_core/src/transformation.rs

//! Rigid poses. A `Transformation` is nalgebra's `Isometry3<f64>`; this module
//! only adds the vocabulary the rest of the crate speaks in.

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};

/// Position + unit quaternion.
///
/// `a.compose(&b)` reads "pose `b`, given in `a`'s frame, expressed in the
/// ambient frame", so a child's world pose is `X_parent.compose(&Q_child)`.
pub type Transformation = Isometry3<f64>;

pub trait TransformationExt: Sized {
    /// `self ∘ other`.
    fn compose(&self, other: &Self) -> Self;
    /// `inverse(self) ∘ other`: `other` expressed in `self`'s frame.
    fn relative_between(&self, other: &Self) -> Self;
    /// Builds a pose from `[x, y, z, qw, qx, qy, qz]`. The quaternion is normalized.
    fn from_pose7(pose: &[f64; 7]) -> Self;
    /// `[x, y, z, qw, qx, qy, qz]` with the quaternion sign canonicalised (`qw >= 0`).
    fn to_pose7(&self) -> [f64; 7];
    /// Same position within `eps` and same rotation within `eps` radians.
    fn approx_eq(&self, other: &Self, eps: f64) -> bool;
}

impl TransformationExt for Transformation {
    fn compose(&self, other: &Self) -> Self {
        self * other
    }

    fn relative_between(&self, other: &Self) -> Self {
        self.inv_mul(other)
    }

    fn from_pose7(pose: &[f64; 7]) -> Self {
        Isometry3::from_parts(
            Translation3::new(pose[0], pose[1], pose[2]),
            quat_from_wxyz(pose[3], pose[4], pose[5], pose[6]),
        )
    }

    fn to_pose7(&self) -> [f64; 7] {
        let t = &self.translation.vector;
        let q = canonical_quaternion(&self.rotation);
        [t.x, t.y, t.z, q.w, q.i, q.j, q.k]
    }

    fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        (self.translation.vector - other.translation.vector).norm() <= eps
            && self.rotation.angle_to(&other.rotation) <= eps
    }
}

/// Normalizes `(w, x, y, z)` into a unit quaternion. A zero quaternion maps to identity.
pub fn quat_from_wxyz(w: f64, x: f64, y: f64, z: f64) -> UnitQuaternion<f64> {
    let raw = Quaternion::new(w, x, y, z);
    if raw.norm_squared() < f64::EPSILON {
        return UnitQuaternion::identity();
    }
    UnitQuaternion::from_quaternion(raw)
}

/// Picks the representative of `{q, -q}` with a non-negative real part.
///
/// When `w` is exactly zero the first non-zero imaginary component is made
/// positive, so the choice stays deterministic for half-turns.
pub fn canonical_quaternion(q: &UnitQuaternion<f64>) -> Quaternion<f64> {
    let c = *q.quaternion();
    let flip = if c.w != 0.0 {
        c.w < 0.0
    } else if c.i != 0.0 {
        c.i < 0.0
    } else if c.j != 0.0 {
        c.j < 0.0
    } else {
        c.k < 0.0
    };
    if flip {
        -c
    } else {
        c
    }
}

/// Pure translation.
pub fn from_translation(x: f64, y: f64, z: f64) -> Transformation {
    Isometry3::translation(x, y, z)
}

/// Pure rotation of `angle` radians about `axis` (need not be normalized).
pub fn from_axis_angle(axis: &Vector3<f64>, angle: f64) -> Transformation {
    Isometry3::from_parts(
        Translation3::identity(),
        UnitQuaternion::from_scaled_axis(axis.normalize() * angle),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    const EPS: f64 = 1e-12;

    fn sample() -> Transformation {
        Isometry3::from_parts(
            Translation3::new(0.3, -1.2, 2.0),
            UnitQuaternion::from_euler_angles(0.2, -0.7, 1.1),
        )
    }

    #[test]
    fn test_compose_matches_parent_child_convention() {
        // Parent rotated 90° about Z; child offset 1 m along the parent's x.
        let parent = from_axis_angle(&Vector3::z(), FRAC_PI_2);
        let child = from_translation(1.0, 0.0, 0.0);
        let world = parent.compose(&child);
        assert_abs_diff_eq!(world.translation.vector.x, 0.0, epsilon = EPS);
        assert_abs_diff_eq!(world.translation.vector.y, 1.0, epsilon = EPS);
    }

    #[test]
    fn test_compose_with_inverse_is_identity() {
        let a = sample();
        let id = a.compose(&a.inverse());
        assert!(id.approx_eq(&Transformation::identity(), EPS));
    }

    #[test]
    fn test_compose_is_associative() {
        let a = sample();
        let b = from_axis_angle(&Vector3::new(1.0, 1.0, 0.0), 0.4);
        let c = from_translation(-0.5, 0.1, 3.0);
        let left = a.compose(&b).compose(&c);
        let right = a.compose(&b.compose(&c));
        assert!(left.approx_eq(&right, 1e-12));
    }

    #[test]
    fn test_relative_between_recovers_child() {
        let a = sample();
        let q = from_translation(0.0, 2.0, 0.0);
        let b = a.compose(&q);
        assert!(a.relative_between(&b).approx_eq(&q, 1e-12));
    }

    #[test]
    fn test_pose7_canonicalises_sign() {
        let rot = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 1.5 * PI);
        let pose = Isometry3::from_parts(Translation3::new(1.0, 2.0, 3.0), rot);
        let p7 = pose.to_pose7();
        assert!(p7[3] >= 0.0);
        assert!(Transformation::from_pose7(&p7).approx_eq(&pose, 1e-12));
    }

    #[test]
    fn test_zero_quaternion_falls_back_to_identity() {
        assert_eq!(quat_from_wxyz(0.0, 0.0, 0.0, 0.0), UnitQuaternion::identity());
    }
}
