// armature_core/src/joint.rs

//! Joints: the map between a slice of generalized coordinates and a frame's
//! relative transform.

use crate::transformation::{canonical_quaternion, quat_from_wxyz, Transformation};
use crate::types::{FrameId, JointState};
use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Every supported parameterization of a relative pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JointType {
    HingeX,
    HingeY,
    HingeZ,
    TransX,
    TransY,
    TransZ,
    TransXY,
    TransXYZ,
    /// Translate in the xy-plane, then rotate about z: `[x, y, phi]`.
    TransXYPhi,
    /// Translate along y, then rotate about z: `[y, phi]`.
    TransYPhi,
    /// Rotate about z, then translate along the rotated x and y: `[phi, x, y]`.
    PhiTransXY,
    /// `Rx(a) * Ry(b)`: `[a, b]`.
    Universal,
    /// Zero coordinates; the relative transform is identity.
    Rigid,
    /// Quaternion `[w, x, y, z]`.
    QuatBall,
    /// Translation along x followed by a quaternion: `[x, w, qx, qy, qz]`.
    #[serde(rename = "XBall")]
    XBall,
    /// Position and quaternion: `[x, y, z, w, qx, qy, qz]`.
    Free,
}

impl JointType {
    pub const ALL: [JointType; 16] = [
        JointType::HingeX,
        JointType::HingeY,
        JointType::HingeZ,
        JointType::TransX,
        JointType::TransY,
        JointType::TransZ,
        JointType::TransXY,
        JointType::TransXYZ,
        JointType::TransXYPhi,
        JointType::TransYPhi,
        JointType::PhiTransXY,
        JointType::Universal,
        JointType::Rigid,
        JointType::QuatBall,
        JointType::XBall,
        JointType::Free,
    ];

    /// Number of generalized coordinates this type consumes.
    pub fn dim(self) -> usize {
        match self {
            JointType::HingeX | JointType::HingeY | JointType::HingeZ => 1,
            JointType::TransX | JointType::TransY | JointType::TransZ => 1,
            JointType::TransXY | JointType::TransYPhi | JointType::Universal => 2,
            JointType::TransXYZ | JointType::TransXYPhi | JointType::PhiTransXY => 3,
            JointType::Rigid => 0,
            JointType::QuatBall => 4,
            JointType::XBall => 5,
            JointType::Free => 7,
        }
    }

    /// The fixed axis of single-axis joints, in the joint frame.
    pub fn local_axis(self) -> Option<Unit<Vector3<f64>>> {
        match self {
            JointType::HingeX | JointType::TransX | JointType::Universal => Some(Vector3::x_axis()),
            JointType::HingeY | JointType::TransY => Some(Vector3::y_axis()),
            JointType::HingeZ | JointType::TransZ => Some(Vector3::z_axis()),
            _ => None,
        }
    }

    /// Whether the inverse map has to pick among equivalent coordinates.
    pub fn is_periodic(self) -> bool {
        matches!(
            self,
            JointType::HingeX
                | JointType::HingeY
                | JointType::HingeZ
                | JointType::TransXYPhi
                | JointType::TransYPhi
                | JointType::PhiTransXY
                | JointType::Universal
                | JointType::QuatBall
                | JointType::XBall
                | JointType::Free
        )
    }

    /// Coordinates that map to the identity transform.
    pub fn zero_coordinates(self) -> JointState {
        let mut q = JointState::zeros(self.dim());
        match self {
            JointType::QuatBall => q[0] = 1.0,
            JointType::XBall => q[1] = 1.0,
            JointType::Free => q[3] = 1.0,
            _ => {}
        }
        q
    }

    /// Where the quaternion `[w, x, y, z]` sits in the coordinates, if any.
    pub fn quaternion_range(self) -> Option<Range<usize>> {
        match self {
            JointType::QuatBall => Some(0..4),
            JointType::XBall => Some(1..5),
            JointType::Free => Some(3..7),
            _ => None,
        }
    }

    /// Forward map. `q` must hold exactly `self.dim()` values.
    pub fn forward(self, q: &[f64]) -> Transformation {
        assert_eq!(q.len(), self.dim(), "{self}: coordinate slice has wrong length");
        match self {
            JointType::HingeX => rotation(UnitQuaternion::from_axis_angle(&Vector3::x_axis(), q[0])),
            JointType::HingeY => rotation(UnitQuaternion::from_axis_angle(&Vector3::y_axis(), q[0])),
            JointType::HingeZ => rotation(UnitQuaternion::from_axis_angle(&Vector3::z_axis(), q[0])),
            JointType::TransX => Isometry3::translation(q[0], 0.0, 0.0),
            JointType::TransY => Isometry3::translation(0.0, q[0], 0.0),
            JointType::TransZ => Isometry3::translation(0.0, 0.0, q[0]),
            JointType::TransXY => Isometry3::translation(q[0], q[1], 0.0),
            JointType::TransXYZ => Isometry3::translation(q[0], q[1], q[2]),
            JointType::TransXYPhi => Isometry3::from_parts(
                Translation3::new(q[0], q[1], 0.0),
                UnitQuaternion::from_axis_angle(&Vector3::z_axis(), q[2]),
            ),
            JointType::TransYPhi => Isometry3::from_parts(
                Translation3::new(0.0, q[0], 0.0),
                UnitQuaternion::from_axis_angle(&Vector3::z_axis(), q[1]),
            ),
            JointType::PhiTransXY => {
                let rot = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), q[0]);
                let pos = rot * Vector3::new(q[1], q[2], 0.0);
                Isometry3::from_parts(Translation3::from(pos), rot)
            }
            JointType::Universal => rotation(
                UnitQuaternion::from_axis_angle(&Vector3::x_axis(), q[0])
                    * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), q[1]),
            ),
            JointType::Rigid => Transformation::identity(),
            JointType::QuatBall => rotation(quat_from_wxyz(q[0], q[1], q[2], q[3])),
            JointType::XBall => Isometry3::from_parts(
                Translation3::new(q[0], 0.0, 0.0),
                quat_from_wxyz(q[1], q[2], q[3], q[4]),
            ),
            JointType::Free => Isometry3::from_parts(
                Translation3::new(q[0], q[1], q[2]),
                quat_from_wxyz(q[3], q[4], q[5], q[6]),
            ),
        }
    }

    /// Inverse map: coordinates that reproduce `rel` under [`JointType::forward`].
    ///
    /// Components of `rel` the joint cannot express are dropped. Angles come back
    /// in `(-π, π]`, quaternions with `w >= 0`.
    pub fn inverse(self, rel: &Transformation) -> JointState {
        let pos = rel.translation.vector;
        match self {
            JointType::HingeX => JointState::from_vec(vec![axis_angle(&rel.rotation, 0)]),
            JointType::HingeY => JointState::from_vec(vec![axis_angle(&rel.rotation, 1)]),
            JointType::HingeZ => JointState::from_vec(vec![axis_angle(&rel.rotation, 2)]),
            JointType::TransX => JointState::from_vec(vec![pos.x]),
            JointType::TransY => JointState::from_vec(vec![pos.y]),
            JointType::TransZ => JointState::from_vec(vec![pos.z]),
            JointType::TransXY => JointState::from_vec(vec![pos.x, pos.y]),
            JointType::TransXYZ => JointState::from_vec(vec![pos.x, pos.y, pos.z]),
            JointType::TransXYPhi => {
                JointState::from_vec(vec![pos.x, pos.y, axis_angle(&rel.rotation, 2)])
            }
            JointType::TransYPhi => JointState::from_vec(vec![pos.y, axis_angle(&rel.rotation, 2)]),
            JointType::PhiTransXY => {
                let phi = axis_angle(&rel.rotation, 2);
                let (s, c) = phi.sin_cos();
                // rotate the position back by -phi
                let local = Vector2::new(c * pos.x + s * pos.y, -s * pos.x + c * pos.y);
                JointState::from_vec(vec![phi, local.x, local.y])
            }
            JointType::Universal => {
                let m = rel.rotation.to_rotation_matrix();
                let m = m.matrix();
                let a = m[(2, 1)].atan2(m[(1, 1)]);
                let b = m[(0, 2)].atan2(m[(0, 0)]);
                JointState::from_vec(vec![wrap_angle(a), wrap_angle(b)])
            }
            JointType::Rigid => JointState::zeros(0),
            JointType::QuatBall => {
                let c = canonical_quaternion(&rel.rotation);
                JointState::from_vec(vec![c.w, c.i, c.j, c.k])
            }
            JointType::XBall => {
                let c = canonical_quaternion(&rel.rotation);
                JointState::from_vec(vec![pos.x, c.w, c.i, c.j, c.k])
            }
            JointType::Free => {
                let c = canonical_quaternion(&rel.rotation);
                JointState::from_vec(vec![pos.x, pos.y, pos.z, c.w, c.i, c.j, c.k])
            }
        }
    }
}

fn rotation(rot: UnitQuaternion<f64>) -> Transformation {
    Isometry3::from_parts(Translation3::identity(), rot)
}

/// Angle of the rotation's projection onto the coordinate axis `axis` (0=x, 1=y, 2=z).
fn axis_angle(rot: &UnitQuaternion<f64>, axis: usize) -> f64 {
    let c = canonical_quaternion(rot);
    let imag = [c.i, c.j, c.k][axis];
    wrap_angle(2.0 * imag.atan2(c.w))
}

/// Wraps into `(-π, π]`.
pub fn wrap_angle(angle: f64) -> f64 {
    let mut a = angle % TAU;
    if a > PI {
        a -= TAU;
    } else if a <= -PI {
        a += TAU;
    }
    a
}

impl fmt::Display for JointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JointType::HingeX => "hingeX",
            JointType::HingeY => "hingeY",
            JointType::HingeZ => "hingeZ",
            JointType::TransX => "transX",
            JointType::TransY => "transY",
            JointType::TransZ => "transZ",
            JointType::TransXY => "transXY",
            JointType::TransXYZ => "transXYZ",
            JointType::TransXYPhi => "transXYPhi",
            JointType::TransYPhi => "transYPhi",
            JointType::PhiTransXY => "phiTransXY",
            JointType::Universal => "universal",
            JointType::Rigid => "rigid",
            JointType::QuatBall => "quatBall",
            JointType::XBall => "XBall",
            JointType::Free => "free",
        };
        f.write_str(name)
    }
}

impl FromStr for JointType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "trans3" {
            return Ok(JointType::TransXYZ);
        }
        JointType::ALL
            .iter()
            .copied()
            .find(|t| t.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown joint type '{s}'"))
    }
}

// --- Coordinate source ---

/// Where a joint's coordinates come from.
///
/// A `MimicOf` joint reads its source's slice of the q-vector and scales it;
/// it never owns a slot itself, and (enforced by `Configuration::set_mimic`)
/// its source is always an `Owned` joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordinateSource {
    /// `q_index` is `None` until the owning configuration indexes the joint,
    /// and while the joint is inactive.
    Owned { q_index: Option<usize> },
    MimicOf { source: FrameId, scale: f64 },
}

// --- Joint ---

/// The articulation of a frame's relative transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    joint_type: JointType,
    pub(crate) source: CoordinateSource,
    /// Inactive joints keep their current transform but leave the q-vector.
    pub(crate) active: bool,
    /// Null position.
    pub q0: JointState,
    /// `[lo_0, up_0, lo_1, up_1, ...]`; empty when unlimited.
    pub limits: Vec<f64>,
    /// Control cost scalar.
    pub h_cost: f64,
    /// Internal coordinate = `scale * q` for owned joints. Quaternion
    /// coordinates are never scaled.
    pub scale: f64,
}

impl Joint {
    pub fn new(joint_type: JointType) -> Self {
        Self {
            joint_type,
            source: CoordinateSource::Owned { q_index: None },
            active: true,
            q0: joint_type.zero_coordinates(),
            limits: Vec::new(),
            h_cost: 1.0,
            scale: 1.0,
        }
    }

    pub fn with_limits(mut self, limits: Vec<f64>) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn joint_type(&self) -> JointType {
        self.joint_type
    }

    /// Dimension of the joint's own parameterization.
    pub fn dim(&self) -> usize {
        self.joint_type.dim()
    }

    /// Slots this joint occupies in the q-vector: zero for mimics and inactive joints.
    pub fn q_dim(&self) -> usize {
        match self.source {
            CoordinateSource::Owned { .. } if self.active => self.dim(),
            _ => 0,
        }
    }

    pub fn source(&self) -> CoordinateSource {
        self.source
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn q_index(&self) -> Option<usize> {
        match self.source {
            CoordinateSource::Owned { q_index } if self.active => q_index,
            _ => None,
        }
    }

    pub fn mimic_source(&self) -> Option<FrameId> {
        match self.source {
            CoordinateSource::MimicOf { source, .. } => Some(source),
            CoordinateSource::Owned { .. } => None,
        }
    }

    pub fn is_mimic(&self) -> bool {
        self.mimic_source().is_some()
    }

    /// Factor between q-vector values and the coordinates fed to the forward map.
    pub fn coordinate_factor(&self) -> f64 {
        match self.source {
            CoordinateSource::Owned { .. } => self.scale,
            CoordinateSource::MimicOf { scale, .. } => scale,
        }
    }

    /// A rigid or free joint that is not a mimic separates physical parts.
    pub fn is_part_break(&self) -> bool {
        matches!(self.joint_type, JointType::Rigid | JointType::Free) && !self.is_mimic()
    }

    pub fn local_axis(&self) -> Option<Unit<Vector3<f64>>> {
        self.joint_type.local_axis()
    }

    fn is_scaled(&self, index: usize) -> bool {
        !self.joint_type.quaternion_range().is_some_and(|r| r.contains(&index))
    }

    /// Relative transform for the q-vector slice `q` (length `dim`).
    pub fn transform_from_dofs(&self, q: &[f64]) -> Transformation {
        let factor = self.coordinate_factor();
        if factor == 1.0 {
            return self.joint_type.forward(q);
        }
        let scaled: Vec<f64> = q
            .iter()
            .enumerate()
            .map(|(i, v)| if self.is_scaled(i) { v * factor } else { *v })
            .collect();
        self.joint_type.forward(&scaled)
    }

    /// q-vector values reproducing `rel`; see [`JointType::inverse`] for tie-breaks.
    pub fn dofs_from_transform(&self, rel: &Transformation) -> JointState {
        let mut internal = self.joint_type.inverse(rel);
        let factor = self.coordinate_factor();
        if factor != 1.0 && factor != 0.0 {
            for (i, v) in internal.iter_mut().enumerate() {
                if self.is_scaled(i) {
                    *v /= factor;
                }
            }
        }
        internal
    }

    /// Changes the type and resets everything sized by the old dimension.
    /// Goes through `Configuration::set_joint_type` so the q-vector follows.
    pub(crate) fn set_type(&mut self, joint_type: JointType) {
        self.joint_type = joint_type;
        self.q0 = joint_type.zero_coordinates();
        self.limits.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformation::TransformationExt;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-10;

    fn assert_state_eq(a: &JointState, b: &[f64]) {
        assert_eq!(a.len(), b.len(), "length mismatch: {a:?} vs {b:?}");
        for (x, y) in a.iter().zip(b) {
            assert_abs_diff_eq!(*x, *y, epsilon = EPS);
        }
    }

    #[test]
    fn test_dims_match_zero_coordinates() {
        for t in JointType::ALL {
            assert_eq!(t.zero_coordinates().len(), t.dim(), "{t}");
            let id = t.forward(t.zero_coordinates().as_slice());
            assert!(id.approx_eq(&Transformation::identity(), EPS), "{t}");
        }
    }

    #[test]
    fn test_hinge_z_rotates_x_into_y() {
        let rel = JointType::HingeZ.forward(&[FRAC_PI_2]);
        let p = rel * nalgebra::Point3::new(1.0, 0.0, 0.0);
        assert_abs_diff_eq!(p.x, 0.0, epsilon = EPS);
        assert_abs_diff_eq!(p.y, 1.0, epsilon = EPS);
    }

    #[test]
    fn test_unique_inverse_round_trips() {
        let cases: [(JointType, &[f64]); 8] = [
            (JointType::HingeX, &[0.3]),
            (JointType::HingeY, &[-2.9]),
            (JointType::TransZ, &[4.5]),
            (JointType::TransXYZ, &[1.0, -2.0, 0.5]),
            (JointType::TransXYPhi, &[0.2, 0.7, -1.2]),
            (JointType::TransYPhi, &[-0.6, 2.4]),
            (JointType::PhiTransXY, &[2.0, -0.3, 1.1]),
            (JointType::Universal, &[0.4, -0.9]),
        ];
        for (t, q) in cases {
            let back = t.inverse(&t.forward(q));
            assert_state_eq(&back, q);
        }
    }

    #[test]
    fn test_free_round_trip_with_canonical_quaternion() {
        let rot = UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3);
        let q = [1.0, 2.0, 3.0, rot.w, rot.i, rot.j, rot.k];
        let back = JointType::Free.inverse(&JointType::Free.forward(&q));
        assert_state_eq(&back, &q);
    }

    #[test]
    fn test_quaternion_sign_tie_break() {
        // -q describes the same rotation; the inverse map returns the w >= 0 representative.
        let back = JointType::QuatBall.inverse(&JointType::QuatBall.forward(&[-0.5, -0.5, -0.5, -0.5]));
        assert_state_eq(&back, &[0.5, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_hinge_angle_wraps_into_principal_range() {
        let back = JointType::HingeZ.inverse(&JointType::HingeZ.forward(&[3.0 * PI / 2.0]));
        assert_state_eq(&back, &[-FRAC_PI_2]);
        let back = JointType::HingeZ.inverse(&JointType::HingeZ.forward(&[PI]));
        assert_state_eq(&back, &[PI]);
    }

    #[test]
    fn test_scale_applies_to_forward_and_inverse() {
        let joint = Joint::new(JointType::TransX).with_scale(2.0);
        let rel = joint.transform_from_dofs(&[1.5]);
        assert_abs_diff_eq!(rel.translation.vector.x, 3.0, epsilon = EPS);
        assert_state_eq(&joint.dofs_from_transform(&rel), &[1.5]);
    }

    #[test]
    fn test_mimic_occupies_no_slots() {
        let mut joint = Joint::new(JointType::HingeX);
        assert_eq!(joint.q_dim(), 1);
        joint.source = CoordinateSource::MimicOf {
            source: FrameId(0),
            scale: -1.0,
        };
        assert_eq!(joint.q_dim(), 0);
        assert_eq!(joint.dim(), 1);
        assert_eq!(joint.coordinate_factor(), -1.0);
    }

    #[test]
    fn test_part_break_only_for_rigid_and_free() {
        assert!(Joint::new(JointType::Free).is_part_break());
        assert!(Joint::new(JointType::Rigid).is_part_break());
        assert!(!Joint::new(JointType::HingeZ).is_part_break());
    }

    #[test]
    fn test_names_round_trip() {
        for t in JointType::ALL {
            assert_eq!(t.to_string().parse::<JointType>(), Ok(t));
        }
        assert_eq!("trans3".parse::<JointType>(), Ok(JointType::TransXYZ));
        assert!("wobble".parse::<JointType>().is_err());
    }

    #[test]
    fn test_set_type_resets_sized_fields() {
        let mut joint = Joint::new(JointType::HingeX).with_limits(vec![-1.0, 1.0]);
        joint.set_type(JointType::Free);
        assert_eq!(joint.q0.len(), 7);
        assert!(joint.limits.is_empty());
    }

    #[test]
    fn test_trans_y_phi_moves_then_turns() {
        let rel = JointType::TransYPhi.forward(&[1.5, FRAC_PI_2]);
        let p = rel * nalgebra::Point3::new(1.0, 0.0, 0.0);
        assert_abs_diff_eq!(p.x, 0.0, epsilon = EPS);
        assert_abs_diff_eq!(p.y, 2.5, epsilon = EPS);
        assert_eq!("transYPhi".parse::<JointType>(), Ok(JointType::TransYPhi));
    }

    #[test]
    fn test_scale_leaves_quaternion_coordinates_alone() {
        let joint = Joint::new(JointType::Free).with_scale(2.0);
        let rot = UnitQuaternion::from_euler_angles(0.4, -0.1, 0.7);
        let q = [0.5, -1.0, 0.25, rot.w, rot.i, rot.j, rot.k];
        let rel = joint.transform_from_dofs(&q);
        assert_abs_diff_eq!(rel.translation.vector.x, 1.0, epsilon = EPS);
        assert_abs_diff_eq!(rel.translation.vector.y, -2.0, epsilon = EPS);
        assert_abs_diff_eq!(rel.rotation.angle_to(&rot), 0.0, epsilon = EPS);
        assert_state_eq(&joint.dofs_from_transform(&rel), &q);

        let ball = Joint::new(JointType::QuatBall).with_scale(-0.5);
        let back = ball.dofs_from_transform(&ball.transform_from_dofs(&[rot.w, rot.i, rot.j, rot.k]));
        assert_state_eq(&back, &[rot.w, rot.i, rot.j, rot.k]);
    }
}
