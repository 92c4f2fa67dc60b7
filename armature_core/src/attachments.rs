// armature_core/src/attachments.rs

//! Payloads a frame can carry besides its pose: geometry, mass, and free-form
//! attributes. The kinematic tree never interprets these beyond summing
//! inertias; consumers such as the physics bridge do.

use crate::transformation::Transformation;
use nalgebra::{Matrix3, Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShapeType {
    Box,
    Sphere,
    Capsule,
    Cylinder,
    /// Sphere-swept box: `[x, y, z, radius]`.
    SsBox,
    Mesh,
    /// Pure reference marker, never collides.
    Marker,
}

/// A collision or visual geometry attached to a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub shape_type: ShapeType,
    /// Type-dependent size parameters; the last entry is the radius where one applies.
    pub size: Vec<f64>,
    /// Non-zero when contacts with this shape should be reported.
    #[serde(default)]
    pub contact: i8,
}

impl Shape {
    pub fn new(shape_type: ShapeType, size: Vec<f64>) -> Self {
        Self {
            shape_type,
            size,
            contact: 0,
        }
    }

    pub fn radius(&self) -> f64 {
        self.size.last().copied().unwrap_or(0.0)
    }

    pub fn can_collide(&self) -> bool {
        self.contact != 0 && self.shape_type != ShapeType::Marker
    }
}

/// How a simulator should treat the body a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyType {
    /// Integrated by the simulator; poses flow back into the tree.
    #[default]
    Dynamic,
    /// Driven by the tree; poses flow into the simulator.
    Kinematic,
    Static,
    Soft,
}

/// Mass properties. `matrix` is the inertia tensor about `com`, in frame axes.
#[derive(Debug, Clone, PartialEq)]
pub struct Inertia {
    pub mass: f64,
    pub com: Vector3<f64>,
    pub matrix: Matrix3<f64>,
    pub body_type: BodyType,
}

impl Default for Inertia {
    fn default() -> Self {
        Self::zero()
    }
}

impl Inertia {
    pub fn zero() -> Self {
        Self {
            mass: 0.0,
            com: Vector3::zeros(),
            matrix: Matrix3::zeros(),
            body_type: BodyType::Dynamic,
        }
    }

    /// A point mass at the frame origin.
    pub fn point_mass(mass: f64) -> Self {
        Self {
            mass,
            ..Self::zero()
        }
    }

    /// Solid sphere of uniform density.
    pub fn sphere(mass: f64, radius: f64) -> Self {
        let i = 0.4 * mass * radius * radius;
        Self {
            mass,
            matrix: Matrix3::from_diagonal_element(i),
            ..Self::zero()
        }
    }

    /// Solid box with edge lengths `size`.
    pub fn cuboid(mass: f64, size: Vector3<f64>) -> Self {
        let s = size.component_mul(&size);
        let k = mass / 12.0;
        Self {
            mass,
            matrix: Matrix3::from_diagonal(&Vector3::new(
                k * (s.y + s.z),
                k * (s.x + s.z),
                k * (s.x + s.y),
            )),
            ..Self::zero()
        }
    }

    /// Rough inertia for a shape of the given mass, used when a frame has a
    /// mass but no explicit tensor.
    pub fn from_shape(mass: f64, shape: &Shape) -> Self {
        match shape.shape_type {
            ShapeType::Sphere => Self::sphere(mass, shape.radius()),
            ShapeType::Box | ShapeType::SsBox if shape.size.len() >= 3 => {
                Self::cuboid(mass, Vector3::new(shape.size[0], shape.size[1], shape.size[2]))
            }
            _ => Self::point_mass(mass),
        }
    }

    /// Accumulates `other`, whose frame sits at `rel` relative to this one.
    ///
    /// Both tensors are moved to the combined centre of mass with the
    /// parallel-axis theorem. Adding to a massless inertia adopts `other`.
    pub fn add(&mut self, other: &Inertia, rel: &Transformation) {
        let other_com = (rel * Point3::from(other.com)).coords;
        let rot = rel.rotation.to_rotation_matrix();
        let other_matrix = rot.matrix() * other.matrix * rot.matrix().transpose();

        let total = self.mass + other.mass;
        if total <= 0.0 {
            return;
        }
        let com = (self.com * self.mass + other_com * other.mass) / total;
        let matrix = self.matrix
            + steiner(self.mass, &(self.com - com))
            + other_matrix
            + steiner(other.mass, &(other_com - com));

        self.mass = total;
        self.com = com;
        self.matrix = matrix;
    }
}

/// Parallel-axis term for a point mass `m` displaced by `d`.
fn steiner(m: f64, d: &Vector3<f64>) -> Matrix3<f64> {
    (Matrix3::identity() * d.norm_squared() - d * d.transpose()) * m
}

/// A free-form attribute value, as stored in an external key/value graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Flag(bool),
    Number(f64),
    Vector(Vec<f64>),
    Text(String),
}

pub type Attributes = BTreeMap<String, AttributeValue>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformation::from_translation;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_add_two_point_masses() {
        let mut a = Inertia::point_mass(1.0);
        a.add(&Inertia::point_mass(1.0), &from_translation(2.0, 0.0, 0.0));
        assert_abs_diff_eq!(a.mass, 2.0);
        assert_abs_diff_eq!(a.com.x, 1.0, epsilon = 1e-12);
        // Two unit masses 1 m either side of the com along x.
        assert_abs_diff_eq!(a.matrix[(0, 0)], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(a.matrix[(1, 1)], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(a.matrix[(2, 2)], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_add_to_massless_adopts_other() {
        let mut a = Inertia::zero();
        let sphere = Inertia::sphere(3.0, 0.5);
        a.add(&sphere, &from_translation(0.0, 1.0, 0.0));
        assert_abs_diff_eq!(a.mass, 3.0);
        assert_abs_diff_eq!(a.com.y, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(a.matrix[(0, 0)], sphere.matrix[(0, 0)], epsilon = 1e-12);
    }

    #[test]
    fn test_adding_zero_mass_changes_nothing() {
        let mut a = Inertia::cuboid(2.0, Vector3::new(1.0, 2.0, 3.0));
        let before = a.clone();
        a.add(&Inertia::zero(), &from_translation(5.0, 5.0, 5.0));
        assert_eq!(a, before);
    }

    #[test]
    fn test_attribute_values_deserialize_untagged() {
        let attrs: Attributes = toml::from_str("color = [0.1, 0.2, 0.3]\nlabel = \"gripper\"\nmass = 1.5\nfixed = true").unwrap();
        assert_eq!(attrs["label"], AttributeValue::Text("gripper".into()));
        assert_eq!(attrs["mass"], AttributeValue::Number(1.5));
        assert_eq!(attrs["fixed"], AttributeValue::Flag(true));
        assert_eq!(attrs["color"], AttributeValue::Vector(vec![0.1, 0.2, 0.3]));
    }
}
