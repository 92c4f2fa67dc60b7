// armature_sim/src/config.rs

//! Options for the physics bridge, layered as defaults <- TOML <- environment
//! (`ARMATURE_` prefix, e.g. `ARMATURE_GRAVITY=-3.7`).

use crate::error::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeOptions {
    /// Signed gravitational acceleration along the up axis.
    pub gravity: f64,
    /// Use +y as the up axis instead of +z.
    pub y_axis_gravity: bool,
    /// Friction for bodies whose frames carry no `friction` attribute.
    pub default_friction: f64,
    /// Restitution for bodies whose frames carry no `restitution` attribute.
    pub default_restitution: f64,
    /// Also write static and kinematic body poses back into the tree.
    pub pull_static_and_kinematic: bool,
    /// Add an infinite ground plane through the origin.
    pub ground_plane: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            gravity: -9.8,
            y_axis_gravity: false,
            default_friction: 1.0,
            default_restitution: 0.1,
            pull_static_and_kinematic: false,
            ground_plane: true,
        }
    }
}

impl BridgeOptions {
    fn base() -> Figment {
        Figment::from(Serialized::defaults(BridgeOptions::default()))
    }

    /// Reads options from a TOML file, then applies `ARMATURE_*` overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let options = Self::base()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("ARMATURE_"))
            .extract()?;
        Ok(options)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let options = Self::base()
            .merge(Toml::string(text))
            .merge(Env::prefixed("ARMATURE_"))
            .extract()?;
        Ok(options)
    }

    /// Renders the options as a TOML document, e.g. to seed an options file.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    pub fn up_axis(&self) -> Vector3<f64> {
        if self.y_axis_gravity {
            Vector3::y()
        } else {
            Vector3::z()
        }
    }

    pub fn gravity_vector(&self) -> Vector3<f64> {
        self.up_axis() * self.gravity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_defaults_point_gravity_down_z() {
        let options = BridgeOptions::default();
        let g = options.gravity_vector();
        assert_abs_diff_eq!(g.z, -9.8);
        assert_abs_diff_eq!(g.y, 0.0);
    }

    #[test]
    fn test_toml_overrides_only_given_keys() {
        let options = BridgeOptions::from_toml_str(
            "y_axis_gravity = true\ndefault_friction = 0.4\n",
        )
        .unwrap();
        assert!(options.y_axis_gravity);
        assert_abs_diff_eq!(options.default_friction, 0.4);
        assert_abs_diff_eq!(options.default_restitution, 0.1);
        assert_abs_diff_eq!(options.gravity_vector().y, options.gravity);
    }

    #[test]
    fn test_wrong_type_is_an_error() {
        assert!(BridgeOptions::from_toml_str("gravity = \"down\"").is_err());
    }

    #[test]
    fn test_rendered_options_read_back() {
        let options = BridgeOptions {
            gravity: -1.62,
            pull_static_and_kinematic: true,
            ..BridgeOptions::default()
        };
        let text = options.to_toml_string().unwrap();
        let back: BridgeOptions = toml::from_str(&text).unwrap();
        assert_eq!(back, options);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let options = BridgeOptions::load("does/not/exist.toml").unwrap();
        assert_eq!(options.ground_plane, BridgeOptions::default().ground_plane);
    }
}
