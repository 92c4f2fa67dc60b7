// armature_sim/src/bridge.rs

//! Exchange of poses between a `Configuration` and a rigid-body simulator.
//!
//! The tree is read once to describe one simulated body per link. Every step
//! then pushes the poses of kinematic bodies (authored by the tree) into the
//! simulator and pulls the poses of dynamic bodies (authored by the simulator)
//! back into the tree.

use crate::config::BridgeOptions;
use crate::error::{BridgeError, Result};
use armature_core::attachments::{AttributeValue, BodyType, Inertia, Shape, ShapeType};
use armature_core::configuration::Configuration;
use armature_core::transformation::Transformation;
use armature_core::types::FrameId;
use nalgebra::{Unit, Vector3};
use std::collections::HashMap;
use tracing::{debug, info, trace};

/// Opaque handle the simulator hands out for a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub usize);

/// World-frame velocity of a body.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyVelocity {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
}

/// Body velocities keyed by the link they belong to.
pub type FrameVelocities = HashMap<FrameId, BodyVelocity>;

/// The simulator side of the bridge. Implementations own the actual physics.
pub trait RigidBodyWorld {
    fn add_body(&mut self, desc: &BodyDesc) -> BodyHandle;
    fn body_pose(&self, handle: BodyHandle) -> Transformation;
    fn set_kinematic_pose(&mut self, handle: BodyHandle, pose: &Transformation);
    /// Teleports a body of any type.
    fn set_body_pose(&mut self, handle: BodyHandle, pose: &Transformation);
    fn body_velocity(&self, handle: BodyHandle) -> BodyVelocity;
    /// Also clears accumulated forces.
    fn set_body_velocity(&mut self, handle: BodyHandle, velocity: &BodyVelocity);
    fn set_body_type(&mut self, handle: BodyHandle, body_type: BodyType);
    fn step(&mut self, dt: f64);

    fn set_gravity(&mut self, _gravity: Vector3<f64>) {}

    fn add_ground_plane(&mut self, _normal: Unit<Vector3<f64>>, _friction: f64, _restitution: f64) {}
}

/// A shape of a body, posed relative to the body's link frame.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyShape {
    pub frame: FrameId,
    pub shape: Shape,
    pub pose: Transformation,
}

/// Everything a simulator needs to create the body of one link.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDesc {
    pub link: FrameId,
    pub name: String,
    pub body_type: BodyType,
    /// World pose of the link when the description was collected.
    pub pose: Transformation,
    pub shapes: Vec<BodyShape>,
    /// Own inertia of the link, or the compound of its rigid sub-frames when
    /// only those carry mass.
    pub inertia: Option<Inertia>,
    /// Zero unless the body is dynamic.
    pub mass: f64,
    pub friction: f64,
    pub restitution: f64,
}

impl BodyDesc {
    /// Describes one body per link of `cfg`.
    pub fn collect(cfg: &mut Configuration, options: &BridgeOptions) -> Result<Vec<BodyDesc>> {
        let mut bodies = Vec::new();
        for link in cfg.links() {
            bodies.push(Self::describe(cfg, link, options)?);
        }
        Ok(bodies)
    }

    fn describe(cfg: &mut Configuration, link: FrameId, options: &BridgeOptions) -> Result<BodyDesc> {
        let link_pose = cfg.ensure_absolute(link)?;
        let mut members = vec![link];
        members.extend(cfg.rigid_sub_frames(link)?);

        let mut shapes = Vec::new();
        let mut members_have_inertia = false;
        let mut friction = options.default_friction;
        let mut restitution = options.default_restitution;
        for &member in &members {
            let x = cfg.ensure_absolute(member)?;
            let frame = cfg.frame(member)?;
            let Some(shape) = frame.shape.as_ref().filter(|s| s.shape_type != ShapeType::Marker) else {
                continue;
            };
            members_have_inertia |= frame.inertia.is_some();
            if let Some(AttributeValue::Number(f)) = frame.attributes.get("friction") {
                friction = *f;
            }
            if let Some(AttributeValue::Number(r)) = frame.attributes.get("restitution") {
                restitution = *r;
            }
            shapes.push(BodyShape {
                frame: member,
                shape: shape.clone(),
                pose: link_pose.inv_mul(&x),
            });
        }

        let frame = cfg.frame(link)?;
        let inertia = match frame.inertia.clone() {
            Some(own) => Some(own),
            None if members_have_inertia => Some(cfg.compound_inertia(link)?),
            None => None,
        };

        let mut body_type = BodyType::Static;
        if !shapes.is_empty() {
            if frame.joint().is_some() {
                body_type = BodyType::Kinematic;
            }
            if let Some(inertia) = &inertia {
                body_type = inertia.body_type;
            }
        }
        let mass = match (&inertia, body_type) {
            (Some(inertia), BodyType::Dynamic) => inertia.mass,
            (None, BodyType::Dynamic) => 1.0,
            _ => 0.0,
        };

        debug!(link = %link, name = frame.name(), ?body_type, shapes = shapes.len(), "described body");
        Ok(BodyDesc {
            link,
            name: frame.name().to_string(),
            body_type,
            pose: link_pose,
            shapes,
            inertia,
            mass,
            friction,
            restitution,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BodyEntry {
    link: FrameId,
    handle: BodyHandle,
    body_type: BodyType,
}

/// Couples a configuration to a simulator world.
pub struct PhysicsBridge<W: RigidBodyWorld> {
    world: W,
    options: BridgeOptions,
    bodies: Vec<BodyEntry>,
    step_count: u64,
}

impl<W: RigidBodyWorld> PhysicsBridge<W> {
    /// Creates one body per link of `cfg` in `world`.
    pub fn new(mut world: W, cfg: &mut Configuration, options: BridgeOptions) -> Result<Self> {
        world.set_gravity(options.gravity_vector());
        if options.ground_plane {
            world.add_ground_plane(
                Unit::new_normalize(options.up_axis()),
                options.default_friction,
                options.default_restitution,
            );
        }

        let mut bodies = Vec::new();
        for desc in BodyDesc::collect(cfg, &options)? {
            let handle = world.add_body(&desc);
            bodies.push(BodyEntry {
                link: desc.link,
                handle,
                body_type: desc.body_type,
            });
        }
        info!(bodies = bodies.len(), "physics bridge ready");
        Ok(Self {
            world,
            options,
            bodies,
            step_count: 0,
        })
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn handle_of(&self, link: FrameId) -> Option<BodyHandle> {
        self.bodies.iter().find(|b| b.link == link).map(|b| b.handle)
    }

    pub fn body_type_of(&self, link: FrameId) -> Option<BodyType> {
        self.bodies.iter().find(|b| b.link == link).map(|b| b.body_type)
    }

    /// Writes the tree's pose of every kinematic body into the simulator.
    pub fn push_kinematic(&mut self, cfg: &mut Configuration) -> Result<()> {
        for body in self.bodies.iter().filter(|b| b.body_type == BodyType::Kinematic) {
            let pose = cfg.ensure_absolute(body.link)?;
            self.world.set_kinematic_pose(body.handle, &pose);
        }
        Ok(())
    }

    /// Writes simulated poses back into the tree with `set_absolute`.
    pub fn pull_dynamic(&mut self, cfg: &mut Configuration) -> Result<()> {
        self.pull_dynamic_states(cfg).map(|_| ())
    }

    /// Like [`PhysicsBridge::pull_dynamic`], also returning the velocity of
    /// every pulled body.
    pub fn pull_dynamic_states(&mut self, cfg: &mut Configuration) -> Result<FrameVelocities> {
        let also_fixed = self.options.pull_static_and_kinematic;
        let mut pulled = Vec::new();
        for body in &self.bodies {
            let wanted = match body.body_type {
                BodyType::Dynamic => true,
                BodyType::Static | BodyType::Kinematic => also_fixed,
                BodyType::Soft => false,
            };
            if wanted {
                let depth = cfg.path_to_root(body.link)?.len();
                let pose = self.world.body_pose(body.handle);
                pulled.push((depth, body.link, pose, self.world.body_velocity(body.handle)));
            }
        }
        // Parents before children; arena order says nothing about depth.
        pulled.sort_by_key(|(depth, ..)| *depth);

        let mut velocities = FrameVelocities::with_capacity(pulled.len());
        for (_, link, pose, velocity) in pulled {
            cfg.set_absolute(link, pose)?;
            velocities.insert(link, velocity);
        }
        Ok(velocities)
    }

    /// Teleports every body to the tree's pose. Dynamic bodies take their
    /// link's entry in `velocities` and are brought to rest without one.
    pub fn push_full_state(&mut self, cfg: &mut Configuration, velocities: &FrameVelocities) -> Result<()> {
        for body in &self.bodies {
            let pose = cfg.ensure_absolute(body.link)?;
            self.world.set_body_pose(body.handle, &pose);
            if body.body_type == BodyType::Dynamic {
                let velocity = velocities.get(&body.link).copied().unwrap_or_default();
                self.world.set_body_velocity(body.handle, &velocity);
            }
        }
        debug!(bodies = self.bodies.len(), with_velocities = velocities.len(), "pushed full state");
        Ok(())
    }

    /// Switches the body of `link` between kinematic and dynamic. A body
    /// turned dynamic can be launched with `with_velocity`.
    pub fn change_body_type(
        &mut self,
        link: FrameId,
        body_type: BodyType,
        with_velocity: Option<Vector3<f64>>,
    ) -> Result<()> {
        if !matches!(body_type, BodyType::Kinematic | BodyType::Dynamic) {
            return Err(BridgeError::UnsupportedBodyType(body_type));
        }
        let body = self
            .bodies
            .iter_mut()
            .find(|b| b.link == link)
            .ok_or(BridgeError::NoBody(link))?;
        if body.body_type == body_type {
            trace!(link = %link, ?body_type, "body already has this type");
        }
        self.world.set_body_type(body.handle, body_type);
        if let (BodyType::Dynamic, Some(linear)) = (body_type, with_velocity) {
            let velocity = BodyVelocity {
                linear,
                ..self.world.body_velocity(body.handle)
            };
            self.world.set_body_velocity(body.handle, &velocity);
        }
        debug!(link = %link, from = ?body.body_type, to = ?body_type, "changed body type");
        body.body_type = body_type;
        Ok(())
    }

    /// Push, advance the simulator by `dt`, pull.
    pub fn step(&mut self, cfg: &mut Configuration, dt: f64) -> Result<()> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(BridgeError::InvalidTimeStep(dt));
        }
        self.push_kinematic(cfg)?;
        self.world.step(dt);
        self.pull_dynamic(cfg)?;
        self.step_count += 1;
        trace!(step = self.step_count, dt, "bridge step");
        Ok(())
    }
}
