//! Single "virtual arm" model of the hexapod.
//!
//! The therapy head sits at the end of a rigid arm of fixed length hanging
//! from a pivot. `phi` is the azimuth and `theta` the inclination from the
//! vertical, both in degrees. Moving the head to an image-space point means
//! moving the pivot to that point minus the arm's projection on each axis.
//! Only the forward direction exists; nothing maps actuator space back.

use std::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};
use shared::domain::Pose;

/// Pose expressed in the hexapod frame. Only obtainable from a [`Pose`]
/// through [`KinematicMapper`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActuatorPose {
    x: f64,
    y: f64,
    z: f64,
    phi: f64,
    theta: f64,
}

impl ActuatorPose {
    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn z(&self) -> f64 {
        self.z
    }

    pub fn phi(&self) -> f64 {
        self.phi
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn components(&self) -> [f64; 5] {
        [self.x, self.y, self.z, self.phi, self.theta]
    }
}

/// Displacement between two actuator poses; what gets sent to the hardware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseDelta {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    pub dphi: f64,
    pub dtheta: f64,
}

impl PoseDelta {
    pub fn components(&self) -> [f64; 5] {
        [self.dx, self.dy, self.dz, self.dphi, self.dtheta]
    }

    pub fn is_zero(&self) -> bool {
        self.components().iter().all(|c| *c == 0.0)
    }
}

impl Sub for ActuatorPose {
    type Output = PoseDelta;

    fn sub(self, origin: ActuatorPose) -> PoseDelta {
        PoseDelta {
            dx: self.x - origin.x,
            dy: self.y - origin.y,
            dz: self.z - origin.z,
            dphi: self.phi - origin.phi,
            dtheta: self.theta - origin.theta,
        }
    }
}

impl Add<PoseDelta> for ActuatorPose {
    type Output = ActuatorPose;

    fn add(self, delta: PoseDelta) -> ActuatorPose {
        ActuatorPose {
            x: self.x + delta.dx,
            y: self.y + delta.dy,
            z: self.z + delta.dz,
            phi: self.phi + delta.dphi,
            theta: self.theta + delta.dtheta,
        }
    }
}

impl AddAssign for PoseDelta {
    fn add_assign(&mut self, other: PoseDelta) {
        self.dx += other.dx;
        self.dy += other.dy;
        self.dz += other.dz;
        self.dphi += other.dphi;
        self.dtheta += other.dtheta;
    }
}

/// Maps `pose` into the hexapod frame for an arm of `arm_length_mm`.
///
/// Non-finite inputs come out as NaN; validate before calling.
pub fn to_actuator(pose: &Pose, arm_length_mm: f64) -> ActuatorPose {
    let phi = pose.phi.to_radians();
    let theta = pose.theta.to_radians();
    ActuatorPose {
        x: pose.x - arm_length_mm * phi.cos() * theta.sin(),
        y: pose.y - arm_length_mm * phi.sin() * theta.sin(),
        z: pose.z - arm_length_mm * theta.cos(),
        phi: pose.phi,
        theta: pose.theta,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicMapper {
    arm_length_mm: f64,
}

impl KinematicMapper {
    pub fn new(arm_length_mm: f64) -> Self {
        Self { arm_length_mm }
    }

    pub fn arm_length_mm(&self) -> f64 {
        self.arm_length_mm
    }

    pub fn to_actuator(&self, pose: &Pose) -> ActuatorPose {
        to_actuator(pose, self.arm_length_mm)
    }
}

#[cfg(test)]
#[path = "tests/kinematics_tests.rs"]
mod tests;
