use serde::{Deserialize, Serialize};

use crate::error::PositioningError;

/// Inclination of the arm when it hangs vertically, in degrees.
pub const VERTICAL_THETA_DEG: f64 = 90.0;

/// Image-space pose: millimeters for the position, degrees for the angles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub phi: f64,
    pub theta: f64,
}

impl Pose {
    pub const HOME: Pose = Pose {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        phi: 0.0,
        theta: VERTICAL_THETA_DEG,
    };

    pub fn new(x: f64, y: f64, z: f64, phi: f64, theta: f64) -> Self {
        Self {
            x,
            y,
            z,
            phi,
            theta,
        }
    }

    /// Position only, with the arm left vertical.
    pub fn at(x: f64, y: f64, z: f64) -> Self {
        Self::new(x, y, z, 0.0, VERTICAL_THETA_DEG)
    }

    pub fn is_finite(&self) -> bool {
        [self.x, self.y, self.z, self.phi, self.theta]
            .iter()
            .all(|v| v.is_finite())
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::HOME
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plane {
    Transversal,
    Coronal,
    Sagittal,
}

impl Plane {
    pub fn title(&self) -> &'static str {
        match self {
            Plane::Transversal => "Transversal",
            Plane::Coronal => "Coronal",
            Plane::Sagittal => "Sagittal",
        }
    }

    fn from_axis(axis: u8) -> Option<Self> {
        match axis {
            0 => Some(Plane::Transversal),
            1 => Some(Plane::Coronal),
            2 => Some(Plane::Sagittal),
            _ => None,
        }
    }
}

/// Scanner-provided mapping of acquisition axes onto anatomical planes.
///
/// Always a permutation of `{0, 1, 2}`; the last element selects the display
/// plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct OrientationCode([u8; 3]);

impl OrientationCode {
    pub fn new(axes: [i64; 3]) -> Result<Self, PositioningError> {
        let mut seen = [false; 3];
        let mut code = [0u8; 3];
        for (slot, axis) in code.iter_mut().zip(axes) {
            let index = usize::try_from(axis)
                .ok()
                .filter(|index| *index < 3)
                .ok_or(PositioningError::UnsupportedOrientation { axes })?;
            if seen[index] {
                return Err(PositioningError::UnsupportedOrientation { axes });
            }
            seen[index] = true;
            *slot = index as u8;
        }
        Ok(Self(code))
    }

    pub fn axes(&self) -> [u8; 3] {
        self.0
    }

    pub fn plane(&self) -> Plane {
        // the permutation check in `new` keeps this total
        Plane::from_axis(self.0[2]).unwrap_or(Plane::Transversal)
    }

    /// Whether the leading pair matches the acquisition order the plane's
    /// labels were written for.
    pub fn is_canonical(&self) -> bool {
        let lead = (self.0[0], self.0[1]);
        match self.plane() {
            Plane::Sagittal => lead == (0, 1),
            Plane::Coronal => lead == (0, 2),
            Plane::Transversal => lead == (1, 2),
        }
    }
}

impl<'de> Deserialize<'de> for OrientationCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let axes = <[i64; 3]>::deserialize(deserializer)?;
        Self::new(axes).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
