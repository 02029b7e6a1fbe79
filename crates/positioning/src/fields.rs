//! Text bindings for the target pose entry and the read-only actuator
//! preview that follows every keystroke.

use std::sync::{Arc, Mutex, PoisonError};

use shared::{
    domain::{Pose, VERTICAL_THETA_DEG},
    error::PositioningError,
};
use tracing::warn;

use crate::kinematics::{ActuatorPose, KinematicMapper};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoseField {
    X,
    Y,
    Z,
    Phi,
    Theta,
}

impl PoseField {
    pub const ALL: [PoseField; 5] = [
        PoseField::X,
        PoseField::Y,
        PoseField::Z,
        PoseField::Phi,
        PoseField::Theta,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PoseField::X => "X (mm)",
            PoseField::Y => "Y (mm)",
            PoseField::Z => "Z (mm)",
            PoseField::Phi => "Phi (deg)",
            PoseField::Theta => "Theta (deg)",
        }
    }

    fn index(&self) -> usize {
        match self {
            PoseField::X => 0,
            PoseField::Y => 1,
            PoseField::Z => 2,
            PoseField::Phi => 3,
            PoseField::Theta => 4,
        }
    }
}

/// Parses one field. Blank text means the placeholder; anything that is not
/// a finite number is rejected.
pub fn parse_field(field: PoseField, text: &str, placeholder: f64) -> Result<f64, PositioningError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(placeholder);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| PositioningError::validation(field.label(), text))
}

#[derive(Debug, Clone)]
struct FieldBinding {
    text: String,
    placeholder: f64,
    value: f64,
}

impl FieldBinding {
    fn new(placeholder: f64) -> Self {
        Self {
            text: String::new(),
            placeholder,
            value: placeholder,
        }
    }
}

type Listener = Box<dyn FnMut(&Pose) + Send>;

/// Target pose entry. Accepted edits notify every subscriber with the
/// resulting pose; rejected edits keep the last accepted text and value.
pub struct PoseForm {
    bindings: [FieldBinding; 5],
    listeners: Vec<Listener>,
}

impl Default for PoseForm {
    fn default() -> Self {
        Self::new(VERTICAL_THETA_DEG)
    }
}

impl PoseForm {
    pub fn new(default_theta_deg: f64) -> Self {
        Self {
            bindings: [
                FieldBinding::new(0.0),
                FieldBinding::new(0.0),
                FieldBinding::new(0.0),
                FieldBinding::new(0.0),
                FieldBinding::new(default_theta_deg),
            ],
            listeners: Vec::new(),
        }
    }

    pub fn pose(&self) -> Pose {
        let [x, y, z, phi, theta] = [0, 1, 2, 3, 4].map(|i| self.bindings[i].value);
        Pose::new(x, y, z, phi, theta)
    }

    pub fn text(&self, field: PoseField) -> &str {
        &self.bindings[field.index()].text
    }

    pub fn placeholder(&self, field: PoseField) -> f64 {
        self.bindings[field.index()].placeholder
    }

    pub fn set_text(&mut self, field: PoseField, text: &str) -> Result<Pose, PositioningError> {
        let binding = &mut self.bindings[field.index()];
        match parse_field(field, text, binding.placeholder) {
            Ok(value) => {
                binding.value = value;
                binding.text = text.to_string();
            }
            Err(err) => {
                warn!(field = field.label(), input = text, "ignoring invalid pose input");
                return Err(err);
            }
        }
        let pose = self.pose();
        self.notify(&pose);
        Ok(pose)
    }

    /// Empties every field back to its placeholder.
    pub fn clear(&mut self) {
        for binding in &mut self.bindings {
            binding.text.clear();
            binding.value = binding.placeholder;
        }
        let pose = self.pose();
        self.notify(&pose);
    }

    pub fn on_change(&mut self, listener: impl FnMut(&Pose) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&mut self, pose: &Pose) {
        for listener in &mut self.listeners {
            listener(pose);
        }
    }
}

/// Actuator coordinates shown next to the entry, recomputed on every
/// accepted edit.
#[derive(Clone)]
pub struct ActuatorPreview {
    latest: Arc<Mutex<ActuatorPose>>,
}

impl ActuatorPreview {
    pub fn attach(mapper: KinematicMapper, form: &mut PoseForm) -> Self {
        let latest = Arc::new(Mutex::new(mapper.to_actuator(&form.pose())));
        let sink = latest.clone();
        form.on_change(move |pose| {
            *sink.lock().unwrap_or_else(PoisonError::into_inner) = mapper.to_actuator(pose);
        });
        Self { latest }
    }

    pub fn latest(&self) -> ActuatorPose {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "tests/fields_tests.rs"]
mod tests;
