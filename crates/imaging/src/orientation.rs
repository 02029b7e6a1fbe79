//! Reorientation of reconstructed volumes into the display convention used by
//! the positioning viewer.
//!
//! The scanner reports which acquisition axis ended up along each anatomical
//! direction. The last axis of the code picks the display plane, the leading
//! pair tells whether readout and phase arrived in the order the plane's labels
//! expect. When they did not, the two in-plane axes are swapped before the
//! flips that put anterior/inferior/right on the conventional side.

use ndarray::Axis;
use serde::Serialize;
use shared::domain::{OrientationCode, Plane};
use tracing::{debug, warn};

use crate::Volume;

pub const NO_ORIENTATION_TITLE: &str = "No orientation";

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedImage {
    pub matrix: Volume,
    pub x_label: String,
    pub y_label: String,
    pub title: String,
    pub plane: Option<Plane>,
}

/// Voxel indices picked on the displayed slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoxelPick {
    pub x: usize,
    pub y: usize,
    pub slice: usize,
}

impl VoxelPick {
    pub fn coordinates(&self) -> [f64; 3] {
        [self.x as f64, self.y as f64, self.slice as f64]
    }
}

struct Layout {
    swap_in_plane: bool,
    flip_slices: bool,
    x_label: &'static str,
    y_label: &'static str,
}

fn layout_for(code: &OrientationCode) -> Layout {
    let canonical = code.is_canonical();
    match (code.plane(), canonical) {
        (Plane::Sagittal, true) => Layout {
            swap_in_plane: false,
            flip_slices: false,
            x_label: "(-Y) A | PHASE | P (+Y)",
            y_label: "(-X) I | READOUT | S (+X)",
        },
        (Plane::Sagittal, false) => Layout {
            swap_in_plane: true,
            flip_slices: false,
            x_label: "(-Y) A | READOUT | P (+Y)",
            y_label: "(-X) I | PHASE | S (+X)",
        },
        (Plane::Coronal, true) => Layout {
            swap_in_plane: false,
            flip_slices: true,
            x_label: "(+Z) R | PHASE | L (-Z)",
            y_label: "(-X) I | READOUT | S (+X)",
        },
        (Plane::Coronal, false) => Layout {
            swap_in_plane: true,
            flip_slices: true,
            x_label: "(+Z) R | READOUT | L (-Z)",
            y_label: "(-X) I | PHASE | S (+X)",
        },
        (Plane::Transversal, true) => Layout {
            swap_in_plane: false,
            flip_slices: false,
            x_label: "(+Z) R | PHASE | L (-Z)",
            y_label: "(+Y) P | READOUT | A (-Y)",
        },
        (Plane::Transversal, false) => Layout {
            swap_in_plane: true,
            flip_slices: false,
            x_label: "(+Z) R | READOUT | L (-Z)",
            y_label: "(+Y) P | PHASE | A (-Y)",
        },
    }
}

fn reorient(volume: &Volume, layout: &Layout) -> Volume {
    // all work happens on a view; the caller's buffer is only read
    let mut view = volume.view();
    if layout.swap_in_plane {
        view = view.permuted_axes([0, 2, 1]);
    }
    view.invert_axis(Axis(2));
    view.invert_axis(Axis(1));
    if layout.flip_slices {
        view.invert_axis(Axis(0));
    }
    view.as_standard_layout().into_owned()
}

fn unoriented(volume: &Volume) -> NormalizedImage {
    NormalizedImage {
        matrix: volume.clone(),
        x_label: "X".to_string(),
        y_label: "Y".to_string(),
        title: NO_ORIENTATION_TITLE.to_string(),
        plane: None,
    }
}

/// Orients `volume` for display according to the scanner's axes code.
///
/// A missing code, or one that is not a permutation of `{0, 1, 2}`, yields the
/// volume as-is with generic labels.
pub fn normalize(volume: &Volume, axes: Option<[i64; 3]>) -> NormalizedImage {
    let Some(axes) = axes else {
        return unoriented(volume);
    };
    match OrientationCode::new(axes) {
        Ok(code) => normalize_oriented(volume, &code),
        Err(err) => {
            warn!(error = %err, "falling back to unoriented display");
            unoriented(volume)
        }
    }
}

pub fn normalize_oriented(volume: &Volume, code: &OrientationCode) -> NormalizedImage {
    let layout = layout_for(code);
    let plane = code.plane();
    debug!(
        axes = ?code.axes(),
        plane = plane.title(),
        swapped = layout.swap_in_plane,
        "reorienting volume"
    );
    NormalizedImage {
        matrix: reorient(volume, &layout),
        x_label: layout.x_label.to_string(),
        y_label: layout.y_label.to_string(),
        title: plane.title().to_string(),
        plane: Some(plane),
    }
}

impl NormalizedImage {
    pub fn shape(&self) -> [usize; 3] {
        let dim = self.matrix.dim();
        [dim.0, dim.1, dim.2]
    }

    /// Converts a click on slice `slice` at display position `(x, y)` into
    /// voxel indices. Positions are truncated toward zero before the bounds
    /// check, as the viewer reports fractional data coordinates.
    pub fn pick(&self, slice: usize, x: f64, y: f64) -> Option<VoxelPick> {
        let [slices, width, height] = self.shape();
        if slice >= slices || !x.is_finite() || !y.is_finite() {
            return None;
        }
        let (x, y) = (x.trunc(), y.trunc());
        if x < 0.0 || y < 0.0 || x >= width as f64 || y >= height as f64 {
            return None;
        }
        Some(VoxelPick {
            x: x as usize,
            y: y as usize,
            slice,
        })
    }

    /// Minimum and maximum intensity, ignoring NaN voxels.
    pub fn intensity_range(&self) -> Option<(f32, f32)> {
        self.matrix
            .iter()
            .copied()
            .filter(|value| !value.is_nan())
            .fold(None, |range, value| match range {
                None => Some((value, value)),
                Some((lo, hi)) => Some((lo.min(value), hi.max(value))),
            })
    }
}

#[cfg(test)]
#[path = "tests/orientation_tests.rs"]
mod tests;
