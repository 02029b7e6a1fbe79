use std::{
    fs,
    path::{Path, PathBuf},
};

use ndarray::Array3;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::Volume;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read volume '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed volume file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("volume '{path}' declares shape {shape:?} but holds {len} voxels")]
    Shape {
        path: PathBuf,
        shape: [usize; 3],
        len: usize,
    },
    #[error("volume '{path}' contains negative or non-finite intensities")]
    Intensity { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct LoadedVolume {
    pub volume: Volume,
    /// Raw axes code as reported by the scanner, validated at normalization.
    pub axes: Option<[i64; 3]>,
}

/// Where reconstructed scans come from. Failures are returned as-is; the
/// positioning core does not retry.
pub trait VolumeSource {
    fn load(&self, path: &Path) -> Result<LoadedVolume, LoadError>;
}

#[derive(Debug, Deserialize)]
struct VolumeFile {
    shape: [usize; 3],
    #[serde(default)]
    axes_orientation: Option<[i64; 3]>,
    data: Vec<f32>,
}

/// Reads the JSON scan fixtures used on the bench: a row-major `data` array
/// with its `shape` and an optional `axes_orientation` triple.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonVolumeSource;

impl VolumeSource for JsonVolumeSource {
    fn load(&self, path: &Path) -> Result<LoadedVolume, LoadError> {
        let raw = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: VolumeFile = serde_json::from_str(&raw).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if file.data.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(LoadError::Intensity {
                path: path.to_path_buf(),
            });
        }

        let [n0, n1, n2] = file.shape;
        let len = file.data.len();
        let volume =
            Array3::from_shape_vec((n0, n1, n2), file.data).map_err(|_| LoadError::Shape {
                path: path.to_path_buf(),
                shape: file.shape,
                len,
            })?;

        info!(
            path = %path.display(),
            shape = ?file.shape,
            axes = ?file.axes_orientation,
            "loaded volume"
        );
        Ok(LoadedVolume {
            volume,
            axes: file.axes_orientation,
        })
    }
}

#[cfg(test)]
#[path = "tests/source_tests.rs"]
mod tests;
