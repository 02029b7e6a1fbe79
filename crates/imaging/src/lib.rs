//! Volume handling for the positioning tab: canonical orientation of the
//! reconstructed scan and the seam through which scans are loaded.

pub mod orientation;
pub mod source;

pub use orientation::{normalize, normalize_oriented, NormalizedImage, VoxelPick};
pub use source::{JsonVolumeSource, LoadError, LoadedVolume, VolumeSource};

pub type Volume = ndarray::Array3<f32>;
