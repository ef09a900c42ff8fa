//! Core types, error definitions, and path profiles for the localizer
//! dataset.

use std::path::{Path, PathBuf};
use thiserror::Error;

pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("label parse error at {path}:{line}: {msg}")]
    Label {
        path: PathBuf,
        line: usize,
        msg: String,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{0}")]
    Other(String),
}

/// One food image and, when labeled, its normalized box.
#[derive(Debug, Clone)]
pub struct SampleIndex {
    pub image: PathBuf,
    pub bbox: Option<[f32; 4]>,
}

/// Loader knobs shared by the train, held-out, and test iterators.
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    /// Resize every image to this square edge before batching. `None` keeps
    /// native resolution, which then must be uniform within a batch.
    pub target_size: Option<u32>,
    pub shuffle: bool,
    pub seed: Option<u64>,
}

/// Where the dataset lives on disk.
///
/// Chosen explicitly at startup; replaces environment-driven module-level
/// path selection with two named layouts.
#[derive(Debug, Clone)]
pub enum DataProfile {
    /// Platform-managed checkout: labeled train split only; the held-out
    /// split is carved from it.
    Platform { root: PathBuf },
    /// Local filesystem layout with a test split beside the train split.
    Local { root: PathBuf },
}

impl DataProfile {
    pub fn root(&self) -> &Path {
        match self {
            DataProfile::Platform { root } | DataProfile::Local { root } => root,
        }
    }

    pub fn train_images(&self) -> PathBuf {
        self.root().join("train").join("train_data")
    }

    pub fn train_labels(&self) -> PathBuf {
        self.root().join("train").join("train_label")
    }

    /// Root of the local test split, when the profile has one.
    pub fn test_root(&self) -> Option<PathBuf> {
        match self {
            DataProfile::Platform { .. } => None,
            DataProfile::Local { root } => Some(root.join("test")),
        }
    }
}
