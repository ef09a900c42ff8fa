//! Train/held-out splitting and test-split indexing.

use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::batch::BatchIter;
use crate::labels::{read_label_file, write_label_file};
use crate::types::{DataProfile, DatasetError, DatasetResult, LoaderConfig, SampleIndex};

pub struct SplitLoaders {
    pub train: BatchIter,
    pub held_out: BatchIter,
    /// Label file for the held-out split, materialized under the workdir for
    /// the file-based metric function. Row order matches `held_out`.
    pub held_out_labels: PathBuf,
}

/// Index the labeled train set, carve off a held-out fraction, and write the
/// held-out label file. The shuffle is deterministic for a given seed.
pub fn load_with_split(
    profile: &DataProfile,
    train_split: f32,
    cfg: &LoaderConfig,
    workdir: &Path,
    eval_split: &str,
) -> DatasetResult<SplitLoaders> {
    let label_path = profile.train_labels();
    let image_dir = profile.train_images();
    let mut entries = read_label_file(&label_path)?;
    if entries.is_empty() {
        return Err(DatasetError::Other(format!(
            "no labeled samples in {}",
            label_path.display()
        )));
    }

    let mut rng = match cfg.seed {
        Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
        None => rand::rngs::StdRng::from_rng(&mut rand::rng()),
    };
    entries.shuffle(&mut rng);

    let take = ((entries.len() as f32) * train_split.clamp(0.0, 1.0)).round() as usize;
    let held_out_entries = entries.split_off(take.min(entries.len()));
    if entries.is_empty() {
        return Err(DatasetError::Other(format!(
            "train split {train_split} leaves no training samples"
        )));
    }
    if held_out_entries.is_empty() {
        return Err(DatasetError::Other(format!(
            "train split {train_split} leaves no held-out samples"
        )));
    }

    let held_out_labels = workdir.join(format!("{eval_split}_label"));
    write_label_file(&held_out_labels, &held_out_entries)?;

    let to_index = |entries: &[(String, [f32; 4])]| -> Vec<SampleIndex> {
        entries
            .iter()
            .map(|(name, bbox)| SampleIndex {
                image: image_dir.join(name),
                bbox: Some(*bbox),
            })
            .collect()
    };

    let train = BatchIter::from_indices(to_index(&entries), cfg.clone());
    // Held-out iteration must stay aligned with the label file rows.
    let held_out_cfg = LoaderConfig {
        shuffle: false,
        ..cfg.clone()
    };
    let held_out = BatchIter::from_indices(to_index(&held_out_entries), held_out_cfg);

    Ok(SplitLoaders {
        train,
        held_out,
        held_out_labels,
    })
}

/// Image directory under a test-split root.
pub fn test_images(root: &Path) -> PathBuf {
    root.join("test_data")
}

/// Label file under a test-split root.
pub fn test_labels(root: &Path) -> PathBuf {
    root.join("test_label")
}

/// Samples under `<root>/test_data`, ordered by the `test_label` file when
/// present, otherwise by sorted filename (unlabeled).
pub fn index_test_split(root: &Path) -> DatasetResult<Vec<SampleIndex>> {
    let image_dir = test_images(root);
    let label_path = test_labels(root);
    if label_path.exists() {
        let entries = read_label_file(&label_path)?;
        return Ok(entries
            .into_iter()
            .map(|(name, bbox)| SampleIndex {
                image: image_dir.join(name),
                bbox: Some(bbox),
            })
            .collect());
    }

    let mut images = Vec::new();
    let dir = fs::read_dir(&image_dir).map_err(|source| DatasetError::Io {
        path: image_dir.clone(),
        source,
    })?;
    for entry in dir {
        let entry = entry.map_err(|source| DatasetError::Io {
            path: image_dir.clone(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() {
            images.push(path);
        }
    }
    images.sort();
    Ok(images
        .into_iter()
        .map(|image| SampleIndex { image, bbox: None })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_dataset(root: &Path, count: usize) {
        let train = root.join("train");
        let data = train.join("train_data");
        fs::create_dir_all(&data).expect("dirs");
        let mut entries = Vec::new();
        for i in 0..count {
            let name = format!("img{i}.png");
            let mut img = image::RgbImage::new(4, 4);
            for p in img.pixels_mut() {
                *p = image::Rgb([i as u8, 0, 0]);
            }
            img.save(data.join(&name)).expect("png write");
            entries.push((name, [0.0, 0.0, 0.5, 0.5]));
        }
        write_label_file(&train.join("train_label"), &entries).expect("labels");
    }

    #[test]
    fn split_fraction_carves_the_held_out_set() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_dataset(dir.path(), 10);
        let profile = DataProfile::Platform {
            root: dir.path().to_path_buf(),
        };
        let cfg = LoaderConfig {
            seed: Some(7),
            ..Default::default()
        };

        let split =
            load_with_split(&profile, 0.9, &cfg, &dir.path().join("runs"), "val").expect("split");
        assert_eq!(split.train.len(), 9);
        assert_eq!(split.held_out.len(), 1);
        assert!(split.held_out_labels.exists());
        let held = read_label_file(&split.held_out_labels).expect("read");
        assert_eq!(held.len(), 1);
    }

    #[test]
    fn split_is_deterministic_under_a_seed() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_dataset(dir.path(), 8);
        let profile = DataProfile::Platform {
            root: dir.path().to_path_buf(),
        };
        let cfg = LoaderConfig {
            seed: Some(11),
            ..Default::default()
        };

        let first = load_with_split(&profile, 0.75, &cfg, &dir.path().join("a"), "val")
            .expect("split");
        let second = load_with_split(&profile, 0.75, &cfg, &dir.path().join("b"), "val")
            .expect("split");
        let left = read_label_file(&first.held_out_labels).expect("read");
        let right = read_label_file(&second.held_out_labels).expect("read");
        assert_eq!(
            left.iter().map(|(n, _)| n.clone()).collect::<Vec<_>>(),
            right.iter().map(|(n, _)| n.clone()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn degenerate_split_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_dataset(dir.path(), 4);
        let profile = DataProfile::Platform {
            root: dir.path().to_path_buf(),
        };
        let cfg = LoaderConfig::default();

        assert!(load_with_split(&profile, 1.0, &cfg, &dir.path().join("runs"), "val").is_err());
        assert!(load_with_split(&profile, 0.0, &cfg, &dir.path().join("runs"), "val").is_err());
    }

    #[test]
    fn unlabeled_test_split_is_sorted_by_filename() {
        let dir = tempfile::tempdir().expect("tempdir");
        let test_root = dir.path().join("test");
        let data = test_images(&test_root);
        fs::create_dir_all(&data).expect("dirs");
        for name in ["b.png", "a.png"] {
            image::RgbImage::new(2, 2).save(data.join(name)).expect("png");
        }

        let indices = index_test_split(&test_root).expect("index");
        assert_eq!(indices.len(), 2);
        assert!(indices[0].image.ends_with("a.png"));
        assert!(indices[0].bbox.is_none());
    }

    #[test]
    fn labeled_test_split_follows_label_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let test_root = dir.path().join("test");
        let data = test_images(&test_root);
        fs::create_dir_all(&data).expect("dirs");
        for name in ["x.png", "y.png"] {
            image::RgbImage::new(2, 2).save(data.join(name)).expect("png");
        }
        write_label_file(
            &test_labels(&test_root),
            &[
                ("y.png".to_string(), [0.0, 0.0, 1.0, 1.0]),
                ("x.png".to_string(), [0.0, 0.0, 0.5, 0.5]),
            ],
        )
        .expect("labels");

        let indices = index_test_split(&test_root).expect("index");
        assert!(indices[0].image.ends_with("y.png"));
        assert_eq!(indices[1].bbox, Some([0.0, 0.0, 0.5, 0.5]));
    }
}
