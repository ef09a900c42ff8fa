//! Batch iteration over indexed samples.
//!
//! A `BatchIter` is a finite, restartable pass over its sample indices. Image
//! decoding happens lazily per batch; the caller drives iteration with
//! blocking `next_batch` calls.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use image::imageops::FilterType;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::types::{DatasetError, DatasetResult, LoaderConfig, SampleIndex};

pub struct LocalizerBatch<B: Backend> {
    /// CHW images normalized to [0, 1], shape `[batch, 3, H, W]`.
    pub images: Tensor<B, 4>,
    /// Normalized target boxes `[batch, 4]`; `None` for unlabeled batches.
    pub targets: Option<Tensor<B, 2>>,
}

pub struct BatchIter {
    indices: Vec<SampleIndex>,
    cursor: usize,
    cfg: LoaderConfig,
    rng: Option<StdRng>,
}

impl BatchIter {
    pub fn from_indices(mut indices: Vec<SampleIndex>, cfg: LoaderConfig) -> Self {
        let mut rng = cfg.shuffle.then(|| match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        });
        if let Some(rng) = rng.as_mut() {
            indices.shuffle(rng);
        }
        Self {
            indices,
            cursor: 0,
            cfg,
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of batches one full pass yields, for progress math.
    pub fn num_batches(&self, batch_size: usize) -> usize {
        self.indices.len().div_ceil(batch_size.max(1))
    }

    /// Restart the pass. Shuffling iterators draw a fresh order.
    pub fn reset(&mut self) {
        self.cursor = 0;
        if let Some(rng) = self.rng.as_mut() {
            self.indices.shuffle(rng);
        }
    }

    pub fn next_batch<B: Backend>(
        &mut self,
        batch_size: usize,
        device: &B::Device,
    ) -> DatasetResult<Option<LocalizerBatch<B>>> {
        if self.cursor >= self.indices.len() {
            return Ok(None);
        }
        let end = (self.cursor + batch_size.max(1)).min(self.indices.len());
        let slice = self.indices[self.cursor..end].to_vec();
        self.cursor = end;

        let labeled = slice[0].bbox.is_some();
        let mut images_buf: Vec<f32> = Vec::new();
        let mut targets_buf: Vec<f32> = Vec::new();
        let mut expected: Option<(u32, u32)> = None;

        for idx in &slice {
            if idx.bbox.is_some() != labeled {
                return Err(DatasetError::Other(format!(
                    "batch mixes labeled and unlabeled samples at {}",
                    idx.image.display()
                )));
            }
            let img = image::open(&idx.image)
                .map_err(|source| DatasetError::Image {
                    path: idx.image.clone(),
                    source,
                })?
                .to_rgb8();
            let img = match self.cfg.target_size {
                Some(edge) => image::imageops::resize(&img, edge, edge, FilterType::Triangle),
                None => img,
            };
            let (w, h) = img.dimensions();
            match expected {
                None => expected = Some((w, h)),
                Some(sz) if sz != (w, h) => {
                    return Err(DatasetError::Other(format!(
                        "image dimensions differ within batch: {} is {w}x{h}, expected {}x{}; \
                         set a target size to force consistency",
                        idx.image.display(),
                        sz.0,
                        sz.1
                    )));
                }
                _ => {}
            }

            // CHW layout, normalized to [0, 1].
            let raw = img.as_raw();
            let pixels = (w * h) as usize;
            images_buf.reserve(3 * pixels);
            for c in 0..3 {
                for p in 0..pixels {
                    images_buf.push(raw[p * 3 + c] as f32 / 255.0);
                }
            }
            if let Some(bbox) = idx.bbox {
                targets_buf.extend_from_slice(&bbox);
            }
        }

        let (w, h) = match expected {
            Some(size) => size,
            None => return Ok(None),
        };
        let batch_len = slice.len();
        let images = Tensor::<B, 1>::from_floats(images_buf.as_slice(), device).reshape([
            batch_len,
            3,
            h as usize,
            w as usize,
        ]);
        let targets = labeled.then(|| {
            Tensor::<B, 1>::from_floats(targets_buf.as_slice(), device).reshape([batch_len, 4])
        });
        Ok(Some(LocalizerBatch { images, targets }))
    }
}
