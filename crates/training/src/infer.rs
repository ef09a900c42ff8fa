//! Inference runner: map the model over a batch source and collect the
//! predicted boxes in input order.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Context;
use burn::tensor::backend::Backend;
use dataset::BatchIter;
use models::ConvLocalizer;

/// How long an inference pass may stay silent before a progress line.
const PROGRESS_EVERY: Duration = Duration::from_secs(10);

/// Dense N x 4 prediction array; row order equals input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Predictions {
    rows: Vec<[f32; 4]>,
}

impl Predictions {
    pub fn new(rows: Vec<[f32; 4]>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[[f32; 4]] {
        &self.rows
    }

    /// Write one `x0 y0 x1 y1` line per row.
    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut out = String::new();
        for row in &self.rows {
            out.push_str(&format!("{} {} {} {}\n", row[0], row[1], row[2], row[3]));
        }
        fs::write(path, out).with_context(|| format!("writing predictions to {}", path.display()))
    }
}

/// Run the model over every batch without touching its parameters and
/// concatenate the host-side outputs. The caller hands in an eval-mode model
/// (inner backend), so normalization layers use running statistics and no
/// gradients are tracked.
pub fn run_inference<B: Backend>(
    model: &ConvLocalizer<B>,
    loader: &mut BatchIter,
    batch_size: usize,
    device: &B::Device,
) -> anyhow::Result<Predictions> {
    let total = loader.num_batches(batch_size);
    let mut rows = Vec::with_capacity(loader.len());
    let mut last_progress = Instant::now();
    let mut batch_idx = 0usize;

    while let Some(batch) = loader.next_batch::<B>(batch_size, device)? {
        batch_idx += 1;
        let output = model.forward(batch.images);
        let [_, width] = output.dims();
        if width != 4 {
            anyhow::bail!("expected 4 outputs per image, got {width}");
        }
        let host = output
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("{e:?}"))?;
        for chunk in host.chunks_exact(4) {
            rows.push([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }

        if last_progress.elapsed() >= PROGRESS_EVERY {
            println!("Infer batch {batch_idx}/{total}.");
            last_progress = Instant::now();
        }
    }
    Ok(Predictions::new(rows))
}
