//! Evaluation runner: write predictions for a split, score them with the
//! metric function, report the scalar.

use std::path::Path;

use burn::tensor::backend::Backend;
use dataset::BatchIter;
use models::ConvLocalizer;

use crate::infer::run_inference;
use crate::metric::evaluation_metrics;

/// Run inference over the held-out split, write the predictions file, and
/// return the mean IoU against `label_file`. Metric failures propagate;
/// nothing here catches or retries.
pub fn local_eval<B: Backend>(
    model: &ConvLocalizer<B>,
    loader: &mut BatchIter,
    batch_size: usize,
    device: &B::Device,
    label_file: &Path,
    prediction_file: &Path,
) -> anyhow::Result<f32> {
    loader.reset();
    let predictions = run_inference(model, loader, batch_size, device)?;
    predictions.write_to(prediction_file)?;
    let miou = evaluation_metrics(prediction_file, label_file)?;
    println!("Eval result: {miou:.4} mIoU");
    Ok(miou)
}
