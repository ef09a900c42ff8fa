//! The training loop and its command-line surface.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use burn::lr_scheduler::LrScheduler;
use burn::module::{AutodiffModule, Module};
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::{GradientsParams, Optimizer};
use clap::{Parser, ValueEnum};
use dataset::{load_with_split, DataProfile, LoaderConfig};

use crate::eval::local_eval;
use crate::session::{EvalSettings, SessionOps, TrainSession};
use crate::ADBackend;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    NdArray,
    Wgpu,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Run the local training loop.
    Train,
    /// Serve a platform-driven inference request from the saved checkpoint.
    Infer,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "train",
    about = "Food-image box-localization training harness"
)]
pub struct TrainArgs {
    /// Fraction of labeled samples used for training; the rest is held out.
    #[arg(long, default_value_t = 0.9)]
    pub train_split: f32,
    /// Base learning rate for the Adam optimizer.
    #[arg(long, default_value_t = 0.01)]
    pub lr: f64,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
    /// Number of epochs.
    #[arg(long, default_value_t = 10)]
    pub num_epochs: usize,
    /// Print progress and save a checkpoint every N iterations.
    #[arg(long, default_value_t = 10)]
    pub print_iter: usize,
    /// Name of the held-out split used for epoch-end evaluation.
    #[arg(long, default_value = "val")]
    pub eval_split: String,
    /// Training batch size.
    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,
    /// Square edge images are resized to before batching.
    #[arg(long, default_value_t = 128)]
    pub target_size: u32,
    /// Dataset root containing train/ (and test/ for local runs).
    #[arg(long, default_value = "data")]
    pub dataset_root: String,
    /// Use the platform-managed data layout (no local test split).
    #[arg(long, default_value_t = false)]
    pub platform: bool,
    /// Checkpoint directory; every save overwrites the same bundle.
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
    /// Working directory for prediction and held-out label files.
    #[arg(long, default_value = "runs")]
    pub workdir: String,
    /// Epochs between learning-rate decays.
    #[arg(long, default_value_t = 40)]
    pub lr_step_size: usize,
    /// Multiplicative learning-rate decay factor.
    #[arg(long, default_value_t = 0.1)]
    pub lr_gamma: f64,
    /// Optional seed for deterministic splits and batching.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Optional metrics output path (JSONL); appends one record per eval.
    #[arg(long)]
    pub metrics_out: Option<String>,
    /// Run mode.
    #[arg(long, value_enum, default_value_t = RunMode::Train)]
    pub mode: RunMode,
    /// Session tag supplied by the experiment platform.
    #[arg(long, default_value = "0")]
    pub iteration: String,
    /// Reload the saved checkpoint before continuing (platform resume).
    #[arg(long, default_value_t = false)]
    pub pause: bool,
}

/// Counters and scores collected by one `run_train` call.
#[derive(Debug, Clone, Default)]
pub struct TrainReport {
    pub epochs: usize,
    pub steps: usize,
    pub checkpoints_saved: usize,
    /// Fractional epoch of every progress print, in order.
    pub progress_epochs: Vec<f32>,
    pub baseline_miou: f32,
    pub final_miou: f32,
}

pub fn validate_backend_choice(kind: BackendKind) -> anyhow::Result<()> {
    let built_wgpu = cfg!(feature = "backend-wgpu");
    match (kind, built_wgpu) {
        (BackendKind::Wgpu, false) => {
            anyhow::bail!(
                "backend-wgpu feature not enabled; rebuild with --features backend-wgpu or choose the ndarray backend"
            )
        }
        (BackendKind::NdArray, true) => {
            println!("note: built with backend-wgpu; training will use the WGPU backend despite --backend ndarray");
            Ok(())
        }
        _ => Ok(()),
    }
}

fn data_profile(args: &TrainArgs) -> DataProfile {
    let root = PathBuf::from(&args.dataset_root);
    if args.platform {
        DataProfile::Platform { root }
    } else {
        DataProfile::Local { root }
    }
}

/// One full training run: baseline eval, sequential epochs with periodic
/// progress logs and checkpoint saves, epoch-end evaluation. Any failure
/// propagates and aborts the run; there are no retries.
pub fn run_train(args: TrainArgs) -> anyhow::Result<TrainReport> {
    validate_backend_choice(args.backend)?;
    let device = <ADBackend as burn::tensor::backend::Backend>::Device::default();
    let workdir = PathBuf::from(&args.workdir);
    let checkpoint_dir = PathBuf::from(&args.checkpoint_dir);

    let profile = data_profile(&args);
    let loader_cfg = LoaderConfig {
        target_size: Some(args.target_size),
        shuffle: true,
        seed: args.seed,
    };
    let mut split = load_with_split(
        &profile,
        args.train_split,
        &loader_cfg,
        &workdir,
        &args.eval_split,
    )?;

    let mut session = TrainSession::<ADBackend>::new(
        args.lr,
        args.lr_step_size,
        args.lr_gamma,
        EvalSettings {
            batch_size: args.batch_size,
            target_size: Some(args.target_size),
        },
        device.clone(),
    );
    println!(
        "ConvLocalizer with {} parameters",
        session.model.num_params()
    );
    if args.pause {
        session.load(&checkpoint_dir)?;
        println!("Resumed from {}", checkpoint_dir.display());
    }

    let prediction_file = workdir.join(format!("pred_{}.txt", args.eval_split));
    let num_batches = split.train.num_batches(args.batch_size).max(1);
    let print_iter = args.print_iter.max(1);
    let mut report = TrainReport::default();

    // Baseline score before any training step.
    report.baseline_miou = local_eval(
        &session.model.valid(),
        &mut split.held_out,
        args.batch_size,
        &device,
        &split.held_out_labels,
        &prediction_file,
    )?;
    report.final_miou = report.baseline_miou;

    let mut window = Instant::now();
    for epoch in 0..args.num_epochs {
        // One scheduler step per epoch: the staircase decay contract.
        let lr = LrScheduler::step(&mut session.scheduler);
        split.train.reset();
        let mut iter_ = 0usize;

        while let Some(batch) = split
            .train
            .next_batch::<ADBackend>(args.batch_size, &device)?
        {
            iter_ += 1;
            report.steps += 1;
            let targets = batch
                .targets
                .ok_or_else(|| anyhow::anyhow!("training batch without labels"))?;
            let preds = session.model.forward(batch.images);
            let loss = MseLoss::new().forward(preds, targets, Reduction::Mean);
            let loss_value = loss
                .clone()
                .detach()
                .into_data()
                .to_vec::<f32>()
                .map_err(|e| anyhow::anyhow!("{e:?}"))?
                .first()
                .copied()
                .unwrap_or(0.0);
            let grads = GradientsParams::from_grads(loss.backward(), &session.model);
            session.model = session.optim.step(lr, session.model, grads);

            if iter_ % print_iter == 0 {
                let frac = epoch as f32 + iter_ as f32 / num_batches as f32;
                let elapsed = window.elapsed().as_secs_f64();
                let expected = elapsed * num_batches as f64 / print_iter as f64;
                println!(
                    "[{frac:.3}/{}] loss({loss_value:.6}) elapsed {elapsed:.1}s expected per epoch {expected:.1}s",
                    args.num_epochs
                );
                session
                    .save(&checkpoint_dir)
                    .with_context(|| format!("checkpoint at epoch {}", epoch + 1))?;
                report.checkpoints_saved += 1;
                report.progress_epochs.push(frac);
                window = Instant::now();
            }
        }

        let miou = local_eval(
            &session.model.valid(),
            &mut split.held_out,
            args.batch_size,
            &device,
            &split.held_out_labels,
            &prediction_file,
        )?;
        report.final_miou = miou;
        report.epochs = epoch + 1;
        println!(
            "[epoch {}] elapsed: {:.1}s",
            epoch + 1,
            window.elapsed().as_secs_f64()
        );
        if let Some(path) = &args.metrics_out {
            append_metrics(Path::new(path), epoch + 1, lr, miou)?;
        }
    }

    Ok(report)
}

/// Serve a platform-driven inference request: restore the saved checkpoint,
/// run the test split under the dataset root, write the tagged prediction
/// file.
pub fn run_infer(args: TrainArgs) -> anyhow::Result<PathBuf> {
    validate_backend_choice(args.backend)?;
    let device = <ADBackend as burn::tensor::backend::Backend>::Device::default();
    let mut session = TrainSession::<ADBackend>::new(
        args.lr,
        args.lr_step_size,
        args.lr_gamma,
        EvalSettings {
            batch_size: args.batch_size,
            target_size: Some(args.target_size),
        },
        device,
    );
    session.load(Path::new(&args.checkpoint_dir))?;

    let profile = data_profile(&args);
    let test_root = match profile.test_root() {
        Some(root) => root,
        // The platform hands the harness a root that already is the split.
        None => profile.root().to_path_buf(),
    };
    let predictions = session.infer(&test_root)?;

    let out = PathBuf::from(&args.workdir).join(format!("pred_test_{}.txt", args.iteration));
    predictions.write_to(&out)?;
    println!("Wrote {} predictions to {}", predictions.len(), out.display());
    Ok(out)
}

fn append_metrics(path: &Path, epoch: usize, lr: f64, miou: f32) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let line = serde_json::json!({ "epoch": epoch, "lr": lr, "miou": miou });
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    writeln!(file, "{line}").with_context(|| format!("appending to {}", path.display()))?;
    Ok(())
}
