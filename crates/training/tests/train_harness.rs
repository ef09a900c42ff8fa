use std::fs;
use std::path::Path;

use anyhow::Result;
use burn::lr_scheduler::LrScheduler;
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use dataset::write_label_file;
use tempfile::tempdir;
use training::{
    run_infer, run_train, ADBackend, BackendKind, EvalSettings, RunMode, SessionOps,
    StepLrScheduler, TrainArgs, TrainSession,
};

fn device() -> <ADBackend as Backend>::Device {
    Default::default()
}

fn write_png(path: &Path, edge: u32, value: u8) {
    let mut img = image::RgbImage::new(edge, edge);
    for p in img.pixels_mut() {
        *p = image::Rgb([value, value / 2, 32]);
    }
    img.save(path).expect("png write");
}

/// Lay out `<root>/train/train_data` with `count` tiny labeled images.
fn write_train_split(root: &Path, count: usize) {
    let data = root.join("train").join("train_data");
    fs::create_dir_all(&data).expect("dirs");
    let mut entries = Vec::new();
    for i in 0..count {
        let name = format!("img{i}.png");
        write_png(&data.join(&name), 8, (i * 20) as u8);
        entries.push((name, [0.25, 0.25, 0.75, 0.75]));
    }
    write_label_file(&root.join("train").join("train_label"), &entries).expect("labels");
}

/// Lay out `<root>/test_data` with `count` unlabeled images.
fn write_test_split(root: &Path, count: usize) {
    let data = root.join("test_data");
    fs::create_dir_all(&data).expect("dirs");
    for i in 0..count {
        write_png(&data.join(format!("t{i}.png")), 8, (i * 30) as u8);
    }
}

fn base_args(root: &Path) -> TrainArgs {
    TrainArgs {
        train_split: 0.8,
        lr: 0.01,
        backend: BackendKind::NdArray,
        num_epochs: 1,
        print_iter: 1,
        eval_split: "val".to_string(),
        batch_size: 2,
        target_size: 8,
        dataset_root: root.display().to_string(),
        platform: true,
        checkpoint_dir: root.join("checkpoints").display().to_string(),
        workdir: root.join("runs").display().to_string(),
        lr_step_size: 40,
        lr_gamma: 0.1,
        seed: Some(42),
        metrics_out: None,
        mode: RunMode::Train,
        iteration: "0".to_string(),
        pause: false,
    }
}

fn session(eval_batch: usize) -> TrainSession<ADBackend> {
    TrainSession::new(
        0.01,
        40,
        0.1,
        EvalSettings {
            batch_size: eval_batch,
            target_size: Some(8),
        },
        device(),
    )
}

#[test]
fn two_batches_with_print_iter_one_save_twice() -> Result<()> {
    let temp = tempdir()?;
    // 5 samples at split 0.8: 4 train (2 batches of 2) + 1 held out.
    write_train_split(temp.path(), 5);
    let mut args = base_args(temp.path());
    args.metrics_out = Some(temp.path().join("runs/metrics.jsonl").display().to_string());

    let report = run_train(args.clone())?;

    assert_eq!(report.epochs, 1);
    assert_eq!(report.steps, 2);
    assert_eq!(report.checkpoints_saved, 2);
    assert_eq!(report.progress_epochs.len(), 2);
    assert!((report.progress_epochs[0] - 0.5).abs() < 1e-6);
    assert!((report.progress_epochs[1] - 1.0).abs() < 1e-6);
    assert!(report.baseline_miou >= 0.0 && report.baseline_miou <= 1.0);
    assert!(report.final_miou >= 0.0 && report.final_miou <= 1.0);

    let bundle = Path::new(&args.checkpoint_dir).join("checkpoint.bin");
    assert!(bundle.exists());
    let metrics = fs::read_to_string(temp.path().join("runs/metrics.jsonl"))?;
    assert_eq!(metrics.lines().count(), 1);
    Ok(())
}

#[test]
fn resume_continues_from_the_saved_bundle() -> Result<()> {
    let temp = tempdir()?;
    write_train_split(temp.path(), 5);
    let args = base_args(temp.path());

    run_train(args.clone())?;
    let mut resumed = args;
    resumed.pause = true;
    let report = run_train(resumed)?;
    assert_eq!(report.epochs, 1);
    Ok(())
}

#[test]
fn save_then_load_restores_predictions_exactly() -> Result<()> {
    let temp = tempdir()?;
    let test_root = temp.path().join("split");
    write_test_split(&test_root, 3);
    let ckpt = temp.path().join("checkpoints");

    let mut trained = session(2);
    // Advance the scheduler so the bundle carries a nonzero decay position.
    trained.scheduler = StepLrScheduler::new(1.0, 1, 0.5);
    LrScheduler::step(&mut trained.scheduler);
    LrScheduler::step(&mut trained.scheduler);
    trained.save(&ckpt)?;
    let expected = trained.infer(&test_root)?;

    let mut restored = session(2);
    restored.scheduler = StepLrScheduler::new(1.0, 1, 0.5);
    restored.load(&ckpt)?;
    let actual = restored.infer(&test_root)?;

    assert_eq!(expected.rows(), actual.rows());
    assert_eq!(actual.len(), 3);
    assert_eq!(LrScheduler::step(&mut restored.scheduler), 0.25);
    Ok(())
}

#[test]
fn loading_a_missing_checkpoint_fails() {
    let temp = tempdir().expect("tempdir");
    let mut fresh = session(2);
    assert!(fresh.load(&temp.path().join("nope")).is_err());
}

#[test]
fn repeated_steps_on_a_constant_batch_reduce_loss() -> Result<()> {
    let dev = device();
    let mut s = session(2);

    let images = Tensor::<ADBackend, 4>::ones([2, 3, 8, 8], &dev).mul_scalar(0.5);
    let target_rows = [0.25f32, 0.25, 0.75, 0.75, 0.25, 0.25, 0.75, 0.75];
    let targets =
        Tensor::<ADBackend, 1>::from_floats(target_rows.as_slice(), &dev).reshape([2, 4]);

    let mut losses = Vec::new();
    for _ in 0..40 {
        let preds = s.model.forward(images.clone());
        let loss = MseLoss::new().forward(preds, targets.clone(), Reduction::Mean);
        let value = loss
            .clone()
            .detach()
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("{e:?}"))?
            .first()
            .copied()
            .unwrap_or(f32::MAX);
        losses.push(value);
        let grads = GradientsParams::from_grads(loss.backward(), &s.model);
        s.model = s.optim.step(0.01, s.model, grads);
    }

    let first = losses.first().copied().unwrap_or(f32::MAX);
    let last = losses.last().copied().unwrap_or(f32::MAX);
    assert!(
        last < first,
        "loss did not decrease: first {first}, last {last}"
    );
    Ok(())
}

#[test]
fn platform_infer_mode_writes_the_tagged_prediction_file() -> Result<()> {
    let temp = tempdir()?;
    let root = temp.path();
    write_test_split(&root.join("test"), 4);

    let ckpt = root.join("checkpoints");
    let trained = session(2);
    trained.save(&ckpt)?;

    let mut args = base_args(root);
    args.platform = false;
    args.mode = RunMode::Infer;
    args.iteration = "7".to_string();

    let out = run_infer(args)?;
    assert!(out.ends_with("pred_test_7.txt"));
    let text = fs::read_to_string(&out)?;
    assert_eq!(text.lines().count(), 4);
    Ok(())
}
