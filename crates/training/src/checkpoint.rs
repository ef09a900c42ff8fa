//! Single-file checkpoint bundles.
//!
//! One checkpoint directory holds one `checkpoint.bin`: a bincode container
//! with three named sub-states (model, optimizer, scheduler), each a burn
//! binary record. Saves overwrite the bundle in place; a crash mid-write can
//! corrupt it (accepted risk, no atomic rename).

use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{anyhow, bail, Context};
use burn::lr_scheduler::LrScheduler;
use burn::module::Module;
use burn::optim::Optimizer;
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::AutodiffBackend;
use models::ConvLocalizer;
use serde::{Deserialize, Serialize};

use crate::scheduler::StepLrScheduler;
use crate::session::LocalizerOptim;

/// Fixed bundle filename inside a checkpoint directory.
pub const CHECKPOINT_FILE: &str = "checkpoint.bin";

#[derive(Serialize, Deserialize)]
struct Bundle {
    model: Vec<u8>,
    optimizer: Vec<u8>,
    scheduler: Vec<u8>,
}

type BytesRecorder = BinBytesRecorder<FullPrecisionSettings>;

/// Serialize model, optimizer, and scheduler state into `dir`, creating the
/// directory if absent. Overwrites any previous bundle (last-write-wins).
pub fn save<B: AutodiffBackend>(
    dir: &Path,
    model: &ConvLocalizer<B>,
    optim: &LocalizerOptim<B>,
    scheduler: &StepLrScheduler,
) -> anyhow::Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating checkpoint dir {}", dir.display()))?;
    let recorder = BytesRecorder::default();
    let bundle = Bundle {
        model: Recorder::<B>::record(&recorder, model.clone().into_record(), ())
            .map_err(|e| anyhow!("recording model state: {e:?}"))?,
        optimizer: Recorder::<B>::record(&recorder, optim.to_record(), ())
            .map_err(|e| anyhow!("recording optimizer state: {e:?}"))?,
        scheduler: Recorder::<B>::record(&recorder, LrScheduler::to_record::<B>(scheduler), ())
            .map_err(|e| anyhow!("recording scheduler state: {e:?}"))?,
    };

    let path = dir.join(CHECKPOINT_FILE);
    let file = fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    bincode::serialize_into(BufWriter::new(file), &bundle)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Replace model, optimizer, and scheduler state from the bundle in `dir`.
/// Fails if the bundle is absent, undecodable, or shaped for a different
/// model.
pub fn load<B: AutodiffBackend>(
    dir: &Path,
    device: &B::Device,
    model: &mut ConvLocalizer<B>,
    optim: &mut LocalizerOptim<B>,
    scheduler: &mut StepLrScheduler,
) -> anyhow::Result<()> {
    let path = dir.join(CHECKPOINT_FILE);
    if !path.exists() {
        bail!("checkpoint not found at {}", path.display());
    }
    let file = fs::File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let bundle: Bundle = bincode::deserialize_from(BufReader::new(file))
        .with_context(|| format!("decoding {}", path.display()))?;

    let recorder = BytesRecorder::default();
    let model_record: <ConvLocalizer<B> as Module<B>>::Record =
        Recorder::<B>::load(&recorder, bundle.model, device)
            .map_err(|e| anyhow!("decoding model state: {e:?}"))?;
    let restored = model.clone().load_record(model_record);
    if restored.num_params() != model.num_params() {
        bail!(
            "checkpoint parameter count {} does not match the constructed model ({})",
            restored.num_params(),
            model.num_params()
        );
    }
    *model = restored;

    let optim_record: <LocalizerOptim<B> as Optimizer<ConvLocalizer<B>, B>>::Record =
        Recorder::<B>::load(&recorder, bundle.optimizer, device)
            .map_err(|e| anyhow!("decoding optimizer state: {e:?}"))?;
    *optim = optim.clone().load_record(optim_record);

    let scheduler_record: usize = Recorder::<B>::load(&recorder, bundle.scheduler, device)
        .map_err(|e| anyhow!("decoding scheduler state: {e:?}"))?;
    *scheduler = LrScheduler::load_record::<B>(scheduler.clone(), scheduler_record);
    Ok(())
}
