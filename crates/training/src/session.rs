//! Session state and the platform-facing save/load/infer operations.

use std::path::Path;

use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{Adam, AdamConfig};
use burn::tensor::backend::AutodiffBackend;
use dataset::{index_test_split, BatchIter, LoaderConfig};
use models::{ConvLocalizer, ConvLocalizerConfig};

use crate::checkpoint;
use crate::infer::{run_inference, Predictions};
use crate::scheduler::StepLrScheduler;

/// Adam over the localizer, stepped by the training loop.
pub type LocalizerOptim<B> =
    OptimizerAdaptor<Adam<<B as AutodiffBackend>::InnerBackend>, ConvLocalizer<B>, B>;

/// Settings the session uses when asked to run inference on its own.
#[derive(Debug, Clone)]
pub struct EvalSettings {
    pub batch_size: usize,
    pub target_size: Option<u32>,
}

/// The three operations an external experiment scheduler may invoke at any
/// point between two training iterations: persist state, restore state, or
/// produce predictions for a test split.
pub trait SessionOps {
    fn save(&self, dir: &Path) -> anyhow::Result<()>;
    fn load(&mut self, dir: &Path) -> anyhow::Result<()>;
    fn infer(&self, root: &Path) -> anyhow::Result<Predictions>;
}

/// Owns the full mutable training state: model, optimizer, scheduler.
pub struct TrainSession<B: AutodiffBackend> {
    pub model: ConvLocalizer<B>,
    pub optim: LocalizerOptim<B>,
    pub scheduler: StepLrScheduler,
    pub device: B::Device,
    pub eval: EvalSettings,
}

impl<B: AutodiffBackend> TrainSession<B> {
    /// Build a freshly initialized session: model weights follow the
    /// localizer init policy, the optimizer starts with empty moments, the
    /// scheduler at step zero.
    pub fn new(
        base_lr: f64,
        lr_step_size: usize,
        lr_gamma: f64,
        eval: EvalSettings,
        device: B::Device,
    ) -> Self {
        let model = ConvLocalizer::new(ConvLocalizerConfig::default(), &device);
        let optim = AdamConfig::new()
            .with_weight_decay(Some(WeightDecayConfig::new(1e-4)))
            .init();
        let scheduler = StepLrScheduler::new(base_lr, lr_step_size, lr_gamma);
        Self {
            model,
            optim,
            scheduler,
            device,
            eval,
        }
    }
}

impl<B: AutodiffBackend> SessionOps for TrainSession<B> {
    fn save(&self, dir: &Path) -> anyhow::Result<()> {
        checkpoint::save(dir, &self.model, &self.optim, &self.scheduler)
    }

    fn load(&mut self, dir: &Path) -> anyhow::Result<()> {
        checkpoint::load(
            dir,
            &self.device,
            &mut self.model,
            &mut self.optim,
            &mut self.scheduler,
        )
    }

    fn infer(&self, root: &Path) -> anyhow::Result<Predictions> {
        let indices = index_test_split(root)?;
        let cfg = LoaderConfig {
            target_size: self.eval.target_size,
            ..Default::default()
        };
        let mut loader = BatchIter::from_indices(indices, cfg);
        let eval_model = self.model.valid();
        run_inference(&eval_model, &mut loader, self.eval.batch_size, &self.device)
    }
}
