#![recursion_limit = "256"]

//! Training, evaluation, and checkpointing for the food-image box localizer.
//!
//! The harness drives one sequential loop: per-epoch scheduler stepping,
//! per-iteration optimizer stepping with periodic progress logs and
//! checkpoint saves, and an epoch-end mean-IoU evaluation on the held-out
//! split. `TrainSession` exposes the save/load/infer operations an external
//! experiment scheduler may invoke between any two iterations.

pub mod checkpoint;
pub mod eval;
pub mod harness;
pub mod infer;
pub mod metric;
pub mod scheduler;
pub mod session;

pub use harness::{
    run_infer, run_train, validate_backend_choice, BackendKind, RunMode, TrainArgs, TrainReport,
};
pub use infer::{run_inference, Predictions};
pub use scheduler::StepLrScheduler;
pub use session::{EvalSettings, LocalizerOptim, SessionOps, TrainSession};

/// Backend used for training/eval (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn::backend::wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn::backend::ndarray::NdArray<f32>;

pub type ADBackend = burn::backend::Autodiff<TrainBackend>;
