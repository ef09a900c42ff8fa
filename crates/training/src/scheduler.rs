//! Step-decay learning-rate schedule.

use burn::lr_scheduler::LrScheduler;
use burn::tensor::backend::Backend;

/// Multiplies the base rate by `gamma` every `step_size` steps.
///
/// The training loop advances it once per epoch, giving the classic
/// staircase decay. The record is the step counter, so a restored scheduler
/// resumes at the exact decay position.
#[derive(Debug, Clone)]
pub struct StepLrScheduler {
    base_lr: f64,
    gamma: f64,
    step_size: usize,
    steps: usize,
}

impl StepLrScheduler {
    pub fn new(base_lr: f64, step_size: usize, gamma: f64) -> Self {
        Self {
            base_lr,
            gamma,
            step_size: step_size.max(1),
            steps: 0,
        }
    }

    /// Rate the next `step` call will return.
    pub fn peek(&self) -> f64 {
        self.base_lr * self.gamma.powi((self.steps / self.step_size) as i32)
    }
}

impl LrScheduler for StepLrScheduler {
    type Record<B: Backend> = usize;

    fn step(&mut self) -> f64 {
        let lr = self.peek();
        self.steps += 1;
        lr
    }

    fn to_record<B: Backend>(&self) -> Self::Record<B> {
        self.steps
    }

    fn load_record<B: Backend>(mut self, record: Self::Record<B>) -> Self {
        self.steps = record;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type B = burn::backend::ndarray::NdArray<f32>;

    #[test]
    fn decays_by_gamma_at_step_size_boundaries() {
        let mut sched = StepLrScheduler::new(1.0, 2, 0.5);
        let rates: Vec<f64> = (0..5).map(|_| LrScheduler::step(&mut sched)).collect();
        assert_eq!(rates, vec![1.0, 1.0, 0.5, 0.5, 0.25]);
    }

    #[test]
    fn record_round_trips_the_decay_position() {
        let mut sched = StepLrScheduler::new(0.01, 2, 0.1);
        for _ in 0..3 {
            LrScheduler::step(&mut sched);
        }
        let record = LrScheduler::to_record::<B>(&sched);

        let resumed = StepLrScheduler::new(0.01, 2, 0.1);
        let resumed = LrScheduler::load_record::<B>(resumed, record);
        assert_eq!(resumed.peek(), sched.peek());
    }

    #[test]
    fn zero_step_size_is_clamped() {
        let mut sched = StepLrScheduler::new(1.0, 0, 0.5);
        assert_eq!(LrScheduler::step(&mut sched), 1.0);
        assert_eq!(LrScheduler::step(&mut sched), 0.5);
    }
}
