//! Burn model for food-image box localization.
//!
//! `ConvLocalizer` maps a batch of RGB images to four normalized box
//! coordinates per image. The head pools spatially before the final
//! projection, so the network accepts any input resolution the loader
//! produces.

pub mod init;

use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::init::conv_init;

#[derive(Debug, Clone)]
pub struct ConvLocalizerConfig {
    /// Channel widths of the three downsampling conv stages.
    pub widths: [usize; 3],
    /// Number of regression outputs per image.
    pub outputs: usize,
}

impl Default for ConvLocalizerConfig {
    fn default() -> Self {
        Self {
            widths: [64, 128, 256],
            outputs: 4,
        }
    }
}

/// Three stages of (conv stride 2 -> batch norm -> ReLU), global average
/// pooling, and a linear projection to the box coordinates.
///
/// BatchNorm uses batch statistics on the autodiff backend and running
/// statistics on the inner backend, so training/eval behavior follows the
/// backend the module lives on.
#[derive(Debug, Module)]
pub struct ConvLocalizer<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    conv3: Conv2d<B>,
    bn3: BatchNorm<B, 2>,
    pool: AdaptiveAvgPool2d,
    head: Linear<B>,
}

impl<B: Backend> ConvLocalizer<B> {
    pub fn new(cfg: ConvLocalizerConfig, device: &B::Device) -> Self {
        let [w1, w2, w3] = cfg.widths;
        let conv1 = Conv2dConfig::new([3, w1], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .with_initializer(conv_init([7, 7], w1))
            .init(device);
        let bn1 = BatchNormConfig::new(w1).init(device);
        let conv2 = Conv2dConfig::new([w1, w2], [3, 3])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .with_initializer(conv_init([3, 3], w2))
            .init(device);
        let bn2 = BatchNormConfig::new(w2).init(device);
        let conv3 = Conv2dConfig::new([w2, w3], [3, 3])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .with_initializer(conv_init([3, 3], w3))
            .init(device);
        let bn3 = BatchNormConfig::new(w3).init(device);
        let pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let head = LinearConfig::new(w3, cfg.outputs).init(device);

        Self {
            conv1,
            bn1,
            conv2,
            bn2,
            conv3,
            bn3,
            pool,
            head,
        }
    }

    /// Forward pass: `[batch, 3, H, W]` -> `[batch, outputs]`.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.bn1.forward(self.conv1.forward(input)));
        let x = relu(self.bn2.forward(self.conv2.forward(x)));
        let x = relu(self.bn3.forward(self.conv3.forward(x)));
        let x = self.pool.forward(x);
        let [batch, channels, _, _] = x.dims();
        self.head.forward(x.reshape([batch, channels]))
    }
}

pub mod prelude {
    pub use super::{ConvLocalizer, ConvLocalizerConfig};
}
