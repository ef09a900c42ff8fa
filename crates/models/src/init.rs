//! Weight-initialization policy for the localizer.

use burn::nn::Initializer;

/// Zero-mean Gaussian for convolution weights, scaled by the layer fan-out:
/// `std = sqrt(2 / (kh * kw * out_channels))`.
///
/// Keeps activation variance stable across the stacked conv+ReLU stages.
/// Applied at construction, before any optimizer snapshots the parameters.
pub fn conv_init(kernel: [usize; 2], out_channels: usize) -> Initializer {
    let fan_out = (kernel[0] * kernel[1] * out_channels) as f64;
    Initializer::Normal {
        mean: 0.0,
        std: (2.0 / fan_out).sqrt(),
    }
}
