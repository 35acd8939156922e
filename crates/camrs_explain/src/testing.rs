//! A tiny hand-wired classifier for unit tests.

use std::cell::Cell;

use burn::prelude::*;
use burn::tensor::activation::relu;

use camrs_core::{backend::NdArray, from_host, to_host, CamModel, ForwardHooks, LayerInfo, LayerKind, ModelMode};

pub(crate) type TestBackend = NdArray;

/// `features[k] = relu(scale[k] * x[:, 0] - 0.2 * k)`, then global average pooling `gap`
/// and a bias-free linear classifier `fc`.
#[derive(Debug)]
pub(crate) struct TinyNet {
    pub scales: Vec<f32>,
    /// `(n_classes, channels)`.
    pub fc: Tensor<TestBackend, 2>,
    pub mode: ModelMode,
    pub panic_after: Option<usize>,
    /// Emit NaN logits for samples whose input is all zeros.
    pub nan_on_blank: bool,
    pub forwards: Cell<usize>,
}

impl CamModel<TestBackend, 4> for TinyNet {
    fn forward_hooked(
        &self,
        x: Tensor<TestBackend, 4>,
        hooks: &mut dyn ForwardHooks<TestBackend, 4>,
    ) -> Tensor<TestBackend, 2> {
        let count = self.forwards.get() + 1;
        self.forwards.set(count);
        if let Some(limit) = self.panic_after {
            if count > limit {
                panic!("forward pass {count} exceeds limit {limit}");
            }
        }

        hooks.pre_forward(&x);

        let [b, _, h, w] = x.dims();
        let k = self.scales.len();
        let device = x.device();

        let blank = blank_samples(&x, self.nan_on_blank);

        let scales = from_host::<TestBackend, 4>(self.scales.clone(), [1, k, 1, 1], &device);
        let offsets: Vec<f32> = (0..k).map(|ch| 0.2 * ch as f32).collect();
        let offsets = from_host::<TestBackend, 4>(offsets, [1, k, 1, 1], &device);
        let features = relu(x.slice([0..b, 0..1, 0..h, 0..w]) * scales - offsets);
        hooks.forward("features", &features);

        let gap = features.mean_dim(3).mean_dim(2);
        hooks.forward("gap", &gap);

        let logits = gap.reshape([b, k]).matmul(self.fc.clone().transpose());
        poison_rows(logits, &blank)
    }

    fn layers(&self) -> Vec<LayerInfo> {
        vec![
            LayerInfo::new("features", LayerKind::Conv),
            LayerInfo::new("gap", LayerKind::Pool),
            LayerInfo::new("fc", LayerKind::Linear),
        ]
    }

    fn linear_weight(&self, name: &str) -> Option<Tensor<TestBackend, 2>> {
        (name == "fc").then(|| self.fc.clone())
    }

    fn mode(&self) -> ModelMode {
        self.mode
    }

    fn set_mode(&mut self, mode: ModelMode) {
        self.mode = mode;
    }

    fn device(&self) -> <TestBackend as Backend>::Device {
        self.fc.device()
    }
}

/// A net with one feature channel per scale and three classes.
///
/// Class `c` weighs channel `k` by `(c + 1) * (k + 1)`, except class 2
/// which weighs every channel negatively.
pub(crate) fn tiny_net(scales: &[f32]) -> TinyNet {
    TinyNet {
        scales: scales.to_vec(),
        fc: classifier(scales.len()),
        mode: ModelMode::Train,
        panic_after: None,
        nan_on_blank: false,
        forwards: Cell::new(0),
    }
}

/// Deterministic non-constant input of shape `(batch, 1, 3, 3)`.
pub(crate) fn tiny_input(batch: usize) -> Tensor<TestBackend, 4> {
    let values: Vec<f32> = (0..batch * 9)
        .map(|i| ((i * 7) % 11) as f32 / 10.0)
        .collect();
    from_host(values, [batch, 1, 3, 3], &Default::default())
}

/// `(3, k)` classifier weights: class `c` weighs channel `k` by `(c + 1) * (k + 1)`,
/// negated for class 2.
fn classifier(k: usize) -> Tensor<TestBackend, 2> {
    let mut fc = Vec::with_capacity(3 * k);
    for c in 0..3 {
        for ch in 0..k {
            let w = ((c + 1) * (ch + 1)) as f32;
            fc.push(if c == 2 { -w } else { w });
        }
    }
    from_host(fc, [3, k], &Default::default())
}

/// Per-sample flags for all-zero inputs, or none when `enabled` is false.
fn blank_samples<const D: usize>(x: &Tensor<TestBackend, D>, enabled: bool) -> Vec<bool> {
    if !enabled {
        return Vec::new();
    }
    let b = x.dims()[0];
    let values = to_host(x.clone()).unwrap();
    values
        .chunks(values.len() / b)
        .map(|sample| sample.iter().all(|v| *v == 0.0))
        .collect()
}

fn poison_rows(logits: Tensor<TestBackend, 2>, blank: &[bool]) -> Tensor<TestBackend, 2> {
    if !blank.iter().any(|b| *b) {
        return logits;
    }
    let dims = logits.dims();
    let device = logits.device();
    let mut values = to_host(logits).unwrap();
    for (row, _) in blank.iter().enumerate().filter(|(_, b)| **b) {
        values[row * dims[1]..(row + 1) * dims[1]].fill(f32::NAN);
    }
    from_host(values, dims, &device)
}

/// Volumetric counterpart of [`TinyNet`] for `(B, 1, D, H, W)` input.
///
/// The input is average-pooled by two over height and width before the
/// feature channels, so feature maps are `(B, K, D, H / 2, W / 2)`.
#[derive(Debug)]
pub(crate) struct TinyVolumeNet {
    pub scales: Vec<f32>,
    pub fc: Tensor<TestBackend, 2>,
    pub mode: ModelMode,
}

impl CamModel<TestBackend, 5> for TinyVolumeNet {
    fn forward_hooked(
        &self,
        x: Tensor<TestBackend, 5>,
        hooks: &mut dyn ForwardHooks<TestBackend, 5>,
    ) -> Tensor<TestBackend, 2> {
        hooks.pre_forward(&x);

        let [b, _, d, h, w] = x.dims();
        let k = self.scales.len();
        let device = x.device();

        let pooled = x
            .slice([0..b, 0..1, 0..d, 0..h, 0..w])
            .reshape([b * d, h / 2, 2, w / 2, 2])
            .mean_dim(4)
            .mean_dim(2)
            .reshape([b, 1, d, h / 2, w / 2]);

        let scales = from_host::<TestBackend, 5>(self.scales.clone(), [1, k, 1, 1, 1], &device);
        let offsets: Vec<f32> = (0..k).map(|ch| 0.2 * ch as f32).collect();
        let offsets = from_host::<TestBackend, 5>(offsets, [1, k, 1, 1, 1], &device);
        let features = relu(pooled * scales - offsets);
        hooks.forward("features", &features);

        let gap = features.mean_dim(4).mean_dim(3).mean_dim(2);
        hooks.forward("gap", &gap);

        gap.reshape([b, k]).matmul(self.fc.clone().transpose())
    }

    fn layers(&self) -> Vec<LayerInfo> {
        vec![
            LayerInfo::new("features", LayerKind::Conv),
            LayerInfo::new("gap", LayerKind::Pool),
            LayerInfo::new("fc", LayerKind::Linear),
        ]
    }

    fn linear_weight(&self, name: &str) -> Option<Tensor<TestBackend, 2>> {
        (name == "fc").then(|| self.fc.clone())
    }

    fn mode(&self) -> ModelMode {
        self.mode
    }

    fn set_mode(&mut self, mode: ModelMode) {
        self.mode = mode;
    }

    fn device(&self) -> <TestBackend as Backend>::Device {
        self.fc.device()
    }
}

pub(crate) fn tiny_volume_net(scales: &[f32]) -> TinyVolumeNet {
    TinyVolumeNet {
        scales: scales.to_vec(),
        fc: classifier(scales.len()),
        mode: ModelMode::Train,
    }
}

/// Deterministic non-constant input of shape `(batch, 1, 2, 4, 4)`.
pub(crate) fn tiny_volume_input(batch: usize) -> Tensor<TestBackend, 5> {
    let values: Vec<f32> = (0..batch * 32)
        .map(|i| ((i * 5) % 13) as f32 / 12.0)
        .collect();
    from_host(values, [batch, 1, 2, 4, 4], &Default::default())
}
