//! [`CamModel`] implementations for the reference classifiers.

use burn::prelude::*;
use camrs_core::{CamModel, ForwardHooks, LayerInfo, LayerKind, ModelMode};

use crate::cnn::{ConvNet1d, ConvNet2d, CLASSIFIER_LAYER, FEATURE_LAYERS, POOL_LAYER};

fn reference_layers() -> Vec<LayerInfo> {
    let mut layers: Vec<LayerInfo> = FEATURE_LAYERS
        .iter()
        .map(|name| LayerInfo::new(*name, LayerKind::Conv))
        .collect();
    layers.push(LayerInfo::new(POOL_LAYER, LayerKind::Pool));
    layers.push(LayerInfo::new(CLASSIFIER_LAYER, LayerKind::Linear));
    layers
}

impl<B: Backend> CamModel<B, 3> for ConvNet1d<B> {
    fn forward_hooked(&self, x: Tensor<B, 3>, hooks: &mut dyn ForwardHooks<B, 3>) -> Tensor<B, 2> {
        hooks.pre_forward(&x);

        let out = self.block1.forward(x, self.mode);
        hooks.forward(FEATURE_LAYERS[0], &out);
        let out = self.block2.forward(out, self.mode);
        hooks.forward(FEATURE_LAYERS[1], &out);
        let out = self.block3.forward(out, self.mode);
        hooks.forward(FEATURE_LAYERS[2], &out);

        let out = self.gap.forward(out);
        hooks.forward(POOL_LAYER, &out);

        let [batch, channels, _] = out.dims();
        let out = out.reshape([batch, channels]);
        let out = if self.mode.is_train() {
            self.dropout.forward(out)
        } else {
            out
        };
        self.fc.forward(out)
    }

    fn layers(&self) -> Vec<LayerInfo> {
        reference_layers()
    }

    fn linear_weight(&self, name: &str) -> Option<Tensor<B, 2>> {
        // burn stores linear weights as (in, out)
        (name == CLASSIFIER_LAYER).then(|| self.fc.weight.val().transpose())
    }

    fn mode(&self) -> ModelMode {
        self.mode
    }

    fn set_mode(&mut self, mode: ModelMode) {
        self.mode = mode;
    }

    fn device(&self) -> B::Device {
        self.fc.weight.val().device()
    }
}

impl<B: Backend> CamModel<B, 4> for ConvNet2d<B> {
    fn forward_hooked(&self, x: Tensor<B, 4>, hooks: &mut dyn ForwardHooks<B, 4>) -> Tensor<B, 2> {
        hooks.pre_forward(&x);

        let out = self.block1.forward(x, self.mode);
        hooks.forward(FEATURE_LAYERS[0], &out);
        let out = self.block2.forward(out, self.mode);
        hooks.forward(FEATURE_LAYERS[1], &out);
        let out = self.block3.forward(out, self.mode);
        hooks.forward(FEATURE_LAYERS[2], &out);

        let out = self.gap.forward(out);
        hooks.forward(POOL_LAYER, &out);

        let [batch, channels, _, _] = out.dims();
        let out = out.reshape([batch, channels]);
        let out = if self.mode.is_train() {
            self.dropout.forward(out)
        } else {
            out
        };
        self.fc.forward(out)
    }

    fn layers(&self) -> Vec<LayerInfo> {
        reference_layers()
    }

    fn linear_weight(&self, name: &str) -> Option<Tensor<B, 2>> {
        (name == CLASSIFIER_LAYER).then(|| self.fc.weight.val().transpose())
    }

    fn mode(&self) -> ModelMode {
        self.mode
    }

    fn set_mode(&mut self, mode: ModelMode) {
        self.mode = mode;
    }

    fn device(&self) -> B::Device {
        self.fc.weight.val().device()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnn::{ConvNet1dConfig, ConvNet2dConfig};
    use camrs_core::backend::NdArray;

    type TestBackend = NdArray;

    #[derive(Default)]
    struct ShapeLog {
        input: Option<Vec<usize>>,
        outputs: Vec<(String, Vec<usize>)>,
    }

    impl<B: Backend, const D: usize> ForwardHooks<B, D> for ShapeLog {
        fn pre_forward(&mut self, input: &Tensor<B, D>) {
            self.input = Some(input.dims().to_vec());
        }

        fn forward(&mut self, layer: &str, output: &Tensor<B, D>) {
            self.outputs.push((layer.to_string(), output.dims().to_vec()));
        }
    }

    #[test]
    fn test_convnet1d_forward_shape() {
        let device = Default::default();
        let model = ConvNet1dConfig::new(3, 20, 4)
            .with_filters(4, 8, 6)
            .init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 3>::ones([2, 3, 20], &device);
        let logits = model.forward(x);
        assert_eq!(logits.dims(), [2, 4]);
    }

    #[test]
    fn test_convnet1d_reports_layers() {
        let device = Default::default();
        let model = ConvNet1dConfig::new(2, 16, 3)
            .with_filters(4, 8, 6)
            .init::<TestBackend>(&device);

        let mut log = ShapeLog::default();
        let x = Tensor::<TestBackend, 3>::zeros([1, 2, 16], &device);
        model.forward_hooked(x, &mut log);

        assert_eq!(log.input, Some(vec![1, 2, 16]));
        let names: Vec<&str> = log.outputs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["block1", "block2", "block3", "gap"]);
        assert_eq!(log.outputs[2].1, vec![1, 6, 16]);
        assert_eq!(log.outputs[3].1, vec![1, 6, 1]);
    }

    #[test]
    fn test_convnet2d_downsamples() {
        let device = Default::default();
        let model = ConvNet2dConfig::new(1, 16, 16, 5)
            .with_filters(4, 8, 8)
            .init::<TestBackend>(&device);

        let mut log = ShapeLog::default();
        let x = Tensor::<TestBackend, 4>::zeros([2, 1, 16, 16], &device);
        let logits = model.forward_hooked(x, &mut log);

        assert_eq!(logits.dims(), [2, 5]);
        assert_eq!(log.outputs[0].1, vec![2, 4, 16, 16]);
        assert_eq!(log.outputs[1].1, vec![2, 8, 8, 8]);
        assert_eq!(log.outputs[2].1, vec![2, 8, 4, 4]);
    }

    #[test]
    fn test_linear_weight_layout() {
        let device = Default::default();
        let model = ConvNet2dConfig::new(1, 8, 8, 5)
            .with_filters(4, 8, 6)
            .init::<TestBackend>(&device);

        let weight = model.linear_weight("fc").unwrap();
        assert_eq!(weight.dims(), [5, 6]);
        assert!(model.linear_weight("block3").is_none());
    }

    #[test]
    fn test_mode_switch() {
        let device = Default::default();
        let mut model = ConvNet1dConfig::new(1, 8, 2)
            .with_filters(2, 2, 2)
            .init::<TestBackend>(&device);

        assert_eq!(model.mode(), ModelMode::Train);
        model.set_mode(ModelMode::Eval);
        assert_eq!(model.mode(), ModelMode::Eval);
    }

    #[test]
    fn test_layer_listing() {
        let device = Default::default();
        let model = ConvNet1dConfig::new(1, 8, 2).init::<TestBackend>(&device);
        let layers = CamModel::<TestBackend, 3>::layers(&model);
        assert_eq!(layers.len(), 5);
        assert_eq!(layers[4].kind, LayerKind::Linear);
        assert_eq!(
            CamModel::<TestBackend, 3>::layer(&model, "gap").map(|l| l.kind),
            Some(LayerKind::Pool)
        );
    }

    fn ramp(batch: usize, size: usize, offset: usize) -> Vec<f32> {
        (0..batch * size * size)
            .map(|i| ((i * 7 + offset) % 13) as f32 / 6.0 - 1.0)
            .collect()
    }

    #[test]
    fn test_eval_mode_uses_running_statistics_with_autodiff() {
        type AdBackend = burn_autodiff::Autodiff<NdArray>;
        let device = Default::default();
        let mut model = ConvNet2dConfig::new(1, 16, 16, 3)
            .with_filters(2, 3, 4)
            .init::<AdBackend>(&device);
        model.set_mode(ModelMode::Eval);

        let pair = Tensor::<AdBackend, 4>::from_data(
            TensorData::new(ramp(2, 16, 0), [2, 1, 16, 16]),
            &device,
        );
        let first = pair.clone().slice([0..1, 0..1, 0..16, 0..16]);

        let batched = model.forward(pair).slice([0..1, 0..3]).into_data();
        let alone = model.forward(first.clone()).into_data();
        batched.assert_approx_eq(&alone, 5);

        // Eval forwards leave the running statistics untouched.
        let other = Tensor::<AdBackend, 4>::from_data(
            TensorData::new(ramp(4, 16, 5), [4, 1, 16, 16]),
            &device,
        );
        let _ = model.forward(other);
        model.forward(first).into_data().assert_approx_eq(&alone, 5);
    }
}
