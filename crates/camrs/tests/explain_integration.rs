//! Integration tests for class activation maps on the reference models.
//!
//! These tests run every method end to end on small randomly initialized
//! networks with seeded inputs.

use burn::prelude::*;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;

use camrs::core::{from_host, to_host};
use camrs::prelude::*;

type TestBackend = NdArray;

/// Seeded uniform input of the given shape.
fn seeded_input<B: Backend, const D: usize>(dims: [usize; D], device: &B::Device) -> Tensor<B, D> {
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let values = (0..dims.iter().product::<usize>())
        .map(|_| rng.gen::<f32>())
        .collect();
    from_host(values, dims, device)
}

fn small_net2d<B: Backend>(device: &B::Device) -> ConvNet2d<B> {
    ConvNet2dConfig::new(1, 16, 16, 3)
        .with_filters(2, 3, 4)
        .init(device)
}

fn small_net1d<B: Backend>(device: &B::Device) -> ConvNet1d<B> {
    ConvNet1dConfig::new(2, 12, 4)
        .with_filters(3, 4, 3)
        .init(device)
}

fn assert_unit_range(values: &[f32]) {
    for v in values {
        assert!(v.is_finite(), "map value {v} is not finite");
        assert!((-1e-6..=1.0 + 1e-5).contains(v), "map value {v} outside [0, 1]");
    }
}

fn run_method<E, M, const D: usize>(mut extractor: E, input: Tensor<TestBackend, D>) -> AttributionMap<TestBackend, D>
where
    E: CamMethod<TestBackend, M, D>,
    M: CamModel<TestBackend, D>,
{
    extractor.forward(input);
    let map = extractor.explain(&ClassIndex::PerSample(vec![0, 2])).unwrap();

    assert!(extractor.core().hooks_enabled());
    assert_eq!(extractor.core().model().mode(), ModelMode::Train);
    map
}

#[test]
fn test_all_methods_conv2d() {
    let device = Default::default();
    let shape = [1, 16, 16];
    let input = || seeded_input::<TestBackend, 4>([2, 1, 16, 16], &device);

    let maps = vec![
        run_method(
            Cam::new(small_net2d::<TestBackend>(&device), &["block3"], Some("fc"), &shape).unwrap(),
            input(),
        ),
        run_method(
            ScoreCam::new(
                small_net2d::<TestBackend>(&device),
                &["block3"],
                ScoreCamConfig::default().with_batch_size(3).with_input_shape(&shape),
            )
            .unwrap(),
            input(),
        ),
        run_method(
            SsCam::new(
                small_net2d::<TestBackend>(&device),
                &["block3"],
                SsCamConfig::default()
                    .with_batch_size(5)
                    .with_num_samples(2)
                    .with_std(0.1)
                    .with_input_shape(&shape),
            )
            .unwrap(),
            input(),
        ),
        run_method(
            IsCam::new(
                small_net2d::<TestBackend>(&device),
                &["block3"],
                IsCamConfig::default()
                    .with_batch_size(4)
                    .with_num_samples(3)
                    .with_input_shape(&shape),
            )
            .unwrap(),
            input(),
        ),
    ];

    let methods: Vec<AttributionMethod> = maps.iter().map(|m| m.method).collect();
    assert_eq!(methods, AttributionMethod::ALL.to_vec());

    for map in &maps {
        // block3 is downsampled twice by stride 2
        assert_eq!(map.shape(), [2, 1, 4, 4]);
        assert_eq!(map.target, Some(ClassIndex::PerSample(vec![0, 2])));
        assert_unit_range(&map.to_host().unwrap());
    }
}

#[test]
fn test_score_cam_conv1d() {
    let device = Default::default();
    let model = small_net1d::<TestBackend>(&device);
    let shape = model.input_shape();

    let mut extractor = ScoreCam::new(
        model,
        &[],
        ScoreCamConfig::default().with_batch_size(4).with_input_shape(&shape),
    )
    .unwrap();
    assert_eq!(extractor.core().target_layers(), &["block3".to_string()]);

    extractor.forward(seeded_input([3, 2, 12], &device));

    let weights = extractor
        .class_weights("block3", &ClassIndex::Single(1))
        .unwrap();
    assert_eq!(weights.dims(), [3, 3]);
    for row in to_host(weights).unwrap().chunks(3) {
        assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    let map = extractor.explain(&ClassIndex::Single(1)).unwrap();
    assert_eq!(map.shape(), [3, 1, 12]);
    assert_unit_range(&map.to_host().unwrap());
}

#[test]
fn test_cam_weights_match_classifier() {
    let device = Default::default();
    let model = small_net2d::<TestBackend>(&device);
    let fc = model.linear_weight("fc").unwrap();
    let [_, in_features] = fc.dims();

    let mut cam = Cam::new(model, &[], None, &[1, 16, 16]).unwrap();
    assert_eq!(cam.fc_layer(), "fc");
    cam.forward(seeded_input([1, 1, 16, 16], &device));

    let weights = to_host(cam.class_weights("block3", &ClassIndex::Single(2)).unwrap()).unwrap();
    let row = to_host(fc.slice([2..3, 0..in_features])).unwrap();
    assert_eq!(weights, row);
}

#[test]
fn test_chunk_size_invariance_conv2d() {
    let device = Default::default();
    let model = small_net2d::<TestBackend>(&device);
    let weights_for = |batch_size: usize| {
        let mut extractor = ScoreCam::new(
            model.clone(),
            &["block2"],
            ScoreCamConfig::default()
                .with_batch_size(batch_size)
                .with_input_shape(&[1, 16, 16]),
        )
        .unwrap();
        extractor.forward(seeded_input([2, 1, 16, 16], &device));
        to_host(
            extractor
                .class_weights("block2", &ClassIndex::PerSample(vec![1, 0]))
                .unwrap(),
        )
        .unwrap()
    };

    let reference = weights_for(128);
    for batch_size in [1, 4] {
        let values = weights_for(batch_size);
        for (a, b) in values.iter().zip(&reference) {
            assert!((a - b).abs() < 1e-5, "batch_size {batch_size}: {a} != {b}");
        }
    }
}

#[test]
fn test_multi_layer_fusion() {
    let device = Default::default();
    let mut extractor = ScoreCam::new(
        small_net2d::<TestBackend>(&device),
        &["block2", "block3"],
        ScoreCamConfig::default().with_input_shape(&[1, 16, 16]),
    )
    .unwrap();
    extractor.forward(seeded_input([2, 1, 16, 16], &device));

    let cams = extractor.compute_cams(&ClassIndex::Single(0), true).unwrap();
    assert_eq!(cams.len(), 2);
    assert_eq!(cams[0].dims(), [2, 1, 8, 8]);
    assert_eq!(cams[1].dims(), [2, 1, 4, 4]);

    let map = extractor.explain(&ClassIndex::Single(0)).unwrap();
    assert_eq!(map.shape(), [2, 1, 8, 8]);
    assert_unit_range(&map.to_host().unwrap());
}

#[test]
fn test_cam_rejects_multiple_layers() {
    let device = Default::default();
    let result = Cam::new(
        small_net2d::<TestBackend>(&device),
        &["block2", "block3"],
        None,
        &[1, 16, 16],
    );
    assert!(matches!(result, Err(CamError::InvalidConfig(_))));
}

#[test]
fn test_eval_mode_is_kept() {
    let device = Default::default();
    let mut model = small_net2d::<TestBackend>(&device);
    model.set_mode(ModelMode::Eval);

    let mut extractor = IsCam::new(
        model,
        &["block3"],
        IsCamConfig::default().with_num_samples(2).with_input_shape(&[1, 16, 16]),
    )
    .unwrap();
    extractor.forward(seeded_input([1, 1, 16, 16], &device));
    extractor.explain(&ClassIndex::Single(1)).unwrap();

    let model = extractor.core().model();
    assert_eq!(model.mode(), ModelMode::Eval);
}

#[test]
fn test_autodiff_chunk_size_invariance() {
    type AdBackend = Autodiff<NdArray>;

    let device = Default::default();
    // Running statistics are shared between clones, so the capture pass must
    // not update them either.
    let mut model = small_net2d::<AdBackend>(&device);
    model.set_mode(ModelMode::Eval);
    let input = seeded_input::<AdBackend, 4>([2, 1, 16, 16], &device);

    let weights_for = |batch_size: usize| {
        let mut extractor = ScoreCam::new(
            model.clone(),
            &["block2"],
            ScoreCamConfig::default()
                .with_batch_size(batch_size)
                .with_input_shape(&[1, 16, 16]),
        )
        .unwrap();
        extractor.forward(input.clone());
        let weights = extractor.class_weights("block2", &ClassIndex::Single(0)).unwrap();
        assert_eq!(weights.dims(), [2, 3]);
        to_host(weights).unwrap()
    };

    let reference = weights_for(128);
    let single = weights_for(1);
    for (a, b) in single.iter().zip(&reference) {
        assert!((a - b).abs() < 1e-5, "{a} != {b}");
    }
    for row in reference.chunks(3) {
        assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }
}
