use nnet::approx::{matrices_within, within};
use nnet::config::{InitPolicy, LayerConfig, MatMulStrategy, SeedMode};
use nnet::layers::pool::{BufferPool, BufferRole};
use nnet::layers::{Layer, LogisticLayer, ReluLayer, TanhLayer};
use nnet::matrix;
use nnet::matrix::{Extent, Matrix};

fn fixed(batch: usize) -> LayerConfig {
    LayerConfig::new(batch).with_seed(SeedMode::Fixed(1))
}

fn known_relu_layer(bias: Matrix<f64>) -> ReluLayer<f64> {
    let mut layer = ReluLayer::<f64>::new(3, 2, &fixed(1)).unwrap();
    layer
        .set_weights(matrix![[1.0, -1.0], [0.5, 2.0], [1.0, 0.0]])
        .unwrap();
    layer.set_bias(bias).unwrap();
    layer
}

#[test]
fn test_relu_layer_end_to_end() {
    let mut layer = known_relu_layer(matrix![[0.5, 1.0]]);
    let x: Matrix<f64> = matrix![[1.0, -2.0, 3.0]];

    let y = layer.forward(&x).unwrap().clone();
    assert_eq!(layer.z().as_slice(), &[3.5, -4.0]);
    assert_eq!(y.as_slice(), &[3.5, 0.0]);

    let d = layer.backward().unwrap();
    assert_eq!(d.as_slice(), &[1.0, 0.0]);
    // z and y untouched by the derivative
    assert_eq!(layer.z().as_slice(), &[3.5, -4.0]);
    assert_eq!(layer.y().as_slice(), &[3.5, 0.0]);
}

#[test]
fn test_relu_derivative_is_one_at_zero() {
    let mut layer = known_relu_layer(matrix![[-3.0, 1.0]]);
    layer.forward(&matrix![[1.0, -2.0, 3.0]]).unwrap();
    assert_eq!(layer.z().as_slice(), &[0.0, -4.0]);
    assert_eq!(layer.backward().unwrap().as_slice(), &[1.0, 0.0]);
}

#[test]
fn test_propagate_matches_hand_computed_error() {
    let mut layer = known_relu_layer(matrix![[0.5, 1.0]]);
    layer.forward(&matrix![[1.0, -2.0, 3.0]]).unwrap();
    layer.backward().unwrap();

    let upstream: Matrix<f64> = matrix![[2.0, 3.0]];
    assert_eq!(layer.delta(&upstream).unwrap().as_slice(), &[2.0, 0.0]);
    let err = layer.propagate(&upstream).unwrap();
    assert_eq!(err.extent(), Extent::new(1, 3));
    assert_eq!(err.as_slice(), &[2.0, 1.0, 2.0]);

    assert!(layer.propagate(&matrix![[1.0, 2.0, 3.0]]).is_err());
}

#[test]
fn test_logistic_derivative_from_output() {
    let mut layer = LogisticLayer::<f64>::new(2, 2, &fixed(1)).unwrap();
    layer.set_weights(Matrix::new(2, 2)).unwrap();
    layer.set_bias(matrix![[0.0, 2.0]]).unwrap();
    layer.forward(&matrix![[4.0, -4.0]]).unwrap();

    let y = layer.y().clone();
    assert_eq!(y.get(0, 0), Some(0.5));
    let d = layer.backward().unwrap();
    assert_eq!(d.get(0, 0), Some(0.25));
    let y1 = y.as_slice()[1];
    assert!(within(d.as_slice()[1], y1 * (1.0 - y1), 1e-12));
}

#[test]
fn test_tanh_derivative_from_output() {
    let mut layer = TanhLayer::<f64>::new(1, 2, &fixed(1)).unwrap();
    layer.set_weights(Matrix::new(1, 2)).unwrap();
    layer.set_bias(matrix![[0.0, 1.0]]).unwrap();
    layer.forward(&matrix![[9.0]]).unwrap();

    let d = layer.backward().unwrap();
    assert_eq!(d.get(0, 0), Some(1.0));
    let t = 1.0f64.tanh();
    assert!(within(d.as_slice()[1], 1.0 - t * t, 1e-12));
}

#[test]
fn test_fixed_seed_reproduces_weights() {
    let cfg = LayerConfig::new(2).with_seed(SeedMode::Fixed(5));
    let a = ReluLayer::<f32>::new(6, 4, &cfg).unwrap();
    let b = ReluLayer::<f32>::new(6, 4, &cfg).unwrap();
    assert_eq!(a.weights(), b.weights());

    let other = ReluLayer::<f32>::new(6, 4, &cfg.with_seed(SeedMode::Fixed(6))).unwrap();
    assert_ne!(a.weights(), other.weights());
}

#[test]
fn test_entropy_seed_differs() {
    let cfg = LayerConfig::new(1).with_seed(SeedMode::Entropy);
    let a = LogisticLayer::<f64>::new(8, 8, &cfg).unwrap();
    let b = LogisticLayer::<f64>::new(8, 8, &cfg).unwrap();
    assert_ne!(a.weights(), b.weights());
}

#[test]
fn test_uniform_ranges_per_variant() {
    let relu = ReluLayer::<f64>::new(16, 16, &fixed(1)).unwrap();
    let w = relu.weights().as_slice();
    assert!(w.iter().all(|v| (-1.0..1.0).contains(v)));
    assert!(w.iter().any(|&v| v < 0.0));

    let logistic = LogisticLayer::<f64>::new(16, 16, &fixed(1)).unwrap();
    assert!(logistic.weights().as_slice().iter().all(|v| (0.0..1.0).contains(v)));

    let tanh = TanhLayer::<f64>::new(16, 16, &fixed(1)).unwrap();
    assert!(tanh.weights().as_slice().iter().all(|v| (-1.0..1.0).contains(v)));
}

#[test]
fn test_scaled_normal_policy_leaves_uniform_range() {
    let cfg = fixed(1).with_init(InitPolicy::ScaledNormal);
    let layer = LogisticLayer::<f64>::new(20, 20, &cfg).unwrap();
    // N(0, sigma) is symmetric; uniform(0, 1) never goes negative
    assert!(layer.weights().as_slice().iter().any(|&v| v < 0.0));
}

#[test]
fn test_naive_and_tiled_strategies_agree() {
    let x: Matrix<f64> = matrix![
        [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9],
        [-0.9, 0.8, -0.7, 0.6, -0.5, 0.4, -0.3, 0.2, -0.1],
    ];
    let mut tiled = TanhLayer::<f64>::new(9, 7, &fixed(2)).unwrap();
    let mut naive =
        TanhLayer::<f64>::new(9, 7, &fixed(2).with_matmul(MatMulStrategy::Naive)).unwrap();
    let a = tiled.forward(&x).unwrap().clone();
    let b = naive.forward(&x).unwrap().clone();
    assert!(matrices_within(&a, &b, 1e-12));
}

#[test]
fn test_batch_extent_is_fixed() {
    let mut layer = ReluLayer::<f32>::new(3, 2, &fixed(1)).unwrap();
    let two_rows: Matrix<f32> = matrix![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
    assert!(layer.forward(&two_rows).unwrap_err().is_dimension_error());
    let wrong_width: Matrix<f32> = matrix![[1.0, 2.0]];
    assert!(layer.forward(&wrong_width).is_err());
}

#[test]
fn test_dyn_layer_stack() {
    let cfg = fixed(2);
    let mut stack: Vec<Box<dyn Layer<f64>>> = vec![
        Box::new(ReluLayer::<f64>::new(3, 4, &cfg).unwrap()),
        Box::new(LogisticLayer::<f64>::new(4, 2, &cfg).unwrap()),
    ];
    assert_eq!(stack[0].name(), "relu");
    assert_eq!(stack[1].name(), "logistic");

    let mut x: Matrix<f64> = matrix![[1.0, -1.0, 0.5], [0.0, 2.0, -0.5]];
    for layer in &mut stack {
        x = layer.forward(&x).unwrap().clone();
    }
    assert_eq!(x.extent(), Extent::new(2, 2));
    assert!(x.as_slice().iter().all(|&v| v > 0.0 && v < 1.0));

    let mut err: Matrix<f64> = Matrix::filled(2, 2, 1.0);
    for layer in stack.iter_mut().rev() {
        layer.backward().unwrap();
        err = layer.propagate(&err).unwrap().clone();
    }
    assert_eq!(err.extent(), Extent::new(2, 3));
}

#[test]
fn test_layers_share_a_pool() {
    let mut pool = BufferPool::<f32>::new();
    let cfg = fixed(4);

    let first = ReluLayer::<f32>::new_in(&mut pool, 8, 8, &cfg).unwrap();
    first.recycle(&mut pool);
    assert_eq!(pool.idle(Extent::new(4, 8), BufferRole::Ones), 1);

    let mut second = LogisticLayer::<f32>::new_in(&mut pool, 8, 8, &cfg).unwrap();
    assert_eq!(pool.idle_total(), 0);
    second.set_weights(Matrix::new(8, 8)).unwrap();
    second.forward(&Matrix::filled(4, 8, 1.0)).unwrap();
    // recycled buffers are overwritten, including the ones
    assert!(second.y().as_slice().iter().all(|&v| v == 0.5));
    assert!(second.backward().unwrap().as_slice().iter().all(|&v| v == 0.25));
}

#[test]
fn test_recycled_layer_reads_zero_before_forward() {
    let mut pool = BufferPool::<f32>::new();
    let cfg = fixed(2);

    let mut first = TanhLayer::<f32>::new_in(&mut pool, 3, 3, &cfg).unwrap();
    first.set_bias(matrix![[1.0, 2.0, 3.0]]).unwrap();
    first.forward(&Matrix::filled(2, 3, 1.0)).unwrap();
    first.backward().unwrap();
    first.recycle(&mut pool);

    let second = TanhLayer::<f32>::new_in(&mut pool, 3, 3, &cfg).unwrap();
    assert!(second.z().as_slice().iter().all(|&v| v == 0.0));
    assert!(second.y().as_slice().iter().all(|&v| v == 0.0));
    assert!(second.derivative().as_slice().iter().all(|&v| v == 0.0));
}
