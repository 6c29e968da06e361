use latent_engine::math::*;
use latent_engine::EngineError;
use ndarray::Array2;

fn assert_close(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() <= tol, "{} != {} (tol {})", a, b, tol);
}

#[test]
fn test_softmax_sums_to_one() {
    for logits in [
        vec![1.0, 2.0, 3.0],
        vec![-50.0, 0.0, 50.0, 700.0],
        vec![0.0; 7],
        vec![1e-9],
    ] {
        let probs = softmax(&logits);
        assert_eq!(probs.len(), logits.len());
        assert_close(probs.iter().sum::<f64>(), 1.0, 1e-9);
        assert!(probs.iter().all(|p| *p >= 0.0));
    }
    assert!(softmax(&[]).is_empty());
}

#[test]
fn test_softmax_shift_invariant() {
    let logits = vec![0.3, -1.2, 2.5, 0.0];
    let shifted: Vec<f64> = logits.iter().map(|x| x + 123.456).collect();
    for (a, b) in softmax(&logits).iter().zip(softmax(&shifted)) {
        assert_close(*a, b, 1e-12);
    }
}

#[test]
fn test_layer_normalize_unit_stats() {
    let v = vec![1.0, 2.0, 3.0, 4.0, 5.0, -7.5];
    let out = layer_normalize(&v, &vec![1.0; 6], &vec![0.0; 6]).unwrap();
    let mean = out.iter().sum::<f64>() / out.len() as f64;
    let variance = out.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / out.len() as f64;
    assert_close(mean, 0.0, 1e-4);
    assert_close(variance, 1.0, 1e-4);
}

#[test]
fn test_layer_normalize_affine() {
    let v = vec![2.0, 4.0];
    let out = layer_normalize(&v, &[2.0, 2.0], &[1.0, 1.0]).unwrap();
    assert!(out[0] < 1.0 && out[1] > 1.0);
    assert_close(out[0] + out[1], 2.0, 1e-12);
}

#[test]
fn test_dimension_mismatch() {
    assert_eq!(
        dot(&[1.0, 2.0], &[1.0]),
        Err(EngineError::DimensionMismatch {
            operation: "dot",
            expected: 2,
            actual: 1,
        })
    );
    assert!(add(&[1.0], &[1.0, 2.0]).is_err());
    assert!(layer_normalize(&[1.0, 2.0], &[1.0], &[0.0, 0.0]).is_err());

    let m = Array2::<f64>::zeros((3, 2));
    assert!(matvec(&m, &[1.0, 2.0, 3.0]).is_err());
    assert_eq!(matvec(&m, &[1.0, 2.0]).unwrap().len(), 3);
    assert_eq!(vecmat(&[1.0, 2.0, 3.0], &m).unwrap().len(), 2);
}

#[test]
fn test_activations() {
    assert_eq!(relu(-3.0), 0.0);
    assert_eq!(relu(2.5), 2.5);
    assert_eq!(gelu(0.0), 0.0);
    assert_close(gelu(1.0), 0.8411919906, 1e-8);
    assert_close(swish(1.0), 1.0 / (1.0 + (-1.0f64).exp()), 1e-12);
    assert_close(sigmoid(0.0), 0.5, 1e-12);
    assert_eq!(Activation::default(), Activation::Gelu);
    assert_eq!(Activation::Relu.apply_vec(&[-1.0, 1.0]), vec![0.0, 1.0]);
}

#[test]
fn test_entropy_and_argmax() {
    assert_close(entropy(&[1.0, 1.0]), 2f64.ln(), 1e-12);
    assert_eq!(entropy(&[0.0, 0.0]), 0.0);
    assert_eq!(entropy(&[5.0]), 0.0);
    assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some((0.7, 1)));
    assert_eq!(argmax(&[0.5, 0.5]), Some((0.5, 0)));
    assert_eq!(argmax(&[]), None);
}
