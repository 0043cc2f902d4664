#![cfg(test)]

use machine_learning::{Classifier, ModelSpec, registry};
use ndarray::{Array, IxDyn};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{PortableGraph, Session, Signature, lower};

fn classifier(spec: ModelSpec, seed: u64) -> Classifier {
    let mut rng = StdRng::seed_from_u64(seed);
    let params = (0..spec.size())
        .map(|_| rng.random_range(-0.05..0.05))
        .collect();
    Classifier::new(spec, params).unwrap()
}

fn batch(shape: &[usize], seed: u64) -> Array<f32, IxDyn> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut full = vec![3];
    full.extend_from_slice(shape);
    Array::from_shape_simple_fn(IxDyn(&full), || rng.random_range(0.0..1.0))
}

fn assert_graph_matches_model(spec: ModelSpec) {
    let classifier = classifier(spec, 7);
    let graph = lower(&classifier, 13, &Signature::default()).unwrap();
    let session = Session::from_bytes(graph.to_bytes().unwrap()).unwrap();

    let x = batch(classifier.input_shape(), 11);
    let expected = classifier.predict(x.view()).unwrap();
    let results = session.predict(x).unwrap();

    assert_eq!(results.len(), 3);
    for (result, row) in results.iter().zip(expected.rows()) {
        assert_eq!(result.scores().len(), registry::NUM_CLASSES);
        for (got, expected) in result.scores().iter().zip(row) {
            assert!((got - expected).abs() < 1e-5, "got {got}, expected {expected}");
        }
        assert!(result.is_normalized(1e-5));
    }
}

#[test]
fn mlp_512x2_graph_scores_match_the_model() {
    assert_graph_matches_model(registry::mlp_512x2());
}

#[test]
fn mlp_128_graph_scores_match_the_model() {
    assert_graph_matches_model(registry::mlp_128());
}

#[test]
fn graph_signature_follows_the_model() {
    let classifier = classifier(registry::mlp_512x2(), 1);
    let graph: PortableGraph = lower(&classifier, 13, &Signature::default()).unwrap();
    let session = Session::new(graph);

    let input = &session.inputs()[0];
    let dims: Vec<_> = input.shape[1..].iter().map(|d| d.size_or(0)).collect();
    assert_eq!(dims, classifier.input_shape());
    assert_eq!(session.outputs()[0].shape[1].size_or(0), 10);
}
