use std::ops::ControlFlow;

use parallel_nn::{configs::NetworkConfig, GradAlgorithm, NeuralNetwork, NnErr, TrainItem};
use rand::{rngs::StdRng, SeedableRng};

const REPEATS: usize = 100;
const EPOCHS: usize = 100;

fn xor_set() -> Vec<TrainItem> {
    let rows = [
        ([0., 1.], 1.),
        ([1., 0.], 1.),
        ([0., 0.], 0.),
        ([1., 1.], 0.),
    ];

    rows.iter()
        .flat_map(|&(inputs, target)| {
            std::iter::repeat_n(TrainItem::new(inputs.to_vec(), vec![target]), REPEATS)
        })
        .collect()
}

fn query(network: &NeuralNetwork, inputs: [f64; 2]) -> f64 {
    network.query(&inputs).unwrap().get(0, 0).unwrap()
}

#[test]
fn backprop_with_momentum_learns_xor() {
    let config = NetworkConfig::new(vec![2, 30, 50, 30, 1])
        .with_learning_rate(0.3)
        .with_moment(0.3)
        .with_seed(17);
    let mut network = NeuralNetwork::new(&config).unwrap();

    let mut epochs_seen = 0;
    let summary = network
        .train_with_rng(
            GradAlgorithm::BackProp,
            &xor_set(),
            EPOCHS,
            &mut StdRng::seed_from_u64(23),
            |report| {
                epochs_seen = report.epoch_number;
                ControlFlow::Continue(())
            },
        )
        .unwrap();

    assert_eq!(summary.epochs_run, EPOCHS);
    assert_eq!(epochs_seen, EPOCHS);

    assert!(query(&network, [0., 1.]) > 0.5);
    assert!(query(&network, [1., 0.]) > 0.5);
    assert!(query(&network, [0., 0.]) < 0.5);
    assert!(query(&network, [1., 1.]) < 0.5);
}

#[test]
fn trained_network_survives_serialization() {
    let config = NetworkConfig::new(vec![2, 8, 1]).with_seed(5);
    let mut network = NeuralNetwork::new(&config).unwrap();
    network
        .train_with_rng(
            GradAlgorithm::RProp,
            &xor_set(),
            2,
            &mut StdRng::seed_from_u64(1),
            |_| ControlFlow::Continue(()),
        )
        .unwrap();

    let restored = NeuralNetwork::deserialize(&network.serialize().unwrap()).unwrap();
    for inputs in [[0., 1.], [1., 0.], [0., 0.], [1., 1.]] {
        assert_eq!(
            query(&restored, inputs).to_bits(),
            query(&network, inputs).to_bits()
        );
    }
}

#[test]
fn quick_prop_never_yields_an_unloadable_network() {
    let config = NetworkConfig::new(vec![2, 30, 50, 30, 1]).with_seed(17);
    let mut network = NeuralNetwork::new(&config).unwrap();

    let result = network.train_with_rng(
        GradAlgorithm::QuickProp,
        &xor_set(),
        50,
        &mut StdRng::seed_from_u64(23),
        |_| ControlFlow::Continue(()),
    );

    match result {
        Ok(summary) => {
            assert_eq!(summary.epochs_run, 50);
            let restored = NeuralNetwork::deserialize(&network.serialize().unwrap()).unwrap();
            assert_eq!(
                query(&restored, [0., 1.]).to_bits(),
                query(&network, [0., 1.]).to_bits()
            );
        }
        Err(NnErr::NonFiniteWeights { .. }) => {
            assert!(matches!(
                network.serialize(),
                Err(NnErr::NonFiniteWeights { .. })
            ));
        }
        Err(e) => panic!("unexpected training error: {e}"),
    }
}
