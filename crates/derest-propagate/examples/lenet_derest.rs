//! Derest a small LeNet-style network and prune it.
//!
//! Run with: RUST_LOG=debug cargo run -p derest-propagate --example lenet_derest

use derest_core::{LrnParams, PoolParams};
use derest_propagate::{
    derest_significance, least_significant, simple_neuron_deleter, ConvolutionalLayer,
    DerestConfig, DropoutLayer, FullyConnectedLayer, Network, NormLayer, PoolLayer,
    PruningConfig, ReluLayer, Result, SoftmaxLayer,
};
use derest_tensor::{BoundedTensor, ConvParams};
use ndarray::{Array1, Array2, Array4, ArrayD, IxDyn};

fn build_network() -> Result<Network> {
    let conv = ConvParams::new(Array4::from_shape_fn((4, 1, 3, 3), |(o, _, h, w)| {
        ((o * 9 + h * 3 + w) % 5) as f64 / 5.0 - 0.4
    }))
    .with_biases(Array1::from_elem(4, 0.1));

    let mut network = Network::new();
    network.add_layer(ConvolutionalLayer::new(conv)?);
    network.add_layer(ReluLayer);
    network.add_layer(PoolLayer::max(PoolParams::new((2, 2)).with_stride((2, 2)))?);
    network.add_layer(NormLayer::new(LrnParams::default())?);
    network.add_layer(FullyConnectedLayer::new(
        Array2::from_shape_fn((4 * 3 * 3, 16), |(i, j)| ((i * 7 + j) % 13) as f64 / 20.0 - 0.3),
        Array1::zeros(16),
    )?);
    network.add_layer(ReluLayer);
    network.add_layer(DropoutLayer::new(0.5)?);
    network.add_layer(FullyConnectedLayer::new(
        Array2::from_shape_fn((16, 10), |(i, j)| ((i + 3 * j) % 7) as f64 / 10.0 - 0.3),
        Array1::zeros(10),
    )?);
    network.add_layer(SoftmaxLayer);
    Ok(network)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut network = build_network()?;
    let image = ArrayD::from_shape_fn(IxDyn(&[1, 1, 8, 8]), |idx| ((idx[2] + idx[3]) % 4) as f64);
    let input = BoundedTensor::from_epsilon(image, 0.25);

    let result = network.derest(&input, &DerestConfig::default())?;
    println!("output bounds:");
    for (i, bound) in result.output.iter().enumerate() {
        println!("  class {i}: [{:.4}, {:.4}]", bound.lower, bound.upper);
    }

    let scores = derest_significance(&result)?;
    for (layer_id, layer_scores) in scores.iter().enumerate() {
        let least = least_significant(layer_scores, 3);
        println!(
            "layer {layer_id} ({}): least significant inputs {:?}",
            network.layers()[layer_id].layer_type(),
            least.iter().map(|s| s.neuron).collect::<Vec<_>>()
        );
    }

    let report = simple_neuron_deleter(&mut network, &PruningConfig::new(0.3, 0.5))?;
    println!(
        "deleted {} of {} fully-connected inputs",
        report.deleted.len(),
        report.considered()
    );
    Ok(())
}
