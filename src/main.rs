use std::env;

use anyhow::{bail, Context};
use log::info;

use parallel_nn::{
    configs, orchestra::ProgressReporter, LabeledDataset, NeuralNetwork, TrainSetProvider,
    TrainingAdapter,
};

#[actix_rt::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let Some(config_path) = args.get(1) else {
        bail!("usage: {} <training.json> [output.json]", args[0]);
    };

    let config = configs::load_training(config_path)
        .with_context(|| format!("cannot load training config '{config_path}'"))?;
    let items = config.dataset.load().context("cannot load the dataset")?;
    info!(items = items.len(); "dataset loaded");

    let network = NeuralNetwork::new(&config.network)?;
    let adapter = TrainingAdapter::from_config(&config.pool)?;

    let epochs = config.epochs;
    let reporter: ProgressReporter = Box::new(move |report| {
        info!(
            epoch = report.epoch_number,
            elapsed_ms = report.epoch_elapsed_millis;
            "epoch {}/{epochs} finished", report.epoch_number
        );
    });

    let job = adapter.train_async(&network, config.algorithm, &items, epochs, Some(reporter))?;
    info!(task_id = job.id().as_str(); "training started");
    let trained = job.await?;

    let dataset = LabeledDataset::from_items(items);
    for (class, set) in dataset.test_sets(usize::MAX).iter().enumerate() {
        println!(
            "class {class}: {} items, accuracy {:.3}, mse {:.5}",
            set.len(),
            trained.accuracy(set)?,
            trained.mse(set)?
        );
    }

    if let Some(output) = args.get(2) {
        adapter.save_network_to(&trained, output).await?;
        info!("trained network saved to {output}");
    }

    adapter.terminate();
    Ok(())
}
