//! Trainer test utilities
use super::batch::{Path, SampleBatch};
use super::vpg::AdvantageParams;
use tch::{Device, Kind, Tensor};

/// Advantages equal to the rewards minus the baseline predictions.
pub fn reward_advantages(batch: &SampleBatch, _: &AdvantageParams) -> Tensor {
    &batch.rewards - &batch.baselines
}

/// A batch of random paths in a discrete-action environment with zero baselines.
pub fn discrete_batch(
    lengths: &[i64],
    observation_dim: i64,
    num_actions: i64,
    max_path_length: usize,
) -> SampleBatch {
    let paths: Vec<_> = lengths
        .iter()
        .map(|&len| {
            Path::new(
                Tensor::randn(&[len, observation_dim], (Kind::Float, Device::Cpu)),
                Tensor::randint(num_actions, &[len], (Kind::Int64, Device::Cpu)),
                Tensor::randn(&[len], (Kind::Float, Device::Cpu)),
            )
            .unwrap()
        })
        .collect();
    let baselines: Vec<_> = paths.iter().map(|p| p.rewards.zeros_like()).collect();
    SampleBatch::from_paths(0, paths, &baselines, max_path_length).unwrap()
}
