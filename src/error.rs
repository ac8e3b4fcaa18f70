//! Error type
use crate::algos::{BatchError, ConfigError};
use crate::envs::{ActionSpace, EnvSpec};
use crate::torch::optimizers::OptimizerStepError;
use crate::torch::policies::BuildPolicyError;
use std::error::Error;
use tch::TchError;
use thiserror::Error;

/// Error training a policy.
#[derive(Error, Debug)]
pub enum TrainError {
    #[error("invalid configuration")]
    Config(#[from] ConfigError),
    #[error("invalid batch")]
    Batch(#[from] BatchError),
    #[error("policy optimization step failed")]
    OptimizerStep(#[from] OptimizerStepError),
    #[error("error building policy")]
    BuildPolicy(#[from] BuildPolicyError),
    #[error("error building optimizer")]
    BuildOptimizer(#[source] Box<dyn Error + Send + Sync>),
    #[error(
        "policy with observation_dim {observation_dim} and action space {action_space} \
         does not match the environment {env_spec:?}"
    )]
    PolicyMismatch {
        observation_dim: usize,
        action_space: ActionSpace,
        env_spec: EnvSpec,
    },
    #[error(transparent)]
    Torch(#[from] TchError),
}
