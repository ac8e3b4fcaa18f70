//! Stochastic policies
mod categorical_mlp;
mod gaussian_mlp;

pub use categorical_mlp::{CategoricalMlpPolicy, CategoricalMlpPolicyConfig};
pub use gaussian_mlp::{GaussianMlpPolicy, GaussianMlpPolicyConfig};

use super::distributions::BatchDistribution;
use crate::envs::{ActionSpace, EnvSpec};
use tch::{nn::VarStore, Device, TchError, Tensor};
use thiserror::Error;

/// A stochastic policy: a map from observations to action distributions.
pub trait Policy {
    /// Action distribution type.
    type Distribution: BatchDistribution;

    /// Action distributions for a batch of observations.
    ///
    /// # Args
    /// * `observations` - A float tensor of shape `[BATCH_SHAPE.., observation_dim]`.
    fn forward(&self, observations: &Tensor) -> Self::Distribution;

    /// Log likelihood of the given actions.
    ///
    /// # Args
    /// * `observations` - A float tensor of shape `[BATCH_SHAPE.., observation_dim]`.
    /// * `actions` - One action per observation: `[BATCH_SHAPE..]` indices for discrete action
    ///               spaces or `[BATCH_SHAPE.., action_dim]` for continuous action spaces.
    ///
    /// # Returns
    /// A tensor of shape `[BATCH_SHAPE..]`.
    fn log_likelihood(&self, observations: &Tensor, actions: &Tensor) -> Tensor {
        self.forward(observations).log_probs(actions)
    }

    /// Sample actions without tracking gradients.
    fn sample_actions(&self, observations: &Tensor) -> Tensor {
        tch::no_grad(|| self.forward(observations).sample())
    }

    /// Number of observation features.
    fn observation_dim(&self) -> usize;

    /// The action space of the policy.
    fn action_space(&self) -> ActionSpace;

    /// The variables (parameters) of the policy.
    fn variables(&self) -> &VarStore;

    /// A copy of this policy with separately stored parameters.
    fn snapshot(&self) -> Result<Self, TchError>
    where
        Self: Sized;

    /// Overwrite the parameters of this policy with those of `source`.
    fn load_parameters(&mut self, source: &Self) -> Result<(), TchError>
    where
        Self: Sized;
}

/// Build a [`Policy`] for an environment.
pub trait BuildPolicy {
    type Policy: Policy;

    /// Build a policy with observations and actions matching `env_spec`.
    fn build_policy(&self, env_spec: &EnvSpec, device: Device)
        -> Result<Self::Policy, BuildPolicyError>;
}

/// Error building a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BuildPolicyError {
    #[error("{policy} does not support action space {action_space}")]
    UnsupportedActionSpace {
        policy: &'static str,
        action_space: ActionSpace,
    },
}
