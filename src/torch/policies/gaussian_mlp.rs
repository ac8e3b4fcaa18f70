//! Gaussian MLP policy
use super::{BuildPolicy, BuildPolicyError, Policy};
use crate::envs::{ActionSpace, EnvSpec};
use crate::torch::distributions::DiagGaussian;
use crate::torch::modules::{Mlp, MlpConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use tch::{
    nn::{Init, Module, VarStore},
    Device, TchError, Tensor,
};

/// Configuration for [`GaussianMlpPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussianMlpPolicyConfig {
    /// Network mapping observations to action means.
    pub network: MlpConfig,
    /// Initial standard deviation of every action dimension.
    pub init_std: f64,
    /// Whether the standard deviation is trained.
    pub learn_std: bool,
}

impl Default for GaussianMlpPolicyConfig {
    fn default() -> Self {
        Self {
            network: MlpConfig::default(),
            init_std: 1.0,
            learn_std: true,
        }
    }
}

impl GaussianMlpPolicyConfig {
    /// Build a policy with the given dimensions.
    pub fn build(
        &self,
        observation_dim: usize,
        action_dim: usize,
        device: Device,
    ) -> GaussianMlpPolicy {
        let vs = VarStore::new(device);
        let root = vs.root();
        let network = self
            .network
            .build_module(&(&root / "network"), observation_dim, action_dim);
        let init_log_std = self.init_std.ln();
        let log_std = if self.learn_std {
            root.var("log_std", &[action_dim as i64], Init::Const(init_log_std))
        } else {
            let mut log_std = root.zeros_no_train("log_std", &[action_dim as i64]);
            let _ = log_std.fill_(init_log_std);
            log_std
        };
        GaussianMlpPolicy {
            vs,
            network,
            log_std,
            config: self.clone(),
            observation_dim,
            action_dim,
        }
    }
}

impl BuildPolicy for GaussianMlpPolicyConfig {
    type Policy = GaussianMlpPolicy;

    fn build_policy(
        &self,
        env_spec: &EnvSpec,
        device: Device,
    ) -> Result<Self::Policy, BuildPolicyError> {
        match env_spec.action_space {
            ActionSpace::Continuous(action_dim) => {
                Ok(self.build(env_spec.observation_dim, action_dim, device))
            }
            action_space => Err(BuildPolicyError::UnsupportedActionSpace {
                policy: "GaussianMlpPolicy",
                action_space,
            }),
        }
    }
}

/// Diagonal Gaussian policy over a continuous action space.
///
/// The mean is given by a multi-layer perceptron of the observation.
/// The log standard deviation is a state-independent parameter vector.
pub struct GaussianMlpPolicy {
    vs: VarStore,
    network: Mlp,
    log_std: Tensor,
    config: GaussianMlpPolicyConfig,
    observation_dim: usize,
    action_dim: usize,
}

impl fmt::Debug for GaussianMlpPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("GaussianMlpPolicy")
            .field("network", &self.network)
            .field("log_std", &self.log_std)
            .field("observation_dim", &self.observation_dim)
            .field("action_dim", &self.action_dim)
            .finish()
    }
}

impl Policy for GaussianMlpPolicy {
    type Distribution = DiagGaussian;

    fn forward(&self, observations: &Tensor) -> Self::Distribution {
        DiagGaussian::new(self.network.forward(observations), &self.log_std)
    }

    fn observation_dim(&self) -> usize {
        self.observation_dim
    }

    fn action_space(&self) -> ActionSpace {
        ActionSpace::Continuous(self.action_dim)
    }

    fn variables(&self) -> &VarStore {
        &self.vs
    }

    fn snapshot(&self) -> Result<Self, TchError> {
        let mut copy = self
            .config
            .build(self.observation_dim, self.action_dim, self.vs.device());
        copy.vs.copy(&self.vs)?;
        Ok(copy)
    }

    fn load_parameters(&mut self, source: &Self) -> Result<(), TchError> {
        self.vs.copy(&source.vs)
    }
}
