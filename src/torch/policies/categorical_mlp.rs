//! Categorical MLP policy
use super::{BuildPolicy, BuildPolicyError, Policy};
use crate::envs::{ActionSpace, EnvSpec};
use crate::torch::distributions::Categorical;
use crate::torch::modules::{Mlp, MlpConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use tch::{nn::Module, nn::VarStore, Device, TchError, Tensor};

/// Configuration for [`CategoricalMlpPolicy`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoricalMlpPolicyConfig {
    /// Network mapping observations to action logits.
    pub network: MlpConfig,
}

impl CategoricalMlpPolicyConfig {
    /// Build a policy with the given dimensions.
    pub fn build(
        &self,
        observation_dim: usize,
        num_actions: usize,
        device: Device,
    ) -> CategoricalMlpPolicy {
        let vs = VarStore::new(device);
        let network = self
            .network
            .build_module(&(&vs.root() / "network"), observation_dim, num_actions);
        CategoricalMlpPolicy {
            vs,
            network,
            config: self.clone(),
            observation_dim,
            num_actions,
        }
    }
}

impl BuildPolicy for CategoricalMlpPolicyConfig {
    type Policy = CategoricalMlpPolicy;

    fn build_policy(
        &self,
        env_spec: &EnvSpec,
        device: Device,
    ) -> Result<Self::Policy, BuildPolicyError> {
        match env_spec.action_space {
            ActionSpace::Discrete(num_actions) => {
                Ok(self.build(env_spec.observation_dim, num_actions, device))
            }
            action_space => Err(BuildPolicyError::UnsupportedActionSpace {
                policy: "CategoricalMlpPolicy",
                action_space,
            }),
        }
    }
}

/// Policy over a discrete action space with action logits given by a multi-layer perceptron.
pub struct CategoricalMlpPolicy {
    vs: VarStore,
    network: Mlp,
    config: CategoricalMlpPolicyConfig,
    observation_dim: usize,
    num_actions: usize,
}

impl fmt::Debug for CategoricalMlpPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CategoricalMlpPolicy")
            .field("network", &self.network)
            .field("observation_dim", &self.observation_dim)
            .field("num_actions", &self.num_actions)
            .finish()
    }
}

impl Policy for CategoricalMlpPolicy {
    type Distribution = Categorical;

    fn forward(&self, observations: &Tensor) -> Self::Distribution {
        Categorical::new(&self.network.forward(observations))
    }

    fn observation_dim(&self) -> usize {
        self.observation_dim
    }

    fn action_space(&self) -> ActionSpace {
        ActionSpace::Discrete(self.num_actions)
    }

    fn variables(&self) -> &VarStore {
        &self.vs
    }

    fn snapshot(&self) -> Result<Self, TchError> {
        let mut copy = self
            .config
            .build(self.observation_dim, self.num_actions, self.vs.device());
        copy.vs.copy(&self.vs)?;
        Ok(copy)
    }

    fn load_parameters(&mut self, source: &Self) -> Result<(), TchError> {
        self.vs.copy(&source.vs)
    }
}
