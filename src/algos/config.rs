//! Policy gradient trainer configuration
use crate::torch::optimizers::AdamConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How the policy entropy enters training.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntropyMethod {
    /// Add the dense entropy to the reward of each time step.
    Max,
    /// Add the mean entropy to the surrogate objective.
    Regularized,
    /// No entropy term.
    NoEntropy,
}

impl Default for EntropyMethod {
    fn default() -> Self {
        Self::NoEntropy
    }
}

impl EntropyMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Max => "max",
            Self::Regularized => "regularized",
            Self::NoEntropy => "no_entropy",
        }
    }
}

impl fmt::Display for EntropyMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntropyMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "max" => Ok(Self::Max),
            "regularized" => Ok(Self::Regularized),
            "no_entropy" => Ok(Self::NoEntropy),
            _ => Err(ConfigError::UnknownEntropyMethod(s.into())),
        }
    }
}

/// Configuration for the [`Vpg`](super::Vpg) trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "OC: Deserialize<'de> + Default"))]
pub struct VpgConfig<OC = AdamConfig> {
    /// Maximum length of a single rollout.
    pub max_path_length: usize,
    /// Number of `train_once` calls per epoch.
    pub num_train_per_epoch: usize,
    /// Reward discount factor.
    pub discount: f64,
    /// Lambda used for generalized advantage estimation.
    pub gae_lambda: f64,
    /// Rescale the advantages to have mean 0 and standard deviation 1.
    pub center_adv: bool,
    /// Shift the advantages to be always positive (after centering, if enabled).
    pub positive_adv: bool,
    /// Coefficient of the policy entropy. Zero means no entropy regularization.
    pub policy_ent_coeff: f64,
    /// Estimate the entropy with a softplus to keep it from being negative.
    pub use_softplus_entropy: bool,
    /// Stop the entropy gradient.
    pub stop_entropy_gradient: bool,
    /// How the entropy enters training.
    pub entropy_method: EntropyMethod,
    /// Policy optimizer configuration.
    pub optimizer: OC,
}

impl<OC: Default> Default for VpgConfig<OC> {
    fn default() -> Self {
        Self {
            max_path_length: 500,
            num_train_per_epoch: 1,
            discount: 0.99,
            gae_lambda: 1.0,
            center_adv: true,
            positive_adv: false,
            policy_ent_coeff: 0.0,
            use_softplus_entropy: false,
            stop_entropy_gradient: false,
            entropy_method: EntropyMethod::NoEntropy,
            optimizer: OC::default(),
        }
    }
}

impl<OC> VpgConfig<OC> {
    /// Check the configuration for invalid values and inconsistent options.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_path_length == 0 {
            return Err(ConfigError::ZeroMaxPathLength);
        }
        if self.num_train_per_epoch == 0 {
            return Err(ConfigError::ZeroNumTrainPerEpoch);
        }
        if !(0.0..=1.0).contains(&self.discount) {
            return Err(ConfigError::InvalidDiscount(self.discount));
        }
        if !(0.0..=1.0).contains(&self.gae_lambda) {
            return Err(ConfigError::InvalidGaeLambda(self.gae_lambda));
        }
        match self.entropy_method {
            EntropyMethod::Max => {
                if self.center_adv {
                    return Err(ConfigError::MaxEntropyWithCenteredAdvantages);
                }
                if !self.stop_entropy_gradient {
                    return Err(ConfigError::MaxEntropyWithoutStopGradient);
                }
            }
            EntropyMethod::NoEntropy => {
                if self.policy_ent_coeff != 0.0 {
                    return Err(ConfigError::EntropyCoeffWithoutEntropy(
                        self.policy_ent_coeff,
                    ));
                }
            }
            EntropyMethod::Regularized => {}
        }
        Ok(())
    }
}

/// Invalid trainer configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("max_path_length must be positive")]
    ZeroMaxPathLength,
    #[error("num_train_per_epoch must be positive")]
    ZeroNumTrainPerEpoch,
    #[error("discount must be in [0, 1], got {0}")]
    InvalidDiscount(f64),
    #[error("gae_lambda must be in [0, 1], got {0}")]
    InvalidGaeLambda(f64),
    #[error("unknown entropy method {0:?}, expected one of \"max\", \"regularized\", \"no_entropy\"")]
    UnknownEntropyMethod(String),
    #[error("center_adv should be false when entropy_method is max")]
    MaxEntropyWithCenteredAdvantages,
    #[error("stop_entropy_gradient should be true when entropy_method is max")]
    MaxEntropyWithoutStopGradient,
    #[error("policy_ent_coeff should be zero when there is no entropy method, got {0}")]
    EntropyCoeffWithoutEntropy(f64),
    #[error("entropy method {0} is not supported by this trainer")]
    UnsupportedEntropyMethod(EntropyMethod),
}
