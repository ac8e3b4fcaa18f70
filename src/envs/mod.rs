//! Environment specification
use serde::{Deserialize, Serialize};
use std::fmt;

/// Action space of an environment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionSpace {
    /// A finite set of actions `0 .. n`.
    Discrete(usize),
    /// Real vectors of the given dimension.
    Continuous(usize),
}

impl fmt::Display for ActionSpace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Discrete(n) => write!(f, "Discrete({})", n),
            Self::Continuous(n) => write!(f, "Continuous({})", n),
        }
    }
}

/// Environment specification: the structure of observations and actions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvSpec {
    /// Number of observation features.
    pub observation_dim: usize,
    /// Action space.
    pub action_space: ActionSpace,
}

impl EnvSpec {
    pub const fn new(observation_dim: usize, action_space: ActionSpace) -> Self {
        Self {
            observation_dim,
            action_space,
        }
    }
}
