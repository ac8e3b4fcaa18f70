//! Trajectories and padded training batches
use crate::torch::utils::f_pad_and_stack;
use tch::{Kind, TchError, Tensor};
use thiserror::Error;

/// A single trajectory (rollout).
#[derive(Debug)]
pub struct Path {
    /// Observations. A float tensor of shape `[len, observation_dim]`.
    pub observations: Tensor,
    /// Actions. An `i64` tensor of shape `[len]` for discrete action spaces or a float tensor of
    /// shape `[len, action_dim]` for continuous action spaces.
    pub actions: Tensor,
    /// Rewards. A float tensor of shape `[len]`.
    pub rewards: Tensor,
}

impl Path {
    /// Create a path, checking that the tensors have the documented ranks and a common length.
    pub fn new(observations: Tensor, actions: Tensor, rewards: Tensor) -> Result<Self, BatchError> {
        check_rank("observations", &observations, &[2], "[len, observation_dim]")?;
        check_rank("actions", &actions, &[1, 2], "[len] or [len, action_dim]")?;
        check_rank("rewards", &rewards, &[1], "[len]")?;
        let (num_observations, num_actions, num_rewards) = (
            observations.size()[0],
            actions.size()[0],
            rewards.size()[0],
        );
        if num_observations != num_actions || num_observations != num_rewards {
            return Err(BatchError::MismatchedPathLengths {
                num_observations,
                num_actions,
                num_rewards,
            });
        }
        Ok(Self {
            observations,
            actions,
            rewards,
        })
    }

    /// Number of steps in the path.
    pub fn len(&self) -> usize {
        self.rewards.size().first().copied().unwrap_or(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the path rewards.
    pub fn total_reward(&self) -> f64 {
        self.rewards.sum(Kind::Double).double_value(&[])
    }

    fn shallow_clone(&self) -> Self {
        Self {
            observations: self.observations.shallow_clone(),
            actions: self.actions.shallow_clone(),
            rewards: self.rewards.shallow_clone(),
        }
    }
}

fn check_rank(
    name: &'static str,
    tensor: &Tensor,
    ranks: &[usize],
    expected: &'static str,
) -> Result<(), BatchError> {
    let shape = tensor.size();
    if ranks.contains(&shape.len()) {
        Ok(())
    } else {
        Err(BatchError::InvalidShape {
            name,
            shape,
            expected,
        })
    }
}

/// A batch of paths padded to a common length.
///
/// Entries past the valid length of each path are zero.
#[derive(Debug)]
pub struct SampleBatch {
    /// Training iteration index.
    pub itr: u64,
    /// The source paths in batch order.
    pub paths: Vec<Path>,
    /// Number of valid steps of each path.
    pub valids: Vec<i64>,
    /// Observations with shape `[N, T, observation_dim]`.
    pub observations: Tensor,
    /// Actions with shape `[N, T]` (discrete) or `[N, T, action_dim]` (continuous).
    pub actions: Tensor,
    /// Rewards with shape `[N, T]`.
    pub rewards: Tensor,
    /// Baseline predictions with shape `[N, T]`.
    pub baselines: Tensor,
}

impl SampleBatch {
    /// Pad paths and their baseline predictions into a batch.
    ///
    /// # Args
    /// * `itr` - Training iteration index.
    /// * `paths` - The paths. Must be nonempty and no longer than `max_path_length`.
    /// * `baselines` - Baseline prediction for each step of each path.
    /// * `max_path_length` - Padded length `T` of the batch.
    pub fn from_paths(
        itr: u64,
        paths: Vec<Path>,
        baselines: &[Tensor],
        max_path_length: usize,
    ) -> Result<Self, BatchError> {
        if paths.is_empty() {
            return Err(BatchError::Empty);
        }
        if baselines.len() != paths.len() {
            return Err(BatchError::NumBaselines {
                num_paths: paths.len(),
                num_baselines: baselines.len(),
            });
        }
        if let Some(path) = paths.iter().find(|p| p.len() > max_path_length) {
            return Err(BatchError::PathTooLong {
                length: path.len(),
                max_path_length,
            });
        }

        let valids = paths.iter().map(|p| p.len() as i64).collect();
        let observations = f_pad_and_stack(paths.iter().map(|p| &p.observations), max_path_length)?;
        let actions = f_pad_and_stack(paths.iter().map(|p| &p.actions), max_path_length)?;
        let rewards = f_pad_and_stack(paths.iter().map(|p| &p.rewards), max_path_length)?;
        let baselines = f_pad_and_stack(baselines, max_path_length)?;
        Ok(Self {
            itr,
            paths,
            valids,
            observations,
            actions,
            rewards,
            baselines,
        })
    }

    /// Number of paths in the batch.
    pub fn num_paths(&self) -> usize {
        self.paths.len()
    }

    /// Padded length of each path.
    pub fn max_path_length(&self) -> usize {
        self.rewards.size()[1] as usize
    }

    /// Total number of valid steps.
    pub fn num_steps(&self) -> i64 {
        self.valids.iter().sum()
    }

    /// A new batch made of the paths at `indices`, in that order.
    ///
    /// # Panics
    /// If any index is out of bounds.
    pub fn select_paths(&self, indices: &[usize]) -> Self {
        let index = Tensor::of_slice(
            &indices.iter().map(|&i| i as i64).collect::<Vec<_>>(),
        )
        .to_device(self.rewards.device());
        Self {
            itr: self.itr,
            paths: indices.iter().map(|&i| self.paths[i].shallow_clone()).collect(),
            valids: indices.iter().map(|&i| self.valids[i]).collect(),
            observations: self.observations.index_select(0, &index),
            actions: self.actions.index_select(0, &index),
            rewards: self.rewards.index_select(0, &index),
            baselines: self.baselines.index_select(0, &index),
        }
    }
}

/// Error constructing a path or batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch has no paths")]
    Empty,
    #[error("path length {length} exceeds the maximum path length {max_path_length}")]
    PathTooLong {
        length: usize,
        max_path_length: usize,
    },
    #[error("path {name} has shape {shape:?}, expected {expected}")]
    InvalidShape {
        name: &'static str,
        shape: Vec<i64>,
        expected: &'static str,
    },
    #[error(
        "path has {num_observations} observations, {num_actions} actions and {num_rewards} rewards"
    )]
    MismatchedPathLengths {
        num_observations: i64,
        num_actions: i64,
        num_rewards: i64,
    },
    #[error("{num_baselines} baseline predictions for {num_paths} paths")]
    NumBaselines {
        num_paths: usize,
        num_baselines: usize,
    },
    #[error(transparent)]
    Torch(#[from] TchError),
}
