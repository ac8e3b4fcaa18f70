//! Categorical distribution
use super::{clamp_float_min, BatchDistribution};
use tch::{Kind, Tensor};

/// Categorical distribution(s).
#[derive(Debug)]
pub struct Categorical {
    /// Normalized log probability of each event.
    ///
    /// A float tensor of shape `[BATCH_SHAPE.., NUM_EVENTS]`.
    logits: Tensor,
}

impl Categorical {
    /// Initialze from possibly unnormalized log probabilities.
    ///
    /// The log probabilities are normalized by adding some value `C` to each
    /// such that `sum_i exp(log_prob[i] + C) = 1`.
    pub fn new(logits: &Tensor) -> Self {
        Self {
            logits: logits.log_softmax(-1, Kind::Float),
        }
    }

    /// Normalized log probabilities with shape `[BATCH_SHAPE.., NUM_EVENTS]`.
    pub const fn logits(&self) -> &Tensor {
        &self.logits
    }
}

impl BatchDistribution for Categorical {
    /// Samples are `i64` event indices with shape `[BATCH_SHAPE..]`.
    fn sample(&self) -> Tensor {
        let shape = self.logits.size();
        let (num_events, batch_shape) = shape
            .split_last()
            .expect("logits have an event dimension");
        self.logits
            .exp()
            .reshape(&[-1, *num_events])
            .multinomial(1, true)
            .reshape(batch_shape)
    }

    fn log_probs(&self, elements: &Tensor) -> Tensor {
        self.logits
            .gather(-1, &elements.to_kind(Kind::Int64).unsqueeze(-1), false)
            .squeeze_dim(-1)
    }

    fn entropy(&self) -> Tensor {
        -(clamp_float_min(&self.logits) * self.logits.exp()).sum_dim_intlist(
            &[-1],
            false,
            Kind::Float,
        )
    }

    fn kl_divergence_from(&self, other: &Self) -> Tensor {
        (clamp_float_min(&(&self.logits - &other.logits)) * self.logits.exp()).sum_dim_intlist(
            &[-1],
            false,
            Kind::Float,
        )
    }
}
