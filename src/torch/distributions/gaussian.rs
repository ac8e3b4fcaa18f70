//! Diagonal Gaussian distribution
use super::BatchDistribution;
use std::f64::consts::PI;
use tch::{Kind, Tensor};

/// Multivariate Gaussian distribution(s) with diagonal covariance.
#[derive(Debug)]
pub struct DiagGaussian {
    /// Mean. A float tensor of shape `[BATCH_SHAPE.., DIM]`.
    mean: Tensor,
    /// Log standard deviation. Broadcastable to the shape of `mean`.
    log_std: Tensor,
}

impl DiagGaussian {
    /// Initialize from a mean and a log standard deviation.
    ///
    /// `log_std` may have any shape that broadcasts to the shape of `mean`,
    /// for example a single `[DIM]` vector shared across the batch.
    pub fn new(mean: Tensor, log_std: &Tensor) -> Self {
        let log_std = log_std.expand_as(&mean);
        Self { mean, log_std }
    }

    pub const fn mean(&self) -> &Tensor {
        &self.mean
    }

    pub const fn log_std(&self) -> &Tensor {
        &self.log_std
    }
}

impl BatchDistribution for DiagGaussian {
    fn sample(&self) -> Tensor {
        &self.mean + self.log_std.exp() * self.mean.randn_like()
    }

    fn log_probs(&self, elements: &Tensor) -> Tensor {
        let z = (elements - &self.mean) * (-&self.log_std).exp();
        let per_dim = z.square() * -0.5 - &self.log_std - 0.5 * (2.0 * PI).ln();
        per_dim.sum_dim_intlist(&[-1], false, Kind::Float)
    }

    fn entropy(&self) -> Tensor {
        (&self.log_std + 0.5 * (1.0 + (2.0 * PI).ln())).sum_dim_intlist(&[-1], false, Kind::Float)
    }

    fn kl_divergence_from(&self, other: &Self) -> Tensor {
        let var_ratio = (&self.log_std - &other.log_std).exp().square();
        let mean_term = ((&self.mean - &other.mean) * (-&other.log_std).exp()).square();
        ((var_ratio + mean_term - 1.0) * 0.5 - (&self.log_std - &other.log_std)).sum_dim_intlist(
            &[-1],
            false,
            Kind::Float,
        )
    }
}
