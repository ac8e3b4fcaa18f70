//! Torch statistical distributions
//!
//! These types all represent a batch of distributions with arbitrary batch shape.
//! The return values of statistics methods are tensors with that same batch shape.
mod categorical;
mod gaussian;

pub use categorical::Categorical;
pub use gaussian::DiagGaussian;

use tch::{Kind, Tensor};

/// A batch of distributions over tensor elements.
pub trait BatchDistribution {
    /// Sample one element from each distribution in the batch.
    ///
    /// # Returns
    /// A tensor of shape `[BATCH_SHAPE..., ELEMENT_SHAPE...]`.
    fn sample(&self) -> Tensor;

    /// Log probabilities (or densities) of the given elements.
    ///
    /// # Args
    /// * `elements` - One element per distribution.
    ///                A tensor of shape `[BATCH_SHAPE..., ELEMENT_SHAPE...]`.
    ///
    /// # Returns
    /// A tensor of shape `[BATCH_SHAPE...]`.
    fn log_probs(&self, elements: &Tensor) -> Tensor;

    /// Distribution entropies with shape `[BATCH_SHAPE...]`.
    fn entropy(&self) -> Tensor;

    /// The KL divergence (relative entropy) from another batch of distributions.
    ///
    /// `KL(self || other)`
    ///
    /// # Returns
    /// A tensor of KL divergences `KL(self[i] || other[i])` with shape `[BATCH_SHAPE...]`.
    fn kl_divergence_from(&self, other: &Self) -> Tensor;
}

/// Clamp float values to be >= the smallest finite value of their kind.
///
/// Tensors of other kinds are returned unchanged.
fn clamp_float_min(x: &Tensor) -> Tensor {
    match x.kind() {
        Kind::Float => x.clamp_min(f64::from(f32::MIN)),
        Kind::Double => x.clamp_min(f64::MIN),
        _ => x.shallow_clone(),
    }
}
