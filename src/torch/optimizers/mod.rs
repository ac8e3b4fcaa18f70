//! Optimizers
mod coptimizer;
#[cfg(test)]
pub mod testing;

pub use coptimizer::{AdamConfig, SgdConfig};

use crate::logging::StatsLogger;
use std::error::Error;
use tch::{nn::VarStore, TchError, Tensor};
use thiserror::Error;

/// Base optimizer interface
pub trait BaseOptimizer {
    /// Zero out the gradients of all optimized tensors
    fn zero_grad(&mut self) -> Result<(), OptimizerStepError>;
}

/// Optimizer that minimizes a loss function.
pub trait Optimizer: BaseOptimizer {
    /// Perform a loss minimization step using the gradient of a loss function.
    ///
    /// Obtains gradients by backpropagating the result of `loss_fn`.
    ///
    /// # Args
    /// * `loss_fn` - Loss function to minimize.
    ///     Called to obtain the loss tensor, which is back-propagated to obtain a gradient.
    ///     Always evaluated at least once; may be evaluated multiple times.
    /// * `logger` - Logger for statistics and other information about the step.
    ///
    /// # Returns
    /// The initial value of `loss_fn` on success.
    ///
    /// In general, error conditions are not guaranteed to be detected and an optimizer
    /// may silently put the parameters into a bad state.
    /// For example, [`COptimizer`] sets parameters to NaN when the loss is NaN.
    ///
    /// [`COptimizer`]: tch::COptimizer
    fn backward_step(
        &mut self,
        loss_fn: &dyn Fn() -> Tensor,
        logger: &mut dyn StatsLogger,
    ) -> Result<Tensor, OptimizerStepError>;
}

/// Optimizer that minimizes a loss tensor using a single gradient evaluation per step.
pub trait OnceOptimizer: BaseOptimizer {
    /// Perform a loss minimization step (parameter update).
    ///
    /// Uses the existing gradients stored with the parameter tensor.
    fn step_once(&mut self, logger: &mut dyn StatsLogger) -> Result<(), OptimizerStepError>;

    /// Zero the gradients, back-propagate `loss`, and perform an optimization step.
    fn backward_step_once(
        &mut self,
        loss: &Tensor,
        logger: &mut dyn StatsLogger,
    ) -> Result<(), OptimizerStepError> {
        self.zero_grad()?;
        loss.backward();
        self.step_once(logger)
    }
}

impl<T: OnceOptimizer> Optimizer for T {
    fn backward_step(
        &mut self,
        loss_fn: &dyn Fn() -> Tensor,
        logger: &mut dyn StatsLogger,
    ) -> Result<Tensor, OptimizerStepError> {
        let loss = loss_fn();
        self.backward_step_once(&loss, logger)?;
        Ok(loss)
    }
}

/// Optimizer that minimizes a loss function subject to an upper bound on a constraint function.
///
/// The constraint typically measures how far the parameters have moved during the step,
/// for example the KL divergence between the policies before and after the step.
pub trait ConstrainedOptimizer: BaseOptimizer {
    /// Upper bound on the constraint value at the end of each step.
    fn max_constraint_value(&self) -> f64;

    /// Take an optimization step subject to the constraint.
    ///
    /// Obtains gradients by backpropagating the results of `loss_fn` and `constraint_fn`.
    /// It is not necessary for the caller to compute or zero out the existing gradients.
    ///
    /// # Args
    /// * `loss_fn` - Function returning the scalar loss to minimize.
    /// * `constraint_fn` - Function returning the non-negative scalar constraint value.
    ///     Should equal zero at the parameters at the start of the step.
    /// * `logger` - Logger for statistics and other information about the step.
    ///
    /// # Returns
    /// The initial loss value on success.
    ///
    /// On [`OptimizerStepError::LossNotImproving`] and
    /// [`OptimizerStepError::ConstraintViolated`] the parameters are reset to their values at
    /// the start of the step.
    fn constrained_backward_step(
        &mut self,
        loss_fn: &dyn Fn() -> Tensor,
        constraint_fn: &dyn Fn() -> Tensor,
        logger: &mut dyn StatsLogger,
    ) -> Result<f64, OptimizerStepError>;
}

/// Error performing an optimization step.
#[derive(Debug, Error)]
pub enum OptimizerStepError {
    #[error("loss is not improving: (new) {loss} >= (prev) {loss_before}")]
    LossNotImproving { loss: f64, loss_before: f64 },
    #[error(
        "constraint is violated: (val) {constraint_val} >= (threshold) {max_constraint_value}"
    )]
    ConstraintViolated {
        constraint_val: f64,
        max_constraint_value: f64,
    },
    #[error("loss is NaN")]
    NaNLoss,
    #[error("constraint is NaN")]
    NaNConstraint,
    #[error(transparent)]
    Torch(#[from] TchError),
}

impl OptimizerStepError {
    /// Whether the step failed in a way that leaves training unable to continue.
    ///
    /// A step that does not improve the loss or that violates the constraint leaves the
    /// parameters at their initial values; training can continue from there.
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::LossNotImproving { .. } | Self::ConstraintViolated { .. }
        )
    }
}

/// Build an optimizer
pub trait BuildOptimizer {
    type Optimizer;
    type Error: Error + Send + Sync + 'static;

    /// Build an optimizer for the trainable variables in a variable store.
    fn build_optimizer(&self, vs: &VarStore) -> Result<Self::Optimizer, Self::Error>;
}

/// Configuration of a [`ConstrainedOptimizer`] with an adjustable constraint bound.
///
/// The built optimizer is expected to implement [`ConstrainedOptimizer`] with
/// [`ConstrainedOptimizer::max_constraint_value`] equal to the configured bound.
pub trait ConstrainedOptimizerConfig: BuildOptimizer {
    /// Upper bound on the constraint value of each step for optimizers built from this config.
    fn max_constraint_value(&self) -> f64;

    /// Set the constraint upper bound.
    fn set_max_constraint_value(&mut self, max_constraint_value: f64);

    /// This config with the given constraint upper bound.
    #[must_use]
    fn with_max_constraint_value(mut self, max_constraint_value: f64) -> Self
    where
        Self: Sized,
    {
        self.set_max_constraint_value(max_constraint_value);
        self
    }
}
