//! Optimizer test utilities
use super::{
    BaseOptimizer, BuildOptimizer, ConstrainedOptimizer, ConstrainedOptimizerConfig, Optimizer,
    OptimizerStepError,
};
use crate::logging::StatsLogger;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tch::{nn::VarStore, Device, Tensor};

pub fn check_optimizes_quadratic<OC>(optimizer_config: &OC, num_steps: u64)
where
    OC: BuildOptimizer,
    OC::Optimizer: Optimizer,
{
    // Minimize f(x) = 1/2*x'Mx + b'x
    // with M = [1  -1]  b = [ 2]
    //          [-1  2]      [-3]
    //
    // which is minimized at x = [-1  1]'
    let m = Tensor::of_slice(&[1.0_f32, -1.0, -1.0, 2.0]).reshape(&[2, 2]);
    let b = Tensor::of_slice(&[2.0_f32, -3.0]);

    let vs = VarStore::new(Device::Cpu);
    let x = vs.root().zeros("x", &[2]);
    let mut optimizer = optimizer_config.build_optimizer(&vs).unwrap();

    let loss_fn = || m.mv(&x).dot(&x) / 2 + b.dot(&x);

    for _ in 0..num_steps {
        let _ = optimizer.backward_step(&loss_fn, &mut ()).unwrap();
    }

    let expected = Tensor::of_slice(&[-1.0_f32, 1.0]);
    assert!(
        f64::from((&x - &expected).norm()) < 1e-3,
        "expected: {:?}, actual: {:?}",
        expected,
        x
    );
}

/// Configuration for [`BacktrackingStep`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktrackingStepConfig {
    pub max_constraint_value: f64,
    pub learning_rate: f64,
    pub backtrack_ratio: f64,
    pub max_backtracks: u32,
}

impl Default for BacktrackingStepConfig {
    fn default() -> Self {
        Self {
            max_constraint_value: 0.01,
            learning_rate: 1.0,
            backtrack_ratio: 0.5,
            max_backtracks: 15,
        }
    }
}

impl BuildOptimizer for BacktrackingStepConfig {
    type Optimizer = BacktrackingStep;
    type Error = Infallible;

    fn build_optimizer(&self, vs: &VarStore) -> Result<BacktrackingStep, Infallible> {
        Ok(BacktrackingStep {
            params: vs.trainable_variables(),
            config: self.clone(),
            num_steps: 0,
            num_constraint_evaluations: 0,
        })
    }
}

impl ConstrainedOptimizerConfig for BacktrackingStepConfig {
    fn max_constraint_value(&self) -> f64 {
        self.max_constraint_value
    }

    fn set_max_constraint_value(&mut self, max_constraint_value: f64) {
        self.max_constraint_value = max_constraint_value;
    }
}

/// Constrained optimizer that backtracks along the negative gradient of the loss.
///
/// Simple stand-in for a trust region optimizer. Counts how it is used.
#[derive(Debug)]
pub struct BacktrackingStep {
    params: Vec<Tensor>,
    pub config: BacktrackingStepConfig,
    /// Number of calls to `constrained_backward_step`
    pub num_steps: usize,
    /// Total number of evaluations of the constraint function
    pub num_constraint_evaluations: usize,
}

impl BacktrackingStep {
    fn set_params(&mut self, initial: &[Tensor], direction: &[Tensor], step_size: f64) {
        tch::no_grad(|| {
            for ((param, init), dir) in self.params.iter_mut().zip(initial).zip(direction) {
                let _ = param.copy_(&(init - dir * step_size));
            }
        });
    }
}

impl BaseOptimizer for BacktrackingStep {
    fn zero_grad(&mut self) -> Result<(), OptimizerStepError> {
        for param in &mut self.params {
            param.zero_grad();
        }
        Ok(())
    }
}

impl ConstrainedOptimizer for BacktrackingStep {
    fn max_constraint_value(&self) -> f64 {
        self.config.max_constraint_value
    }

    fn constrained_backward_step(
        &mut self,
        loss_fn: &dyn Fn() -> Tensor,
        constraint_fn: &dyn Fn() -> Tensor,
        _: &mut dyn StatsLogger,
    ) -> Result<f64, OptimizerStepError> {
        self.num_steps += 1;
        self.zero_grad()?;
        let loss = loss_fn();
        let loss_before = loss.double_value(&[]);
        if loss_before.is_nan() {
            return Err(OptimizerStepError::NaNLoss);
        }
        loss.backward();

        let initial: Vec<_> = self.params.iter().map(|p| p.detach().copy()).collect();
        let direction: Vec<_> = self
            .params
            .iter()
            .map(|p| {
                let grad = p.grad();
                if grad.defined() {
                    grad.detach().copy()
                } else {
                    p.zeros_like()
                }
            })
            .collect();

        let mut step_size = self.config.learning_rate;
        let mut last = (loss_before, 0.0);
        for _ in 0..self.config.max_backtracks {
            self.set_params(&initial, &direction, step_size);
            let (loss, constraint) = tch::no_grad(|| {
                (
                    loss_fn().double_value(&[]),
                    constraint_fn().double_value(&[]),
                )
            });
            self.num_constraint_evaluations += 1;
            if constraint.is_nan() {
                self.set_params(&initial, &direction, 0.0);
                return Err(OptimizerStepError::NaNConstraint);
            }
            if loss < loss_before && constraint <= self.config.max_constraint_value {
                return Ok(loss_before);
            }
            last = (loss, constraint);
            step_size *= self.config.backtrack_ratio;
        }

        self.set_params(&initial, &direction, 0.0);
        let (loss, constraint_val) = last;
        if loss >= loss_before {
            Err(OptimizerStepError::LossNotImproving { loss, loss_before })
        } else {
            Err(OptimizerStepError::ConstraintViolated {
                constraint_val,
                max_constraint_value: self.config.max_constraint_value,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Kind;

    #[test]
    fn backtracking_respects_constraint() {
        let vs = VarStore::new(Device::Cpu);
        let x = vs.root().zeros("x", &[2]);
        let target = Tensor::of_slice(&[3.0_f32, -4.0]);
        let x_init = x.detach().copy();

        let mut optimizer = BacktrackingStepConfig::default()
            .build_optimizer(&vs)
            .unwrap();
        let loss_fn = || (&x - &target).square().sum(Kind::Float);
        let constraint_fn = || (&x - &x_init).square().sum(Kind::Float);

        let loss_before = optimizer
            .constrained_backward_step(&loss_fn, &constraint_fn, &mut ())
            .unwrap();
        assert!((loss_before - 25.0).abs() < 1e-5);
        assert!(constraint_fn().double_value(&[]) <= 0.01);
        assert!(loss_fn().double_value(&[]) < loss_before);
        assert_eq!(optimizer.num_steps, 1);
    }

    #[test]
    fn nan_loss_is_an_error() {
        let vs = VarStore::new(Device::Cpu);
        let x = vs.root().zeros("x", &[1]);
        let mut optimizer = BacktrackingStepConfig::default()
            .build_optimizer(&vs)
            .unwrap();
        #[allow(clippy::eq_op)]
        let result = optimizer.constrained_backward_step(
            &|| (&x / &x).sum(Kind::Float),
            &|| x.sum(Kind::Float),
            &mut (),
        );
        assert!(matches!(result, Err(OptimizerStepError::NaNLoss)));
    }

    #[test]
    fn loss_not_improving_restores_parameters() {
        let vs = VarStore::new(Device::Cpu);
        let x = vs.root().zeros("x", &[1]);
        let mut optimizer = BacktrackingStepConfig::default()
            .build_optimizer(&vs)
            .unwrap();
        // Already at the minimum
        let result = optimizer.constrained_backward_step(
            &|| x.square().sum(Kind::Float),
            &|| x.square().sum(Kind::Float),
            &mut (),
        );
        assert!(matches!(
            result,
            Err(OptimizerStepError::LossNotImproving { .. })
        ));
        assert_eq!(x.double_value(&[0]), 0.0);
    }
}
