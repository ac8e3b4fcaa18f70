//! Vanilla policy gradient trainer
use super::batch::{Path, SampleBatch};
use super::config::{ConfigError, EntropyMethod, VpgConfig};
use crate::envs::EnvSpec;
use crate::error::TrainError;
use crate::logging::StatsLogger;
use crate::torch::distributions::BatchDistribution;
use crate::torch::optimizers::{BuildOptimizer, Optimizer, OptimizerStepError};
use crate::torch::policies::Policy;
use crate::torch::utils::valid_mean;
use log::debug;
use tch::{Kind, Tensor};

/// Parameters passed to an [`AdvantageEstimator`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AdvantageParams {
    pub discount: f64,
    pub gae_lambda: f64,
    pub center_adv: bool,
    pub positive_adv: bool,
}

impl<OC> From<&VpgConfig<OC>> for AdvantageParams {
    fn from(config: &VpgConfig<OC>) -> Self {
        Self {
            discount: config.discount,
            gae_lambda: config.gae_lambda,
            center_adv: config.center_adv,
            positive_adv: config.positive_adv,
        }
    }
}

/// Estimate per-step advantages of a batch.
pub trait AdvantageEstimator {
    /// Advantage estimates with shape `[N, T]`, matching `batch.rewards`.
    ///
    /// Values past the valid length of each path are ignored.
    fn advantages(&self, batch: &SampleBatch, params: &AdvantageParams) -> Tensor;
}

impl<F> AdvantageEstimator for F
where
    F: Fn(&SampleBatch, &AdvantageParams) -> Tensor,
{
    fn advantages(&self, batch: &SampleBatch, params: &AdvantageParams) -> Tensor {
        self(batch, params)
    }
}

/// State value baseline.
pub trait Baseline {
    /// Predicted value of each step of a path. A tensor of shape `[path.len()]`.
    fn predict(&self, path: &Path) -> Tensor;

    /// Fit the baseline to a set of paths.
    fn fit(&mut self, paths: &[Path]);
}

/// Baseline that always predicts zero.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ZeroBaseline;

impl Baseline for ZeroBaseline {
    fn predict(&self, path: &Path) -> Tensor {
        path.rewards.zeros_like()
    }

    fn fit(&mut self, _: &[Path]) {}
}

/// Policy loss and constraint evaluation for a batch.
pub trait PolicyLoss {
    /// The policy loss: the negated mean objective over the valid steps of the batch.
    fn compute_loss(&self, batch: &SampleBatch) -> Tensor;

    /// Mean KL divergence `KL(old_policy || policy)` over all steps.
    ///
    /// The old policy distribution does not track gradients.
    fn compute_kl_constraint(&self, observations: &Tensor) -> Tensor;
}

/// Surrogate objective of a policy gradient trainer.
pub trait SurrogateObjective<P> {
    /// Per-step objective values to be maximized.
    ///
    /// # Args
    /// * `policy` - The policy being optimized.
    /// * `old_policy` - The policy at the start of the training step.
    /// * `advantages` - Advantages with shape `[N, T]`.
    /// * `valids` - Number of valid steps of each path.
    /// * `observations` - Observations with shape `[N, T, observation_dim]`.
    /// * `actions` - Actions with shape `[N, T, ..]`.
    /// * `rewards` - Rewards with shape `[N, T]`.
    ///
    /// # Returns
    /// A tensor with the same shape as `advantages`.
    #[allow(clippy::too_many_arguments)]
    fn compute_objective(
        &self,
        policy: &P,
        old_policy: &P,
        advantages: &Tensor,
        valids: &[i64],
        observations: &Tensor,
        actions: &Tensor,
        rewards: &Tensor,
    ) -> Tensor;
}

/// Objective and optimization strategy of a policy gradient trainer.
pub trait PolicyUpdateRule<P, O: ?Sized>: SurrogateObjective<P> {
    /// Update the policy parameters with one optimization step on `batch`.
    fn optimize(
        &self,
        loss: &dyn PolicyLoss,
        optimizer: &mut O,
        batch: &SampleBatch,
        logger: &mut dyn StatsLogger,
    ) -> Result<(), OptimizerStepError>;
}

/// Vanilla policy gradient update rule.
///
/// Objective `log_likelihood * advantages` minimized with a plain gradient step.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct VpgRule;

impl<P: Policy> SurrogateObjective<P> for VpgRule {
    fn compute_objective(
        &self,
        policy: &P,
        _old_policy: &P,
        advantages: &Tensor,
        _valids: &[i64],
        observations: &Tensor,
        actions: &Tensor,
        _rewards: &Tensor,
    ) -> Tensor {
        policy.log_likelihood(observations, actions) * advantages
    }
}

impl<P, O> PolicyUpdateRule<P, O> for VpgRule
where
    P: Policy,
    O: Optimizer + ?Sized,
{
    fn optimize(
        &self,
        loss: &dyn PolicyLoss,
        optimizer: &mut O,
        batch: &SampleBatch,
        logger: &mut dyn StatsLogger,
    ) -> Result<(), OptimizerStepError> {
        let _ = optimizer.backward_step(&|| loss.compute_loss(batch), logger)?;
        Ok(())
    }
}

/// Policies, advantage estimation, and update rule: everything needed to evaluate the loss.
struct Objective<P, A, U> {
    policy: P,
    old_policy: P,
    advantage_estimator: A,
    advantage_params: AdvantageParams,
    update_rule: U,
}

impl<P, A, U> Objective<P, A, U>
where
    P: Policy,
    A: AdvantageEstimator,
    U: SurrogateObjective<P>,
{
    fn compute_objective(&self, batch: &SampleBatch) -> Tensor {
        let advantages = self
            .advantage_estimator
            .advantages(batch, &self.advantage_params)
            .detach();
        self.update_rule.compute_objective(
            &self.policy,
            &self.old_policy,
            &advantages,
            &batch.valids,
            &batch.observations,
            &batch.actions,
            &batch.rewards,
        )
    }
}

impl<P, A, U> PolicyLoss for Objective<P, A, U>
where
    P: Policy,
    A: AdvantageEstimator,
    U: SurrogateObjective<P>,
{
    fn compute_loss(&self, batch: &SampleBatch) -> Tensor {
        -valid_mean(&self.compute_objective(batch), &batch.valids)
    }

    fn compute_kl_constraint(&self, observations: &Tensor) -> Tensor {
        let old_distribution = tch::no_grad(|| self.old_policy.forward(observations));
        let distribution = self.policy.forward(observations);
        old_distribution
            .kl_divergence_from(&distribution)
            .mean(Kind::Float)
    }
}

/// Vanilla policy gradient trainer.
///
/// Generic over the policy `P`, baseline `B`, advantage estimator `A`, optimizer `O`, and update
/// rule `U`. The update rule determines the surrogate objective and how the optimizer is applied.
pub struct Vpg<P, B, A, O, U = VpgRule> {
    objective: Objective<P, A, U>,
    baseline: B,
    optimizer: O,
    max_path_length: usize,
    num_train_per_epoch: usize,
}

impl<P, B, A, O, U> Vpg<P, B, A, O, U>
where
    P: Policy,
    B: Baseline,
    A: AdvantageEstimator,
    U: PolicyUpdateRule<P, O>,
{
    /// Create a new trainer.
    ///
    /// # Args
    /// * `env_spec` - Environment specification. Must match the policy.
    /// * `policy` - The policy to train.
    /// * `baseline` - State value baseline.
    /// * `advantage_estimator` - Estimates advantages from rewards and baseline predictions.
    /// * `update_rule` - Surrogate objective and optimization strategy.
    /// * `config` - Trainer configuration, including the policy optimizer configuration.
    pub fn new<OC>(
        env_spec: &EnvSpec,
        policy: P,
        baseline: B,
        advantage_estimator: A,
        update_rule: U,
        config: &VpgConfig<OC>,
    ) -> Result<Self, TrainError>
    where
        OC: BuildOptimizer<Optimizer = O>,
    {
        config.validate()?;
        match config.entropy_method {
            EntropyMethod::NoEntropy => {}
            method => return Err(ConfigError::UnsupportedEntropyMethod(method).into()),
        }
        if policy.observation_dim() != env_spec.observation_dim
            || policy.action_space() != env_spec.action_space
        {
            return Err(TrainError::PolicyMismatch {
                observation_dim: policy.observation_dim(),
                action_space: policy.action_space(),
                env_spec: *env_spec,
            });
        }

        let old_policy = policy.snapshot()?;
        let optimizer = config
            .optimizer
            .build_optimizer(policy.variables())
            .map_err(|err| TrainError::BuildOptimizer(Box::new(err)))?;
        Ok(Self {
            objective: Objective {
                policy,
                old_policy,
                advantage_estimator,
                advantage_params: config.into(),
                update_rule,
            },
            baseline,
            optimizer,
            max_path_length: config.max_path_length,
            num_train_per_epoch: config.num_train_per_epoch,
        })
    }

    /// The policy being trained.
    pub fn policy(&self) -> &P {
        &self.objective.policy
    }

    /// Snapshot of the policy from the start of the current training step.
    pub fn old_policy(&self) -> &P {
        &self.objective.old_policy
    }

    pub fn baseline(&self) -> &B {
        &self.baseline
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    pub fn update_rule(&self) -> &U {
        &self.objective.update_rule
    }

    pub fn advantage_params(&self) -> &AdvantageParams {
        &self.objective.advantage_params
    }

    pub fn max_path_length(&self) -> usize {
        self.max_path_length
    }

    /// Per-step surrogate objective of the update rule. Shape `[N, T]`.
    pub fn compute_objective(&self, batch: &SampleBatch) -> Tensor {
        self.objective.compute_objective(batch)
    }

    /// Policy loss: the negated mean objective over the valid steps of the batch.
    pub fn compute_loss(&self, batch: &SampleBatch) -> Tensor {
        self.objective.compute_loss(batch)
    }

    /// Mean KL divergence `KL(old_policy || policy)` over all steps of `observations`.
    pub fn compute_kl_constraint(&self, observations: &Tensor) -> Tensor {
        self.objective.compute_kl_constraint(observations)
    }

    /// Mean policy entropy over the valid steps of the batch.
    pub fn compute_policy_entropy(&self, batch: &SampleBatch) -> Tensor {
        tch::no_grad(|| {
            let entropy = self.objective.policy.forward(&batch.observations).entropy();
            valid_mean(&entropy, &batch.valids)
        })
    }

    /// Take one policy optimization step on the batch using the update rule.
    pub fn optimize(
        &mut self,
        batch: &SampleBatch,
        logger: &mut dyn StatsLogger,
    ) -> Result<(), TrainError> {
        self.objective.update_rule.optimize(
            &self.objective,
            &mut self.optimizer,
            batch,
            logger,
        )?;
        Ok(())
    }

    /// Pad a set of paths into a batch along with baseline predictions.
    pub fn process_paths(&self, itr: u64, paths: Vec<Path>) -> Result<SampleBatch, TrainError> {
        let baselines: Vec<_> = tch::no_grad(|| {
            paths
                .iter()
                .map(|path| self.baseline.predict(path))
                .collect()
        });
        Ok(SampleBatch::from_paths(
            itr,
            paths,
            &baselines,
            self.max_path_length,
        )?)
    }

    /// Train the policy on a single batch.
    ///
    /// Logs the loss, KL divergence, and entropy statistics of the step.
    /// Afterwards the old policy is set to the updated policy and the baseline is refit.
    pub fn train_step(
        &mut self,
        batch: &SampleBatch,
        logger: &mut dyn StatsLogger,
    ) -> Result<(), TrainError> {
        let (loss_before, kl_before) = tch::no_grad(|| {
            (
                self.compute_loss(batch).double_value(&[]),
                self.compute_kl_constraint(&batch.observations)
                    .double_value(&[]),
            )
        });

        self.optimize(batch, logger)?;

        let (loss_after, kl_after) = tch::no_grad(|| {
            (
                self.compute_loss(batch).double_value(&[]),
                self.compute_kl_constraint(&batch.observations)
                    .double_value(&[]),
            )
        });
        let entropy = self.compute_policy_entropy(batch).double_value(&[]);
        debug!(
            "itr {}: loss {} -> {}, kl {}",
            batch.itr, loss_before, loss_after, kl_after
        );

        logger.group_start();
        logger.group_log_scalar("LossBefore", loss_before);
        logger.group_log_scalar("LossAfter", loss_after);
        logger.group_log_scalar("dLoss", loss_before - loss_after);
        logger.group_log_scalar("KLBefore", kl_before);
        logger.group_log_scalar("KL", kl_after);
        logger.group_log_scalar("Entropy", entropy);
        logger.group_end();

        let Objective {
            policy, old_policy, ..
        } = &mut self.objective;
        old_policy.load_parameters(policy)?;
        self.baseline.fit(&batch.paths);
        Ok(())
    }

    /// Process a set of paths and train on them.
    ///
    /// # Returns
    /// The average undiscounted return of the paths.
    pub fn train_once(
        &mut self,
        itr: u64,
        paths: Vec<Path>,
        logger: &mut dyn StatsLogger,
    ) -> Result<f64, TrainError> {
        let average_return =
            paths.iter().map(Path::total_reward).sum::<f64>() / paths.len().max(1) as f64;
        let batch = self.process_paths(itr, paths)?;
        self.train_step(&batch, logger)?;
        logger.log_scalar("AverageReturn", average_return);
        Ok(average_return)
    }

    /// Run one epoch of `num_train_per_epoch` training iterations.
    ///
    /// # Args
    /// * `epoch` - Epoch index.
    /// * `obtain_samples` - Collect paths with the current policy for an iteration index.
    /// * `logger` - Statistics logger.
    ///
    /// # Returns
    /// The average undiscounted return of the last iteration.
    pub fn train_epoch<F>(
        &mut self,
        epoch: u64,
        mut obtain_samples: F,
        logger: &mut dyn StatsLogger,
    ) -> Result<f64, TrainError>
    where
        F: FnMut(u64, &P) -> Vec<Path>,
    {
        let mut last_return = f64::NAN;
        for i in 0..self.num_train_per_epoch as u64 {
            let itr = epoch * self.num_train_per_epoch as u64 + i;
            let paths = obtain_samples(itr, self.policy());
            last_return = self.train_once(itr, paths, logger)?;
        }
        Ok(last_return)
    }
}
