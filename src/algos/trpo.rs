//! Trust Region Policy Optimization
//!
//! # Reference
//! Schulman, John, et al. "Trust region policy optimization."
//! International conference on machine learning. PMLR, 2015.
//! <https://arxiv.org/abs/1502.05477>
use super::config::{EntropyMethod, VpgConfig};
use super::vpg::{
    AdvantageEstimator, Baseline, PolicyLoss, PolicyUpdateRule, SurrogateObjective, Vpg,
};
use super::SampleBatch;
use crate::envs::EnvSpec;
use crate::error::TrainError;
use crate::logging::StatsLogger;
use crate::torch::optimizers::{
    ConstrainedOptimizer, ConstrainedOptimizerConfig, OptimizerStepError,
};
use crate::torch::policies::Policy;
use log::warn;
use serde::{Deserialize, Serialize};
use tch::Tensor;

/// Trust region policy update rule.
///
/// Maximizes the importance-sampled surrogate objective
/// `exp(log π(a|s) - log π_old(a|s)) * A(s, a)` with a constrained optimizer
/// that bounds the mean KL divergence between the old and new policies.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TrpoRule;

impl<P: Policy> SurrogateObjective<P> for TrpoRule {
    fn compute_objective(
        &self,
        policy: &P,
        old_policy: &P,
        advantages: &Tensor,
        _valids: &[i64],
        observations: &Tensor,
        actions: &Tensor,
        _rewards: &Tensor,
    ) -> Tensor {
        let old_log_likelihood = tch::no_grad(|| old_policy.log_likelihood(observations, actions));
        let log_likelihood = policy.log_likelihood(observations, actions);
        let likelihood_ratio = (log_likelihood - old_log_likelihood).exp();
        likelihood_ratio * advantages
    }
}

impl<P, O> PolicyUpdateRule<P, O> for TrpoRule
where
    P: Policy,
    O: ConstrainedOptimizer + ?Sized,
{
    fn optimize(
        &self,
        loss: &dyn PolicyLoss,
        optimizer: &mut O,
        batch: &SampleBatch,
        logger: &mut dyn StatsLogger,
    ) -> Result<(), OptimizerStepError> {
        let result = optimizer.constrained_backward_step(
            &|| loss.compute_loss(batch),
            &|| loss.compute_kl_constraint(&batch.observations),
            logger,
        );
        match result {
            Ok(_) => Ok(()),
            Err(error) if !error.is_fatal() => {
                warn!("no policy step in iteration {}: {}", batch.itr, error);
                Ok(())
            }
            Err(error) => Err(error),
        }
    }
}

/// Configuration for TRPO.
///
/// The same as [`VpgConfig`] except for the defaults and `max_kl_step`,
/// which becomes the constraint bound of the policy optimizer.
///
/// No [`ConstrainedOptimizerConfig`] implementation ships with this crate.
/// `OC` must be supplied by the caller, typically a conjugate-gradient
/// trust region optimizer implementing [`ConstrainedOptimizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "OC: Deserialize<'de> + Default"))]
pub struct TrpoConfig<OC> {
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
    /// Maximum KL divergence between the old and new policies of a step.
    pub max_kl_step: f64,
    /// Estimate the entropy with a softplus to keep it from being negative.
    pub use_softplus_entropy: bool,
    /// Stop the entropy gradient.
    pub stop_entropy_gradient: bool,
    /// How the entropy enters training.
    pub entropy_method: EntropyMethod,
    /// Constrained policy optimizer configuration.
    ///
    /// Its constraint bound is replaced by `max_kl_step`.
    pub optimizer: OC,
}

impl<OC: Default> Default for TrpoConfig<OC> {
    fn default() -> Self {
        Self {
            max_path_length: 100,
            num_train_per_epoch: 1,
            discount: 0.99,
            gae_lambda: 0.98,
            center_adv: true,
            positive_adv: false,
            policy_ent_coeff: 0.0,
            max_kl_step: 0.01,
            use_softplus_entropy: false,
            stop_entropy_gradient: false,
            entropy_method: EntropyMethod::NoEntropy,
            optimizer: OC::default(),
        }
    }
}

impl<OC> TrpoConfig<OC>
where
    OC: ConstrainedOptimizerConfig + Clone,
{
    /// The base trainer configuration.
    ///
    /// The optimizer configuration has its constraint bound set to `max_kl_step`.
    pub fn vpg_config(&self) -> VpgConfig<OC> {
        VpgConfig {
            max_path_length: self.max_path_length,
            num_train_per_epoch: self.num_train_per_epoch,
            discount: self.discount,
            gae_lambda: self.gae_lambda,
            center_adv: self.center_adv,
            positive_adv: self.positive_adv,
            policy_ent_coeff: self.policy_ent_coeff,
            use_softplus_entropy: self.use_softplus_entropy,
            stop_entropy_gradient: self.stop_entropy_gradient,
            entropy_method: self.entropy_method,
            optimizer: self
                .optimizer
                .clone()
                .with_max_constraint_value(self.max_kl_step),
        }
    }
}

/// Trust Region Policy Optimization trainer.
///
/// `O` is the policy optimizer and must be a [`ConstrainedOptimizer`].
/// The crate does not provide one; bring your own (e.g. conjugate gradient
/// with a backtracking line search) and build it from `TrpoConfig`.
pub type Trpo<P, B, A, O> = Vpg<P, B, A, O, TrpoRule>;

impl<P, B, A, O> Vpg<P, B, A, O, TrpoRule>
where
    P: Policy,
    B: Baseline,
    A: AdvantageEstimator,
    O: ConstrainedOptimizer,
{
    /// Create a TRPO trainer.
    ///
    /// The policy optimizer is built from `config.optimizer`, a caller-provided
    /// [`ConstrainedOptimizerConfig`]; none is included in this crate.
    ///
    /// # Args
    /// * `env_spec` - Environment specification. Must match the policy.
    /// * `policy` - The policy to train.
    /// * `baseline` - State value baseline.
    /// * `advantage_estimator` - Estimates advantages from rewards and baseline predictions.
    /// * `config` - TRPO configuration.
    pub fn trpo<OC>(
        env_spec: &EnvSpec,
        policy: P,
        baseline: B,
        advantage_estimator: A,
        config: &TrpoConfig<OC>,
    ) -> Result<Self, TrainError>
    where
        OC: ConstrainedOptimizerConfig<Optimizer = O> + Clone,
    {
        Self::new(
            env_spec,
            policy,
            baseline,
            advantage_estimator,
            TrpoRule,
            &config.vpg_config(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{discrete_batch, reward_advantages};
    use super::super::vpg::{AdvantageParams, ZeroBaseline};
    use super::*;
    use crate::envs::ActionSpace;
    use crate::logging::RecordLogger;
    use crate::torch::optimizers::testing::{BacktrackingStep, BacktrackingStepConfig};
    use crate::torch::policies::{
        BuildPolicy, CategoricalMlpPolicy, CategoricalMlpPolicyConfig, GaussianMlpPolicyConfig,
    };
    use rstest::{fixture, rstest};
    use tch::{Device, Kind};

    type TestTrpo = Trpo<
        CategoricalMlpPolicy,
        ZeroBaseline,
        fn(&SampleBatch, &AdvantageParams) -> Tensor,
        BacktrackingStep,
    >;

    const ENV_SPEC: EnvSpec = EnvSpec::new(3, ActionSpace::Discrete(2));

    fn config() -> TrpoConfig<BacktrackingStepConfig> {
        TrpoConfig {
            max_path_length: 8,
            ..TrpoConfig::default()
        }
    }

    fn trpo_with<A: AdvantageEstimator>(
        advantage_estimator: A,
    ) -> Trpo<CategoricalMlpPolicy, ZeroBaseline, A, BacktrackingStep> {
        let policy = CategoricalMlpPolicyConfig::default().build(3, 2, Device::Cpu);
        Vpg::trpo(
            &ENV_SPEC,
            policy,
            ZeroBaseline,
            advantage_estimator,
            &config(),
        )
        .unwrap()
    }

    #[fixture]
    fn trainer() -> TestTrpo {
        trpo_with(reward_advantages as fn(&SampleBatch, &AdvantageParams) -> Tensor)
    }

    #[fixture]
    fn batch() -> SampleBatch {
        discrete_batch(&[5, 8, 1, 3], 3, 2, 8)
    }

    #[rstest]
    fn objective_equals_advantages_at_old_policy(trainer: TestTrpo, batch: SampleBatch) {
        let objective = trainer.compute_objective(&batch);
        assert_eq!(objective.size(), batch.rewards.size());
        assert!(bool::from(
            objective.allclose(&batch.rewards, 1e-6, 1e-6, false)
        ));
    }

    #[test]
    fn objective_equals_advantages_gaussian() {
        let env_spec = EnvSpec::new(2, ActionSpace::Continuous(3));
        let policy = GaussianMlpPolicyConfig::default()
            .build_policy(&env_spec, Device::Cpu)
            .unwrap();
        let old_policy = policy.snapshot().unwrap();
        let observations = Tensor::randn(&[4, 5, 2], (Kind::Float, Device::Cpu));
        let actions = Tensor::randn(&[4, 5, 3], (Kind::Float, Device::Cpu));
        let advantages = Tensor::randn(&[4, 5], (Kind::Float, Device::Cpu));
        let rewards = advantages.zeros_like();

        let objective = TrpoRule.compute_objective(
            &policy,
            &old_policy,
            &advantages,
            &[5, 5, 5, 5],
            &observations,
            &actions,
            &rewards,
        );
        assert!(bool::from(objective.allclose(&advantages, 1e-5, 1e-5, false)));
    }

    #[rstest]
    fn gradient_reaches_only_new_policy(trainer: TestTrpo, batch: SampleBatch) {
        let objective = trainer.compute_objective(&batch);
        assert!(objective.requires_grad());
        objective.sum(Kind::Float).backward();

        let policy_grads: Vec<_> = trainer
            .policy()
            .variables()
            .trainable_variables()
            .iter()
            .map(Tensor::grad)
            .collect();
        assert!(policy_grads.iter().all(Tensor::defined));
        assert!(policy_grads
            .iter()
            .any(|g| g.abs().sum(Kind::Float).double_value(&[]) > 0.0));

        for var in trainer.old_policy().variables().trainable_variables() {
            assert!(!var.grad().defined());
        }
    }

    #[rstest]
    fn objective_invariant_to_path_order(trainer: TestTrpo, batch: SampleBatch) {
        let order = [2, 0, 3, 1];
        let permuted = batch.select_paths(&order);

        let objective = trainer.compute_objective(&batch);
        let permuted_objective = trainer.compute_objective(&permuted);
        let index = Tensor::of_slice(&[2_i64, 0, 3, 1]);
        assert!(bool::from(permuted_objective.allclose(
            &objective.index_select(0, &index),
            1e-6,
            1e-6,
            false
        )));

        let loss = trainer.compute_loss(&batch).double_value(&[]);
        let permuted_loss = trainer.compute_loss(&permuted).double_value(&[]);
        assert!((loss - permuted_loss).abs() < 1e-6);
    }

    #[rstest]
    #[case(0.01)]
    #[case(0.05)]
    #[case(1e-4)]
    fn max_kl_step_is_optimizer_bound(#[case] max_kl_step: f64) {
        let config = TrpoConfig {
            max_kl_step,
            optimizer: BacktrackingStepConfig {
                max_constraint_value: 123.0,
                ..BacktrackingStepConfig::default()
            },
            ..config()
        };
        assert_eq!(
            config.vpg_config().optimizer.max_constraint_value,
            max_kl_step
        );

        let policy = CategoricalMlpPolicyConfig::default().build(3, 2, Device::Cpu);
        let trainer =
            Vpg::trpo(&ENV_SPEC, policy, ZeroBaseline, reward_advantages, &config).unwrap();
        assert_eq!(trainer.optimizer().max_constraint_value(), max_kl_step);
    }

    #[rstest]
    fn optimize_uses_constrained_step(mut trainer: TestTrpo, batch: SampleBatch) {
        let loss_before = trainer.compute_loss(&batch).double_value(&[]);
        trainer.optimize(&batch, &mut ()).unwrap();
        assert_eq!(trainer.optimizer().num_steps, 1);
        assert!(trainer.optimizer().num_constraint_evaluations >= 1);

        let loss_after = trainer.compute_loss(&batch).double_value(&[]);
        let kl = trainer
            .compute_kl_constraint(&batch.observations)
            .double_value(&[]);
        assert!(loss_after < loss_before);
        assert!(kl <= 0.01 + 1e-6);
    }

    #[rstest]
    fn train_step_logs_and_syncs_old_policy(mut trainer: TestTrpo, batch: SampleBatch) {
        let mut logger = RecordLogger::new();
        trainer.train_step(&batch, &mut logger).unwrap();

        let loss_before = logger.last_scalar("LossBefore").unwrap();
        let loss_after = logger.last_scalar("LossAfter").unwrap();
        let d_loss = logger.last_scalar("dLoss").unwrap();
        assert!((d_loss - (loss_before - loss_after)).abs() < 1e-9);
        assert!(logger.last_scalar("KLBefore").unwrap().abs() < 1e-6);
        assert!(logger.last_scalar("KL").unwrap() <= 0.01 + 1e-6);
        assert!(logger.last_scalar("Entropy").unwrap() > 0.0);

        let kl = trainer
            .compute_kl_constraint(&batch.observations)
            .double_value(&[]);
        assert!(kl.abs() < 1e-6);
    }

    #[rstest]
    fn nan_loss_is_an_error(batch: SampleBatch) {
        let mut trainer = trpo_with(|batch: &SampleBatch, _: &AdvantageParams| {
            batch.rewards.full_like(f64::NAN)
        });
        let result = trainer.train_step(&batch, &mut ());
        assert!(matches!(
            result,
            Err(TrainError::OptimizerStep(OptimizerStepError::NaNLoss))
        ));
    }

    #[rstest]
    fn no_improvement_is_not_an_error(batch: SampleBatch) {
        // Zero advantages: the loss is constant so no step improves it
        let mut trainer = trpo_with(|batch: &SampleBatch, _: &AdvantageParams| {
            batch.rewards.zeros_like()
        });
        let mut logger = RecordLogger::new();
        trainer.train_step(&batch, &mut logger).unwrap();
        assert_eq!(trainer.optimizer().num_steps, 1);
        assert_eq!(logger.last_scalar("dLoss"), Some(0.0));
        assert!(logger.last_scalar("KL").unwrap().abs() < 1e-9);
    }

    #[test]
    fn default_config() {
        let config = TrpoConfig::<BacktrackingStepConfig>::default();
        assert_eq!(config.max_path_length, 100);
        assert_eq!(config.num_train_per_epoch, 1);
        assert_eq!(config.discount, 0.99);
        assert_eq!(config.gae_lambda, 0.98);
        assert!(config.center_adv);
        assert!(!config.positive_adv);
        assert_eq!(config.policy_ent_coeff, 0.0);
        assert_eq!(config.max_kl_step, 0.01);
        assert!(!config.use_softplus_entropy);
        assert!(!config.stop_entropy_gradient);
        assert_eq!(config.entropy_method, EntropyMethod::NoEntropy);

        let vpg_config = config.vpg_config();
        assert_eq!(vpg_config.gae_lambda, 0.98);
        assert_eq!(vpg_config.max_path_length, 100);
        assert_eq!(vpg_config.validate(), Ok(()));
    }

    #[test]
    fn deserialize_config() {
        let config: TrpoConfig<BacktrackingStepConfig> =
            serde_json::from_str(r#"{"max_kl_step": 0.02, "entropy_method": "no_entropy"}"#)
                .unwrap();
        assert_eq!(config.max_kl_step, 0.02);
        assert_eq!(config.max_path_length, 100);
        assert_eq!(config.vpg_config().optimizer.max_constraint_value, 0.02);
    }

    #[test]
    fn deserialize_config_unknown_entropy_method() {
        let result: Result<TrpoConfig<BacktrackingStepConfig>, _> =
            serde_json::from_str(r#"{"entropy_method": "maximum"}"#);
        assert!(result.is_err());
    }
}
