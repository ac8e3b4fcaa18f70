//! Multi-layer perceptron
use serde::{Deserialize, Serialize};
use std::iter;
use tch::{
    nn::{self, Linear, Module, Path},
    Tensor,
};

/// Activation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// No transformation
    Identity,
    /// Rectified linear
    Relu,
    /// Sigmoid function
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
}

impl Default for Activation {
    fn default() -> Self {
        Self::Tanh
    }
}

impl Activation {
    /// The function pointer for this activation function.
    #[inline]
    pub fn function(self) -> fn(&Tensor) -> Tensor {
        match self {
            Self::Identity => Tensor::shallow_clone,
            Self::Relu => Tensor::relu,
            Self::Sigmoid => Tensor::sigmoid,
            Self::Tanh => Tensor::tanh,
        }
    }

    /// The function pointer for this activation function if not the identity function.
    #[inline]
    pub fn maybe_function(self) -> Option<fn(&Tensor) -> Tensor> {
        match self {
            Self::Identity => None,
            _ => Some(self.function()),
        }
    }
}

/// Configuration for the [`Mlp`] module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct MlpConfig {
    /// Sizes of the hidden layers
    pub hidden_sizes: Vec<usize>,
    /// Activation function between hidden layers.
    pub activation: Activation,
    /// Activation function on the output.
    pub output_activation: Activation,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_sizes: vec![32, 32],
            activation: Activation::Tanh,
            output_activation: Activation::Identity,
        }
    }
}

impl MlpConfig {
    pub fn build_module(&self, vs: &Path, in_dim: usize, out_dim: usize) -> Mlp {
        Mlp::new(vs, in_dim, out_dim, self)
    }
}

/// Multi-layer perceptron
///
/// Applies to the last dimension of the input so any number of batch dimensions are supported.
#[derive(Debug)]
pub struct Mlp {
    layers: Vec<Linear>,
    activation: Option<fn(&Tensor) -> Tensor>,
    output_activation: Option<fn(&Tensor) -> Tensor>,
}

impl Mlp {
    pub fn new(vs: &Path, in_dim: usize, out_dim: usize, config: &MlpConfig) -> Self {
        let in_dims = iter::once(&in_dim).chain(&config.hidden_sizes);
        let out_dims = config.hidden_sizes.iter().chain(iter::once(&out_dim));

        let layers: Vec<_> = in_dims
            .zip(out_dims)
            .enumerate()
            .map(|(i, (in_, out_))| {
                nn::linear(
                    vs / format!("layer_{}", i),
                    *in_ as i64,
                    *out_ as i64,
                    Default::default(),
                )
            })
            .collect();

        Self {
            layers,
            activation: config.activation.maybe_function(),
            output_activation: config.output_activation.maybe_function(),
        }
    }
}

impl Module for Mlp {
    fn forward(&self, input: &Tensor) -> Tensor {
        let mut iter_layers = self.layers.iter();
        let mut hidden = iter_layers
            .next()
            .expect("must have >= 1 layers by construction")
            .forward(input);
        for layer in iter_layers {
            if let Some(activation) = self.activation {
                hidden = activation(&hidden);
            }
            hidden = layer.forward(&hidden);
        }
        if let Some(output_activation) = self.output_activation {
            hidden = output_activation(&hidden);
        }
        hidden
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tch::{Device, Kind};

    #[fixture]
    fn default_module() -> (nn::VarStore, Mlp) {
        let vs = nn::VarStore::new(Device::Cpu);
        let module = MlpConfig::default().build_module(&vs.root(), 3, 2);
        (vs, module)
    }

    #[rstest]
    fn forward_batch_shape(default_module: (nn::VarStore, Mlp)) {
        let (_vs, mlp) = default_module;
        let input = Tensor::ones(&[4, 3], (Kind::Float, Device::Cpu));
        assert_eq!(mlp.forward(&input).size(), vec![4, 2]);
    }

    #[rstest]
    fn forward_multiple_batch_dims(default_module: (nn::VarStore, Mlp)) {
        let (_vs, mlp) = default_module;
        let input = Tensor::ones(&[5, 4, 3], (Kind::Float, Device::Cpu));
        assert_eq!(mlp.forward(&input).size(), vec![5, 4, 2]);
    }

    #[rstest]
    fn num_trainable_variables(default_module: (nn::VarStore, Mlp)) {
        let (vs, _mlp) = default_module;
        // weight and bias for each of 3 layers
        assert_eq!(vs.trainable_variables().len(), 6);
    }

    #[rstest]
    #[case(Activation::Relu)]
    #[case(Activation::Sigmoid)]
    #[case(Activation::Tanh)]
    fn activation_maybe_function_some(#[case] activation: Activation) {
        assert!(activation.maybe_function().is_some());
    }

    #[test]
    fn identity_maybe_function_none() {
        assert!(Activation::Identity.maybe_function().is_none());
    }
}
