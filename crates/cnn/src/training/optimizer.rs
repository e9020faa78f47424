//! Optimizer selection.
//!
//! [`OptimizerKind`] is the serializable description used in config files;
//! it builds the matching burn optimizer config.

use burn::optim::decay::WeightDecayConfig;
use burn::optim::momentum::MomentumConfig;
use burn::optim::{AdamConfig, SgdConfig};
use serde::{Deserialize, Serialize};

fn default_lr() -> f64 {
    0.001
}

fn default_beta1() -> f32 {
    0.9
}

fn default_beta2() -> f32 {
    0.999
}

fn default_epsilon() -> f32 {
    1e-7
}

/// Which optimizer to train with, and its hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizerKind {
    Sgd {
        #[serde(default = "default_lr")]
        learning_rate: f64,
        #[serde(default)]
        momentum: f64,
        #[serde(default)]
        nesterov: bool,
        #[serde(default)]
        weight_decay: f32,
    },
    Adam {
        #[serde(default = "default_lr")]
        learning_rate: f64,
        #[serde(default = "default_beta1")]
        beta1: f32,
        #[serde(default = "default_beta2")]
        beta2: f32,
        #[serde(default = "default_epsilon")]
        epsilon: f32,
    },
}

impl Default for OptimizerKind {
    /// Plain SGD with learning rate 0.001.
    fn default() -> Self {
        OptimizerKind::sgd(default_lr())
    }
}

impl OptimizerKind {
    /// Plain SGD without momentum or decay.
    pub fn sgd(learning_rate: f64) -> Self {
        OptimizerKind::Sgd {
            learning_rate,
            momentum: 0.0,
            nesterov: false,
            weight_decay: 0.0,
        }
    }

    /// Adam with Keras default betas and epsilon.
    pub fn adam(learning_rate: f64) -> Self {
        OptimizerKind::Adam {
            learning_rate,
            beta1: default_beta1(),
            beta2: default_beta2(),
            epsilon: default_epsilon(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OptimizerKind::Sgd { .. } => "sgd",
            OptimizerKind::Adam { .. } => "adam",
        }
    }

    pub fn learning_rate(&self) -> f64 {
        match self {
            OptimizerKind::Sgd { learning_rate, .. } | OptimizerKind::Adam { learning_rate, .. } => {
                *learning_rate
            }
        }
    }

    /// Same optimizer with a different learning rate.
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        match &mut self {
            OptimizerKind::Sgd { learning_rate, .. } | OptimizerKind::Adam { learning_rate, .. } => {
                *learning_rate = lr;
            }
        }
        self
    }

    /// burn SGD config, or `None` for a non-SGD kind.
    pub fn sgd_config(&self) -> Option<SgdConfig> {
        match *self {
            OptimizerKind::Sgd {
                momentum,
                nesterov,
                weight_decay,
                ..
            } => {
                let momentum = (momentum > 0.0).then(|| {
                    MomentumConfig::new()
                        .with_momentum(momentum)
                        .with_dampening(0.0)
                        .with_nesterov(nesterov)
                });
                let decay = (weight_decay > 0.0).then(|| WeightDecayConfig::new(weight_decay));
                Some(
                    SgdConfig::new()
                        .with_momentum(momentum)
                        .with_weight_decay(decay),
                )
            }
            OptimizerKind::Adam { .. } => None,
        }
    }

    /// burn Adam config, or `None` for a non-Adam kind.
    pub fn adam_config(&self) -> Option<AdamConfig> {
        match *self {
            OptimizerKind::Adam {
                beta1,
                beta2,
                epsilon,
                ..
            } => Some(
                AdamConfig::new()
                    .with_beta_1(beta1)
                    .with_beta_2(beta2)
                    .with_epsilon(epsilon),
            ),
            OptimizerKind::Sgd { .. } => None,
        }
    }
}
