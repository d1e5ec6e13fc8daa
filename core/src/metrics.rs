use serde::{Deserialize, Serialize};

/// Metrics for one optimization step.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepMetrics {
    pub epoch: usize,
    pub step: usize,
    /// Total loss, reconstruction plus weighted L1 penalty.
    pub loss: f32,
    pub recon_loss: f32,
    pub l1_penalty: f32,
}

/// Metrics from one pass over the held-out test rows.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub loss: f32,
    pub recon_loss: f32,
    /// Fraction of latent activations with near-zero magnitude, to compare
    /// against the configured sparsity target.
    pub latent_sparsity: f32,
}
