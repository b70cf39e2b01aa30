//! the flat parameter vector (§3 `Parameters`) exposed to the optimizer,
//! wrapped in a `candle_core::Var` so every derived tensor built from it
//! (hazards, Q, P, L) carries gradients back to it.

use crate::error::ConfigError;
use crate::tensor::{self, DTYPE};
use candle_core::{Tensor, Var};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// offsets into the flat parameter vector; computed once per (n_targets,
/// num_nodes) pair and shared by every accessor.
#[derive(Debug, Clone, Copy)]
struct Layout {
    n_targets: usize,
    num_nodes: usize,
}

impl Layout {
    fn len(&self) -> usize {
        self.branch_lens_offset() + self.num_nodes
    }
    fn target_lams_offset(&self) -> usize {
        0
    }
    fn double_cut_weight_offset(&self) -> usize {
        self.n_targets
    }
    fn trim_long_probs_offset(&self) -> usize {
        self.double_cut_weight_offset() + 1
    }
    fn trim_zero_prob_offset(&self) -> usize {
        self.trim_long_probs_offset() + 2
    }
    fn insertion_params_offset(&self) -> usize {
        self.trim_zero_prob_offset() + 1
    }
    fn branch_lens_offset(&self) -> usize {
        self.insertion_params_offset() + 2
    }
}

/// the model's free parameters: per-target cut rates, the double-cut weight,
/// trim and insertion distribution parameters, and per-node branch lengths.
/// Backed by a single `candle_core::Var` so the whole vector differentiates
/// as one unit, matching the flat layout the optimizer owns.
pub struct Parameters {
    layout: Layout,
    var: Var,
}

impl Parameters {
    pub fn from_values(n_targets: usize, num_nodes: usize, values: Vec<f64>) -> Result<Self, ConfigError> {
        let layout = Layout { n_targets, num_nodes };
        if values.len() != layout.len() {
            return Err(ConfigError::BadTargetTract(format!(
                "parameter vector has {} entries, expected {} for n_targets={n_targets}, num_nodes={num_nodes}",
                values.len(),
                layout.len(),
            )));
        }
        for (i, &v) in values.iter().enumerate() {
            let is_branch_len = i >= layout.branch_lens_offset();
            let is_prob = i >= layout.trim_long_probs_offset() && i < layout.insertion_params_offset();
            if v < 0.0 {
                return Err(ConfigError::BadTargetTract(format!(
                    "parameter at index {i} is negative ({v})"
                )));
            }
            if is_prob && v > 1.0 {
                return Err(ConfigError::BadTargetTract(format!(
                    "probability parameter at index {i} exceeds 1 ({v})"
                )));
            }
            if is_branch_len && v == 0.0 {
                return Err(ConfigError::BadTargetTract(format!(
                    "branch length at index {i} must be strictly positive"
                )));
            }
        }
        let tensor = Tensor::from_vec(values, layout.len(), &tensor::device())
            .map_err(|e| ConfigError::BadTargetTract(e.to_string()))?
            .to_dtype(DTYPE)
            .map_err(|e| ConfigError::BadTargetTract(e.to_string()))?;
        let var = Var::from_tensor(&tensor).map_err(|e| ConfigError::BadTargetTract(e.to_string()))?;
        Ok(Self { layout, var })
    }

    /// draws a fresh parameter vector: target rates and insertion/trim
    /// probabilities from weakly-informative priors, branch lengths from a
    /// Gamma(1, mean_branch_len) prior — the same shape=1 (exponential) family
    /// as the original's fixed `Gamma(1, 10)` branch-length prior, generalized
    /// to a caller-chosen mean instead of the hardcoded scale of 10.
    pub fn random_init(n_targets: usize, num_nodes: usize, mean_branch_len: f64, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let layout = Layout { n_targets, num_nodes };
        let mut values = vec![0.0f64; layout.len()];
        for v in values.iter_mut().take(n_targets) {
            *v = rng.gen_range(0.5..2.0);
        }
        values[layout.double_cut_weight_offset()] = rng.gen_range(0.1..1.0);
        values[layout.trim_long_probs_offset()] = rng.gen_range(0.1..0.9);
        values[layout.trim_long_probs_offset() + 1] = rng.gen_range(0.1..0.9);
        values[layout.trim_zero_prob_offset()] = rng.gen_range(0.0..0.5);
        values[layout.insertion_params_offset()] = rng.gen_range(0.0..0.5);
        values[layout.insertion_params_offset() + 1] = rng.gen_range(0.1..2.0);
        let shape = 1.0;
        let scale = mean_branch_len;
        for v in values.iter_mut().skip(layout.branch_lens_offset()) {
            *v = gamma_sample(&mut rng, shape, scale).max(1e-6);
        }
        Self::from_values(n_targets, num_nodes, values).expect("random_init respects its own invariants")
    }

    pub fn tensor(&self) -> &Tensor {
        self.var.as_tensor()
    }

    pub fn var(&self) -> &Var {
        &self.var
    }

    fn slice(&self, start: usize, len: usize) -> candle_core::Result<Tensor> {
        self.tensor().narrow(0, start, len)
    }

    pub fn target_lams(&self) -> candle_core::Result<Tensor> {
        self.slice(self.layout.target_lams_offset(), self.layout.n_targets)
    }

    pub fn double_cut_weight(&self) -> candle_core::Result<Tensor> {
        self.slice(self.layout.double_cut_weight_offset(), 1)
    }

    pub fn trim_long_probs(&self) -> candle_core::Result<Tensor> {
        self.slice(self.layout.trim_long_probs_offset(), 2)
    }

    pub fn trim_zero_prob(&self) -> candle_core::Result<Tensor> {
        self.slice(self.layout.trim_zero_prob_offset(), 1)
    }

    pub fn insertion_params(&self) -> candle_core::Result<Tensor> {
        self.slice(self.layout.insertion_params_offset(), 2)
    }

    pub fn branch_lens(&self) -> candle_core::Result<Tensor> {
        self.slice(self.layout.branch_lens_offset(), self.layout.num_nodes)
    }

    pub fn branch_len(&self, node_id: usize) -> candle_core::Result<Tensor> {
        self.slice(self.layout.branch_lens_offset() + node_id, 1)
    }
}

/// Marsaglia-Tsang gamma sampler; `shape` must be positive.
fn gamma_sample(rng: &mut SmallRng, shape: f64, scale: f64) -> f64 {
    if shape < 1.0 {
        let u: f64 = rng.gen_range(0.0..1.0);
        return gamma_sample(rng, shape + 1.0, scale) * u.powf(1.0 / shape);
    }
    let d = shape - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();
    loop {
        let (mut x, mut v);
        loop {
            x = std_normal(rng);
            v = 1.0 + c * x;
            if v > 0.0 {
                break;
            }
        }
        v = v * v * v;
        let u: f64 = rng.gen_range(0.0..1.0);
        if u < 1.0 - 0.0331 * x * x * x * x || u.ln() < 0.5 * x * x + d * (1.0 - v + v.ln()) {
            return d * v * scale;
        }
    }
}

fn std_normal(rng: &mut SmallRng) -> f64 {
    let u1: f64 = rng.gen_range(1e-12..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

impl crate::Arbitrary for Parameters {
    /// a small, always-valid parameter vector (3 targets, 2 nodes) drawn
    /// from [`Parameters::random_init`]'s own priors, for property tests
    /// that don't care about dimensions.
    fn random() -> Self {
        Parameters::random_init(3, 2, 1.0, rand::random())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Arbitrary;

    #[test]
    fn arbitrary_parameters_are_always_valid() {
        for _ in 0..20 {
            let params = Parameters::random();
            assert_eq!(params.target_lams().unwrap().dims(), &[3]);
        }
    }

    #[test]
    fn rejects_wrong_length() {
        let err = Parameters::from_values(2, 3, vec![1.0; 5]);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_negative_entry() {
        let mut values = vec![1.0; Layout { n_targets: 2, num_nodes: 3 }.len()];
        values[0] = -1.0;
        assert!(Parameters::from_values(2, 3, values).is_err());
    }

    #[test]
    fn random_init_produces_valid_parameters() {
        let params = Parameters::random_init(3, 4, 1.0, 42);
        assert_eq!(params.target_lams().unwrap().dims(), &[3]);
        assert_eq!(params.branch_lens().unwrap().dims(), &[4]);
    }

    #[test]
    fn gamma_sampler_stays_positive() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..1000 {
            assert!(gamma_sample(&mut rng, 2.0, 0.5) > 0.0);
        }
    }
}
