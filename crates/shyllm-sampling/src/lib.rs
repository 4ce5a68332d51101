//! # shyllm-sampling
//!
//! Picks the next token from a logit vector.
//!
//! Supports:
//! - Greedy decoding (`temperature == 0`, or too small to scale by)
//! - Temperature scaling
//! - Top-k filtering
//! - Top-p (nucleus) filtering
//! - Seeded RNG so a fixed seed reproduces the same token sequence

use std::cmp::Ordering;

/// Temperatures below this decode greedily; dividing by them overflows `f32`.
pub const MIN_TEMPERATURE: f32 = 1e-6;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SamplingError {
    #[error("logits are empty")]
    EmptyLogits,
    #[error("temperature must be finite and non-negative (got {0})")]
    InvalidTemperature(f32),
    #[error("top_p must be in (0, 1] (got {0})")]
    InvalidTopP(f32),
    #[error("no token has non-zero probability after filtering")]
    NoValidTokens,
}

pub type SamplingResult<T> = std::result::Result<T, SamplingError>;

/// xorshift64 generator. Small, fast and fully determined by its seed.
#[derive(Debug, Clone)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    /// Seeds are scrambled with splitmix64 first, so nearby seeds give
    /// unrelated streams.
    pub fn new(seed: u64) -> Self {
        let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        // xorshift never leaves the all-zero state
        Self {
            state: if z == 0 { 1 } else { z },
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Uniform float in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }
}

/// Sampling hyperparameters, independent of RNG state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_k: Option<usize>,
    pub top_p: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_k: None,
            top_p: 1.0,
        }
    }
}

impl SamplingParams {
    pub fn greedy() -> Self {
        Self {
            temperature: 0.0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> SamplingResult<()> {
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(SamplingError::InvalidTemperature(self.temperature));
        }
        if self.top_p.is_nan() || self.top_p <= 0.0 || self.top_p > 1.0 {
            return Err(SamplingError::InvalidTopP(self.top_p));
        }
        Ok(())
    }
}

/// Stateful sampler: parameters plus the RNG stream for one generation.
#[derive(Debug, Clone)]
pub struct Sampler {
    params: SamplingParams,
    rng: SeededRng,
}

impl Sampler {
    pub fn new(params: SamplingParams, seed: u64) -> SamplingResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            rng: SeededRng::new(seed),
        })
    }

    pub fn params(&self) -> &SamplingParams {
        &self.params
    }

    /// Sample a token index. Tokens set to `-inf` are never chosen.
    pub fn sample(&mut self, logits: &[f32]) -> SamplingResult<usize> {
        if logits.is_empty() {
            return Err(SamplingError::EmptyLogits);
        }

        if self.params.temperature < MIN_TEMPERATURE {
            return argmax(logits).ok_or(SamplingError::NoValidTokens);
        }

        let mut scaled: Vec<f32> = logits
            .iter()
            .map(|&l| l / self.params.temperature)
            .collect();
        let peak = scaled.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if !peak.is_finite() {
            // Scaling overflowed; the limit of the distribution is the argmax.
            return argmax(logits).ok_or(SamplingError::NoValidTokens);
        }
        if let Some(k) = self.params.top_k {
            keep_top_k(&mut scaled, k);
        }

        let mut probs = softmax(&scaled);
        if self.params.top_p < 1.0 {
            keep_top_p(&mut probs, self.params.top_p);
        }

        self.draw(&probs)
    }

    fn draw(&mut self, probs: &[f32]) -> SamplingResult<usize> {
        let total: f32 = probs.iter().sum();
        if total.is_nan() || total <= 0.0 {
            return Err(SamplingError::NoValidTokens);
        }

        let target = self.rng.next_f32() * total;
        let mut cumulative = 0.0;
        for (i, &p) in probs.iter().enumerate() {
            cumulative += p;
            if target < cumulative {
                return Ok(i);
            }
        }

        // Rounding left the target past the last bucket.
        probs
            .iter()
            .rposition(|&p| p > 0.0)
            .ok_or(SamplingError::NoValidTokens)
    }
}

fn argmax(logits: &[f32]) -> Option<usize> {
    logits
        .iter()
        .enumerate()
        .filter(|(_, l)| !l.is_nan() && **l > f32::NEG_INFINITY)
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(Ordering::Equal))
        .map(|(i, _)| i)
}

/// Numerically stable softmax. All `-inf` input yields all zeros.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max == f32::NEG_INFINITY {
        return vec![0.0; logits.len()];
    }
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn keep_top_k(logits: &mut [f32], k: usize) {
    if k == 0 || k >= logits.len() {
        return;
    }
    let mut sorted = logits.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));
    let threshold = sorted[k - 1];
    for logit in logits.iter_mut() {
        if *logit < threshold {
            *logit = f32::NEG_INFINITY;
        }
    }
}

/// Zero out everything outside the smallest set of tokens whose mass reaches `p`.
fn keep_top_p(probs: &mut [f32], p: f32) {
    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&a, &b| probs[b].partial_cmp(&probs[a]).unwrap_or(Ordering::Equal));

    let mut cumulative = 0.0;
    let mut keep = order.len();
    for (rank, &idx) in order.iter().enumerate() {
        cumulative += probs[idx];
        if cumulative >= p {
            keep = rank + 1;
            break;
        }
    }
    for &idx in &order[keep..] {
        probs[idx] = 0.0;
    }
}
