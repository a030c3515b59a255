//! # Delta phylogenetic signal
//!
//! Entropies of the internal-node marginals are modelled as Beta(α, β)
//! draws; α and β get exponential priors with rate `lambda0` and are sampled
//! by Metropolis-Hastings with log-normal proposals. δ = mean(β) / mean(α)
//! over two independent chains.
//!
//! ## Determinism
//!
//! Chain `i` draws from `ChaCha8Rng::seed_from_u64(seed + i)`, so a fixed
//! seed yields the same δ regardless of `threads`.

use std::sync::atomic::{AtomicBool, Ordering};

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp1, LogNormal};
use serde::{Deserialize, Serialize};

use super::acr::{leaf_states, ACREngine, Marginals};
use crate::model::Tree;
use crate::{Error, Result};

const CHAINS: u64 = 2;
const ENTROPY_FLOOR: f64 = 1e-10;
const PROPOSAL_RETRIES: usize = 100;
const PERMUTATION_STREAM: u64 = 0x9E37_79B9_7F4A_7C15;

/// How a marginal row becomes an uncertainty score in (0, 1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntropyMode {
    /// Shannon entropy after linearly flattening probabilities above 1/k.
    #[default]
    Lse,
    Shannon,
    Gini,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeltaOptions {
    pub lambda0: f64,
    /// Standard deviation of the log-normal proposal.
    pub se: f64,
    pub sim: usize,
    pub burn: usize,
    pub thin: usize,
    pub entropy: EntropyMode,
    pub seed: u64,
    pub threads: usize,
    /// Label shuffles for the p-value; 0 skips it.
    pub permutations: usize,
}

impl Default for DeltaOptions {
    fn default() -> Self {
        Self {
            lambda0: 0.1,
            se: 0.5,
            sim: 10_000,
            burn: 100,
            thin: 10,
            entropy: EntropyMode::Lse,
            seed: 42,
            threads: 1,
            permutations: 0,
        }
    }
}

impl DeltaOptions {
    fn validate(&self) -> Result<()> {
        if !(self.lambda0 > 0.0) || !(self.se > 0.0) {
            return Err(Error::InputValidation("lambda0 and se must be positive".into()));
        }
        if self.thin == 0 || self.sim <= self.burn {
            return Err(Error::InputValidation(format!(
                "need thin >= 1 and sim > burn (sim {}, burn {}, thin {})",
                self.sim, self.burn, self.thin
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaResult {
    pub prop: String,
    pub delta: f64,
    pub mean_alpha: f64,
    pub mean_beta: f64,
    pub acceptance: f64,
    pub p_value: Option<f64>,
}

// ============================================================================
// Entropy
// ============================================================================

/// Uncertainty of one marginal row, normalised to [0, 1].
pub fn row_entropy(row: &[f64], mode: EntropyMode) -> f64 {
    let k = row.len();
    if k < 2 {
        return 0.0;
    }
    let kf = k as f64;
    match mode {
        EntropyMode::Shannon => shannon(row.iter().copied()) / kf.ln(),
        EntropyMode::Lse => {
            let flat = row.iter().map(|&p| if p > 1.0 / kf { (1.0 - p) / (kf - 1.0) } else { p });
            shannon(flat) / kf.ln()
        }
        EntropyMode::Gini => {
            let g = 1.0 - row.iter().map(|p| p * p).sum::<f64>();
            g / (1.0 - 1.0 / kf)
        }
    }
}

fn shannon(ps: impl Iterator<Item = f64>) -> f64 {
    ps.filter(|p| *p > 0.0).map(|p| -p * p.ln()).sum()
}

/// Row entropies clamped away from 0 and 1.
pub fn entropies(marginals: &Marginals, mode: EntropyMode) -> Vec<f64> {
    marginals
        .rows
        .iter()
        .map(|(_, row)| row_entropy(row, mode).clamp(ENTROPY_FLOOR, 1.0 - ENTROPY_FLOOR))
        .collect()
}

// ============================================================================
// Sampler
// ============================================================================

/// Lanczos approximation (g = 7, n = 9).
pub fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEF: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).abs().ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + G + 0.5;
    let series = COEF[1..]
        .iter()
        .enumerate()
        .fold(COEF[0], |acc, (i, c)| acc + c / (x + i as f64 + 1.0));
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

/// Sufficient statistics of the entropies.
struct Evidence {
    n: f64,
    sum_ln_x: f64,
    sum_ln_1mx: f64,
}

impl Evidence {
    fn new(xs: &[f64]) -> Self {
        Self {
            n: xs.len() as f64,
            sum_ln_x: xs.iter().map(|x| x.ln()).sum(),
            sum_ln_1mx: xs.iter().map(|x| (1.0 - x).ln()).sum(),
        }
    }

    fn lp_alpha(&self, a: f64, b: f64, l0: f64) -> f64 {
        self.n * (ln_gamma(a + b) - ln_gamma(a)) - a * (l0 - self.sum_ln_x)
    }

    fn lp_beta(&self, a: f64, b: f64, l0: f64) -> f64 {
        self.n * (ln_gamma(a + b) - ln_gamma(b)) - b * (l0 - self.sum_ln_1mx)
    }
}

struct Chain {
    alpha: Vec<f64>,
    beta: Vec<f64>,
    accepted: usize,
    steps: usize,
}

fn metropolis<R: Rng>(
    rng: &mut R,
    current: f64,
    se: f64,
    log_post: impl Fn(f64) -> f64,
) -> Result<(f64, bool)> {
    let proposal = LogNormal::new(current.ln(), se).map_err(|e| Error::InputValidation(e.to_string()))?;
    let base = log_post(current);
    for _ in 0..PROPOSAL_RETRIES {
        let candidate = proposal.sample(rng);
        let diff = log_post(candidate) - base;
        if diff.is_nan() {
            continue;
        }
        let u: f64 = rng.gen_range(0.0..1.0);
        return Ok(if u < diff.exp().min(1.0) { (candidate, true) } else { (current, false) });
    }
    Ok((current, false))
}

fn run_chain(evidence: &Evidence, opts: &DeltaOptions, seed: u64) -> Result<Chain> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut alpha: f64 = Exp1.sample(&mut rng);
    let mut beta: f64 = Exp1.sample(&mut rng);
    let kept = (opts.sim - opts.burn).div_ceil(opts.thin);
    let mut chain = Chain {
        alpha: Vec::with_capacity(kept),
        beta: Vec::with_capacity(kept),
        accepted: 0,
        steps: opts.sim,
    };

    for i in 0..opts.sim {
        let flip: f64 = rng.gen_range(0.0..1.0);
        let moved = if flip > 0.5 {
            let (a, ok) = metropolis(&mut rng, alpha, opts.se, |a| evidence.lp_alpha(a, beta, opts.lambda0))?;
            alpha = a;
            ok
        } else {
            let (b, ok) = metropolis(&mut rng, beta, opts.se, |b| evidence.lp_beta(alpha, b, opts.lambda0))?;
            beta = b;
            ok
        };
        chain.accepted += usize::from(moved);
        if i >= opts.burn && (i - opts.burn) % opts.thin == 0 {
            chain.alpha.push(alpha);
            chain.beta.push(beta);
        }
    }
    Ok(chain)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    sum / n.max(1) as f64
}

fn cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|c| c.load(Ordering::Relaxed))
}

/// δ for already-reconstructed marginals.
pub fn delta(marginals: &Marginals, opts: &DeltaOptions, cancel: Option<&AtomicBool>) -> Result<DeltaResult> {
    opts.validate()?;
    if marginals.is_empty() {
        return Err(Error::InputValidation("no internal node to score".into()));
    }
    let evidence = Evidence::new(&entropies(marginals, opts.entropy));

    let chains: Vec<Chain> = if opts.threads > 1 {
        if cancelled(cancel) {
            return Err(Error::Cancelled);
        }
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..CHAINS)
                .map(|i| {
                    let evidence = &evidence;
                    s.spawn(move || run_chain(evidence, opts, opts.seed.wrapping_add(i)))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|_| Err(Error::External("sampler thread panicked".into()))))
                .collect::<Result<Vec<_>>>()
        })?
    } else {
        let mut out = Vec::new();
        for i in 0..CHAINS {
            if cancelled(cancel) {
                return Err(Error::Cancelled);
            }
            out.push(run_chain(&evidence, opts, opts.seed.wrapping_add(i))?);
        }
        out
    };

    let mean_alpha = mean(chains.iter().flat_map(|c| c.alpha.iter().copied()));
    let mean_beta = mean(chains.iter().flat_map(|c| c.beta.iter().copied()));
    let accepted: usize = chains.iter().map(|c| c.accepted).sum();
    let steps: usize = chains.iter().map(|c| c.steps).sum();

    let result = DeltaResult {
        prop: String::new(),
        delta: mean_beta / mean_alpha,
        mean_alpha,
        mean_beta,
        acceptance: accepted as f64 / steps.max(1) as f64,
        p_value: None,
    };
    tracing::debug!(delta = result.delta, acceptance = result.acceptance, "delta sampled");
    Ok(result)
}

/// δ for leaf property `prop`, reconstructing with `engine`. With
/// `permutations > 0` the leaf states are shuffled that many times and the
/// p-value is the share of shuffles whose δ reaches the observed one.
pub fn delta_for_trait(
    tree: &Tree,
    prop: &str,
    engine: &dyn ACREngine,
    opts: &DeltaOptions,
    cancel: Option<&AtomicBool>,
) -> Result<DeltaResult> {
    let states = leaf_states(tree, prop);
    if states.is_empty() {
        return Err(Error::InputValidation(format!("no leaf carries '{prop}'")));
    }
    let marginals = engine.marginals(tree, &states)?;
    let mut result = delta(&marginals, opts, cancel)?;
    result.prop = prop.to_string();

    if opts.permutations > 0 {
        let mut rng = ChaCha8Rng::seed_from_u64(opts.seed ^ PERMUTATION_STREAM);
        let ids: Vec<_> = states.iter().map(|(id, _)| *id).collect();
        let mut labels: Vec<String> = states.into_iter().map(|(_, s)| s).collect();
        let mut hits = 0usize;
        for _ in 0..opts.permutations {
            if cancelled(cancel) {
                return Err(Error::Cancelled);
            }
            labels.shuffle(&mut rng);
            let shuffled: Vec<_> = ids.iter().copied().zip(labels.iter().cloned()).collect();
            let null = delta(&engine.marginals(tree, &shuffled)?, opts, cancel)?;
            hits += usize::from(null.delta >= result.delta);
        }
        result.p_value = Some(hits as f64 / opts.permutations as f64);
    }

    tracing::info!(prop, delta = result.delta, p_value = ?result.p_value, "phylogenetic signal estimated");
    Ok(result)
}
