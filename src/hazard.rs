//! pure hazard functions (§4.3): the event hazard, the total hazard away
//! from a tts, and the conditional probability of a concrete `Singleton`
//! given its `TargetTract` fired. Everything here is built from
//! `candle_core::Tensor` so gradients flow back to `Parameters`.

use crate::indel::{Singleton, TargetTract, TtsTuple};
use crate::params::Parameters;
use crate::tensor;
use candle_core::{Result, Tensor};

/// `h(e) = λ[a] · (λ[b] if b≠a else 1) · (pL if left-long else 1-pL) ·
/// (pR if right-long else 1-pR) · (w if b≠a else 1)`, a scalar tensor.
pub fn hazard_event(e: &TargetTract, params: &Parameters) -> Result<Tensor> {
    let lams = params.target_lams()?;
    let a = e.min_cut;
    let b = e.max_cut;
    let is_double = b != a;

    let term_a = lams.narrow(0, a, 1)?;
    let term_b = if is_double { lams.narrow(0, b, 1)? } else { tensor::scalar(1.0)?.reshape(1)? };

    let trim_long = params.trim_long_probs()?;
    let p_left = trim_long.narrow(0, 0, 1)?;
    let p_right = trim_long.narrow(0, 1, 1)?;
    let left_term = if e.is_left_long { p_left } else { p_left.affine(-1.0, 1.0)? };
    let right_term = if e.is_right_long { p_right } else { p_right.affine(-1.0, 1.0)? };

    let weight = if is_double { params.double_cut_weight()? } else { tensor::scalar(1.0)?.reshape(1)? };

    (((term_a.mul(&term_b))?.mul(&left_term))?.mul(&right_term))?.mul(&weight)
}

/// targets not deactivated by any event in `tts`.
fn active_mask(tts: &TtsTuple, n_targets: usize) -> Vec<bool> {
    let mut active = vec![true; n_targets];
    for e in tts.events() {
        for t in e.min_deact..=e.max_deact {
            active[t] = false;
        }
    }
    active
}

/// every `TargetTract` one step reachable from `tts`: single-target and
/// double-target cuts over contiguous runs of still-active targets, with
/// long-trim flags permitted only when the adjoining target is already
/// deactivated.
pub fn admissible_events(tts: &TtsTuple, n_targets: usize) -> Vec<TargetTract> {
    let active = active_mask(tts, n_targets);
    let mut events = Vec::new();
    for a in 0..n_targets {
        if !active[a] {
            continue;
        }
        let left_options: &[bool] = if a == 0 || active[a - 1] { &[false] } else { &[false, true] };
        for b in a..n_targets {
            if !active[b] {
                break;
            }
            let right_options: &[bool] =
                if b == n_targets - 1 || active[b + 1] { &[false] } else { &[false, true] };
            for &is_left_long in left_options {
                for &is_right_long in right_options {
                    let min_deact = if is_left_long { a - 1 } else { a };
                    let max_deact = if is_right_long { b + 1 } else { b };
                    events.push(TargetTract {
                        min_deact,
                        min_cut: a,
                        max_cut: b,
                        max_deact,
                        is_left_long,
                        is_right_long,
                    });
                }
            }
        }
    }
    events
}

/// total hazard of leaving `tts`, the sum of `hazard_event` over every
/// admissible event; the rate into the unlikely sink is `hazard_away` minus
/// whatever of it is captured by the node's transition skeleton.
pub fn hazard_away(tts: &TtsTuple, n_targets: usize, params: &Parameters) -> Result<Tensor> {
    let mut total = tensor::scalar(0.0)?.reshape(1)?;
    for e in admissible_events(tts, n_targets) {
        total = total.add(&hazard_event(&e, params)?)?;
    }
    Ok(total)
}

/// conditional probability of realizing `singleton`, given that its
/// `target_tract` fired: the product of left/right trim-length
/// probabilities, insertion-length probability, and insertion-sequence
/// probability `1/4^insert_len`.
pub fn singleton_log_prob(singleton: &Singleton, meta: &crate::barcode::BarcodeMeta, params: &Parameters) -> Result<Tensor> {
    let tt = &singleton.target_tract;
    let trim_zero = params.trim_zero_prob()?;
    let insertion = params.insertion_params()?;
    let insert_zero = insertion.narrow(0, 0, 1)?;
    let insert_rate = insertion.narrow(0, 1, 1)?;

    let left_trim_len = (meta.abs_cut_site(tt.min_cut) - singleton.start_pos).max(0) as f64;
    let right_trim_len = ((singleton.end_pos()) - meta.abs_cut_site(tt.max_cut)).max(0) as f64;

    let left_range = if tt.is_left_long {
        (meta.left_max_trim(tt.min_cut) - meta.left_long_trim_min(tt.min_cut) + 1) as f64
    } else {
        (meta.left_long_trim_min(tt.min_cut) + 1) as f64
    };
    let right_range = if tt.is_right_long {
        (meta.right_max_trim(tt.max_cut) - meta.right_long_trim_min(tt.max_cut) + 1) as f64
    } else {
        (meta.right_long_trim_min(tt.max_cut) + 1) as f64
    };

    let left_uniform = tensor::scalar(1.0 / left_range.max(1.0))?.reshape(1)?;
    let right_uniform = tensor::scalar(1.0 / right_range.max(1.0))?.reshape(1)?;

    // zero-inflation only applies to the degenerate (zero-length) trim on a
    // short side; long trims are never zero-inflated. mixture: p0 = trim_zero
    // + (1 - trim_zero) * uniform(0).
    let one_minus_trim_zero = trim_zero.affine(-1.0, 1.0)?;
    let left_prob = if !tt.is_left_long && left_trim_len == 0.0 {
        trim_zero.add(&one_minus_trim_zero.mul(&left_uniform)?)?
    } else {
        left_uniform.clone()
    };
    let right_prob = if !tt.is_right_long && right_trim_len == 0.0 {
        trim_zero.add(&one_minus_trim_zero.mul(&right_uniform)?)?
    } else {
        right_uniform.clone()
    };

    // boost (deviation, recorded in DESIGN.md's `indel/` entry):
    // `allele_simulator_simult.py::_do_repair` reallocates one unit of
    // length to exactly one of insert/left-trim/right-trim via a 3-way
    // multinomial whenever every side is short, independent of whether the
    // other two are already zero. That multinomial's weights (`boost_probs`)
    // are a simulator-only parameter with no counterpart in the likelihood
    // model this crate evaluates (`_create_del_probs`/`_create_insert_probs`
    // carry no boost term at all — zero-inflation is the only adjustment
    // near a zero-length draw). Marginalizing over the true 3-way choice
    // would mean fabricating `boost_probs` as a model parameter, so this
    // narrows the reallocation to the fully-degenerate all-zero observation
    // only, boosting insert_len by one unit there.
    let all_short = !tt.is_left_long && !tt.is_right_long;
    let boost = if all_short && singleton.insert_len == 0 && left_trim_len == 0.0 && right_trim_len == 0.0 {
        1.0
    } else {
        0.0
    };
    let effective_insert_len = (singleton.insert_len as f64 + boost).max(0.0);

    let poisson_at_len = poisson_pmf(effective_insert_len, &insert_rate)?;
    let insert_len_prob = if singleton.insert_len == 0 {
        let one_minus_insert_zero = insert_zero.affine(-1.0, 1.0)?;
        insert_zero.add(&one_minus_insert_zero.mul(&poisson_at_len)?)?
    } else {
        poisson_at_len
    };

    let insert_seq_prob = tensor::scalar(0.25f64.powi(singleton.insert_len as i32))?.reshape(1)?;

    let p = ((left_prob.mul(&right_prob))?.mul(&insert_len_prob))?.mul(&insert_seq_prob)?;
    p.log()
}

/// Poisson pmf `λ^k e^-λ / k!` evaluated at `k`, with `λ` a differentiable
/// scalar tensor.
fn poisson_pmf(k: f64, lambda: &Tensor) -> Result<Tensor> {
    let log_lambda = lambda.log()?;
    let log_numer = log_lambda.affine(k, 0.0)?;
    let log_fact = (1..=k as u64).map(|i| (i as f64).ln()).sum::<f64>();
    let log_pmf = log_numer.sub(lambda)?.affine(1.0, -log_fact)?;
    log_pmf.exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barcode::BarcodeMeta;

    fn params() -> Parameters {
        Parameters::random_init(3, 1, 1.0, 1)
    }

    #[test]
    fn admissible_events_includes_every_focal_cut_when_fully_active() {
        let tts = TtsTuple::empty();
        let events = admissible_events(&tts, 3);
        let focal_count = events.iter().filter(|e| e.is_focal() && !e.is_left_long && !e.is_right_long).count();
        assert_eq!(focal_count, 3);
    }

    #[test]
    fn admissible_events_excludes_inactive_targets() {
        let tt = TargetTract::focal(1);
        let tts = TtsTuple::new(vec![tt]).unwrap();
        let events = admissible_events(&tts, 3);
        assert!(events.iter().all(|e| e.min_cut != 1 && e.max_cut != 1));
    }

    #[test]
    fn hazard_event_is_positive_and_finite() {
        let e = TargetTract::focal(0);
        let h = hazard_event(&e, &params()).unwrap();
        let v = h.reshape(()).unwrap().to_scalar::<f64>().unwrap();
        assert!(v.is_finite() && v > 0.0);
    }

    #[test]
    fn hazard_away_dominates_any_single_event() {
        let tts = TtsTuple::empty();
        let p = params();
        let away = hazard_away(&tts, 3, &p).unwrap().reshape(()).unwrap().to_scalar::<f64>().unwrap();
        let e = TargetTract::focal(0);
        let single = hazard_event(&e, &p).unwrap().reshape(()).unwrap().to_scalar::<f64>().unwrap();
        assert!(away >= single - 1e-9);
    }

    #[test]
    fn singleton_log_prob_is_finite() {
        let meta = BarcodeMeta::new(vec![0, 10, 20], vec![5; 3], vec![5; 3], vec![2; 3], vec![2; 3]).unwrap();
        let tt = TargetTract::focal(1);
        let singleton = Singleton::new(tt, meta.abs_cut_site(1), 0, 0, &meta).unwrap();
        let p = singleton_log_prob(&singleton, &meta, &params()).unwrap();
        let v = p.reshape(()).unwrap().to_scalar::<f64>().unwrap();
        assert!(v.is_finite());
    }
}
