//! Synthetic observables for tests and tuning: pseudo observables with
//! prescribed mean and error, and multivariate AR(1) series with prescribed
//! covariance and integrated autocorrelation time.

use crate::error::GammetError;
use crate::gamma::GammaOptions;
use crate::obs::Obs;
use ndarray::{Array1, Array2};
use ndarray_linalg::{Cholesky, UPLO};
use ndarray_rand::rand_distr::Normal;
use rand::{thread_rng, Rng};

/// Generate an observable whose estimator reproduces the requested mean
/// exactly and the requested error to high accuracy. Uses the thread-local
/// RNG; see [`pseudo_obs_using`] for an explicit generator handle.
///
/// A non-positive `dvalue` yields a constant observable of length `samples`.
pub fn pseudo_obs(value: f64, dvalue: f64, name: &str, samples: usize) -> Result<Obs, GammetError> {
    pseudo_obs_using(value, dvalue, name, samples, &mut thread_rng())
}

/// [`pseudo_obs`] with an explicit random generator.
///
/// The sample is drawn once, then refined for up to 100 iterations by
/// rescaling the deltas with the ratio of requested to estimated error. The
/// gamma-method estimate is exactly linear in the deltas, so the refinement
/// reaches the `1e-10 * dvalue` target immediately; if it ever does not, the
/// best effort is returned with a logged warning.
pub fn pseudo_obs_using<R: Rng + ?Sized>(
    value: f64,
    dvalue: f64,
    name: &str,
    samples: usize,
    rng: &mut R,
) -> Result<Obs, GammetError> {
    if samples == 0 {
        return Err(GammetError::ShapeMismatch(
            "pseudo_obs requires at least one sample".into(),
        ));
    }
    if !dvalue.is_finite() || !value.is_finite() {
        return Err(GammetError::InvalidOperation(
            "value and dvalue have to be finite".into(),
        ));
    }
    if dvalue <= 0.0 {
        return Obs::new(
            vec![Array1::from_elem(samples, value)],
            vec![name.to_string()],
        );
    }

    let n = samples as f64;
    let normal = Normal::new(0.0, dvalue * n.sqrt())
        .map_err(|_| GammetError::InvalidOperation("Invalid normal distribution".into()))?;
    let raw: Array1<f64> = (0..samples).map(|_| rng.sample(normal)).collect();
    let mut obs = Obs::new(vec![raw + value], vec![name.to_string()])?;

    // Naive starting scale: match sqrt(var / N) to the requested error.
    let d = &obs.deltas[name];
    let naive = (d.dot(d) / n / n).sqrt();
    if naive > 0.0 {
        obs = rescaled(&obs, name, dvalue / naive, value)?;
    }

    let opt = GammaOptions {
        s_tau: 2.0,
        tau_exp: 0.0,
        ..Default::default()
    };
    let mut converged = false;
    for _ in 0..100 {
        obs.gamma_method_with(&opt)?;
        let est = obs.dvalue();
        if (est - dvalue).abs() < 1e-10 * dvalue {
            converged = true;
            break;
        }
        if est == 0.0 {
            break;
        }
        obs = rescaled(&obs, name, dvalue / est, value)?;
    }
    if !converged {
        log::warn!(
            "pseudo_obs did not converge to the requested dvalue {}, returning best effort",
            dvalue
        );
    }

    obs.value = value;
    obs.r_values.insert(name.to_string(), value);
    obs.analysis = None;
    Ok(obs)
}

fn rescaled(obs: &Obs, name: &str, scale: f64, value: f64) -> Result<Obs, GammetError> {
    let sample = obs.deltas[name].mapv(|d| d * scale) + value;
    Obs::new(vec![sample], vec![name.to_string()])
}

/// Generate observables with a given covariance matrix and integrated
/// autocorrelation times on a fresh ensemble. Uses the thread-local RNG; see
/// [`gen_correlated_data_using`] for an explicit generator handle.
pub fn gen_correlated_data(
    means: &[f64],
    cov: &Array2<f64>,
    name: &str,
    tau: &[f64],
    samples: usize,
) -> Result<Vec<Obs>, GammetError> {
    gen_correlated_data_using(means, cov, name, tau, samples, &mut thread_rng())
}

/// [`gen_correlated_data`] with an explicit random generator.
///
/// `tau` holds either one shared integrated autocorrelation time or one per
/// observable; each has to be at least 0.5 (the uncorrelated limit). The
/// series follow an AR(1) recursion with coefficient `a = (2tau-1)/(2tau+1)`
/// on top of a multivariate normal base sample whose empirical covariance is
/// normalized to the request.
pub fn gen_correlated_data_using<R: Rng + ?Sized>(
    means: &[f64],
    cov: &Array2<f64>,
    name: &str,
    tau: &[f64],
    samples: usize,
    rng: &mut R,
) -> Result<Vec<Obs>, GammetError> {
    let k = means.len();
    if k == 0 {
        return Err(GammetError::ShapeMismatch(
            "means must not be empty".into(),
        ));
    }
    if cov.dim() != (k, k) {
        return Err(GammetError::ShapeMismatch(format!(
            "Covariance matrix is {:?}, expected ({}, {})",
            cov.dim(),
            k,
            k
        )));
    }
    if samples < 2 {
        return Err(GammetError::ShapeMismatch(
            "At least two samples are required".into(),
        ));
    }
    let taus: Vec<f64> = match tau.len() {
        1 => vec![tau[0]; k],
        l if l == k => tau.to_vec(),
        _ => {
            return Err(GammetError::ShapeMismatch(format!(
                "Got {} autocorrelation times for {} observables",
                tau.len(),
                k
            )))
        }
    };
    if taus.iter().any(|&t| t < 0.5) {
        return Err(GammetError::InvalidOperation(
            "All integrated autocorrelation times have to be >= 0.5".into(),
        ));
    }

    let a: Vec<f64> = taus.iter().map(|t| (2.0 * t - 1.0) / (2.0 * t + 1.0)).collect();
    let n = samples as f64;

    // Base sample ~ MVN(0, cov * samples) via the Cholesky factor.
    let chol = (cov * n).cholesky(UPLO::Lower)?;
    let normal = Normal::new(0.0, 1.0)
        .map_err(|_| GammetError::InvalidOperation("Invalid normal distribution".into()))?;
    let mut base = Array2::<f64>::zeros((samples, k));
    for mut row in base.rows_mut() {
        let z: Array1<f64> = (0..k).map(|_| rng.sample(normal)).collect();
        row.assign(&chol.dot(&z));
    }

    // Normalize each column so the empirical variance matches the request.
    for j in 0..k {
        let col = base.column(j);
        let mean = col.sum() / n;
        let var = col.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let norm = var / n;
        let scale = (cov[[j, j]] / norm).sqrt();
        base.column_mut(j).mapv_inplace(|x| x * scale);
    }

    // AR(1) recursion with exponential autocorrelation.
    let mut data = Array2::<f64>::zeros((samples, k));
    data.row_mut(0).assign(&base.row(0));
    for i in 1..samples {
        for j in 0..k {
            data[[i, j]] =
                (1.0 - a[j] * a[j]).sqrt() * base[[i, j]] + a[j] * data[[i - 1, j]];
        }
    }

    // Center each series on the requested mean and wrap into observables.
    let mut result = Vec::with_capacity(k);
    for j in 0..k {
        let col = data.column(j);
        let mean = col.sum() / n;
        let series = col.mapv(|x| x - mean + means[j]);
        result.push(Obs::new(vec![series], vec![name.to_string()])?);
    }
    Ok(result)
}
