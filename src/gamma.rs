use crate::error::GammetError;
use crate::idl::{self, IndexList};
use crate::obs::Obs;
use ndarray::Array1;
use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;
use std::collections::BTreeMap;

/// Configuration of the gamma-method error estimator.
///
/// `s_tau` is the window-selection constant of the automatic (Madras-Sokal)
/// criterion. A positive `tau_exp` switches to the tail-extended criterion,
/// in which the window is placed where the autocorrelation function stops
/// being significant at `n_sigma` standard deviations and the slow mode is
/// accounted for by an exponential of characteristic time `tau_exp`; `s_tau`
/// does not participate there. `e_tag` overrides the `ensemble|replica`
/// naming convention by truncating replica names to the first `e_tag`
/// characters (0 pools everything into a single ensemble).
#[derive(Debug, Clone)]
pub struct GammaOptions {
    pub s_tau: f64,
    pub tau_exp: f64,
    pub n_sigma: f64,
    pub fft: bool,
    pub e_tag: Option<usize>,
}

impl Default for GammaOptions {
    fn default() -> Self {
        GammaOptions {
            s_tau: 2.0,
            tau_exp: 0.0,
            n_sigma: 1.0,
            fft: true,
            e_tag: None,
        }
    }
}

impl GammaOptions {
    fn validate(&self) -> Result<(), GammetError> {
        if !(self.s_tau > 0.0 && self.s_tau.is_finite()) {
            return Err(GammetError::InvalidOperation(
                "S has to be a positive number".into(),
            ));
        }
        if !(self.tau_exp >= 0.0 && self.tau_exp.is_finite()) {
            return Err(GammetError::InvalidOperation(
                "tau_exp has to be non-negative".into(),
            ));
        }
        if !(self.n_sigma > 0.0 && self.n_sigma.is_finite()) {
            return Err(GammetError::InvalidOperation(
                "N_sigma has to be a positive number".into(),
            ));
        }
        Ok(())
    }
}

/// Per-ensemble output of the estimator.
#[derive(Debug, Clone)]
pub struct EnsembleAnalysis {
    pub tau_int: f64,
    pub dtau_int: f64,
    /// Error contribution of this ensemble.
    pub dvalue: f64,
    pub ddvalue: f64,
    /// Chosen summation window.
    pub window: usize,
    /// Normalized autocorrelation function rho(t), t = 0..w_max.
    pub rho: Array1<f64>,
    /// Madras-Sokal error on rho, filled as far as the window search needed it.
    pub drho: Array1<f64>,
    /// Running integrated autocorrelation time tau_int(W).
    pub tau_int_history: Array1<f64>,
    /// Number of measurements in this ensemble.
    pub n_eff: f64,
    /// Replica names grouped into this ensemble, sorted.
    pub replicas: Vec<String>,
    /// Set when the chain was too short for windowing (warning state).
    pub short_chain: bool,
}

/// Result of a `gamma_method` run, cached on the observable.
#[derive(Debug, Clone)]
pub struct ErrorAnalysis {
    pub dvalue: f64,
    pub ddvalue: f64,
    pub ensembles: BTreeMap<String, EnsembleAnalysis>,
    /// The options the analysis was run with.
    pub options: GammaOptions,
}

impl Obs {
    /// Estimate the statistical error with the default options
    /// (S = 2, no tail extension, FFT, `ensemble|replica` naming).
    pub fn gamma_method(&mut self) -> Result<(), GammetError> {
        self.gamma_method_with(&GammaOptions::default())
    }

    /// Estimate the statistical error of this observable with the gamma
    /// method (autocorrelation-aware variance estimation with automatic
    /// windowing, per ensemble, aggregated in quadrature).
    ///
    /// The run replaces any previous analysis completely; calling it twice
    /// with the same options yields bit-for-bit identical results.
    pub fn gamma_method_with(&mut self, options: &GammaOptions) -> Result<(), GammetError> {
        options.validate()?;
        let content = ensemble_content(&self.names, options.e_tag);

        let mut ensembles = BTreeMap::new();
        let mut dvalue_sq = 0.0;
        let mut ddvalue_sq = 0.0;
        for (e_name, replicas) in content {
            let ens = analyze_ensemble(self, &replicas, options);
            dvalue_sq += ens.dvalue * ens.dvalue;
            ddvalue_sq += (ens.dvalue * ens.ddvalue).powi(2);
            ensembles.insert(e_name, ens);
        }
        let dvalue = dvalue_sq.sqrt();
        let ddvalue = if dvalue > 0.0 {
            ddvalue_sq.sqrt() / dvalue
        } else {
            0.0
        };

        self.analysis = Some(ErrorAnalysis {
            dvalue,
            ddvalue,
            ensembles,
            options: options.clone(),
        });
        Ok(())
    }
}

/// Ensemble name of a replica: explicit `ensemble|replica` split, or prefix
/// truncation when `e_tag` is given.
pub(crate) fn ensemble_name(replica: &str, e_tag: Option<usize>) -> String {
    match e_tag {
        Some(k) => replica.chars().take(k).collect(),
        None => replica.split('|').next().unwrap_or(replica).to_string(),
    }
}

fn ensemble_content(names: &[String], e_tag: Option<usize>) -> BTreeMap<String, Vec<String>> {
    let mut content: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for name in names {
        content
            .entry(ensemble_name(name, e_tag))
            .or_default()
            .push(name.clone());
    }
    for replicas in content.values_mut() {
        replicas.sort();
    }
    content
}

fn analyze_ensemble(obs: &Obs, replicas: &[String], opt: &GammaOptions) -> EnsembleAnalysis {
    let mut n_e = 0usize;
    let mut min_span = usize::MAX;
    for r in replicas {
        n_e += obs.idl[r].len();
        min_span = min_span.min(obs.idl[r].span());
    }
    let n_eff = n_e as f64;
    let w_max = min_span / 2;
    let short = n_e < 4 || w_max < 2;
    let n_lags = if short { 1 } else { w_max };

    // Pooled autocorrelation function, replicas weighted by measurement count.
    let mut gamma = vec![0.0; n_lags];
    for r in replicas {
        let g_r = replica_gamma(&obs.deltas[r], &obs.idl[r], n_lags, opt.fft);
        let weight = obs.idl[r].len() as f64 / n_eff;
        for (acc, g) in gamma.iter_mut().zip(g_r) {
            *acc += weight * g;
        }
    }

    if gamma[0] == 0.0 {
        // Constant observable: no fluctuations at all.
        let mut rho = Array1::<f64>::zeros(n_lags);
        rho[0] = 1.0;
        return EnsembleAnalysis {
            tau_int: 0.5,
            dtau_int: 0.0,
            dvalue: 0.0,
            ddvalue: 0.0,
            window: 0,
            rho,
            drho: Array1::zeros(n_lags),
            tau_int_history: Array1::from_elem(n_lags, 0.5),
            n_eff,
            replicas: replicas.to_vec(),
            short_chain: short,
        };
    }

    if short {
        log::warn!(
            "Ensemble of replicas {:?} has too little data for windowing (N = {}, w_max = {}), \
             using tau_int = 0.5",
            replicas,
            n_e,
            w_max
        );
        let dvalue = (gamma[0] / n_eff).sqrt();
        return EnsembleAnalysis {
            tau_int: 0.5,
            dtau_int: 0.0,
            dvalue,
            ddvalue: dvalue * (0.5 / n_eff).sqrt(),
            window: 0,
            rho: Array1::from_elem(1, 1.0),
            drho: Array1::zeros(1),
            tau_int_history: Array1::from_elem(1, 0.5),
            n_eff,
            replicas: replicas.to_vec(),
            short_chain: true,
        };
    }

    let rho: Vec<f64> = gamma.iter().map(|g| g / gamma[0]).collect();
    let mut tau_hist = vec![0.5; w_max];
    for w in 1..w_max {
        tau_hist[w] = tau_hist[w - 1] + rho[w];
    }

    let mut drho = vec![0.0; w_max];
    let window;
    let tau_raw;
    // Extra variance on tau_int from the tail extension, zero otherwise.
    let mut tail_dtau_sq = 0.0;

    if opt.tau_exp > 0.0 {
        // Window where rho stops being significant at n_sigma standard
        // deviations, then an exponential tail of characteristic time
        // tau_exp accounts for the slowest mode. S is not used here.
        let w_half = (w_max / 2).max(2);
        let w_stop = w_half.saturating_sub(2).max(1);
        let mut chosen = w_stop;
        for w in 1..w_half {
            drho[w] = madras_sokal_drho(&rho, w, n_eff);
            if rho[w] - opt.n_sigma * drho[w] <= 0.0 || w >= w_stop {
                chosen = w;
                break;
            }
        }
        window = chosen;
        let rho_next = rho.get(window + 1).copied().unwrap_or(0.0);
        let drho_next = if window + 1 < w_max {
            drho[window + 1] = madras_sokal_drho(&rho, window + 1, n_eff);
            drho[window + 1]
        } else {
            0.0
        };
        tau_raw = tau_hist[window] + opt.tau_exp * rho_next.abs();
        tail_dtau_sq = (opt.tau_exp * drho_next).powi(2);
    } else {
        // Automatic windowing: smallest W with
        //   g(W) = exp(-W / tau_W) - tau_W / sqrt(W * N) <= 0,
        // tau_W estimated from the running tau_int via
        //   tau_W = S / ln((G + 1) / G),   G = tau_int(W) - 1/2.
        let mut chosen = w_max - 1;
        let mut found = false;
        for w in 1..w_max {
            let gint = tau_hist[w] - 0.5;
            let tau_w = if gint <= 0.0 {
                f64::EPSILON
            } else {
                opt.s_tau / ((gint + 1.0) / gint).ln()
            };
            let wf = w as f64;
            let g = (-wf / tau_w).exp() - tau_w / (wf * n_eff).sqrt();
            if g <= 0.0 {
                chosen = w;
                found = true;
                break;
            }
        }
        if !found {
            log::warn!(
                "Automatic windowing did not converge below w_max = {}, window forced to {}",
                w_max,
                chosen
            );
        }
        window = chosen;
        for w in 1..=(window + 1).min(w_max - 1) {
            drho[w] = madras_sokal_drho(&rho, w, n_eff);
        }
        tau_raw = tau_hist[window];
    }

    // An anticorrelated chain can drive the windowed sum below the
    // uncorrelated limit; clip at 0.5.
    let tau_int = tau_raw.max(0.5);
    let wf = window as f64;
    let base_dtau = tau_int * (2.0 * (2.0 * wf + 1.0) / n_eff).sqrt();
    let dtau_int = (base_dtau * base_dtau + tail_dtau_sq).sqrt();
    let dvalue = (2.0 * tau_int * gamma[0] / n_eff).sqrt();
    let ddvalue = dvalue * ((wf + 0.5) / n_eff).sqrt();

    EnsembleAnalysis {
        tau_int,
        dtau_int,
        dvalue,
        ddvalue,
        window,
        rho: Array1::from(rho),
        drho: Array1::from(drho),
        tau_int_history: Array1::from(tau_hist),
        n_eff,
        replicas: replicas.to_vec(),
        short_chain: false,
    }
}

/// Unbiased per-replica autocorrelation function gamma_r(t).
///
/// The sums run over the dense expansion of the replica; the per-lag divisor
/// is the number of measured pairs at that lag, which for a contiguous chain
/// is exactly `L - t` and for a gappy one is the autocorrelation of the
/// indicator series (integer counts, clamped at 1).
fn replica_gamma(deltas: &Array1<f64>, list: &IndexList, n_lags: usize, fft: bool) -> Vec<f64> {
    let dense = idl::expand_deltas(deltas, list);
    let n_lags = n_lags.min(dense.len());
    let mut raw = autocovariance(&dense, n_lags, fft);
    if list.is_contiguous() {
        let l = dense.len();
        for (t, g) in raw.iter_mut().enumerate() {
            *g /= (l - t) as f64;
        }
    } else {
        let indicator = idl::expand_deltas(&Array1::from_elem(list.len(), 1.0), list);
        let counts = autocovariance(&indicator, n_lags, fft);
        for (g, c) in raw.iter_mut().zip(counts) {
            *g /= c.round().max(1.0);
        }
    }
    raw
}

fn autocovariance(dense: &Array1<f64>, n_lags: usize, fft: bool) -> Vec<f64> {
    if fft {
        autocovariance_fft(dense, n_lags)
    } else {
        autocovariance_direct(dense, n_lags)
    }
}

/// FFT path: zero-pad to the next power of two >= 2L, transform, multiply by
/// the conjugate, transform back. rustfft leaves the inverse unnormalized, so
/// the result is divided by the transform length.
fn autocovariance_fft(dense: &Array1<f64>, n_lags: usize) -> Vec<f64> {
    let l = dense.len();
    let mut n = 1usize;
    while n < 2 * l {
        n <<= 1;
    }
    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);

    let mut buffer: Vec<Complex64> = Vec::with_capacity(n);
    buffer.extend(dense.iter().map(|&x| Complex64::new(x, 0.0)));
    buffer.resize(n, Complex64::new(0.0, 0.0));

    forward.process(&mut buffer);
    for c in buffer.iter_mut() {
        *c = Complex64::new(c.norm_sqr(), 0.0);
    }
    inverse.process(&mut buffer);

    let norm = n as f64;
    buffer[..n_lags].iter().map(|c| c.re / norm).collect()
}

fn autocovariance_direct(dense: &Array1<f64>, n_lags: usize) -> Vec<f64> {
    let l = dense.len();
    let d = dense.as_slice().expect("expanded deltas are contiguous");
    (0..n_lags)
        .map(|t| {
            let mut sum = 0.0;
            for i in 0..l - t {
                sum += d[i] * d[i + t];
            }
            sum
        })
        .collect()
}

/// Madras-Sokal estimate of the statistical error on rho(i):
/// `drho(i)^2 = 1/N * sum_m (rho(m+i) + rho(|m-i|) - 2 rho(i) rho(m))^2`.
fn madras_sokal_drho(rho: &[f64], i: usize, n_eff: f64) -> f64 {
    let w_max = rho.len();
    if i + 1 >= w_max {
        return 0.0;
    }
    let mut sum = 0.0;
    for m in 1..(w_max - i) {
        let term = rho[m + i] + rho[m.abs_diff(i)] - 2.0 * rho[i] * rho[m];
        sum += term * term;
    }
    (sum / n_eff).sqrt()
}

/// Covariance of two observables.
///
/// Estimated per shared ensemble by the correlation coefficient of the raw
/// deltas (no autocorrelation) rescaled with the full gamma-method errors of
/// both observables, so `covariance(a, a)` equals `a.dvalue()^2` and the
/// Cauchy-Schwarz bound holds. Requires `gamma_method` to have been applied
/// to both observables.
pub fn covariance(obs1: &Obs, obs2: &Obs) -> Result<f64, GammetError> {
    let a1 = obs1
        .analysis
        .as_ref()
        .ok_or(GammetError::ErrorsNotEstimated)?;
    let a2 = obs2
        .analysis
        .as_ref()
        .ok_or(GammetError::ErrorsNotEstimated)?;

    let mut cov = 0.0;
    for (e_name, e1) in &a1.ensembles {
        let e2 = match a2.ensembles.get(e_name) {
            Some(e) => e,
            None => continue,
        };
        let mut num = 0.0;
        let mut div = 0.0;
        for r in &e1.replicas {
            if !e2.replicas.contains(r) {
                continue;
            }
            let common = obs1.idl[r].intersection(&obs2.idl[r]);
            if common.is_empty() {
                continue;
            }
            let d1 = idl::reduce_deltas(&obs1.deltas[r], &obs1.idl[r], &common)?;
            let d2 = idl::reduce_deltas(&obs2.deltas[r], &obs2.idl[r], &common)?;
            num += d1.dot(&d2);
            div += d1.dot(&d1).sqrt() * d2.dot(&d2).sqrt();
        }
        if num == 0.0 || div == 0.0 {
            continue;
        }
        cov += e1.dvalue * e2.dvalue * (num / div);
    }
    Ok(cov)
}
