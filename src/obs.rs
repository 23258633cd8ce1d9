use crate::error::GammetError;
use crate::gamma::ErrorAnalysis;
use crate::idl::{self, IndexList};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A Monte-Carlo observable: one scalar estimate together with its full
/// per-configuration fluctuation trail.
///
/// An `Obs` keeps, for every replica (one Markov chain), the mean-subtracted
/// samples (`deltas`), the configuration indices at which they were measured
/// (`idl`) and the replica mean (`r_values`). The global `value` of a
/// constructed observable is the measurement-count-weighted average of the
/// replica means. Derived observables produced by `derived_observable` carry
/// the function applied to the means instead.
///
/// The struct is immutable after construction except for the error-analysis
/// cache written by [`Obs::gamma_method`].
///
/// # Examples
/// ```no_run
/// use gammet::Obs;
/// use ndarray::Array1;
///
/// let samples = Array1::from(vec![1.0, 1.2, 0.9, 1.1, 0.8]);
/// let mut obs = Obs::new(vec![samples], vec!["ens_a".to_string()]).unwrap();
/// obs.gamma_method().unwrap();
/// println!("{} +/- {}", obs.value(), obs.dvalue());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obs {
    pub(crate) value: f64,
    pub(crate) names: Vec<String>,
    pub(crate) deltas: BTreeMap<String, Array1<f64>>,
    pub(crate) idl: BTreeMap<String, IndexList>,
    pub(crate) r_values: BTreeMap<String, f64>,
    pub(crate) reweighted: bool,
    #[serde(skip)]
    pub(crate) analysis: Option<ErrorAnalysis>,
}

impl Obs {
    /// Create an observable from raw per-replica samples measured on
    /// contiguous configurations `1..=N`.
    pub fn new(samples: Vec<Array1<f64>>, names: Vec<String>) -> Result<Obs, GammetError> {
        let idls = samples
            .iter()
            .map(|s| {
                if s.is_empty() {
                    Err(GammetError::ShapeMismatch(
                        "Replica samples must not be empty".into(),
                    ))
                } else {
                    IndexList::range(1, s.len())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::with_idl(samples, names, idls)
    }

    /// Create an observable from raw per-replica samples together with the
    /// configuration indices at which they were taken.
    pub fn with_idl(
        samples: Vec<Array1<f64>>,
        names: Vec<String>,
        idls: Vec<IndexList>,
    ) -> Result<Obs, GammetError> {
        if names.is_empty() {
            return Err(GammetError::ShapeMismatch(
                "At least one replica is required".into(),
            ));
        }
        if samples.len() != names.len() || idls.len() != names.len() {
            return Err(GammetError::ShapeMismatch(format!(
                "Got {} samples, {} names and {} index lists",
                samples.len(),
                names.len(),
                idls.len()
            )));
        }

        let mut deltas = BTreeMap::new();
        let mut idl_map = BTreeMap::new();
        let mut r_values = BTreeMap::new();
        let mut value = 0.0;
        let mut n_total = 0usize;

        for ((name, sample), list) in names.iter().zip(samples).zip(idls) {
            if name.is_empty() {
                return Err(GammetError::ShapeMismatch(
                    "Replica names must not be empty".into(),
                ));
            }
            if sample.is_empty() {
                return Err(GammetError::ShapeMismatch(format!(
                    "Replica '{}' has no samples",
                    name
                )));
            }
            if sample.len() != list.len() {
                return Err(GammetError::ShapeMismatch(format!(
                    "Replica '{}': {} samples but {} configuration indices",
                    name,
                    sample.len(),
                    list.len()
                )));
            }
            let n = sample.len();
            let r_mean = sample.sum() / n as f64;
            if deltas.insert(name.clone(), sample - r_mean).is_some() {
                return Err(GammetError::StateMismatch(format!(
                    "Duplicate replica name '{}'",
                    name
                )));
            }
            idl_map.insert(name.clone(), list);
            r_values.insert(name.clone(), r_mean);
            value += n as f64 * r_mean;
            n_total += n;
        }
        value /= n_total as f64;

        Ok(Obs {
            value,
            names,
            deltas,
            idl: idl_map,
            r_values,
            reweighted: false,
            analysis: None,
        })
    }

    /// Assemble an observable from already centered deltas. Used by the
    /// derived-observable engine, which guarantees the per-replica sum-to-zero
    /// property through linearity.
    pub(crate) fn from_parts(
        value: f64,
        names: Vec<String>,
        deltas: BTreeMap<String, Array1<f64>>,
        idl: BTreeMap<String, IndexList>,
        r_values: BTreeMap<String, f64>,
        reweighted: bool,
    ) -> Obs {
        Obs {
            value,
            names,
            deltas,
            idl,
            r_values,
            reweighted,
            analysis: None,
        }
    }

    /// Re-check the structural invariants. Used after deserialization.
    pub(crate) fn validate(&self) -> Result<(), GammetError> {
        if self.names.is_empty() {
            return Err(GammetError::ShapeMismatch(
                "At least one replica is required".into(),
            ));
        }
        let mut seen = std::collections::BTreeSet::new();
        for name in &self.names {
            if !seen.insert(name) {
                return Err(GammetError::StateMismatch(format!(
                    "Duplicate replica name '{}'",
                    name
                )));
            }
            let d = self.deltas.get(name).ok_or_else(|| {
                GammetError::ShapeMismatch(format!("Missing deltas for replica '{}'", name))
            })?;
            let i = self.idl.get(name).ok_or_else(|| {
                GammetError::ShapeMismatch(format!("Missing index list for replica '{}'", name))
            })?;
            if !self.r_values.contains_key(name) {
                return Err(GammetError::ShapeMismatch(format!(
                    "Missing replica mean for '{}'",
                    name
                )));
            }
            if d.len() != i.len() {
                return Err(GammetError::ShapeMismatch(format!(
                    "Replica '{}': {} deltas but {} configuration indices",
                    name,
                    d.len(),
                    i.len()
                )));
            }
        }
        if self.deltas.len() != self.names.len() || self.idl.len() != self.names.len() {
            return Err(GammetError::ShapeMismatch(
                "Replica maps and name list disagree".into(),
            ));
        }
        Ok(())
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Replica names, in construction order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn deltas(&self, name: &str) -> Option<&Array1<f64>> {
        self.deltas.get(name)
    }

    pub fn idl(&self, name: &str) -> Option<&IndexList> {
        self.idl.get(name)
    }

    pub fn r_value(&self, name: &str) -> Option<f64> {
        self.r_values.get(name).copied()
    }

    pub fn is_reweighted(&self) -> bool {
        self.reweighted
    }

    /// Total number of measurements across all replicas.
    pub fn n_total(&self) -> usize {
        self.deltas.values().map(|d| d.len()).sum()
    }

    /// Raw measurement history of one replica (deltas plus replica mean),
    /// for plotting collaborators.
    pub fn replica_history(&self, name: &str) -> Option<Array1<f64>> {
        let d = self.deltas.get(name)?;
        let r = *self.r_values.get(name)?;
        Some(d + r)
    }

    /// Statistical error from the last `gamma_method` run, 0.0 before.
    pub fn dvalue(&self) -> f64 {
        self.analysis.as_ref().map_or(0.0, |a| a.dvalue)
    }

    /// Error of the statistical error from the last `gamma_method` run.
    pub fn ddvalue(&self) -> f64 {
        self.analysis.as_ref().map_or(0.0, |a| a.ddvalue)
    }

    /// Full error analysis from the last `gamma_method` run.
    pub fn analysis(&self) -> Option<&ErrorAnalysis> {
        self.analysis.as_ref()
    }

    /// Ensemble names of the last analysis, sorted.
    pub fn ensembles(&self) -> Vec<&str> {
        self.analysis
            .as_ref()
            .map(|a| a.ensembles.keys().map(|k| k.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn tau_int(&self, ensemble: &str) -> Option<f64> {
        self.ensemble_analysis(ensemble).map(|e| e.tau_int)
    }

    pub fn dtau_int(&self, ensemble: &str) -> Option<f64> {
        self.ensemble_analysis(ensemble).map(|e| e.dtau_int)
    }

    /// Error contribution of one ensemble.
    pub fn e_dvalue(&self, ensemble: &str) -> Option<f64> {
        self.ensemble_analysis(ensemble).map(|e| e.dvalue)
    }

    pub fn e_ddvalue(&self, ensemble: &str) -> Option<f64> {
        self.ensemble_analysis(ensemble).map(|e| e.ddvalue)
    }

    /// Normalized autocorrelation function of one ensemble.
    pub fn rho(&self, ensemble: &str) -> Option<&Array1<f64>> {
        self.ensemble_analysis(ensemble).map(|e| &e.rho)
    }

    /// Madras-Sokal error on the normalized autocorrelation function, filled
    /// as far as the window search computed it.
    pub fn drho(&self, ensemble: &str) -> Option<&Array1<f64>> {
        self.ensemble_analysis(ensemble).map(|e| &e.drho)
    }

    /// Running integrated autocorrelation time tau_int(W).
    pub fn tau_int_history(&self, ensemble: &str) -> Option<&Array1<f64>> {
        self.ensemble_analysis(ensemble).map(|e| &e.tau_int_history)
    }

    /// Window chosen by the automatic criterion.
    pub fn window(&self, ensemble: &str) -> Option<usize> {
        self.ensemble_analysis(ensemble).map(|e| e.window)
    }

    fn ensemble_analysis(&self, ensemble: &str) -> Option<&crate::gamma::EnsembleAnalysis> {
        self.analysis.as_ref()?.ensembles.get(ensemble)
    }

    /// True if the value and every delta vanish within `atol`.
    pub fn is_zero_within(&self, atol: f64) -> bool {
        self.value.abs() <= atol
            && self
                .deltas
                .values()
                .all(|d| d.iter().all(|x| x.abs() <= atol))
    }

    /// True if the observable is compatible with zero at floating-point
    /// working precision (absolute tolerance 1e-8 on the value and on every
    /// delta).
    pub fn is_zero(&self) -> bool {
        self.is_zero_within(1e-8)
    }

    /// True if the value is compatible with zero within one standard error.
    /// Requires a prior `gamma_method` run.
    pub fn is_zero_within_error(&self) -> bool {
        self.value.abs() <= self.dvalue()
    }

    /// Multi-line summary of the last error analysis, one row per ensemble.
    pub fn details(&self) -> String {
        use std::fmt::Write as _;
        let mut out = String::new();
        let _ = writeln!(out, "{:=^66}", " Observable ");
        let _ = writeln!(out, "{:<16} {:>20.12}", "Value:", self.value);
        match &self.analysis {
            Some(a) => {
                let _ = writeln!(out, "{:<16} {:>20.12}", "dvalue:", a.dvalue);
                let _ = writeln!(out, "{:<16} {:>20.12}", "ddvalue:", a.ddvalue);
                let _ = writeln!(out, "{:-^66}", "");
                let _ = writeln!(
                    out,
                    "{:<12} | {:>10} | {:>10} | {:>6} | {:>8} | {:>5}",
                    "Ensemble", "tau_int", "dtau_int", "W", "N", "Reps"
                );
                let _ = writeln!(out, "{:-^66}", "");
                for (name, e) in &a.ensembles {
                    let _ = writeln!(
                        out,
                        "{:<12} | {:>10.4} | {:>10.4} | {:>6} | {:>8} | {:>5}",
                        name,
                        e.tau_int,
                        e.dtau_int,
                        e.window,
                        e.n_eff as usize,
                        e.replicas.len()
                    );
                }
            }
            None => {
                let _ = writeln!(out, "Error not estimated yet, call gamma_method first.");
            }
        }
        if self.reweighted {
            let _ = writeln!(out, "Observable has been reweighted.");
        }
        let _ = writeln!(out, "{:=^66}", "");
        out
    }
}

impl fmt::Display for Obs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.analysis {
            Some(a) => write!(f, "Obs[{} +/- {}]", self.value, a.dvalue),
            None => write!(f, "Obs[{}]", self.value),
        }
    }
}

/// Equality compares the full fluctuation content: two observables are equal
/// iff their difference is zero within working precision. Ordering, in
/// contrast, compares central values only and is not error-aware.
impl PartialEq for Obs {
    fn eq(&self, other: &Obs) -> bool {
        (self - other).is_zero()
    }
}

impl PartialEq<f64> for Obs {
    fn eq(&self, other: &f64) -> bool {
        (self - *other).is_zero()
    }
}

impl PartialEq<Obs> for f64 {
    fn eq(&self, other: &Obs) -> bool {
        (other - *self).is_zero()
    }
}

impl PartialOrd for Obs {
    fn partial_cmp(&self, other: &Obs) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

impl PartialOrd<f64> for Obs {
    fn partial_cmp(&self, other: &f64) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(other)
    }
}

/// Concatenate observables defined on pairwise disjoint replica sets into a
/// single observable.
///
/// The value of the result is the simple mean of the input values; the
/// per-replica fluctuation trails are kept unchanged.
pub fn merge_obs(list: &[Obs]) -> Result<Obs, GammetError> {
    if list.is_empty() {
        return Err(GammetError::InvalidOperation(
            "merge_obs requires at least one observable".into(),
        ));
    }
    if list.iter().any(|o| o.reweighted != list[0].reweighted) {
        return Err(GammetError::StateMismatch(
            "All observables in the list have to share the reweighting state".into(),
        ));
    }

    let mut entries: Vec<(String, Array1<f64>, IndexList)> = Vec::new();
    for o in list {
        for name in &o.names {
            let sample = &o.deltas[name] + o.r_values[name];
            entries.push((name.clone(), sample, o.idl[name].clone()));
        }
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    for w in entries.windows(2) {
        if w[0].0 == w[1].0 {
            return Err(GammetError::StateMismatch(format!(
                "List of observables contains duplicate replica '{}'",
                w[0].0
            )));
        }
    }

    let mut names = Vec::with_capacity(entries.len());
    let mut samples = Vec::with_capacity(entries.len());
    let mut idls = Vec::with_capacity(entries.len());
    for (name, sample, list_idl) in entries {
        names.push(name);
        samples.push(sample);
        idls.push(list_idl);
    }

    let mut merged = Obs::with_idl(samples, names, idls)?;
    merged.value = list.iter().map(|o| o.value).sum::<f64>() / list.len() as f64;
    merged.reweighted = list[0].reweighted;
    Ok(merged)
}

/// Reweight observables: each entry is replaced by `(O * W) / W` evaluated
/// configuration by configuration on the entry's own index lists, with the
/// `reweighted` flag set on every output.
///
/// Every target has to live on a subset of the weight's replicas and
/// configurations. The weight is expected to carry unit-mean semantics; this
/// is not enforced, only propagated.
pub fn reweight(weight: &Obs, obs: &[Obs]) -> Result<Vec<Obs>, GammetError> {
    let mut result = Vec::with_capacity(obs.len());
    for (k, o) in obs.iter().enumerate() {
        if o.reweighted {
            return Err(GammetError::StateMismatch(format!(
                "Observable {} is already reweighted",
                k
            )));
        }
        let mut names = o.names.clone();
        names.sort();
        let mut num_samples = Vec::with_capacity(names.len());
        let mut den_samples = Vec::with_capacity(names.len());
        let mut idls = Vec::with_capacity(names.len());
        for name in &names {
            let w_idl = weight.idl.get(name).ok_or_else(|| {
                GammetError::StateMismatch(format!(
                    "Replica '{}' of observable {} is not present in the weight",
                    name, k
                ))
            })?;
            let o_idl = &o.idl[name];
            if !o_idl.is_subset_of(w_idl) {
                return Err(GammetError::StateMismatch(format!(
                    "Observable {} has to be defined on a subset of the configurations \
                     of the weight on replica '{}'",
                    k, name
                )));
            }
            let w_sample =
                idl::reduce_deltas(&weight.deltas[name], w_idl, o_idl)? + weight.r_values[name];
            let o_sample = &o.deltas[name] + o.r_values[name];
            num_samples.push(&w_sample * &o_sample);
            den_samples.push(w_sample);
            idls.push(o_idl.clone());
        }
        let numerator = Obs::with_idl(num_samples, names.clone(), idls.clone())?;
        let denominator = Obs::with_idl(den_samples, names, idls)?;
        let mut ratio = &numerator / &denominator;
        ratio.reweighted = true;
        result.push(ratio);
    }
    Ok(result)
}
