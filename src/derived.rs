use crate::dual::Dual;
use crate::error::GammetError;
use crate::idl::{self, IndexList};
use crate::obs::Obs;
use ndarray::Array1;
use std::collections::{BTreeMap, BTreeSet};

/// Argument of a derived observable: either a proper observable or a plain
/// numeric constant. Constants shape the functional form at the means but
/// contribute no fluctuations; arrays of numerics broadcast by mapping the
/// scalar form elementwise at the call site.
#[derive(Clone, Copy)]
pub enum Operand<'a> {
    Obs(&'a Obs),
    Scalar(f64),
}

impl<'a> From<&'a Obs> for Operand<'a> {
    fn from(o: &'a Obs) -> Self {
        Operand::Obs(o)
    }
}

impl From<f64> for Operand<'_> {
    fn from(x: f64) -> Self {
        Operand::Scalar(x)
    }
}

/// Apply a scalar function to a list of observables with analytic,
/// forward-mode-AD gradients.
///
/// The function is evaluated on dual numbers, once per observable argument
/// with that argument's tangent seeded to one, so any function expressible in
/// the elementary operation set of [`Dual`] differentiates exactly. The
/// result's value is `f` at the tuple of means, its per-replica deltas are
/// the gradient-weighted linear combination of the input deltas, and its
/// replica set is the union of the input replica sets.
///
/// # Examples
/// ```no_run
/// use gammet::{derived_observable, pseudo_obs, Operand};
///
/// let a = pseudo_obs(17.0, 2.9, "e1", 1000).unwrap();
/// let b = pseudo_obs(4.0, 0.8, "e1", 1000).unwrap();
/// let prod = derived_observable(
///     |x| x[0] * x[1] * (x[0] * x[1]).sin(),
///     &[Operand::Obs(&a), Operand::Obs(&b)],
/// )
/// .unwrap();
/// ```
pub fn derived_observable<F>(func: F, args: &[Operand<'_>]) -> Result<Obs, GammetError>
where
    F: Fn(&[Dual]) -> Dual,
{
    check_args(args)?;
    Ok(derive_analytic(&func, args))
}

/// Apply a scalar function to a list of observables with central
/// finite-difference gradients, step `h = max(|x|, 1) * eps^(1/3)`.
///
/// Intended for validating the analytic mode and for functions outside the
/// elementary operation set.
pub fn derived_observable_numeric<F>(func: F, args: &[Operand<'_>]) -> Result<Obs, GammetError>
where
    F: Fn(&[f64]) -> f64,
{
    check_args(args)?;
    let values = primal_values(args);
    let n = values.len();
    let step = f64::EPSILON.cbrt();

    let mut grads = vec![0.0; n];
    for (i, arg) in args.iter().enumerate() {
        if let Operand::Obs(_) = arg {
            let h = values[i].abs().max(1.0) * step;
            let mut up = values.clone();
            let mut down = values.clone();
            up[i] += h;
            down[i] -= h;
            grads[i] = (func(&up) - func(&down)) / (2.0 * h);
        }
    }
    Ok(assemble(func(&values), &grads, args, &func))
}

fn check_args(args: &[Operand<'_>]) -> Result<(), GammetError> {
    if args.is_empty() {
        return Err(GammetError::InvalidOperation(
            "derived_observable requires at least one argument".into(),
        ));
    }
    if !args.iter().any(|a| matches!(a, Operand::Obs(_))) {
        return Err(GammetError::InvalidOperation(
            "derived_observable requires at least one observable argument".into(),
        ));
    }
    Ok(())
}

fn primal_values(args: &[Operand<'_>]) -> Vec<f64> {
    args.iter()
        .map(|a| match a {
            Operand::Obs(o) => o.value(),
            Operand::Scalar(x) => *x,
        })
        .collect()
}

fn derive_analytic<F>(func: &F, args: &[Operand<'_>]) -> Obs
where
    F: Fn(&[Dual]) -> Dual,
{
    let values = primal_values(args);
    let constants: Vec<Dual> = values.iter().map(|&x| Dual::constant(x)).collect();
    let new_value = func(&constants).re;

    let mut grads = vec![0.0; args.len()];
    for (i, arg) in args.iter().enumerate() {
        if let Operand::Obs(_) = arg {
            let mut duals = constants.clone();
            duals[i] = Dual::variable(values[i]);
            grads[i] = func(&duals).eps;
        }
    }

    let eval = |xs: &[f64]| {
        let duals: Vec<Dual> = xs.iter().map(|&x| Dual::constant(x)).collect();
        func(&duals).re
    };
    assemble(new_value, &grads, args, &eval)
}

/// Build the output observable from the value, the gradients and the inputs.
///
/// Replica names are the sorted union of the input replica sets. Where inputs
/// share a replica with different index lists, every contribution is expanded
/// onto the union list (zeros at configurations an input did not measure,
/// rescaled by the length ratio) before the linear combination; per-replica
/// sum-to-zero then follows from linearity. The replica means of the output
/// are the function at the tuple of per-replica means, with the global value
/// standing in for inputs absent on a replica.
fn assemble<F>(new_value: f64, grads: &[f64], args: &[Operand<'_>], eval: &F) -> Obs
where
    F: Fn(&[f64]) -> f64,
{
    let mut all_names: BTreeSet<&str> = BTreeSet::new();
    let mut reweighted = false;
    for arg in args {
        if let Operand::Obs(o) = arg {
            all_names.extend(o.names().iter().map(|s| s.as_str()));
            reweighted |= o.is_reweighted();
        }
    }

    let values = primal_values(args);
    let mut deltas = BTreeMap::new();
    let mut idl_map = BTreeMap::new();
    let mut r_values = BTreeMap::new();

    for name in &all_names {
        // Union index list of all inputs present on this replica.
        let mut union: Option<IndexList> = None;
        for arg in args {
            if let Operand::Obs(o) = arg {
                if let Some(list) = o.idl(name) {
                    union = Some(match union {
                        Some(u) => u.union(list),
                        None => list.clone(),
                    });
                }
            }
        }
        let union = union.expect("replica name comes from one of the inputs");

        let mut combined = Array1::<f64>::zeros(union.len());
        let mut local_means = values.clone();
        for (i, arg) in args.iter().enumerate() {
            if let Operand::Obs(o) = arg {
                if let Some(d) = o.deltas(name) {
                    let expanded = idl::expand_deltas_to(d, o.idl(name).unwrap(), &union);
                    combined.scaled_add(grads[i], &expanded);
                    local_means[i] = o.r_value(name).unwrap();
                }
            }
        }

        r_values.insert(name.to_string(), eval(&local_means));
        deltas.insert(name.to_string(), combined);
        idl_map.insert(name.to_string(), union);
    }

    let names: Vec<String> = all_names.iter().map(|s| s.to_string()).collect();
    Obs::from_parts(new_value, names, deltas, idl_map, r_values, reweighted)
}

/// Internal entry point for the operator overloads: same engine, but the
/// argument shapes are fixed by construction so no validation is needed.
pub(crate) fn unary(a: &Obs, f: impl Fn(Dual) -> Dual) -> Obs {
    derive_analytic(&|x: &[Dual]| f(x[0]), &[Operand::Obs(a)])
}

pub(crate) fn binary(a: Operand<'_>, b: Operand<'_>, f: impl Fn(Dual, Dual) -> Dual) -> Obs {
    derive_analytic(&|x: &[Dual]| f(x[0], x[1]), &[a, b])
}
