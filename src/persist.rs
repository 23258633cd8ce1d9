//! JSON persistence for observables.
//!
//! The serialized form round-trips `value`, `names`, `deltas`, `idl`,
//! `r_values` and the `reweighted` flag exactly (floats are written in
//! shortest-roundtrip notation); the error-analysis cache is not persisted
//! and has to be recomputed after loading.

use crate::error::GammetError;
use crate::obs::Obs;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Serialize an observable to a JSON string.
pub fn to_json(obs: &Obs) -> Result<String, GammetError> {
    Ok(serde_json::to_string(obs)?)
}

/// Deserialize an observable from a JSON string, re-checking the structural
/// invariants.
pub fn from_json(json: &str) -> Result<Obs, GammetError> {
    let obs: Obs = serde_json::from_str(json)?;
    obs.validate()?;
    Ok(obs)
}

/// Dump an observable into a JSON file.
pub fn dump_obs<P: AsRef<Path>>(obs: &Obs, path: P) -> Result<(), GammetError> {
    let file = File::create(path)?;
    serde_json::to_writer(BufWriter::new(file), obs)?;
    Ok(())
}

/// Load an observable from a JSON file written by [`dump_obs`].
pub fn load_obs<P: AsRef<Path>>(path: P) -> Result<Obs, GammetError> {
    let file = File::open(path)?;
    let obs: Obs = serde_json::from_reader(BufReader::new(file))?;
    obs.validate()?;
    Ok(obs)
}
