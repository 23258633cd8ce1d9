pub mod cobs;
pub mod derived;
pub mod dual;
pub mod error;
pub mod gamma;
pub mod generators;
pub mod idl;
pub mod npr;
pub mod obs;
pub mod ops;
pub mod persist;

pub use cobs::CObs;
pub use derived::{derived_observable, derived_observable_numeric, Operand};
pub use dual::Dual;
pub use error::GammetError;
pub use gamma::{covariance, EnsembleAnalysis, ErrorAnalysis, GammaOptions};
pub use generators::{
    gen_correlated_data, gen_correlated_data_using, pseudo_obs, pseudo_obs_using,
};
pub use idl::IndexList;
pub use npr::{grid_gamma, NprMatrix};
pub use obs::{merge_obs, reweight, Obs};
pub use persist::{dump_obs, from_json, load_obs, to_json};
