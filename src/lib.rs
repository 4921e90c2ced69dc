//! Approximate inference in probabilistic relational models.
//!
//! A query names event and evidence attribute objects of a relational data store. The `Engine`
//! unrolls the part of the ground Bayesian network the query depends on, samples it with Gibbs
//! and Metropolis-Hastings steps and returns the samples of every chain.

extern crate bidir_map;
extern crate indexmap;
extern crate itertools;
#[macro_use]
extern crate ndarray;
extern crate ndarray_rand;
extern crate rand;

pub mod builder;
pub mod config;
pub mod data;
pub mod inference;
pub mod init;
pub mod likelihood;
pub mod network;
pub mod posterior;
pub mod query;
pub mod samplers;
pub mod schema;
pub mod util;

pub use config::EngineConfig;
pub use inference::Engine;
pub use util::{PrmError, Result};
