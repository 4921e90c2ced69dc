//! Configuration of the inference `Engine`, loadable from TOML.
//!
//! ```toml
//! chains = 3
//! burn_in = 100
//! iterations = 1000
//! strategy = "block"
//! seed = 42
//! ```

use crate::util::{PrmError, Result};

use serde::{Deserialize, Serialize};

use std::fs::read_to_string;
use std::path::Path;


/// The order in which latent vertices are resampled within one MCMC iteration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Every latent vertex once, in insertion order
    Standard,

    /// All latent vertices of one attribute class, picked uniformly at random
    Block,

    /// As many vertices as there are latent vertices, picked uniformly with replacement
    Random,
}

/// Which vertices are recorded in the posterior
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    /// The event vertices of the query
    Events,

    /// Every latent vertex and every reference vertex
    All,
}


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// The number of Markov chains, run one after another
    pub chains: usize,

    /// Iterations discarded at the start of each chain
    pub burn_in: usize,

    /// Iterations collected per chain
    pub iterations: usize,

    pub strategy: Strategy,

    /// Seed of the random source. Chain `c` is seeded with `seed + c`. Without a seed, each chain
    /// draws its seed from the operating system.
    pub seed: Option<u64>,

    pub track: Track,

    /// The most keys passed to one data access call. Larger key sets are split.
    pub max_keys_per_call: usize,

    /// Remove latent vertices without children that are not events
    pub prune_barren: bool,

    /// Add artificial parents for ground vertices missing a parent
    pub validate: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            chains: 3,
            burn_in: 100,
            iterations: 1000,
            strategy: Strategy::Standard,
            seed: None,
            track: Track::Events,
            max_keys_per_call: 500,
            prune_barren: true,
            validate: true,
        }
    }
}

impl EngineConfig {

    /// Parse and validate a TOML configuration. Missing fields take their default.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        tracing::debug!("Reading engine configuration from {:?}", path.as_ref());
        EngineConfig::from_toml_str(&read_to_string(path)?)
    }

    /// # Errors
    /// `Config` if no chain, no iteration or no key per data access call is requested
    pub fn validate(&self) -> Result<()> {
        if self.chains == 0 {
            return Err(PrmError::Config(String::from("chains must be at least 1")));
        }
        if self.iterations == 0 {
            return Err(PrmError::Config(String::from("iterations must be at least 1")));
        }
        if self.max_keys_per_call == 0 {
            return Err(PrmError::Config(String::from("max_keys_per_call must be at least 1")));
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(EngineConfig::default(), config);
    }

    #[test]
    fn parse() {
        let config = EngineConfig::from_toml_str(
            "chains = 2\nburn_in = 10\nstrategy = \"block\"\nseed = 7\ntrack = \"all\"\n"
        ).unwrap();

        assert_eq!(2, config.chains);
        assert_eq!(10, config.burn_in);
        assert_eq!(1000, config.iterations);
        assert_eq!(Strategy::Block, config.strategy);
        assert_eq!(Some(7), config.seed);
        assert_eq!(Track::All, config.track);
    }

    #[test]
    fn invalid() {
        assert!(EngineConfig::from_toml_str("chains = 0").is_err());
        assert!(EngineConfig::from_toml_str("strategy = \"sideways\"").is_err());
    }
}
