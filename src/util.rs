//! Defines the `Error` type for the prm-infer library

use std::result;

use itertools::Itertools;
use thiserror::Error;

pub type Result<T> = result::Result<T, PrmError>;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum PrmError {

    /// A probabilistic attribute with parents has no CPD. Inference cannot start until the CPD is
    /// learned or supplied.
    #[error("Attribute {0} has parents but no CPD")]
    MissingCpd(String),

    /// An attribute name that is not part of the schema
    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    /// A dependency handle that is not part of the schema
    #[error("Unknown dependency")]
    UnknownDependency,

    /// A CPD with the wrong shape, negative entries or rows that do not sum to one
    #[error("Invalid CPD: {0}")]
    InvalidCpd(String),

    /// Represents an attempt to build a CPD with an incompatible `Initialization`
    #[error("An invalid initialization was provided")]
    InvalidInitialization,

    /// A value outside of an attribute's domain, or an empty domain
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    /// A primary key tuple whose length does not match the attribute's key arity
    #[error("Attribute {attr} expects {expected} key columns, found {found}")]
    KeyArity { attr: String, expected: usize, found: usize },

    /// A data access call exceeded the number of keys the backend accepts
    #[error("Requested {requested} keys, but the data interface accepts at most {limit}")]
    SizeLimit { requested: usize, limit: usize },

    /// A vertex ID that is not in the ground network
    #[error("Vertex not found: {0}")]
    MissingVertex(String),

    /// A reference operation was attempted on a vertex that is not a `ReferenceVertex`
    #[error("Not a reference vertex: {0}")]
    NotAReference(String),

    /// Reference uncertainty without any k-side candidates
    #[error("No candidate objects for attribute {0}")]
    EmptyCandidates(String),

    /// A diagnostic that needs completed chains was called without enough of them
    #[error("Not enough chains or samples")]
    EmptyChains,

    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A general error with the given description
    #[error("{0}")]
    General(String),

}

impl From<toml::de::Error> for PrmError {
    fn from(err: toml::de::Error) -> Self {
        PrmError::Config(err.to_string())
    }
}

impl From<std::io::Error> for PrmError {
    fn from(err: std::io::Error) -> Self {
        PrmError::Config(err.to_string())
    }
}


/// Join a sequence of primary key values with `.`
pub fn join_keys(keys: &[i64]) -> String {
    keys.iter().join(".")
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let err = PrmError::KeyArity { attr: String::from("Student.success"), expected: 1, found: 2 };
        assert_eq!("Attribute Student.success expects 1 key columns, found 2", err.to_string());
        assert_eq!("Attribute A has parents but no CPD", PrmError::MissingCpd(String::from("A")).to_string());
    }

    #[test]
    fn keys() {
        assert_eq!("1.23", join_keys(&[1, 23]));
        assert_eq!("", join_keys(&[]));
    }
}
