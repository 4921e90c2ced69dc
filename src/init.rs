//! Module containing initialization routines for the CPDs of a `Schema`.

use crate::schema::Cpd;
use crate::util::{PrmError, Result};

use ndarray::prelude as nd;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;


/// Defines possible ways to initialize an attribute's CPD.
#[derive(Clone, Debug)]
pub enum Initialization {
    /// A uniform distribution over all values, for every parent assignment
    Uniform,

    /// Randomly initialize the rows of the CPD
    Random,

    /// Initialize the CPD as a Binomial distribution where the first domain value has probability
    /// ```p```. Note that this `Initialization` is valid only for a binary attribute with no
    /// parents.
    Binomial(f64),

    /// Initialize the CPD as a Multinomial distribution with parameters ```p_0, p_1...```.
    /// Note that this `Initialization` is valid only for an attribute with no parents.
    Multinomial(Vec<f64>),

    /// User defined CPD table. One row per joint parent assignment, one column per value.
    Table(nd::Array2<f64>)
}


impl Initialization {

    /// Construct a CPD, initialized based on ```self```
    ///
    /// # Args
    /// * `cardinality`: the cardinality of the attribute
    /// * `parents`: the cardinality of each parent, in parent order
    ///
    /// # Returns
    /// a `Cpd` with ```prod(parents)``` rows and ```cardinality``` columns
    pub fn build_cpd(self, cardinality: usize, parents: &[usize]) -> Result<Cpd> {
        ///////////////////////////////////////////////////////////////////////////////
        // Check for errors
        if parents.is_empty() {
            match self {
                // A binomial distribution on a non-binary attribute
                Initialization::Binomial(p) if cardinality != 2 || !(0.0..=1.0).contains(&p) => {
                    return Err(PrmError::InvalidInitialization);
                },

                // A multinomial distribution with an incorrect number of parameters
                Initialization::Multinomial(ref ps) if ps.len() != cardinality => {
                    return Err(PrmError::InvalidInitialization);
                },

                _ => ()
            }
        } else {
            match self {
                // A binomial/multinomial with parents
                Initialization::Binomial(_) | Initialization::Multinomial(_) => {
                    return Err(PrmError::InvalidInitialization);
                },

                _ => ()
            }
        }

        ///////////////////////////////////////////////////////////////////////////////
        // now, build CPD
        let rows: usize = parents.iter().product();
        let shape = (rows, cardinality);

        let tbl = match self {
            Initialization::Uniform => {
                nd::Array2::from_elem(shape, 1. / (cardinality as f64))
            },
            Initialization::Random => {
                let mut tbl = nd::Array2::random(shape, Uniform::new(1.0, 100.0));
                for mut row in tbl.rows_mut() {
                    let z = row.sum();
                    row.mapv_inplace(|e| e / z);
                }
                tbl
            },
            Initialization::Binomial(p) => {
                array![[p, (1.0 - p)]]
            },
            Initialization::Multinomial(p) => {
                nd::Array2::from_shape_vec((1, cardinality), p).map_err(|_| PrmError::InvalidInitialization)?
            },
            Initialization::Table(t) => t
        };

        Cpd::new(tbl, parents.to_vec())
    }
}
