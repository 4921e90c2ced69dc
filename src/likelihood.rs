//! Precomputed conditional likelihood functions.
//!
//! A `Clf` rearranges the CPD of an attribute `A` so that the probability of `A`'s value, as a
//! function of one parent `P_j`, can be read with a single lookup. Gibbs sampling a vertex of `P_j`
//! scores each candidate value against every child of `A` this way.
//!
//! # Representation
//! Row `r` enumerates a value of `A` and a joint assignment of the parents other than `P_j`, in
//! CPD order, with the last one varying fastest. Column `c` is the `c`-th value of `P_j`.

use crate::schema::{AttrId, Cpd, Schema};
use crate::util::{PrmError, Result};

use indexmap::IndexMap;
use itertools::iproduct;
use ndarray::prelude as nd;


/// The conditional likelihood function of an attribute with respect to one of its parents
#[derive(Clone, Debug, PartialEq)]
pub struct Clf {
    /// The position of the parent in the CPD order
    position: usize,

    matrix: nd::Array2<f64>,
    log_matrix: nd::Array2<f64>,

    /// Multipliers over `[|A|, other parent cardinalities...]`
    multipliers: Vec<usize>,
}

impl Clf {

    /// Rearrange `cpd` for the parent at `position`
    ///
    /// # Args
    /// * `cpd`: the CPD of the child attribute
    /// * `cardinality`: the number of values of the child attribute
    /// * `position`: the position of the parent in the CPD order
    pub fn new(cpd: &Cpd, cardinality: usize, position: usize) -> Self {
        let cards = cpd.parent_cardinalities();

        let mut dims = vec![cardinality];
        dims.extend(cards.iter().enumerate().filter(|&(j, _)| j != position).map(|(_, &c)| c));

        let mut multipliers = vec![1; dims.len()];
        for d in (0..dims.len() - 1).rev() {
            multipliers[d] = multipliers[d + 1] * dims[d + 1];
        }

        let rows: usize = dims.iter().product();
        let cols = cards[position];
        let mut matrix = nd::Array2::zeros((rows, cols));

        for (row, col) in iproduct!(0..rows, 0..cols) {
            // 1) decode the row into the child value and the other parents
            let mut rest = row;
            let decoded: Vec<usize> = multipliers.iter().map(|m| {
                let i = rest / m;
                rest %= m;
                i
            }).collect();

            // 2) put the parent value back at its position
            let mut assignment = decoded[1..].to_vec();
            assignment.insert(position, col);

            matrix[[row, col]] = cpd.prob(cpd.index_row(&assignment), decoded[0]);
        }

        let log_matrix = matrix.mapv(f64::ln);
        Clf { position, matrix, log_matrix, multipliers }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn matrix(&self) -> &nd::Array2<f64> {
        &self.matrix
    }

    /// The row of the child value `value` and the full parent assignment `assignment`. The entry
    /// of the parent this `Clf` is defined for is ignored.
    pub fn row_index(&self, value: usize, assignment: &[usize]) -> usize {
        let others = assignment.iter().enumerate().filter(|&(j, _)| j != self.position).map(|(_, &i)| i);

        std::iter::once(value).chain(others)
                              .zip(self.multipliers.iter())
                              .map(|(i, m)| i * m)
                              .sum()
    }

    pub fn likelihood(&self, row: usize, col: usize) -> f64 {
        self.matrix[[row, col]]
    }

    pub fn log_likelihood(&self, row: usize, col: usize) -> f64 {
        self.log_matrix[[row, col]]
    }

    /// The CPD entry of the child value `value` given the full parent assignment `assignment`
    pub fn reconstruct(&self, value: usize, assignment: &[usize]) -> f64 {
        self.likelihood(self.row_index(value, assignment), assignment[self.position])
    }
}


/// Every `Clf` of one attribute, by parent position
#[derive(Clone, Debug, PartialEq)]
pub struct Likelihood {
    pub attr: AttrId,
    clfs: Vec<Clf>,
}

impl Likelihood {

    pub fn new(attr: AttrId, cpd: &Cpd, cardinality: usize) -> Self {
        let clfs = (0..cpd.parent_cardinalities().len()).map(|j| Clf::new(cpd, cardinality, j)).collect();
        Likelihood { attr, clfs }
    }

    pub fn clf(&self, position: usize) -> Option<&Clf> {
        self.clfs.get(position)
    }
}


/// The `Likelihood` of every attribute with parents
#[derive(Clone, Debug, Default)]
pub struct LikelihoodTables {
    tables: IndexMap<AttrId, Likelihood>,
}

impl LikelihoodTables {

    /// Precompute the CLFs of every attribute with parents. Exist attributes are checked for a CPD
    /// but get no CLF.
    ///
    /// # Errors
    /// `MissingCpd` if an attribute with parents has no CPD
    pub fn configure(schema: &Schema) -> Result<Self> {
        let mut tables = IndexMap::new();

        for attr in schema.attributes().filter(|a| a.has_parents()) {
            let cpd = attr.cpd.as_ref().ok_or_else(|| PrmError::MissingCpd(attr.name.clone()))?;
            if attr.is_exist {
                continue;
            }

            tables.insert(attr.id, Likelihood::new(attr.id, cpd, attr.cardinality()));
        }

        tracing::debug!("Precomputed likelihood functions of {} attributes", tables.len());
        Ok(LikelihoodTables { tables })
    }

    pub fn get(&self, attr: AttrId) -> Option<&Likelihood> {
        self.tables.get(&attr)
    }

    /// The `Clf` of `attr` for the parent at `position`
    pub fn clf(&self, attr: AttrId, position: usize) -> Option<&Clf> {
        self.get(attr).and_then(|l| l.clf(position))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::Initialization;
    use crate::schema::{Domain, SchemaBuilder};

    use itertools::Itertools;

    fn student() -> Schema {
        SchemaBuilder::new().with_attribute("Student", "intelligence", 1, Domain::Binary)
                            .with_attribute("Course", "difficulty", 1, Domain::Range(1, 3))
                            .with_attribute("Registration", "grade", 2, Domain::Range(1, 3))
                            .with_dependency("Student.intelligence", "Registration.grade", None)
                            .with_dependency("Course.difficulty", "Registration.grade", None)
                            .with_cpd("Student.intelligence", Initialization::Binomial(0.7))
                            .with_cpd("Course.difficulty", Initialization::Uniform)
                            .with_cpd("Registration.grade", Initialization::Random)
                            .build()
                            .unwrap()
    }

    #[test]
    fn reconstruct() {
        let schema = student();
        let grade = schema.lookup("Registration.grade").unwrap();
        let cpd = schema.attribute(grade).cpd.as_ref().unwrap();
        let tables = LikelihoodTables::configure(&schema).unwrap();

        assert_eq!(1, tables.len());
        for j in 0..2 {
            let clf = tables.clf(grade, j).unwrap();
            assert_eq!(j, clf.position());
            assert_eq!((3 * [3, 2][j], [2, 3][j]), clf.matrix().dim());

            for (i, d, g) in iproduct!(0..2, 0..3, 0..3) {
                let expected = cpd.prob(cpd.index_row(&[i, d]), g);
                assert!((expected - clf.reconstruct(g, &[i, d])).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn columns_vary_the_parent() {
        let schema = student();
        let grade = schema.lookup("Registration.grade").unwrap();
        let cpd = schema.attribute(grade).cpd.as_ref().unwrap();
        let clf = LikelihoodTables::configure(&schema).unwrap().clf(grade, 0).unwrap().clone();

        // grade 2 (index 1) with difficulty index 2, as a function of intelligence
        let row = clf.row_index(1, &[0, 2]);
        assert_eq!(row, clf.row_index(1, &[1, 2]));

        let column: Vec<f64> = (0..2).map(|i| clf.likelihood(row, i)).collect();
        let expected: Vec<f64> = (0..2).map(|i| cpd.prob(cpd.index_row(&[i, 2]), 1)).collect();
        assert_eq!(expected, column);
        assert_eq!(column.iter().map(|p| p.ln()).collect_vec(), (0..2).map(|i| clf.log_likelihood(row, i)).collect_vec());
    }

    #[test]
    fn missing_cpd() {
        let schema = SchemaBuilder::new().with_attribute("A", "x", 1, Domain::Binary)
                                         .with_attribute("A", "y", 1, Domain::Binary)
                                         .with_dependency("A.x", "A.y", None)
                                         .build()
                                         .unwrap();

        assert_eq!(Err(PrmError::MissingCpd(String::from("A.y"))), LikelihoodTables::configure(&schema).map(|_| ()));
    }
}
