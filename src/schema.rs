//! Defines the relational `Schema` of a probabilistic relational model (PRM).
//!
//! A `Schema` holds the attribute classes of each entity, the first-order dependencies between
//! them and the tabular CPD of each probabilistic attribute. Attributes and dependencies are
//! referenced everywhere else through the interned handles `AttrId` and `DepId`.

use crate::init::Initialization;
use crate::util::{PrmError, Result};

use bidir_map::BidirMap;
use ndarray::prelude as nd;

use std::fmt;


/// Handle of an attribute class in a `Schema`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttrId(pub usize);

/// Handle of a dependency in a `Schema`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepId(pub usize);

impl fmt::Display for AttrId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "attr#{}", self.0)
    }
}


/// The kinds of discrete domains an attribute class can take
#[derive(Clone, Debug, PartialEq)]
pub enum Domain {
    /// The values `0` and `1`
    Binary,

    /// Every integer in `lo..=hi`
    Range(i64, i64),

    /// An explicit, ordered list of values
    Enumerated(Vec<i64>),
}

impl Domain {

    /// The ordered values of the domain
    pub fn values(&self) -> Vec<i64> {
        match self {
            Domain::Binary => vec![0, 1],
            Domain::Range(lo, hi) => (*lo..=*hi).collect(),
            Domain::Enumerated(vals) => vals.clone(),
        }
    }
}


/// Reduces the multiset of parent values of one dependency to a single value.
///
/// Needed when a child object has several parent objects for one dependency (`1:n` or `m:n`
/// relationships).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregator {
    /// The mean, rounded to the nearest integer
    Average,
    Max,
    Min,
    /// The most frequent value. Ties are broken by the smallest value.
    Mode,
}

impl Aggregator {

    /// Aggregate `values`. Returns `None` for an empty multiset.
    pub fn apply(&self, values: &[i64]) -> Option<i64> {
        if values.is_empty() {
            return None;
        }

        match self {
            Aggregator::Average => {
                let sum: i64 = values.iter().sum();
                Some((sum as f64 / values.len() as f64).round() as i64)
            },
            Aggregator::Max => values.iter().max().cloned(),
            Aggregator::Min => values.iter().min().cloned(),
            Aggregator::Mode => {
                let mut sorted = values.to_vec();
                sorted.sort();

                let mut best = (sorted[0], 0);
                let mut current = (sorted[0], 0);
                for &v in sorted.iter() {
                    if v == current.0 {
                        current.1 += 1;
                    } else {
                        current = (v, 1);
                    }

                    if current.1 > best.1 {
                        best = current;
                    }
                }

                Some(best.0)
            }
        }
    }
}


/// Marks a dependency as a reference uncertainty dependency.
///
/// The n-side object is linked to at most `k` objects of the k-side attribute class. Which ones
/// is latent; the binary `exist` attribute models the probability of each link.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Uncertainty {
    /// The binary attribute modelling whether a link exists
    pub exist: AttrId,

    /// The attribute on the side that is chosen among many candidates
    pub k_attribute: AttrId,

    /// The attribute on the side that owns the `k` references
    pub n_attribute: AttrId,

    /// `true` if the n-side attribute is the parent of the dependency
    pub n_is_parent: bool,

    /// Upper bound on the number of references of one n-side object
    pub k: usize,
}


/// A first-order probabilistic dependency `parent -> child`
#[derive(Clone, Debug)]
pub struct Dependency {
    pub id: DepId,
    pub parent: AttrId,
    pub child: AttrId,
    pub aggregator: Option<Aggregator>,
    pub uncertain: Option<Uncertainty>,
}

impl Dependency {

    /// `true` if this is a reference uncertainty dependency
    pub fn is_uncertain(&self) -> bool {
        self.uncertain.is_some()
    }
}


/// A tabular conditional probability distribution.
///
/// # Representation
/// Row `r` of `matrix` is the distribution of the attribute given the `r`-th joint assignment of
/// its parents. Column `c` is the `c`-th value of the attribute's domain. A joint parent
/// assignment `(i_0, ..., i_n)` (domain indices, in the attribute's parent order) maps to row
/// `sum_j multiplier_j * i_j`, where `multiplier_j` is the product of the cardinalities of the
/// parents after `j`. The last parent varies fastest.
#[derive(Clone, Debug, PartialEq)]
pub struct Cpd {
    matrix: nd::Array2<f64>,
    log_matrix: nd::Array2<f64>,
    parent_cardinalities: Vec<usize>,
    multipliers: Vec<usize>,
}

impl Cpd {

    /// Create a new `Cpd`
    ///
    /// # Args
    /// * `matrix`: the table, with one row per joint parent assignment
    /// * `parent_cardinalities`: the cardinality of each parent, in parent order
    ///
    /// # Errors
    /// `InvalidCpd` if the shape does not match, an entry is negative or a row does not sum to 1
    pub fn new(matrix: nd::Array2<f64>, parent_cardinalities: Vec<usize>) -> Result<Self> {
        let rows: usize = parent_cardinalities.iter().product();
        if matrix.nrows() != rows || matrix.ncols() == 0 {
            return Err(PrmError::InvalidCpd(format!(
                "expected {} rows with at least one column, found {:?}", rows, matrix.shape()
            )));
        }

        if matrix.iter().any(|&p| p < 0.0 || !p.is_finite()) {
            return Err(PrmError::InvalidCpd(String::from("entries must be finite and non-negative")));
        }

        for (r, row) in matrix.rows().into_iter().enumerate() {
            if (row.sum() - 1.0).abs() > 1e-6 {
                return Err(PrmError::InvalidCpd(format!("row {} sums to {}", r, row.sum())));
            }
        }

        let mut multipliers = vec![1; parent_cardinalities.len()];
        for j in (0..parent_cardinalities.len().saturating_sub(1)).rev() {
            multipliers[j] = multipliers[j + 1] * parent_cardinalities[j + 1];
        }

        let log_matrix = matrix.mapv(f64::ln);
        Ok(Cpd { matrix, log_matrix, parent_cardinalities, multipliers })
    }

    /// The number of values of the attribute
    pub fn cardinality(&self) -> usize {
        self.matrix.ncols()
    }

    /// The number of joint parent assignments
    pub fn rows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn parent_cardinalities(&self) -> &[usize] {
        &self.parent_cardinalities
    }

    pub fn matrix(&self) -> &nd::Array2<f64> {
        &self.matrix
    }

    /// The row of the joint parent assignment `assignment` (domain indices in parent order)
    pub fn index_row(&self, assignment: &[usize]) -> usize {
        assignment.iter().zip(self.multipliers.iter()).map(|(i, m)| i * m).sum()
    }

    /// The joint parent assignment of `row`
    pub fn reverse_index_row(&self, row: usize) -> Vec<usize> {
        let mut rest = row;
        self.multipliers.iter().map(|m| {
            let i = rest / m;
            rest %= m;
            i
        }).collect()
    }

    pub fn prob(&self, row: usize, value: usize) -> f64 {
        self.matrix[[row, value]]
    }

    pub fn log_prob(&self, row: usize, value: usize) -> f64 {
        self.log_matrix[[row, value]]
    }
}


/// An attribute class of an entity or relationship
#[derive(Clone, Debug)]
pub struct Attribute {
    pub id: AttrId,

    /// The full name, `Entity.attribute`
    pub name: String,

    /// The entity (or relationship) the attribute belongs to
    pub entity: String,

    /// The number of primary key columns of the entity
    pub key_arity: usize,

    /// The ordered domain values
    pub domain: Vec<i64>,

    /// The parents, in CPD order
    pub parents: Vec<AttrId>,

    /// The dependencies this attribute is the child of, in parent order
    pub dependencies_child: Vec<DepId>,

    /// The dependencies this attribute is the parent of
    pub dependencies_parent: Vec<DepId>,

    pub cpd: Option<Cpd>,

    /// `true` for the exist attribute of a reference uncertainty dependency. Exist attributes
    /// never get vertices of their own.
    pub is_exist: bool,
}

impl Attribute {

    pub fn cardinality(&self) -> usize {
        self.domain.len()
    }

    /// Index of `value` in the domain
    pub fn index_of(&self, value: i64) -> Option<usize> {
        self.domain.iter().position(|&v| v == value)
    }

    /// Index of the domain value closest to `value`. Ties go to the earlier value.
    pub fn nearest_index(&self, value: i64) -> usize {
        self.domain.iter()
            .enumerate()
            .min_by_key(|&(i, v)| ((v - value).abs(), i))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    pub fn has_parents(&self) -> bool {
        !self.parents.is_empty()
    }
}


/// The relational schema together with its probabilistic model
#[derive(Clone)]
pub struct Schema {
    attributes: Vec<Attribute>,
    dependencies: Vec<Dependency>,
    names: BidirMap<AttrId, String>,
}

impl Schema {

    /// Get an attribute. `id` must have been issued by this `Schema`.
    pub fn attribute(&self, id: AttrId) -> &Attribute {
        &self.attributes[id.0]
    }

    /// Get a dependency. `id` must have been issued by this `Schema`.
    pub fn dependency(&self, id: DepId) -> &Dependency {
        &self.dependencies[id.0]
    }

    /// Lookup an attribute by its full name
    pub fn lookup(&self, name: &str) -> Option<AttrId> {
        self.names.get_by_second(&String::from(name)).cloned()
    }

    /// Lookup the full name of an attribute
    pub fn name(&self, id: AttrId) -> &str {
        &self.attributes[id.0].name
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter()
    }

    /// Replace the CPD of an attribute, e.g. after learning it from data
    ///
    /// # Errors
    /// `InvalidCpd` if the CPD does not match the attribute and its parents
    pub fn set_cpd(&mut self, id: AttrId, cpd: Cpd) -> Result<()> {
        let expected: Vec<usize> = self.attribute(id).parents.iter()
                                                             .map(|&p| self.attribute(p).cardinality())
                                                             .collect();

        if cpd.parent_cardinalities() != &expected[..] || cpd.cardinality() != self.attribute(id).cardinality() {
            return Err(PrmError::InvalidCpd(format!("CPD does not match attribute {}", self.name(id))));
        }

        self.attributes[id.0].cpd = Some(cpd);
        Ok(())
    }

    /// The position of `parent` in the CPD order of `child`, for the dependency `dep`. `None` if
    /// `dep` is not registered with its child.
    pub fn parent_position(&self, dep: DepId) -> Option<usize> {
        let d = self.dependency(dep);
        self.attribute(d.child).dependencies_child.iter().position(|&x| x == dep)
    }
}


/// Builder for a `Schema`.
///
/// Errors are deferred until `build` is called.
pub struct SchemaBuilder {
    attributes: Vec<Attribute>,
    dependencies: Vec<Dependency>,
    names: BidirMap<AttrId, String>,
    cpds: Vec<(String, Initialization)>,
    err: Option<PrmError>,
}

impl SchemaBuilder {

    pub fn new() -> Self {
        SchemaBuilder {
            attributes: Vec::new(),
            dependencies: Vec::new(),
            names: BidirMap::new(),
            cpds: Vec::new(),
            err: None,
        }
    }

    /// Add an attribute class `entity.name`
    pub fn with_attribute(self, entity: &str, name: &str, key_arity: usize, domain: Domain) -> Self {
        self.push_attribute(entity, name, key_arity, domain, false)
    }

    /// Add the binary exist attribute of a reference uncertainty relationship
    pub fn with_exist_attribute(self, entity: &str, name: &str, key_arity: usize) -> Self {
        self.push_attribute(entity, name, key_arity, Domain::Binary, true)
    }

    /// Add a dependency `parent -> child` between two attributes, given by full name
    pub fn with_dependency(self, parent: &str, child: &str, aggregator: Option<Aggregator>) -> Self {
        self.push_dependency(parent, child, aggregator, None)
    }

    /// Add a reference uncertainty dependency `parent -> child`.
    ///
    /// # Args
    /// * `exist`: the full name of the exist attribute
    /// * `n_is_parent`: `true` if `parent` is the n-side, `false` if `child` is
    /// * `k`: the number of references per n-side object
    pub fn with_uncertain_dependency(
        mut self,
        parent: &str,
        child: &str,
        exist: &str,
        n_is_parent: bool,
        k: usize,
        aggregator: Option<Aggregator>
    ) -> Self {
        if self.err.is_some() {
            return self;
        }

        let (p, c, e) = match (self.lookup(parent), self.lookup(child), self.lookup(exist)) {
            (Some(p), Some(c), Some(e)) => (p, c, e),
            _ => {
                let missing = [parent, child, exist].iter()
                                                    .find(|n| self.lookup(n).is_none())
                                                    .map(|n| n.to_string())
                                                    .unwrap_or_default();
                self.err = Some(PrmError::UnknownAttribute(missing));
                return self;
            }
        };

        if k == 0 {
            self.err = Some(PrmError::General(String::from("k must be at least 1")));
            return self;
        }

        if !self.attributes[e.0].is_exist {
            self.err = Some(PrmError::General(format!("{} is not an exist attribute", exist)));
            return self;
        }

        let uncertainty = if n_is_parent {
            Uncertainty { exist: e, k_attribute: c, n_attribute: p, n_is_parent, k }
        } else {
            Uncertainty { exist: e, k_attribute: p, n_attribute: c, n_is_parent, k }
        };

        self.push_dependency(parent, child, aggregator, Some(uncertainty))
    }

    /// Set the CPD of an attribute
    pub fn with_cpd(mut self, attr: &str, init: Initialization) -> Self {
        self.cpds.push((String::from(attr), init));
        self
    }

    /// Build the `Schema`, building and verifying every CPD
    pub fn build(self) -> Result<Schema> {
        if let Some(e) = self.err {
            return Err(e);
        }

        let mut schema = Schema {
            attributes: self.attributes,
            dependencies: self.dependencies,
            names: self.names,
        };

        for (name, init) in self.cpds {
            let id = schema.lookup(&name).ok_or_else(|| PrmError::UnknownAttribute(name.clone()))?;
            let parent_cards: Vec<usize> = schema.attribute(id).parents.iter()
                                                                     .map(|&p| schema.attribute(p).cardinality())
                                                                     .collect();

            let cpd = init.build_cpd(schema.attribute(id).cardinality(), &parent_cards)?;
            schema.set_cpd(id, cpd)?;
        }

        Ok(schema)
    }

    fn lookup(&self, name: &str) -> Option<AttrId> {
        self.names.get_by_second(&String::from(name)).cloned()
    }

    fn push_attribute(mut self, entity: &str, name: &str, key_arity: usize, domain: Domain, is_exist: bool) -> Self {
        if self.err.is_some() {
            return self;
        }

        let full = format!("{}.{}", entity, name);
        if self.lookup(&full).is_some() {
            self.err = Some(PrmError::General(format!("Duplicate attribute {}", full)));
            return self;
        }

        let values = domain.values();
        if values.is_empty() {
            self.err = Some(PrmError::InvalidDomain(format!("{} has an empty domain", full)));
            return self;
        }

        let id = AttrId(self.attributes.len());
        self.names.insert(id, full.clone());
        self.attributes.push(Attribute {
            id,
            name: full,
            entity: String::from(entity),
            key_arity,
            domain: values,
            parents: Vec::new(),
            dependencies_child: Vec::new(),
            dependencies_parent: Vec::new(),
            cpd: None,
            is_exist,
        });

        self
    }

    fn push_dependency(
        mut self,
        parent: &str,
        child: &str,
        aggregator: Option<Aggregator>,
        uncertain: Option<Uncertainty>
    ) -> Self {
        if self.err.is_some() {
            return self;
        }

        let (p, c) = match (self.lookup(parent), self.lookup(child)) {
            (Some(p), Some(c)) => (p, c),
            (None, _) => {
                self.err = Some(PrmError::UnknownAttribute(String::from(parent)));
                return self;
            },
            (_, None) => {
                self.err = Some(PrmError::UnknownAttribute(String::from(child)));
                return self;
            }
        };

        if self.attributes[c.0].parents.contains(&p) {
            self.err = Some(PrmError::General(format!("Duplicate dependency {} -> {}", parent, child)));
            return self;
        }

        if self.attributes[p.0].is_exist {
            self.err = Some(PrmError::General(format!("Exist attribute {} cannot be a parent", parent)));
            return self;
        }

        let id = DepId(self.dependencies.len());
        self.dependencies.push(Dependency { id, parent: p, child: c, aggregator, uncertain });
        self.attributes[c.0].parents.push(p);
        self.attributes[c.0].dependencies_child.push(id);
        self.attributes[p.0].dependencies_parent.push(id);

        self
    }
}
