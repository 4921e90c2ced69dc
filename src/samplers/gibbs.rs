//! Defines a Gibbs sampler over the ground vertices of a `Graph`.
//!
//! The full conditional of a vertex `v` is proportional to its own CPD entry times the CPD entry of
//! each child given its parents, with `v` set to each candidate value. Children that depend on
//! `v` directly are scored with a precomputed `Clf`. Children that aggregate over `v` and its
//! siblings have their parent assignment recomputed for every candidate value.

use super::sample_from;
use crate::likelihood::LikelihoodTables;
use crate::network::Graph;
use crate::schema::Schema;
use crate::util::{PrmError, Result};

use rand::Rng;


pub struct GibbsSampler<'a> {
    schema: &'a Schema,
    tables: &'a LikelihoodTables,
}

impl<'a> GibbsSampler<'a> {

    pub fn new(schema: &'a Schema, tables: &'a LikelihoodTables) -> Self {
        GibbsSampler { schema, tables }
    }

    /// The distribution of the ground vertex `id` given its Markov blanket, one probability per
    /// domain value. Artificial vertices have a uniform prior.
    ///
    /// # Errors
    /// * `MissingVertex` if `id` is not a ground vertex of `graph`
    /// * `MissingCpd` if a child's attribute has no `Clf`
    pub fn full_conditional(&self, graph: &Graph, id: &str) -> Result<Vec<f64>> {
        let schema = self.schema;
        let v = graph.ground(id).ok_or_else(|| PrmError::MissingVertex(id.to_string()))?;
        let attr = schema.attribute(v.attr);
        let card = attr.cardinality();

        //////////////////////////////////////////////////////////////
        // 1) P(v | parents)
        let mut log_p: Vec<f64> = match attr.cpd.as_ref() {
            Some(cpd) if !v.artificial => {
                let row = cpd.index_row(&graph.parent_assignment(schema, id)?);
                (0..card).map(|x| cpd.log_prob(row, x)).collect()
            },
            _ => vec![0.; card],
        };

        //////////////////////////////////////////////////////////////
        // 2) P(c | parents of c) for every child c
        for child_id in v.child_ids() {
            let c = match graph.ground(child_id) {
                Some(c) if !c.artificial => c,
                _ => continue,
            };
            let c_attr = schema.attribute(c.attr);
            let (c_value, c_cpd) = match (c.value, c_attr.cpd.as_ref()) {
                (Some(value), Some(cpd)) => (value, cpd),
                _ => continue,
            };
            let dep = match c_attr.dependencies_child.iter().find(|&&d| schema.dependency(d).parent == v.attr) {
                Some(&dep) => dep,
                None => continue,
            };

            if schema.dependency(dep).aggregator.is_some() {
                for (x, lp) in log_p.iter_mut().enumerate() {
                    let assignment = graph.parent_assignment_with(schema, child_id, Some((id, x)))?;
                    *lp += c_cpd.log_prob(c_cpd.index_row(&assignment), c_value);
                }
                continue;
            }

            // without an aggregator, only the first parent vertex is read
            let read = c.parents.get(&v.attr)
                                .and_then(|ps| ps.iter().find(|p| p.as_str() == id || graph.value(p).is_some()))
                                .map_or(false, |p| p.as_str() == id);
            if !read {
                continue;
            }

            let position = schema.parent_position(dep).ok_or(PrmError::UnknownDependency)?;
            let clf = self.tables.clf(c.attr, position)
                                 .ok_or_else(|| PrmError::MissingCpd(c_attr.name.clone()))?;
            let row = clf.row_index(c_value, &graph.parent_assignment(schema, child_id)?);
            for (x, lp) in log_p.iter_mut().enumerate() {
                *lp += clf.log_likelihood(row, x);
            }
        }

        Ok(normalize(&log_p, id))
    }

    /// Resample the latent ground vertex `id` from its full conditional
    ///
    /// # Returns
    /// The new value index
    ///
    /// # Errors
    /// `General` if `id` is evidence
    pub fn gibbs_step<R: Rng + ?Sized>(&self, rng: &mut R, graph: &mut Graph, id: &str) -> Result<usize> {
        let fixed = graph.ground(id).ok_or_else(|| PrmError::MissingVertex(id.to_string()))?.fixed;
        if fixed {
            return Err(PrmError::General(format!("cannot resample evidence vertex {}", id)));
        }

        let dist = self.full_conditional(graph, id)?;
        let value = sample_from(&dist, rng.gen::<f64>());
        graph.set_value(id, value)?;
        Ok(value)
    }
}

/// Exponentiate and normalize log-probabilities. A distribution without any finite entry becomes
/// uniform.
fn normalize(log_p: &[f64], id: &str) -> Vec<f64> {
    let max = log_p.iter().cloned().filter(|l| !l.is_nan()).fold(std::f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        tracing::warn!("Degenerate full conditional of {}, sampling uniformly", id);
        return vec![1. / log_p.len() as f64; log_p.len()];
    }

    let p: Vec<f64> = log_p.iter().map(|&l| if l.is_nan() { 0. } else { (l - max).exp() }).collect();
    let sum: f64 = p.iter().sum();
    p.iter().map(|x| x / sum).collect()
}
