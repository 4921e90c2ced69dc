//! Defines a Metropolis-Hastings sampler over the reference vertices of a `Graph`.
//!
//! Each reference slot proposes a k-side object uniformly from the candidates of the uncertain
//! dependency. Since the proposal is symmetric, the acceptance ratio only depends on the exist
//! attribute of the old and the new object.

use crate::network::Graph;
use crate::schema::Schema;
use crate::util::{PrmError, Result};

use rand::Rng;


pub struct MetropolisSampler<'a> {
    schema: &'a Schema,
}

impl<'a> MetropolisSampler<'a> {

    pub fn new(schema: &'a Schema) -> Self {
        MetropolisSampler { schema }
    }

    /// The acceptance ratio of replacing the reference to the k-side object `old` by one to `new`:
    ///
    /// ```text
    /// P(e = 0 | old) * P(e = 1 | new) / (P(e = 1 | old) * P(e = 0 | new))
    /// ```
    ///
    /// where `e` is the exist attribute, conditioned on the exist parents of each object. An exist
    /// attribute without a CPD accepts every proposal.
    ///
    /// # Errors
    /// `NotAReference` if `ref_id` is not a reference vertex
    pub fn acceptance_ratio(&self, graph: &Graph, ref_id: &str, old: &str, new: &str) -> Result<f64> {
        let schema = self.schema;
        let r = graph.reference(ref_id).ok_or_else(|| PrmError::NotAReference(ref_id.to_string()))?;
        let u = schema.dependency(r.dep).uncertain.ok_or(PrmError::UnknownDependency)?;

        let cpd = match schema.attribute(u.exist).cpd.as_ref() {
            Some(cpd) => cpd,
            None => return Ok(1.),
        };

        let row_old = graph.exist_parent_assignment(schema, r.dep, old)?;
        let row_new = graph.exist_parent_assignment(schema, r.dep, new)?;

        let log_alpha = cpd.log_prob(row_old, 0) + cpd.log_prob(row_new, 1)
                      - cpd.log_prob(row_old, 1) - cpd.log_prob(row_new, 0);
        Ok(log_alpha.exp())
    }

    /// Propose a new k-side object for each reference slot of `ref_id` in turn
    ///
    /// # Returns
    /// The number of accepted proposals
    pub fn mh_step<R: Rng + ?Sized>(&self, rng: &mut R, graph: &mut Graph, ref_id: &str) -> Result<usize> {
        let (dep, slots) = {
            let r = graph.reference(ref_id).ok_or_else(|| PrmError::NotAReference(ref_id.to_string()))?;
            (r.dep, r.references.keys().cloned().collect::<Vec<String>>())
        };

        let n = graph.candidates(dep).map_or(0, |c| c.len());
        if n == 0 {
            return Ok(0);
        }

        let mut accepted = 0;
        for old in slots {
            let i = rng.gen_range(0..n);
            let (new, k_vertex) = match graph.candidates(dep).and_then(|c| c.get_index(i)) {
                Some((object, vertex)) => (object.clone(), vertex.clone()),
                None => continue,
            };

            if graph.reference(ref_id).map_or(false, |r| r.references.contains_key(&new)) {
                continue;
            }

            let alpha = self.acceptance_ratio(graph, ref_id, &old, &new)?;
            if alpha.is_nan() || rng.gen::<f64>() > alpha {
                tracing::debug!("Rejected {} -> {} for {} (alpha {})", old, new, ref_id, alpha);
                continue;
            }

            tracing::debug!("Accepted {} -> {} for {} (alpha {})", old, new, ref_id, alpha);
            graph.replace_reference(self.schema, ref_id, &old, &k_vertex)?;
            accepted += 1;
        }

        Ok(accepted)
    }
}
