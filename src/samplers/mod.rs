//! Markov chain Monte Carlo over a ground network.
//!
//! Ground vertices are resampled with Gibbs steps, reference vertices with Metropolis-Hastings
//! steps. `McmcSampler` combines both into one sweep, visiting vertices by a `Strategy`.

use crate::likelihood::LikelihoodTables;
use crate::network::Graph;
use crate::schema::{AttrId, Schema};
use crate::util::{PrmError, Result};

use rand::seq::SliceRandom;
use rand::Rng;

pub mod gibbs;
pub mod metropolis;

pub use self::gibbs::GibbsSampler;
pub use self::metropolis::MetropolisSampler;
pub use crate::config::Strategy;


/// Invert the cumulative distribution of `dist` at `u`, a draw from `[0, 1)`
pub fn sample_from(dist: &[f64], u: f64) -> usize {
    let mut upper = 0.0;
    for (i, p) in dist.iter().enumerate() {
        upper += p;
        if u < upper {
            return i;
        }
    }

    // rounding can leave the total slightly below 1
    dist.len().saturating_sub(1)
}


/// Runs the Gibbs and Metropolis-Hastings steps of one chain
pub struct McmcSampler<'a> {
    schema: &'a Schema,
    gibbs: GibbsSampler<'a>,
    metropolis: MetropolisSampler<'a>,
    strategy: Strategy,
}

impl<'a> McmcSampler<'a> {

    pub fn new(schema: &'a Schema, tables: &'a LikelihoodTables, strategy: Strategy) -> Self {
        McmcSampler {
            schema,
            gibbs: GibbsSampler::new(schema, tables),
            metropolis: MetropolisSampler::new(schema),
            strategy,
        }
    }

    /// Draw the initial state of a chain: a uniform value for every latent ground vertex, and
    /// `min(k, candidates)` distinct uniform references for every reference vertex.
    pub fn init<R: Rng + ?Sized>(&self, rng: &mut R, graph: &mut Graph) -> Result<()> {
        let schema = self.schema;

        let sampling: Vec<String> = graph.sampling().iter().cloned().collect();
        for id in sampling {
            let card = graph.ground(&id)
                            .map(|v| schema.attribute(v.attr).cardinality())
                            .ok_or_else(|| PrmError::MissingVertex(id.clone()))?;
            graph.set_value(&id, rng.gen_range(0..card))?;
        }

        let references: Vec<String> = graph.references().iter().cloned().collect();
        for ref_id in references {
            graph.remove_all_references(schema, &ref_id)?;

            let dep = graph.reference(&ref_id).ok_or_else(|| PrmError::NotAReference(ref_id.clone()))?.dep;
            let k = schema.dependency(dep).uncertain.map_or(1, |u| u.k);
            let picks: Vec<String> = match graph.candidates(dep) {
                Some(candidates) => {
                    let vertices: Vec<&String> = candidates.values().collect();
                    vertices.choose_multiple(rng, k).map(|v| v.to_string()).collect()
                },
                None => Vec::new(),
            };

            for k_vertex in picks {
                graph.add_reference(schema, &ref_id, &k_vertex)?;
            }
        }

        Ok(())
    }

    /// One iteration of the chain
    pub fn sweep<R: Rng + ?Sized>(&self, rng: &mut R, graph: &mut Graph) -> Result<()> {
        match self.strategy {
            Strategy::Standard => {
                let sampling: Vec<String> = graph.sampling().iter().cloned().collect();
                for id in sampling.iter() {
                    self.gibbs.gibbs_step(rng, graph, id)?;
                }

                let references: Vec<String> = graph.references().iter().cloned().collect();
                self.metropolis_sweep(rng, graph, &references)
            },
            Strategy::Block => {
                let attrs = graph.sampling_attributes();
                let attr = match attrs.choose(rng) {
                    Some(&attr) => attr,
                    None => {
                        let references: Vec<String> = graph.references().iter().cloned().collect();
                        return self.metropolis_sweep(rng, graph, &references);
                    }
                };

                let block: Vec<String> = graph.sampling_by_attribute(attr)
                                              .map(|ids| ids.iter().cloned().collect())
                                              .unwrap_or_default();
                for id in block.iter() {
                    self.gibbs.gibbs_step(rng, graph, id)?;
                }

                let references = self.references_touching(graph, attr);
                self.metropolis_sweep(rng, graph, &references)
            },
            Strategy::Random => {
                let n = graph.sampling().len();
                for _ in 0..n {
                    let i = rng.gen_range(0..n);
                    if let Some(id) = graph.sampling().get_index(i).cloned() {
                        self.gibbs.gibbs_step(rng, graph, &id)?;
                    }
                }

                let references: Vec<String> = graph.references().iter().cloned().collect();
                self.metropolis_sweep(rng, graph, &references)
            }
        }
    }

    /// The reference vertices of dependencies with `attr` on either side
    fn references_touching(&self, graph: &Graph, attr: AttrId) -> Vec<String> {
        let schema = self.schema;
        graph.references()
             .iter()
             .filter(|id| graph.reference(id).map_or(false, |r| {
                 let d = schema.dependency(r.dep);
                 d.parent == attr || d.child == attr
             }))
             .cloned()
             .collect()
    }

    fn metropolis_sweep<R: Rng + ?Sized>(&self, rng: &mut R, graph: &mut Graph, references: &[String]) -> Result<()> {
        for ref_id in references {
            self.metropolis.mh_step(rng, graph, ref_id)?;
        }
        Ok(())
    }
}
