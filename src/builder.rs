//! Defines the `NetworkBuilder`, which unrolls the ground Bayesian network of a `Query`.
//!
//! The builder performs a breadth-first expansion from the event variables, batched by attribute:
//!
//! 1. every event object is added and pushed to the frontier
//! 2. a popped attribute bucket has the parents of all its vertices loaded, and the children of
//!    its latent vertices loaded. New latent vertices are pushed. Evidence reached as a parent
//!    d-separates and is not pushed; evidence reached as a child is pushed so that its other
//!    parents (V-structures) are reached.
//! 3. reference uncertainty dependencies load every k-side candidate and the exist parents of each
//!    candidate once, and give each n-side vertex a `ReferenceVertex`
//!
//! Two post-passes follow: latent vertices without children that are not events are pruned
//! (they cannot change the posterior), and missing parents are filled with artificial vertices.

use crate::config::EngineConfig;
use crate::data::{DataInterface, Row};
use crate::network::vertex::{artificial_id, object_id, reference_id, vertex_id};
use crate::network::{FrontierQueue, Graph};
use crate::query::Query;
use crate::schema::{AttrId, DepId, Schema};
use crate::util::{PrmError, Result};

use indexmap::IndexSet;
use rand::seq::SliceRandom;
use rand::Rng;


/// Split a `[value, pk...]` row
fn object_row(row: &Row, arity: usize) -> Result<(Option<i64>, Vec<i64>)> {
    if row.len() != arity + 1 {
        return Err(PrmError::General(format!("Expected {} columns, found {}", arity + 1, row.len())));
    }

    Ok((row[0], keys(&row[1..])?))
}

/// Split a `[firstPk..., secondPk..., value]` row
fn link_row(row: &Row, first: usize, second: usize) -> Result<(Vec<i64>, Vec<i64>, Option<i64>)> {
    if row.len() != first + second + 1 {
        return Err(PrmError::General(format!("Expected {} columns, found {}", first + second + 1, row.len())));
    }

    Ok((keys(&row[..first])?, keys(&row[first..first + second])?, row[first + second]))
}

fn keys(cols: &[Option<i64>]) -> Result<Vec<i64>> {
    cols.iter()
        .map(|k| k.ok_or_else(|| PrmError::General(String::from("Missing primary key value"))))
        .collect()
}


/// Builds the ground network of one `Query`. Consumed by `unroll`.
pub struct NetworkBuilder<'a> {
    schema: &'a Schema,
    data: &'a dyn DataInterface,
    query: &'a Query,
    config: &'a EngineConfig,

    graph: Graph,
    queue: FrontierQueue,

    /// Uncertain dependencies whose candidates and exist parents are loaded
    initialized: IndexSet<DepId>,
}

impl<'a> NetworkBuilder<'a> {

    pub fn new(schema: &'a Schema, data: &'a dyn DataInterface, query: &'a Query, config: &'a EngineConfig) -> Self {
        NetworkBuilder {
            schema,
            data,
            query,
            config,
            graph: Graph::new(),
            queue: FrontierQueue::new(),
            initialized: IndexSet::new(),
        }
    }

    /// Unroll the ground network.
    ///
    /// # Args
    /// * `rng`: the random source for the initial references of reference vertices
    ///
    /// # Errors
    /// Any error of the `DataInterface`, malformed rows, evidence values outside of the domain and
    /// uncertain dependencies without candidates
    pub fn unroll<R: Rng + ?Sized>(mut self, rng: &mut R) -> Result<Graph> {
        let schema = self.schema;
        tracing::info!(
            "Unrolling ground network for {} event and {} evidence variables",
            self.query.event.len(), self.query.evidence.len()
        );

        ///////////////////////////////////////////////////////////////////////////////
        // 1) event vertices
        self.add_events()?;

        ///////////////////////////////////////////////////////////////////////////////
        // 2) breadth-first expansion, one attribute bucket at a time
        while let Some((attr, bucket)) = self.queue.pop_bucket() {
            tracing::debug!("Expanding {} vertices of {}", bucket.len(), schema.name(attr));

            let latent: Vec<String> = bucket.iter()
                                            .filter(|id| self.graph.ground(id).map_or(false, |v| !v.fixed))
                                            .cloned()
                                            .collect();

            self.add_references(attr, &bucket, rng)?;
            self.add_parents(attr, &bucket)?;
            self.add_children(attr, &latent)?;
        }

        ///////////////////////////////////////////////////////////////////////////////
        // 3) post-passes
        if self.config.prune_barren {
            self.prune_barren();
        }

        if self.config.validate {
            self.validate()?;
        }

        tracing::info!("Ground network: {}", self.graph.statistics());
        Ok(self.graph)
    }

    fn page_size(&self) -> usize {
        self.config.max_keys_per_call.max(1)
    }

    fn keys_of(&self, ids: &[String]) -> Vec<Vec<i64>> {
        ids.iter().filter_map(|id| self.graph.ground(id)).map(|v| v.keys.clone()).collect()
    }

    /// Add the object `keys` of `attr`, loaded with `value`, unless it is in the graph already.
    ///
    /// Objects in evidence with a value become fixed vertices, pushed only if `push_evidence`.
    /// Everything else becomes a latent vertex and is pushed. Evidence that is already in the graph
    /// is pushed as well if `push_evidence`, so evidence first reached as a parent still has its
    /// other parents loaded once it is reached as a child.
    fn discover(&mut self, attr: AttrId, keys: Vec<i64>, value: Option<i64>, push_evidence: bool) -> Result<String> {
        let schema = self.schema;
        let query = self.query;
        let id = vertex_id(schema, attr, &keys);
        if self.graph.contains(&id) {
            if push_evidence && self.graph.ground(&id).map_or(false, |v| v.fixed) {
                self.queue.push(attr, &id);
            }
            return Ok(id);
        }

        match value.filter(|_| query.obj_in_evidence(attr, &id)) {
            Some(value) => {
                let index = self.evidence_index(attr, &id, value)?;
                self.graph.add_evidence_vertex(id.clone(), attr, keys, index, false);
                if push_evidence {
                    self.queue.push(attr, &id);
                }
            },
            None => {
                self.graph.add_sampling_vertex(id.clone(), attr, keys, false);
                self.queue.push(attr, &id);
            }
        }

        Ok(id)
    }

    fn evidence_index(&self, attr: AttrId, id: &str, value: i64) -> Result<usize> {
        self.schema.attribute(attr).index_of(value).ok_or_else(|| {
            PrmError::InvalidDomain(format!("Evidence {} = {} is not in the domain", id, value))
        })
    }

    fn add_events(&mut self) -> Result<()> {
        let schema = self.schema;
        let query = self.query;
        for qvar in query.event.iter() {
            let arity = schema.attribute(qvar.attr).key_arity;
            let rows = self.data.load_objects(schema, qvar)?;
            tracing::debug!("Loaded {} event objects of {}", rows.len(), schema.name(qvar.attr));

            for row in rows {
                let (value, keys) = object_row(&row, arity)?;
                let id = vertex_id(schema, qvar.attr, &keys);
                if self.graph.contains(&id) {
                    continue;
                }

                match value.filter(|_| query.obj_in_evidence(qvar.attr, &id)) {
                    Some(value) => {
                        let index = self.evidence_index(qvar.attr, &id, value)?;
                        self.graph.add_evidence_vertex(id.clone(), qvar.attr, keys, index, true);
                    },
                    None => {
                        self.graph.add_sampling_vertex(id.clone(), qvar.attr, keys, true);
                    }
                }

                self.queue.push(qvar.attr, &id);
            }
        }

        Ok(())
    }

    /// Create the reference vertices of every vertex in `bucket` that is the n-side of an
    /// uncertain dependency
    fn add_references<R: Rng + ?Sized>(&mut self, attr: AttrId, bucket: &[String], rng: &mut R) -> Result<()> {
        let schema = self.schema;
        let a = schema.attribute(attr);
        let deps: Vec<DepId> = a.dependencies_child.iter()
                                                   .chain(a.dependencies_parent.iter())
                                                   .cloned()
                                                   .filter(|&dep| {
                                                       schema.dependency(dep)
                                                             .uncertain
                                                             .map_or(false, |u| u.n_attribute == attr)
                                                   })
                                                   .collect();

        for dep in deps {
            self.init_reference_uncertainty(dep)?;
            for id in bucket {
                self.add_reference_vertex(dep, id, rng)?;
            }
        }

        Ok(())
    }

    /// Load every k-side candidate of `dep` and the exist parents of each candidate. Runs once
    /// per dependency.
    fn init_reference_uncertainty(&mut self, dep: DepId) -> Result<()> {
        let schema = self.schema;
        if !self.initialized.insert(dep) {
            return Ok(());
        }

        let u = schema.dependency(dep).uncertain.ok_or(PrmError::UnknownDependency)?;
        let k_arity = schema.attribute(u.k_attribute).key_arity;

        let rows = self.data.load_attribute_objects(schema, u.k_attribute)?;
        tracing::debug!(
            "Loaded {} candidates of {} for reference uncertainty",
            rows.len(), schema.name(u.k_attribute)
        );

        for row in rows {
            let (value, keys) = object_row(&row, k_arity)?;
            let object = object_id(schema, u.k_attribute, &keys);
            let id = self.discover(u.k_attribute, keys, value, false)?;
            self.graph.add_candidate(dep, object, id);
        }

        for &parent in schema.attribute(u.exist).parents.iter() {
            let p_arity = schema.attribute(parent).key_arity;
            let rows = self.data.load_exist_parents(schema, dep, parent)?;
            tracing::debug!("Loaded {} exist parents of {}", rows.len(), schema.name(parent));

            for row in rows {
                let (k_keys, p_keys, value) = link_row(&row, k_arity, p_arity)?;
                let object = object_id(schema, u.k_attribute, &k_keys);
                let id = self.discover(parent, p_keys, value, false)?;
                self.graph.add_exist_parent(dep, object, parent, id);
            }
        }

        if self.graph.candidates(dep).map_or(true, |c| c.is_empty()) {
            return Err(PrmError::EmptyCandidates(schema.name(u.k_attribute).to_string()));
        }

        Ok(())
    }

    /// Add the reference vertex of the n-side vertex `n_vertex`, referencing up to `k` candidates
    /// chosen uniformly at random
    fn add_reference_vertex<R: Rng + ?Sized>(&mut self, dep: DepId, n_vertex: &str, rng: &mut R) -> Result<()> {
        let schema = self.schema;
        let ref_id = reference_id(n_vertex);
        let event = self.graph.get(n_vertex).map_or(false, |v| v.is_event());
        if !self.graph.add_reference_vertex(ref_id.clone(), dep, n_vertex.to_string(), event) {
            return Ok(());
        }

        let k = schema.dependency(dep).uncertain.map_or(1, |u| u.k);
        let candidates: Vec<String> = self.graph.candidates(dep)
                                                .map(|c| c.values().cloned().collect())
                                                .unwrap_or_default();

        for k_vertex in candidates.choose_multiple(rng, k) {
            self.graph.add_reference(schema, &ref_id, k_vertex)?;
        }

        Ok(())
    }

    /// Load the parents of every vertex in `bucket`, one call per dependency and page of keys
    fn add_parents(&mut self, attr: AttrId, bucket: &[String]) -> Result<()> {
        let schema = self.schema;
        let keys = self.keys_of(bucket);
        let arity = schema.attribute(attr).key_arity;

        for &dep in schema.attribute(attr).dependencies_child.iter() {
            let d = schema.dependency(dep);
            if d.is_uncertain() {
                continue;
            }

            let p_arity = schema.attribute(d.parent).key_arity;
            for page in keys.chunks(self.page_size()) {
                let rows = self.data.load_parents(schema, dep, page)?;
                tracing::debug!("Loaded {} parents of {}", rows.len(), schema.name(attr));

                for row in rows {
                    let (child_keys, parent_keys, value) = link_row(&row, arity, p_arity)?;
                    let child = vertex_id(schema, attr, &child_keys);
                    if !self.graph.contains(&child) {
                        continue;
                    }

                    let parent = self.discover(d.parent, parent_keys, value, false)?;
                    self.graph.add_parent(&child, &parent)?;
                }
            }
        }

        Ok(())
    }

    /// Load the children of every vertex in `latent`, one call per dependency and page of keys
    fn add_children(&mut self, attr: AttrId, latent: &[String]) -> Result<()> {
        let schema = self.schema;
        if latent.is_empty() {
            return Ok(());
        }

        let keys = self.keys_of(latent);
        let arity = schema.attribute(attr).key_arity;

        for &dep in schema.attribute(attr).dependencies_parent.iter() {
            let d = schema.dependency(dep);
            if d.is_uncertain() || schema.attribute(d.child).is_exist {
                continue;
            }

            let c_arity = schema.attribute(d.child).key_arity;
            for page in keys.chunks(self.page_size()) {
                let rows = self.data.load_children(schema, dep, page)?;
                tracing::debug!("Loaded {} children of {}", rows.len(), schema.name(attr));

                for row in rows {
                    let (parent_keys, child_keys, value) = link_row(&row, arity, c_arity)?;
                    let parent = vertex_id(schema, attr, &parent_keys);
                    if !self.graph.contains(&parent) {
                        continue;
                    }

                    let child = self.discover(d.child, child_keys, value, true)?;
                    self.graph.add_parent(&child, &parent)?;
                }
            }
        }

        Ok(())
    }

    /// Remove latent, non-event vertices without children until none is left. Candidates, exist
    /// parents, n-side vertices of references and artificial vertices are kept.
    fn prune_barren(&mut self) {
        let mut protected: IndexSet<String> = IndexSet::new();
        for dep in self.initialized.iter() {
            if let Some(candidates) = self.graph.candidates(*dep) {
                protected.extend(candidates.values().cloned());
            }
        }
        for ref_id in self.graph.references().iter() {
            if let Some(r) = self.graph.reference(ref_id) {
                protected.insert(r.n_vertex.clone());
            }
        }

        let mut pruned = 0;
        loop {
            let barren: Vec<String> = self.graph.sampling()
                                                .iter()
                                                .filter(|id| !protected.contains(*id))
                                                .filter(|id| !self.graph.is_exist_parent(id))
                                                .filter(|id| {
                                                    self.graph.ground(id).map_or(false, |v| {
                                                        !v.event && !v.artificial && !v.has_children()
                                                    })
                                                })
                                                .cloned()
                                                .collect();

            if barren.is_empty() {
                break;
            }

            pruned += barren.len();
            for id in barren {
                self.graph.remove_vertex(&id);
            }
        }

        tracing::debug!("Pruned {} barren vertices", pruned);
    }

    /// Give every expanded ground vertex a parent vertex for each (certain) parent attribute,
    /// adding artificial vertices where data is missing. Evidence reached as a parent was never
    /// expanded and is skipped.
    fn validate(&mut self) -> Result<()> {
        let schema = self.schema;
        for attr in schema.attributes().filter(|a| a.has_parents() && !a.is_exist) {
            let ids: Vec<String> = match self.graph.all_by_attribute(attr.id) {
                Some(ids) => ids.iter().filter(|id| self.queue.was_pushed(id)).cloned().collect(),
                None => continue,
            };

            for id in ids {
                for &dep in attr.dependencies_child.iter() {
                    let d = schema.dependency(dep);
                    if d.is_uncertain() || self.graph.ground(&id).map_or(true, |v| v.artificial || v.has_parents(d.parent)) {
                        continue;
                    }

                    let artificial = artificial_id(schema, d.parent, &id);
                    tracing::warn!("{} has no parent of {}, adding {}", id, schema.name(d.parent), artificial);

                    self.graph.add_artificial_vertex(artificial.clone(), d.parent);
                    self.graph.add_parent(&id, &artificial)?;
                }
            }
        }

        Ok(())
    }
}
