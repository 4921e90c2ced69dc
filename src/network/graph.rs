//! Defines the ground Bayesian network `Graph`.
//!
//! # Representation
//! The vertices are held in one map keyed by ID. Derived indices (vertices by attribute, sampling
//! vertices, events, reference vertices) are maintained incrementally as vertices are added and
//! removed, so they are always exactly the views implied by each vertex's `fixed`/`event` flags.
//! Edges are stored on both endpoints: `w` is in `v.parents[w.attr]` iff `v` is in
//! `w.children[v.attr]`.

use super::vertex::{object_id, GroundVertex, ReferenceVertex, Vertex};
use crate::schema::{AttrId, DepId, Dependency, Schema, Uncertainty};
use crate::util::{PrmError, Result};

use indexmap::{IndexMap, IndexSet};

use std::fmt;


/// Summary statistics of a `Graph`
#[derive(Clone, Debug, PartialEq)]
pub struct GraphStatistics {
    pub vertices: usize,
    pub sampling: usize,
    pub evidence: usize,
    pub events: usize,
    pub references: usize,
    pub artificial: usize,
    pub avg_in_degree: f64,
    pub avg_out_degree: f64,
}

impl fmt::Display for GraphStatistics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} vertices ({} sampling, {} evidence, {} events, {} references, {} artificial), \
             avg in-degree {:.2}, avg out-degree {:.2}",
            self.vertices, self.sampling, self.evidence, self.events, self.references,
            self.artificial, self.avg_in_degree, self.avg_out_degree
        )
    }
}


/// A ground Bayesian network, created for and owned by a single inference call
#[derive(Clone, Debug, Default)]
pub struct Graph {
    vertices: IndexMap<String, Vertex>,

    all_by_attribute: IndexMap<AttrId, IndexSet<String>>,

    /// Non-fixed ground vertices
    sampling: IndexSet<String>,

    sampling_by_attribute: IndexMap<AttrId, IndexSet<String>>,

    events: IndexSet<String>,

    references: IndexSet<String>,

    references_by_dep: IndexMap<DepId, IndexSet<String>>,

    /// uncertain dependency -> k-side object ID -> k-side vertex ID
    candidates: IndexMap<DepId, IndexMap<String, String>>,

    /// uncertain dependency -> k-side object ID -> exist parent attribute -> parent vertex IDs
    exist_parents: IndexMap<DepId, IndexMap<String, IndexMap<AttrId, IndexSet<String>>>>,
}

impl Graph {

    pub fn new() -> Self {
        Graph::default()
    }

    ///////////////////////////////////////////////////////////////////////////////
    // Insertion

    /// Add a vertex and register it in every applicable index.
    ///
    /// # Returns
    /// `false`, without changing anything, if a vertex with the same ID exists
    pub fn add_vertex(&mut self, vertex: Vertex) -> bool {
        if self.vertices.contains_key(vertex.id()) {
            return false;
        }

        let id = vertex.id().to_string();
        match &vertex {
            Vertex::Ground(v) => {
                self.all_by_attribute.entry(v.attr).or_insert_with(IndexSet::new).insert(id.clone());
                if !v.fixed {
                    self.sampling.insert(id.clone());
                    self.sampling_by_attribute.entry(v.attr).or_insert_with(IndexSet::new).insert(id.clone());
                }
            },
            Vertex::Reference(r) => {
                self.references.insert(id.clone());
                self.references_by_dep.entry(r.dep).or_insert_with(IndexSet::new).insert(id.clone());
            }
        }

        if vertex.is_event() {
            self.events.insert(id.clone());
        }

        self.vertices.insert(id, vertex);
        true
    }

    /// Add a latent vertex whose value is sampled
    pub fn add_sampling_vertex(&mut self, id: String, attr: AttrId, keys: Vec<i64>, event: bool) -> bool {
        let mut v = GroundVertex::new(id, attr, keys);
        v.event = event;
        self.add_vertex(Vertex::Ground(v))
    }

    /// Add an observed vertex with the fixed value index `value`
    pub fn add_evidence_vertex(&mut self, id: String, attr: AttrId, keys: Vec<i64>, value: usize, event: bool) -> bool {
        let mut v = GroundVertex::new(id, attr, keys);
        v.value = Some(value);
        v.fixed = true;
        v.event = event;
        self.add_vertex(Vertex::Ground(v))
    }

    /// Add a latent vertex standing in for a missing parent
    pub fn add_artificial_vertex(&mut self, id: String, attr: AttrId) -> bool {
        let mut v = GroundVertex::new(id, attr, Vec::new());
        v.artificial = true;
        self.add_vertex(Vertex::Ground(v))
    }

    /// Add a reference vertex for the n-side vertex `n_vertex` of the uncertain dependency `dep`
    pub fn add_reference_vertex(&mut self, id: String, dep: DepId, n_vertex: String, event: bool) -> bool {
        let mut r = ReferenceVertex::new(id, dep, n_vertex);
        r.event = event;
        self.add_vertex(Vertex::Reference(r))
    }

    /// Add the edge `parent -> child`. Idempotent.
    ///
    /// # Returns
    /// `true` if the edge is new
    ///
    /// # Errors
    /// `MissingVertex` if either endpoint is not a ground vertex of this graph
    pub fn add_parent(&mut self, child: &str, parent: &str) -> Result<bool> {
        let child_attr = self.ground(child).ok_or_else(|| PrmError::MissingVertex(child.to_string()))?.attr;
        let parent_attr = self.ground(parent).ok_or_else(|| PrmError::MissingVertex(parent.to_string()))?.attr;

        let added = self.ground_mut(child)?
                        .parents
                        .entry(parent_attr)
                        .or_insert_with(IndexSet::new)
                        .insert(parent.to_string());

        self.ground_mut(parent)?
            .children
            .entry(child_attr)
            .or_insert_with(IndexSet::new)
            .insert(child.to_string());

        Ok(added)
    }

    /// Remove the edge `parent -> child`, if present
    pub fn remove_parent(&mut self, child: &str, parent: &str) -> Result<bool> {
        let child_attr = self.ground(child).ok_or_else(|| PrmError::MissingVertex(child.to_string()))?.attr;
        let parent_attr = self.ground(parent).ok_or_else(|| PrmError::MissingVertex(parent.to_string()))?.attr;

        let removed = self.ground_mut(child)?
                          .parents
                          .get_mut(&parent_attr)
                          .map_or(false, |ps| ps.shift_remove(parent));

        if let Some(cs) = self.ground_mut(parent)?.children.get_mut(&child_attr) {
            cs.shift_remove(child);
        }

        Ok(removed)
    }

    /// Remove a vertex, its edges and its index entries
    pub fn remove_vertex(&mut self, id: &str) -> Option<Vertex> {
        let vertex = self.vertices.shift_remove(id)?;

        match &vertex {
            Vertex::Ground(v) => {
                for p in v.parent_ids() {
                    if let Some(pv) = self.vertices.get_mut(p).and_then(|x| x.as_ground_mut()) {
                        if let Some(cs) = pv.children.get_mut(&v.attr) {
                            cs.shift_remove(id);
                        }
                    }
                }

                for c in v.child_ids() {
                    if let Some(cv) = self.vertices.get_mut(c).and_then(|x| x.as_ground_mut()) {
                        if let Some(ps) = cv.parents.get_mut(&v.attr) {
                            ps.shift_remove(id);
                        }
                    }
                }

                if let Some(ids) = self.all_by_attribute.get_mut(&v.attr) {
                    ids.shift_remove(id);
                }
                if let Some(ids) = self.sampling_by_attribute.get_mut(&v.attr) {
                    ids.shift_remove(id);
                }
                self.sampling.shift_remove(id);
            },
            Vertex::Reference(r) => {
                self.references.shift_remove(id);
                if let Some(ids) = self.references_by_dep.get_mut(&r.dep) {
                    ids.shift_remove(id);
                }
            }
        }

        self.events.shift_remove(id);
        Some(vertex)
    }

    ///////////////////////////////////////////////////////////////////////////////
    // Lookup

    pub fn contains(&self, id: &str) -> bool {
        self.vertices.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    pub fn ground(&self, id: &str) -> Option<&GroundVertex> {
        self.vertices.get(id).and_then(|v| v.as_ground())
    }

    pub fn reference(&self, id: &str) -> Option<&ReferenceVertex> {
        self.vertices.get(id).and_then(|v| v.as_reference())
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    /// The current value index of a ground vertex
    pub fn value(&self, id: &str) -> Option<usize> {
        self.ground(id).and_then(|v| v.value)
    }

    /// Set the value index of a latent ground vertex
    ///
    /// # Errors
    /// * `MissingVertex` if there is no such ground vertex
    /// * `General` if the vertex is evidence
    pub fn set_value(&mut self, id: &str, value: usize) -> Result<()> {
        let v = self.vertices.get_mut(id)
                             .and_then(|v| v.as_ground_mut())
                             .ok_or_else(|| PrmError::MissingVertex(id.to_string()))?;

        if v.fixed {
            return Err(PrmError::General(format!("Cannot change the value of evidence vertex {}", id)));
        }

        v.value = Some(value);
        Ok(())
    }

    pub fn all_by_attribute(&self, attr: AttrId) -> Option<&IndexSet<String>> {
        self.all_by_attribute.get(&attr)
    }

    /// The IDs of all latent ground vertices
    pub fn sampling(&self) -> &IndexSet<String> {
        &self.sampling
    }

    pub fn sampling_by_attribute(&self, attr: AttrId) -> Option<&IndexSet<String>> {
        self.sampling_by_attribute.get(&attr)
    }

    /// The attributes that have at least one latent vertex
    pub fn sampling_attributes(&self) -> Vec<AttrId> {
        self.sampling_by_attribute.iter()
                                  .filter(|(_, ids)| !ids.is_empty())
                                  .map(|(&a, _)| a)
                                  .collect()
    }

    pub fn events(&self) -> &IndexSet<String> {
        &self.events
    }

    /// The IDs of all reference vertices
    pub fn references(&self) -> &IndexSet<String> {
        &self.references
    }

    pub fn references_by_dep(&self, dep: DepId) -> Option<&IndexSet<String>> {
        self.references_by_dep.get(&dep)
    }

    ///////////////////////////////////////////////////////////////////////////////
    // Reference uncertainty

    /// Register `vertex` as a k-side candidate of `dep`, known by its object ID `object`
    pub fn add_candidate(&mut self, dep: DepId, object: String, vertex: String) {
        self.candidates.entry(dep).or_insert_with(IndexMap::new).insert(object, vertex);
    }

    /// k-side object ID -> k-side vertex ID of every candidate of `dep`
    pub fn candidates(&self, dep: DepId) -> Option<&IndexMap<String, String>> {
        self.candidates.get(&dep)
    }

    /// Add `vertex` to the exist parents of attribute `attr` for the k-side object `object`
    ///
    /// # Returns
    /// `false` if it was recorded before
    pub fn add_exist_parent(&mut self, dep: DepId, object: String, attr: AttrId, vertex: String) -> bool {
        self.exist_parents.entry(dep)
                          .or_insert_with(IndexMap::new)
                          .entry(object)
                          .or_insert_with(IndexMap::new)
                          .entry(attr)
                          .or_insert_with(IndexSet::new)
                          .insert(vertex)
    }

    /// exist parent attribute -> vertex IDs for the k-side object `object`
    pub fn exist_parents(&self, dep: DepId, object: &str) -> Option<&IndexMap<AttrId, IndexSet<String>>> {
        self.exist_parents.get(&dep).and_then(|m| m.get(object))
    }

    /// `true` if `id` is an exist parent of any k-side object
    pub fn is_exist_parent(&self, id: &str) -> bool {
        self.exist_parents.values().any(|m| m.values().any(|ps| ps.values().any(|p| p.contains(id))))
    }

    fn uncertainty(schema: &Schema, dep: DepId) -> Result<Uncertainty> {
        schema.dependency(dep).uncertain.ok_or(PrmError::UnknownDependency)
    }

    fn reference_parts(&self, schema: &Schema, ref_id: &str) -> Result<(String, Uncertainty, usize)> {
        let r = self.reference(ref_id).ok_or_else(|| PrmError::NotAReference(ref_id.to_string()))?;
        Ok((r.n_vertex.clone(), Graph::uncertainty(schema, r.dep)?, r.references.len()))
    }

    /// Wire the edge between the n-side and the k-side vertex in the direction of the dependency
    fn wire(&mut self, u: &Uncertainty, n: &str, k: &str, connect: bool) -> Result<bool> {
        let (child, parent) = if u.n_is_parent { (k, n) } else { (n, k) };
        if connect {
            self.add_parent(child, parent)
        } else {
            self.remove_parent(child, parent)
        }
    }

    /// Reference the k-side vertex `k_vertex` from the reference vertex `ref_id`, adding the edge
    /// between the n-side vertex and `k_vertex`.
    ///
    /// # Returns
    /// `false` if `k_vertex` is already referenced or `k` references exist
    pub fn add_reference(&mut self, schema: &Schema, ref_id: &str, k_vertex: &str) -> Result<bool> {
        let (n, u, count) = self.reference_parts(schema, ref_id)?;
        let k = self.ground(k_vertex).ok_or_else(|| PrmError::MissingVertex(k_vertex.to_string()))?;
        let object = object_id(schema, k.attr, &k.keys);

        let full = count >= u.k;
        let present = self.reference(ref_id).map_or(false, |r| r.references.contains_key(&object));
        if full || present {
            return Ok(false);
        }

        self.wire(&u, &n, k_vertex, true)?;
        if let Some(r) = self.vertices.get_mut(ref_id).and_then(|v| v.as_reference_mut()) {
            r.references.insert(object, k_vertex.to_string());
        }

        Ok(true)
    }

    /// Remove the reference to the k-side object `object` and its edge
    ///
    /// # Returns
    /// `false` if `object` was not referenced
    pub fn remove_reference(&mut self, schema: &Schema, ref_id: &str, object: &str) -> Result<bool> {
        let (n, u, _) = self.reference_parts(schema, ref_id)?;

        let removed = self.vertices.get_mut(ref_id)
                                   .and_then(|v| v.as_reference_mut())
                                   .and_then(|r| r.references.shift_remove(object));

        match removed {
            Some(k_vertex) => {
                self.wire(&u, &n, &k_vertex, false)?;
                Ok(true)
            },
            None => Ok(false)
        }
    }

    /// Replace the reference to the k-side object `old` by a reference to `k_vertex`
    pub fn replace_reference(&mut self, schema: &Schema, ref_id: &str, old: &str, k_vertex: &str) -> Result<bool> {
        if !self.remove_reference(schema, ref_id, old)? {
            return Ok(false);
        }

        self.add_reference(schema, ref_id, k_vertex)
    }

    /// Remove every reference of `ref_id` and their edges
    pub fn remove_all_references(&mut self, schema: &Schema, ref_id: &str) -> Result<()> {
        let objects: Vec<String> = self.reference(ref_id)
                                       .ok_or_else(|| PrmError::NotAReference(ref_id.to_string()))?
                                       .references
                                       .keys()
                                       .cloned()
                                       .collect();

        for object in objects {
            self.remove_reference(schema, ref_id, &object)?;
        }

        Ok(())
    }

    ///////////////////////////////////////////////////////////////////////////////
    // Likelihood

    /// The joint parent assignment (domain indices, in CPD order) of the ground vertex `id`.
    ///
    /// Dependencies with an aggregator reduce the current values of all parent vertices, every time
    /// this is called. A dependency without parent vertices contributes the first domain value.
    pub fn parent_assignment(&self, schema: &Schema, id: &str) -> Result<Vec<usize>> {
        self.parent_assignment_with(schema, id, None)
    }

    /// As `parent_assignment`, reading the value index given in `replaced` for that parent vertex
    /// instead of its current value
    pub fn parent_assignment_with(
        &self,
        schema: &Schema,
        id: &str,
        replaced: Option<(&str, usize)>
    ) -> Result<Vec<usize>> {
        let v = self.ground(id).ok_or_else(|| PrmError::MissingVertex(id.to_string()))?;
        let value_of = |p: &String| match replaced {
            Some((parent, value)) if parent == p.as_str() => Some(value),
            _ => self.value(p),
        };

        Ok(schema.attribute(v.attr).dependencies_child.iter().map(|&dep| {
            let d = schema.dependency(dep);
            v.parents.get(&d.parent).map_or(0, |ids| Graph::reduce_parents(schema, d, ids, &value_of))
        }).collect())
    }

    /// The value index one dependency contributes to a parent assignment. With an aggregator, the
    /// domain values of all parent vertices are reduced and snapped to the nearest domain value.
    /// Without one, the first parent vertex with a value is read. Parents without values
    /// contribute the first domain value.
    fn reduce_parents<F>(schema: &Schema, d: &Dependency, ids: &IndexSet<String>, value_of: F) -> usize
        where F: Fn(&String) -> Option<usize>
    {
        match d.aggregator {
            None => ids.iter().filter_map(|p| value_of(p)).next().unwrap_or(0),
            Some(aggr) => {
                let attr = schema.attribute(d.parent);
                let values: Vec<i64> = ids.iter()
                                          .filter_map(|p| value_of(p))
                                          .map(|i| attr.domain[i])
                                          .collect();

                aggr.apply(&values).map_or(0, |x| attr.nearest_index(x))
            }
        }
    }

    /// The row of the exist CPD of `dep` for the k-side object `object`, computed from the cached
    /// exist parents of that object rather than from the current references. Exist dependencies
    /// with an aggregator reduce every cached parent of their attribute.
    pub fn exist_parent_assignment(&self, schema: &Schema, dep: DepId, object: &str) -> Result<usize> {
        let u = Graph::uncertainty(schema, dep)?;
        let exist = schema.attribute(u.exist);
        let cpd = exist.cpd.as_ref().ok_or_else(|| PrmError::MissingCpd(exist.name.clone()))?;

        let cached = self.exist_parents(dep, object);
        let value_of = |p: &String| self.value(p);
        let assignment: Vec<usize> = exist.dependencies_child.iter().map(|&e| {
            let d = schema.dependency(e);
            cached.and_then(|ps| ps.get(&d.parent))
                  .map_or(0, |ids| Graph::reduce_parents(schema, d, ids, &value_of))
        }).collect();

        Ok(cpd.index_row(&assignment))
    }

    /// The log-likelihood of the current value of `id` given its parents. Artificial vertices are
    /// uniform over their domain. Vertices without a CPD or a value contribute 0.
    pub fn log_likelihood_of(&self, schema: &Schema, id: &str) -> Result<f64> {
        let v = self.ground(id).ok_or_else(|| PrmError::MissingVertex(id.to_string()))?;
        let attr = schema.attribute(v.attr);

        if v.artificial {
            return Ok(match v.value {
                Some(_) => -(attr.cardinality() as f64).ln(),
                None => 0.,
            });
        }

        match (attr.cpd.as_ref(), v.value) {
            (Some(cpd), Some(value)) => {
                let row = cpd.index_row(&self.parent_assignment(schema, id)?);
                Ok(cpd.log_prob(row, value))
            },
            _ => Ok(0.)
        }
    }

    /// The log-likelihood of the current assignment of every ground vertex
    pub fn log_likelihood(&self, schema: &Schema) -> Result<f64> {
        self.vertices.values()
                     .filter_map(|v| v.as_ground())
                     .map(|v| self.log_likelihood_of(schema, &v.id))
                     .sum()
    }

    ///////////////////////////////////////////////////////////////////////////////
    // Statistics and consistency

    pub fn statistics(&self) -> GraphStatistics {
        let ground: Vec<&GroundVertex> = self.vertices.values().filter_map(|v| v.as_ground()).collect();
        let n = ground.len().max(1) as f64;

        GraphStatistics {
            vertices: self.vertices.len(),
            sampling: self.sampling.len(),
            evidence: ground.iter().filter(|v| v.fixed).count(),
            events: self.events.len(),
            references: self.references.len(),
            artificial: ground.iter().filter(|v| v.artificial).count(),
            avg_in_degree: ground.iter().map(|v| v.in_degree()).sum::<usize>() as f64 / n,
            avg_out_degree: ground.iter().map(|v| v.out_degree()).sum::<usize>() as f64 / n,
        }
    }

    /// `true` if every edge is stored on both endpoints
    pub fn check_edge_symmetry(&self) -> bool {
        self.vertices.values().filter_map(|v| v.as_ground()).all(|v| {
            let parents_ok = v.parents.iter().all(|(&attr, ids)| ids.iter().all(|p| {
                self.ground(p).map_or(false, |pv| {
                    pv.attr == attr && pv.children.get(&v.attr).map_or(false, |cs| cs.contains(&v.id))
                })
            }));

            let children_ok = v.children.iter().all(|(&attr, ids)| ids.iter().all(|c| {
                self.ground(c).map_or(false, |cv| {
                    cv.attr == attr && cv.parents.get(&v.attr).map_or(false, |ps| ps.contains(&v.id))
                })
            }));

            parents_ok && children_ok
        })
    }

    /// `true` if every index is exactly the view implied by the vertices' flags
    pub fn check_indices(&self) -> bool {
        let vertices_ok = self.vertices.values().all(|vertex| {
            let id = vertex.id();
            let event_ok = vertex.is_event() == self.events.contains(id);

            match vertex {
                Vertex::Ground(v) => {
                    let all_ok = self.all_by_attribute.get(&v.attr).map_or(false, |ids| ids.contains(id));
                    let buckets = self.sampling_by_attribute.values().filter(|ids| ids.contains(id)).count();
                    let sampling_ok = if v.fixed {
                        !self.sampling.contains(id) && buckets == 0
                    } else {
                        self.sampling.contains(id)
                            && buckets == 1
                            && self.sampling_by_attribute.get(&v.attr).map_or(false, |ids| ids.contains(id))
                    };

                    event_ok && all_ok && sampling_ok && !self.references.contains(id)
                },
                Vertex::Reference(r) => {
                    event_ok
                        && self.references.contains(id)
                        && self.references_by_dep.get(&r.dep).map_or(false, |ids| ids.contains(id))
                        && !self.sampling.contains(id)
                }
            }
        });

        let indexed_ok = self.all_by_attribute.values()
                                              .chain(self.sampling_by_attribute.values())
                                              .chain(self.references_by_dep.values())
                                              .flat_map(|ids| ids.iter())
                                              .chain(self.sampling.iter())
                                              .chain(self.events.iter())
                                              .chain(self.references.iter())
                                              .all(|id| self.vertices.contains_key(id));

        vertices_ok && indexed_ok
    }

    fn ground_mut(&mut self, id: &str) -> Result<&mut GroundVertex> {
        self.vertices.get_mut(id)
                     .and_then(|v| v.as_ground_mut())
                     .ok_or_else(|| PrmError::MissingVertex(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::Initialization;
    use crate::network::vertex::{reference_id, vertex_id};
    use crate::schema::{Aggregator, Domain, SchemaBuilder};

    fn chain_schema() -> Schema {
        SchemaBuilder::new().with_attribute("A", "x", 1, Domain::Binary)
                            .with_attribute("A", "y", 1, Domain::Binary)
                            .with_dependency("A.x", "A.y", None)
                            .with_cpd("A.x", Initialization::Binomial(0.5))
                            .with_cpd("A.y", Initialization::Table(array![[0.8, 0.2], [0.2, 0.8]]))
                            .build()
                            .unwrap()
    }

    #[test]
    fn insert_is_idempotent() {
        let schema = chain_schema();
        let x = schema.lookup("A.x").unwrap();
        let y = schema.lookup("A.y").unwrap();

        let mut graph = Graph::new();
        assert!(graph.add_evidence_vertex(vertex_id(&schema, x, &[1]), x, vec![1], 1, false));
        assert!(graph.add_sampling_vertex(vertex_id(&schema, y, &[1]), y, vec![1], true));
        assert!(graph.add_parent("A.y.1", "A.x.1").unwrap());

        assert!(!graph.add_sampling_vertex(String::from("A.x.1"), x, vec![1], false));
        assert!(!graph.add_parent("A.y.1", "A.x.1").unwrap());

        let v = graph.ground("A.x.1").unwrap();
        assert!(v.fixed);
        assert_eq!(1, v.out_degree());
        assert_eq!(1, graph.ground("A.y.1").unwrap().in_degree());
        assert!(graph.check_edge_symmetry());
        assert!(graph.check_indices());
    }

    #[test]
    fn indices() {
        let schema = chain_schema();
        let x = schema.lookup("A.x").unwrap();
        let y = schema.lookup("A.y").unwrap();

        let mut graph = Graph::new();
        for i in 0..3 {
            graph.add_sampling_vertex(vertex_id(&schema, x, &[i]), x, vec![i], false);
            graph.add_evidence_vertex(vertex_id(&schema, y, &[i]), y, vec![i], 0, i == 0);
        }

        assert_eq!(3, graph.sampling().len());
        assert_eq!(3, graph.sampling_by_attribute(x).unwrap().len());
        assert!(graph.sampling_by_attribute(y).is_none());
        assert_eq!(3, graph.all_by_attribute(y).unwrap().len());
        assert_eq!(vec![x], graph.sampling_attributes());
        assert!(graph.events().contains("A.y.0"));
        assert!(graph.check_indices());

        assert!(graph.set_value("A.y.0", 1).is_err());
        assert!(graph.set_value("A.x.0", 1).is_ok());

        graph.remove_vertex("A.x.1");
        assert_eq!(2, graph.sampling().len());
        assert!(graph.check_indices());
    }

    #[test]
    fn log_likelihood() {
        let schema = chain_schema();
        let x = schema.lookup("A.x").unwrap();
        let y = schema.lookup("A.y").unwrap();

        let mut graph = Graph::new();
        graph.add_evidence_vertex(String::from("A.x.1"), x, vec![1], 1, false);
        graph.add_sampling_vertex(String::from("A.y.1"), y, vec![1], true);
        graph.add_parent("A.y.1", "A.x.1").unwrap();
        graph.set_value("A.y.1", 0).unwrap();

        assert_eq!(vec![1], graph.parent_assignment(&schema, "A.y.1").unwrap());

        let expected = 0.5f64.ln() + 0.2f64.ln();
        assert!((expected - graph.log_likelihood(&schema).unwrap()).abs() < 1e-12);

        let stats = graph.statistics();
        assert_eq!(2, stats.vertices);
        assert_eq!(1, stats.evidence);
        assert!((0.5 - stats.avg_in_degree).abs() < std::f64::EPSILON);
    }

    #[test]
    fn aggregated_parents() {
        let schema = SchemaBuilder::new().with_attribute("S", "grade", 1, Domain::Range(1, 3))
                                         .with_attribute("C", "rating", 1, Domain::Range(1, 3))
                                         .with_dependency("S.grade", "C.rating", Some(Aggregator::Average))
                                         .build()
                                         .unwrap();
        let grade = schema.lookup("S.grade").unwrap();
        let rating = schema.lookup("C.rating").unwrap();

        let mut graph = Graph::new();
        graph.add_sampling_vertex(String::from("C.rating.1"), rating, vec![1], true);
        for (i, &g) in [0, 2, 2].iter().enumerate() {
            let id = format!("S.grade.{}", i);
            graph.add_evidence_vertex(id.clone(), grade, vec![i as i64], g, false);
            graph.add_parent("C.rating.1", &id).unwrap();
        }

        // mean of (1, 3, 3) rounds to 2, at index 1
        assert_eq!(vec![1], graph.parent_assignment(&schema, "C.rating.1").unwrap());
    }

    #[test]
    fn exist_parents() {
        let schema = SchemaBuilder::new().with_attribute("Professor", "fame", 1, Domain::Binary)
                                         .with_attribute("Dept", "funding", 1, Domain::Binary)
                                         .with_attribute("Student", "success", 1, Domain::Binary)
                                         .with_exist_attribute("advisor", "exist", 2)
                                         .with_dependency("Dept.funding", "advisor.exist", Some(Aggregator::Min))
                                         .with_uncertain_dependency(
                                             "Professor.fame", "Student.success", "advisor.exist", false, 1, None
                                         )
                                         .with_cpd("advisor.exist", Initialization::Table(array![[0.8, 0.2], [0.2, 0.8]]))
                                         .build()
                                         .unwrap();
        let funding = schema.lookup("Dept.funding").unwrap();
        let success = schema.lookup("Student.success").unwrap();
        let dep = schema.attribute(success).dependencies_child[0];

        let mut graph = Graph::new();
        graph.add_evidence_vertex(String::from("Dept.funding.1"), funding, vec![1], 1, false);
        graph.add_evidence_vertex(String::from("Dept.funding.2"), funding, vec![2], 0, false);

        assert!(graph.add_exist_parent(dep, String::from("Professor.1"), funding, String::from("Dept.funding.1")));
        assert_eq!(1, graph.exist_parent_assignment(&schema, dep, "Professor.1").unwrap());

        assert!(graph.add_exist_parent(dep, String::from("Professor.1"), funding, String::from("Dept.funding.2")));
        assert!(!graph.add_exist_parent(dep, String::from("Professor.1"), funding, String::from("Dept.funding.1")));
        assert_eq!(2, graph.exist_parents(dep, "Professor.1").unwrap()[&funding].len());

        // min(1, 0) = 0, and an object without exist parents reads the first row
        assert_eq!(0, graph.exist_parent_assignment(&schema, dep, "Professor.1").unwrap());
        assert_eq!(0, graph.exist_parent_assignment(&schema, dep, "Professor.2").unwrap());
        assert!(graph.is_exist_parent("Dept.funding.2"));
        assert!(!graph.is_exist_parent("Professor.fame.1"));
    }

    #[test]
    fn references() {
        let schema = SchemaBuilder::new().with_attribute("Professor", "fame", 1, Domain::Binary)
                                         .with_attribute("Student", "success", 1, Domain::Binary)
                                         .with_exist_attribute("advisor", "exist", 2)
                                         .with_uncertain_dependency(
                                             "Professor.fame", "Student.success", "advisor.exist", false, 1, None
                                         )
                                         .build()
                                         .unwrap();
        let fame = schema.lookup("Professor.fame").unwrap();
        let success = schema.lookup("Student.success").unwrap();
        let dep = schema.attribute(success).dependencies_child[0];

        let mut graph = Graph::new();
        graph.add_sampling_vertex(String::from("Student.success.1"), success, vec![1], true);
        for p in 1..=3 {
            graph.add_sampling_vertex(vertex_id(&schema, fame, &[p]), fame, vec![p], false);
        }

        let ref_id = reference_id("Student.success.1");
        assert!(graph.add_reference_vertex(ref_id.clone(), dep, String::from("Student.success.1"), true));

        assert!(graph.add_reference(&schema, &ref_id, "Professor.fame.1").unwrap());
        assert!(graph.ground("Student.success.1").unwrap().has_parents(fame));

        // k = 1
        assert!(!graph.add_reference(&schema, &ref_id, "Professor.fame.2").unwrap());

        assert!(graph.replace_reference(&schema, &ref_id, "Professor.1", "Professor.fame.3").unwrap());
        let r = graph.reference(&ref_id).unwrap();
        assert_eq!(vec!["Professor.3"], r.references.keys().collect::<Vec<_>>());
        assert!(graph.ground("Professor.fame.1").unwrap().children.get(&success).map_or(true, |c| c.is_empty()));
        assert!(graph.ground("Professor.fame.3").unwrap().has_children());
        assert!(graph.check_edge_symmetry());

        graph.remove_all_references(&schema, &ref_id).unwrap();
        assert!(graph.reference(&ref_id).unwrap().references.is_empty());
        assert!(!graph.ground("Student.success.1").unwrap().has_parents(fame));
        assert!(graph.check_indices());
    }
}
