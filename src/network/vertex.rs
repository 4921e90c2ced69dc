//! Defines the vertices of a ground Bayesian network.
//!
//! A `GroundVertex` is one attribute object, e.g. the `success` of the student with key `1`. A
//! `ReferenceVertex` compactly represents the latent links of one n-side object to at most `k`
//! k-side objects of a reference uncertainty dependency.

use crate::schema::{AttrId, DepId, Schema};
use crate::util::join_keys;

use indexmap::{IndexMap, IndexSet};


/// The ID of the attribute object of `attr` with primary key `keys`, e.g. `Student.success.1`
pub fn vertex_id(schema: &Schema, attr: AttrId, keys: &[i64]) -> String {
    format!("{}.{}", schema.name(attr), join_keys(keys))
}

/// The ID of the entity object of `attr` with primary key `keys`, e.g. `Student.1`
pub fn object_id(schema: &Schema, attr: AttrId, keys: &[i64]) -> String {
    format!("{}.{}", schema.attribute(attr).entity, join_keys(keys))
}

/// The ID of the reference vertex owned by the n-side vertex `n_vertex`
pub fn reference_id(n_vertex: &str) -> String {
    format!("RefV_{}", n_vertex)
}

/// The ID of an artificial `parent` vertex standing in for a missing parent of `child`
pub fn artificial_id(schema: &Schema, parent: AttrId, child: &str) -> String {
    format!("{}({})", schema.name(parent), child)
}


/// An attribute object in the ground network
#[derive(Clone, Debug, PartialEq)]
pub struct GroundVertex {
    pub id: String,
    pub attr: AttrId,

    /// The primary key of the object. Empty for artificial vertices.
    pub keys: Vec<i64>,

    /// The index of the current value in the attribute's domain
    pub value: Option<usize>,

    /// `true` for evidence. The value of a fixed vertex never changes.
    pub fixed: bool,

    /// `true` if the vertex is part of the requested posterior
    pub event: bool,

    /// `true` if the vertex was synthesized for a missing parent
    pub artificial: bool,

    /// parent attribute -> parent vertex IDs
    pub parents: IndexMap<AttrId, IndexSet<String>>,

    /// child attribute -> child vertex IDs
    pub children: IndexMap<AttrId, IndexSet<String>>,
}

impl GroundVertex {

    pub fn new(id: String, attr: AttrId, keys: Vec<i64>) -> Self {
        GroundVertex {
            id,
            attr,
            keys,
            value: None,
            fixed: false,
            event: false,
            artificial: false,
            parents: IndexMap::new(),
            children: IndexMap::new(),
        }
    }

    /// `true` if there is at least one parent vertex of attribute `attr`
    pub fn has_parents(&self, attr: AttrId) -> bool {
        self.parents.get(&attr).map_or(false, |ps| !ps.is_empty())
    }

    pub fn has_children(&self) -> bool {
        self.children.values().any(|cs| !cs.is_empty())
    }

    /// The number of parent vertices
    pub fn in_degree(&self) -> usize {
        self.parents.values().map(|ps| ps.len()).sum()
    }

    /// The number of child vertices
    pub fn out_degree(&self) -> usize {
        self.children.values().map(|cs| cs.len()).sum()
    }

    /// All child vertex IDs, over all child attributes
    pub fn child_ids(&self) -> impl Iterator<Item = &String> {
        self.children.values().flat_map(|cs| cs.iter())
    }

    /// All parent vertex IDs, over all parent attributes
    pub fn parent_ids(&self) -> impl Iterator<Item = &String> {
        self.parents.values().flat_map(|ps| ps.iter())
    }
}


/// The latent references of one n-side object of a reference uncertainty dependency
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceVertex {
    pub id: String,

    /// The uncertain dependency
    pub dep: DepId,

    /// The ID of the n-side vertex owning the references
    pub n_vertex: String,

    /// k-side object ID -> referenced k-side vertex ID. Never holds more than `k` entries.
    pub references: IndexMap<String, String>,

    pub event: bool,
}

impl ReferenceVertex {

    pub fn new(id: String, dep: DepId, n_vertex: String) -> Self {
        ReferenceVertex { id, dep, n_vertex, references: IndexMap::new(), event: false }
    }
}


/// A vertex of the ground network
#[derive(Clone, Debug, PartialEq)]
pub enum Vertex {
    Ground(GroundVertex),
    Reference(ReferenceVertex),
}

impl Vertex {

    pub fn id(&self) -> &str {
        match self {
            Vertex::Ground(v) => &v.id,
            Vertex::Reference(r) => &r.id,
        }
    }

    pub fn is_event(&self) -> bool {
        match self {
            Vertex::Ground(v) => v.event,
            Vertex::Reference(r) => r.event,
        }
    }

    pub fn as_ground(&self) -> Option<&GroundVertex> {
        match self {
            Vertex::Ground(v) => Some(v),
            Vertex::Reference(_) => None,
        }
    }

    pub fn as_ground_mut(&mut self) -> Option<&mut GroundVertex> {
        match self {
            Vertex::Ground(v) => Some(v),
            Vertex::Reference(_) => None,
        }
    }

    pub fn as_reference(&self) -> Option<&ReferenceVertex> {
        match self {
            Vertex::Reference(r) => Some(r),
            Vertex::Ground(_) => None,
        }
    }

    pub fn as_reference_mut(&mut self) -> Option<&mut ReferenceVertex> {
        match self {
            Vertex::Reference(r) => Some(r),
            Vertex::Ground(_) => None,
        }
    }
}
