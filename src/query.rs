//! Defines a `Query` over a PRM: a set of event variables whose posterior is requested and a set of
//! evidence variables whose values are observed.
//!
//! Both are given as `Qvariable`s, which pair an attribute class with a set of attribute objects
//! (`ObjsVariable`).

use crate::network::vertex::vertex_id;
use crate::schema::{AttrId, Schema};
use crate::util::{PrmError, Result};

use indexmap::{IndexMap, IndexSet};


/// How the primary keys of an `ObjsVariable` select attribute objects
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjsConstraint {
    /// Only the listed objects
    Inclusive,

    /// All but the listed objects
    Exclusive,
}


/// A set of attribute objects, given by their primary keys
#[derive(Clone, Debug, PartialEq)]
pub struct ObjsVariable {
    pub constraint: ObjsConstraint,

    /// One primary key tuple per object
    pub pk_values: Vec<Vec<i64>>,
}

impl ObjsVariable {

    pub fn new(constraint: ObjsConstraint, pk_values: Vec<Vec<i64>>) -> Self {
        ObjsVariable { constraint, pk_values }
    }

    /// Every object of the attribute class
    pub fn all() -> Self {
        ObjsVariable { constraint: ObjsConstraint::Exclusive, pk_values: Vec::new() }
    }

    /// `true` if the object with primary key `keys` is selected
    pub fn selects(&self, keys: &[i64]) -> bool {
        let listed = self.pk_values.iter().any(|pk| &pk[..] == keys);
        match self.constraint {
            ObjsConstraint::Inclusive => listed,
            ObjsConstraint::Exclusive => !listed,
        }
    }
}


/// An attribute class together with a set of its objects
#[derive(Clone, Debug, PartialEq)]
pub struct Qvariable {
    pub attr: AttrId,
    pub objs: ObjsVariable,
}


/// Create a `Qvariable` from the full name of an attribute, e.g. `Professor.fame`
///
/// # Errors
/// * `UnknownAttribute` if the schema has no such attribute
/// * `KeyArity` if a primary key tuple has the wrong length
pub fn create_qvar(
    schema: &Schema,
    name: &str,
    constraint: ObjsConstraint,
    pk_values: Vec<Vec<i64>>
) -> Result<Qvariable> {
    let attr = schema.lookup(name).ok_or_else(|| PrmError::UnknownAttribute(String::from(name)))?;

    let arity = schema.attribute(attr).key_arity;
    if let Some(pk) = pk_values.iter().find(|pk| pk.len() != arity) {
        return Err(PrmError::KeyArity { attr: String::from(name), expected: arity, found: pk.len() });
    }

    Ok(Qvariable { attr, objs: ObjsVariable::new(constraint, pk_values) })
}


/// A query `P(event | evidence)`
#[derive(Clone, Debug)]
pub struct Query {
    pub event: Vec<Qvariable>,
    pub evidence: Vec<Qvariable>,

    /// attribute -> (constraint, vertex IDs) of the evidence
    evidence_lookup: IndexMap<AttrId, (ObjsConstraint, IndexSet<String>)>,
}

impl Query {

    /// Create a new `Query` and precompute its evidence lookup
    pub fn new(schema: &Schema, event: Vec<Qvariable>, evidence: Vec<Qvariable>) -> Self {
        let evidence_lookup = evidence.iter().map(|qvar| {
            let ids = qvar.objs.pk_values.iter().map(|pk| vertex_id(schema, qvar.attr, pk)).collect();
            (qvar.attr, (qvar.objs.constraint, ids))
        }).collect();

        Query { event, evidence, evidence_lookup }
    }

    /// `true` if the attribute object `id` of `attr` is part of the evidence.
    ///
    /// An attribute without an evidence entry has no objects in evidence.
    pub fn obj_in_evidence(&self, attr: AttrId, id: &str) -> bool {
        match self.evidence_lookup.get(&attr) {
            Some((ObjsConstraint::Inclusive, ids)) => ids.contains(id),
            Some((ObjsConstraint::Exclusive, ids)) => !ids.contains(id),
            None => false,
        }
    }

    pub fn event_attributes(&self) -> IndexSet<AttrId> {
        self.event.iter().map(|q| q.attr).collect()
    }

    pub fn evidence_attributes(&self) -> IndexSet<AttrId> {
        self.evidence_lookup.keys().cloned().collect()
    }
}
