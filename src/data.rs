//! Defines the `DataInterface`, the boundary between the inference core and a relational data
//! store, and `InMemoryData`, an implementation backed by in-memory tables.
//!
//! Rows are positional. Callers must know the key arity of each attribute:
//!
//! | call                     | row layout                                |
//! |--------------------------|-------------------------------------------|
//! | `load_objects`           | `[value, pk...]`                          |
//! | `load_attribute_objects` | `[value, pk...]`                          |
//! | `load_parents`           | `[childPk..., parentPk..., parentValue]`  |
//! | `load_children`          | `[parentPk..., childPk..., childValue]`   |
//! | `load_exist_parents`     | `[kPk..., parentPk..., parentValue]`      |
//!
//! A `None` value is a missing observation.

use crate::query::Qvariable;
use crate::schema::{AttrId, DepId, Schema};
use crate::util::{PrmError, Result};

use indexmap::IndexMap;


/// One positional row returned by a `DataInterface`
pub type Row = Vec<Option<i64>>;


/// Access to the objects and links of a relational data store
pub trait DataInterface {

    /// Load the objects selected by `qvar`, as `[value, pk...]`
    fn load_objects(&self, schema: &Schema, qvar: &Qvariable) -> Result<Vec<Row>>;

    /// Load every object of `attr`, as `[value, pk...]`
    fn load_attribute_objects(&self, schema: &Schema, attr: AttrId) -> Result<Vec<Row>>;

    /// Load the parent objects of the dependency `dep` for the given child keys, as
    /// `[childPk..., parentPk..., parentValue]`
    fn load_parents(&self, schema: &Schema, dep: DepId, child_keys: &[Vec<i64>]) -> Result<Vec<Row>>;

    /// Load the child objects of the dependency `dep` for the given parent keys, as
    /// `[parentPk..., childPk..., childValue]`
    fn load_children(&self, schema: &Schema, dep: DepId, parent_keys: &[Vec<i64>]) -> Result<Vec<Row>>;

    /// Load, for every k-side object of the uncertain dependency `dep`, the objects of `parent`
    /// (a parent attribute of the exist attribute), as `[kPk..., parentPk..., parentValue]`
    fn load_exist_parents(&self, schema: &Schema, dep: DepId, parent: AttrId) -> Result<Vec<Row>>;
}


/// A `DataInterface` over in-memory tables.
///
/// Links of a dependency between attributes of the same entity default to the identity, i.e. the
/// object with the same primary key. Links between different entities must be registered with
/// `with_link`. Exist parents default the same way, relative to the k-side entity.
#[derive(Clone, Debug, Default)]
pub struct InMemoryData {
    /// attribute -> primary key -> value
    values: IndexMap<AttrId, IndexMap<Vec<i64>, Option<i64>>>,

    /// dependency -> child key -> parent keys
    links: IndexMap<DepId, IndexMap<Vec<i64>, Vec<Vec<i64>>>>,

    /// (uncertain dependency, exist parent) -> k-side key -> parent keys
    exist_links: IndexMap<(DepId, AttrId), IndexMap<Vec<i64>, Vec<Vec<i64>>>>,

    /// The most keys one call accepts
    max_keys: Option<usize>,
}

impl InMemoryData {

    pub fn new() -> Self {
        InMemoryData::default()
    }

    /// Reject calls with more than `max_keys` keys with a `SizeLimit` error
    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    /// Add an object of `attr` with primary key `keys` and the (possibly missing) `value`
    pub fn insert(&mut self, attr: AttrId, keys: Vec<i64>, value: Option<i64>) {
        self.values.entry(attr).or_insert_with(IndexMap::new).insert(keys, value);
    }

    /// Link the child object `child` to the parent object `parent` through `dep`
    pub fn link(&mut self, dep: DepId, child: Vec<i64>, parent: Vec<i64>) {
        self.links.entry(dep)
                  .or_insert_with(IndexMap::new)
                  .entry(child)
                  .or_insert_with(Vec::new)
                  .push(parent);
    }

    /// Link the k-side object `k` of `dep` to the exist parent object `parent` of attribute `attr`
    pub fn link_exist_parent(&mut self, dep: DepId, attr: AttrId, k: Vec<i64>, parent: Vec<i64>) {
        self.exist_links.entry((dep, attr))
                        .or_insert_with(IndexMap::new)
                        .entry(k)
                        .or_insert_with(Vec::new)
                        .push(parent);
    }

    fn check_size(&self, requested: usize) -> Result<()> {
        match self.max_keys {
            Some(limit) if requested > limit => Err(PrmError::SizeLimit { requested, limit }),
            _ => Ok(()),
        }
    }

    fn objects(&self, attr: AttrId) -> impl Iterator<Item = (&Vec<i64>, &Option<i64>)> {
        self.values.get(&attr).into_iter().flat_map(|m| m.iter())
    }

    fn value(&self, attr: AttrId, keys: &[i64]) -> Option<Option<i64>> {
        self.values.get(&attr).and_then(|m| m.get(keys)).cloned()
    }

    /// The parent keys of `child` for `dep`, with the same-entity identity default
    fn parent_keys(&self, schema: &Schema, dep: DepId, child: &[i64]) -> Vec<Vec<i64>> {
        match self.links.get(&dep) {
            Some(table) => table.get(child).cloned().unwrap_or_default(),
            None => {
                let d = schema.dependency(dep);
                if schema.attribute(d.parent).entity == schema.attribute(d.child).entity {
                    vec![child.to_vec()]
                } else {
                    Vec::new()
                }
            }
        }
    }
}

fn row(keys: &[i64], value: Option<i64>) -> Row {
    let mut row = Vec::with_capacity(keys.len() + 1);
    row.push(value);
    row.extend(keys.iter().map(|&k| Some(k)));
    row
}

fn link_row(first: &[i64], second: &[i64], value: Option<i64>) -> Row {
    first.iter().chain(second.iter()).map(|&k| Some(k)).chain(std::iter::once(value)).collect()
}

impl DataInterface for InMemoryData {

    fn load_objects(&self, _schema: &Schema, qvar: &Qvariable) -> Result<Vec<Row>> {
        if qvar.objs.constraint == crate::query::ObjsConstraint::Inclusive {
            self.check_size(qvar.objs.pk_values.len())?;
        }

        Ok(self.objects(qvar.attr)
               .filter(|(keys, _)| qvar.objs.selects(keys))
               .map(|(keys, &value)| row(keys, value))
               .collect())
    }

    fn load_attribute_objects(&self, _schema: &Schema, attr: AttrId) -> Result<Vec<Row>> {
        Ok(self.objects(attr).map(|(keys, &value)| row(keys, value)).collect())
    }

    fn load_parents(&self, schema: &Schema, dep: DepId, child_keys: &[Vec<i64>]) -> Result<Vec<Row>> {
        self.check_size(child_keys.len())?;

        let parent = schema.dependency(dep).parent;
        let mut rows = Vec::new();
        for child in child_keys {
            for pk in self.parent_keys(schema, dep, child) {
                if let Some(value) = self.value(parent, &pk) {
                    rows.push(link_row(child, &pk, value));
                }
            }
        }

        Ok(rows)
    }

    fn load_children(&self, schema: &Schema, dep: DepId, parent_keys: &[Vec<i64>]) -> Result<Vec<Row>> {
        self.check_size(parent_keys.len())?;

        let child = schema.dependency(dep).child;
        let mut rows = Vec::new();
        for (ck, &value) in self.objects(child) {
            for pk in self.parent_keys(schema, dep, ck) {
                if parent_keys.contains(&pk) {
                    rows.push(link_row(&pk, ck, value));
                }
            }
        }

        Ok(rows)
    }

    fn load_exist_parents(&self, schema: &Schema, dep: DepId, parent: AttrId) -> Result<Vec<Row>> {
        let k_attr = schema.dependency(dep)
                           .uncertain
                           .map(|u| u.k_attribute)
                           .ok_or(PrmError::UnknownDependency)?;

        let same_entity = schema.attribute(parent).entity == schema.attribute(k_attr).entity;
        let table = self.exist_links.get(&(dep, parent));

        let mut rows = Vec::new();
        for (kk, _) in self.objects(k_attr) {
            let parents = match table {
                Some(t) => t.get(kk).cloned().unwrap_or_default(),
                None if same_entity => vec![kk.clone()],
                None => Vec::new(),
            };

            for pk in parents {
                if let Some(value) = self.value(parent, &pk) {
                    rows.push(link_row(kk, &pk, value));
                }
            }
        }

        Ok(rows)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{create_qvar, ObjsConstraint};
    use crate::schema::{Domain, SchemaBuilder};

    fn setup() -> (Schema, InMemoryData) {
        let schema = SchemaBuilder::new().with_attribute("Student", "intelligence", 1, Domain::Binary)
                                         .with_attribute("Course", "difficulty", 1, Domain::Binary)
                                         .with_attribute("Registration", "grade", 2, Domain::Range(1, 3))
                                         .with_dependency("Student.intelligence", "Registration.grade", None)
                                         .with_dependency("Course.difficulty", "Registration.grade", None)
                                         .build()
                                         .unwrap();

        let intel = schema.lookup("Student.intelligence").unwrap();
        let diff = schema.lookup("Course.difficulty").unwrap();
        let grade = schema.lookup("Registration.grade").unwrap();
        let [d_intel, d_diff] = [schema.attribute(grade).dependencies_child[0], schema.attribute(grade).dependencies_child[1]];

        let mut data = InMemoryData::new();
        data.insert(intel, vec![1], Some(1));
        data.insert(intel, vec![2], None);
        data.insert(diff, vec![10], Some(0));
        for &(s, c, g) in [(1, 10, 3), (2, 10, 1)].iter() {
            data.insert(grade, vec![s, c], Some(g));
            data.link(d_intel, vec![s, c], vec![s]);
            data.link(d_diff, vec![s, c], vec![c]);
        }

        (schema, data)
    }

    #[test]
    fn objects() {
        let (schema, data) = setup();
        let qvar = create_qvar(&schema, "Student.intelligence", ObjsConstraint::Exclusive, vec![vec![1]]).unwrap();
        assert_eq!(vec![vec![None, Some(2)]], data.load_objects(&schema, &qvar).unwrap());

        let all = data.load_attribute_objects(&schema, schema.lookup("Registration.grade").unwrap()).unwrap();
        assert_eq!(vec![vec![Some(3), Some(1), Some(10)], vec![Some(1), Some(2), Some(10)]], all);
    }

    #[test]
    fn parents_and_children() {
        let (schema, data) = setup();
        let grade = schema.lookup("Registration.grade").unwrap();
        let dep = schema.attribute(grade).dependencies_child[0];

        let parents = data.load_parents(&schema, dep, &[vec![1, 10]]).unwrap();
        assert_eq!(vec![vec![Some(1), Some(10), Some(1), Some(1)]], parents);

        let dep = schema.attribute(grade).dependencies_child[1];
        let children = data.load_children(&schema, dep, &[vec![10]]).unwrap();
        assert_eq!(2, children.len());
        assert_eq!(vec![Some(10), Some(1), Some(10), Some(3)], children[0]);
    }

    #[test]
    fn size_limit() {
        let (schema, data) = setup();
        let data = data.with_max_keys(1);
        let grade = schema.lookup("Registration.grade").unwrap();
        let dep = schema.attribute(grade).dependencies_child[0];

        assert_eq!(
            Err(PrmError::SizeLimit { requested: 2, limit: 1 }),
            data.load_parents(&schema, dep, &[vec![1, 10], vec![2, 10]])
        );
    }
}
