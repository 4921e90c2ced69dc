//! Stores the samples of the Markov chains of one query and summarizes them.
//!
//! # Representation
//! Each `Chain` is a matrix with one row per collected iteration and one column per tracked value.
//! A ground vertex takes one column holding its domain value. A reference vertex of a dependency
//! with `k` references takes `k` columns, `<ref id>` and then `<ref id>#1` to `<ref id>#(k-1)`,
//! holding the first primary key of each referenced k-side object in ascending order. Values that
//! are not set are `NaN`.

use crate::network::Graph;
use crate::schema::Schema;
use crate::util::{PrmError, Result};

use indexmap::IndexMap;
use ndarray::prelude as nd;


/// The column name of reference slot `slot` of `ref_id`
pub fn slot_id(ref_id: &str, slot: usize) -> String {
    match slot {
        0 => ref_id.to_string(),
        _ => format!("{}#{}", ref_id, slot),
    }
}


/// The samples of one Markov chain
#[derive(Clone, Debug, PartialEq)]
pub struct Chain {
    samples: nd::Array2<f64>,

    /// column name -> column
    index: IndexMap<String, usize>,

    /// The vertex read by each column and, for reference vertices, the slot
    layout: Vec<(String, usize)>,
}

impl Chain {

    /// Lay out the columns of the vertices `tracked` for `iterations` samples
    ///
    /// # Errors
    /// `MissingVertex` if a tracked vertex is not in `graph`
    pub fn init_chain(schema: &Schema, graph: &Graph, tracked: &[String], iterations: usize) -> Result<Self> {
        let mut index = IndexMap::new();
        let mut layout = Vec::new();

        for id in tracked {
            let slots = match graph.get(id).ok_or_else(|| PrmError::MissingVertex(id.clone()))?.as_reference() {
                Some(r) => schema.dependency(r.dep).uncertain.map_or(1, |u| u.k),
                None => 1,
            };

            for slot in 0..slots {
                index.insert(slot_id(id, slot), layout.len());
                layout.push((id.clone(), slot));
            }
        }

        let samples = nd::Array2::from_elem((iterations, layout.len()), std::f64::NAN);
        Ok(Chain { samples, index, layout })
    }

    /// Record the current state of `graph` as iteration `i`
    pub fn collect_samples(&mut self, schema: &Schema, graph: &Graph, i: usize) {
        let mut row = self.samples.row_mut(i);

        for (col, (id, slot)) in self.layout.iter().enumerate() {
            row[col] = match graph.get(id) {
                Some(vertex) => match vertex.as_reference() {
                    Some(r) => {
                        let mut keys: Vec<i64> = r.references.values()
                                                  .filter_map(|k| graph.ground(k))
                                                  .filter_map(|k| k.keys.first().cloned())
                                                  .collect();
                        keys.sort();
                        keys.get(*slot).map_or(std::f64::NAN, |&k| k as f64)
                    },
                    None => graph.ground(id)
                                 .and_then(|v| v.value.map(|x| schema.attribute(v.attr).domain[x]))
                                 .map_or(std::f64::NAN, |x| x as f64),
                },
                None => std::f64::NAN,
            };
        }
    }

    /// The number of iterations
    pub fn len(&self) -> usize {
        self.samples.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.nrows() == 0
    }

    /// The column names, in layout order
    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.index.keys()
    }

    pub fn samples(&self) -> &nd::Array2<f64> {
        &self.samples
    }

    pub fn column(&self, id: &str) -> Option<nd::ArrayView1<f64>> {
        self.index.get(id).map(|&col| self.samples.column(col))
    }

    pub fn mean(&self, id: &str) -> Option<f64> {
        self.column(id).filter(|c| !c.is_empty()).map(|c| c.sum() / c.len() as f64)
    }

    /// The running mean of `id` after each iteration
    pub fn cumulative_mean(&self, id: &str) -> Option<Vec<f64>> {
        self.column(id).map(|c| {
            let mut sum = 0.;
            c.iter().enumerate().map(|(t, x)| {
                sum += x;
                sum / (t + 1) as f64
            }).collect()
        })
    }

    /// The autocorrelation of `id` at lags `0..=max_lag`. A constant column is fully correlated.
    pub fn autocorrelation(&self, id: &str, max_lag: usize) -> Option<Vec<f64>> {
        let c = self.column(id)?;
        let n = c.len();
        let mean = self.mean(id)?;
        let centered: Vec<f64> = c.iter().map(|x| x - mean).collect();

        let variance: f64 = centered.iter().map(|x| x * x).sum();
        if variance == 0. {
            return Some(vec![1.; max_lag + 1]);
        }

        Some((0..=max_lag).map(|lag| {
            if lag >= n {
                return 0.;
            }
            let cov: f64 = centered.iter().zip(centered[lag..].iter()).map(|(a, b)| a * b).sum();
            cov / variance
        }).collect())
    }
}


/// Every chain of one query
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PosteriorStore {
    chains: Vec<Chain>,
}

impl PosteriorStore {

    pub fn new() -> Self {
        PosteriorStore::default()
    }

    pub fn push(&mut self, chain: Chain) {
        self.chains.push(chain);
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    /// The mean of `id` over the samples of every chain
    pub fn mean(&self, id: &str) -> Option<f64> {
        let (sum, count) = self.chains.iter()
                                      .filter_map(|chain| chain.column(id))
                                      .fold((0., 0), |(s, n), c| (s + c.sum(), n + c.len()));

        match count {
            0 => None,
            _ => Some(sum / count as f64),
        }
    }

    /// The Gelman-Rubin potential scale reduction of `id`, from the between-chain variance `B`
    /// and the within-chain variance `W`:
    ///
    /// ```text
    /// R = sqrt(((T - 1) / T * W + B / T) / W)
    /// ```
    ///
    /// Values close to 1 indicate that the chains have mixed.
    ///
    /// # Errors
    /// * `EmptyChains` with fewer than two chains
    /// * `MissingVertex` if a chain does not track `id`
    /// * `General` if the chains differ in length or have fewer than two samples
    pub fn gelman_rubin(&self, id: &str) -> Result<f64> {
        let m = self.chains.len();
        if m < 2 {
            return Err(PrmError::EmptyChains);
        }

        let columns = self.chains.iter()
                                 .map(|chain| chain.column(id).ok_or_else(|| PrmError::MissingVertex(id.to_string())))
                                 .collect::<Result<Vec<_>>>()?;

        let t = columns[0].len();
        if t < 2 || columns.iter().any(|c| c.len() != t) {
            return Err(PrmError::General(String::from("chains need at least two samples of the same length")));
        }

        //////////////////////////////////////////////////////////////
        // 1) chain means and the overall mean
        let means: Vec<f64> = columns.iter().map(|c| c.sum() / t as f64).collect();
        let mean = means.iter().sum::<f64>() / m as f64;

        //////////////////////////////////////////////////////////////
        // 2) between- and within-chain variances
        let b = t as f64 / (m - 1) as f64 * means.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
        let w = columns.iter().zip(means.iter()).map(|(c, cm)| {
            c.iter().map(|x| (x - cm).powi(2)).sum::<f64>() / (t - 1) as f64
        }).sum::<f64>() / m as f64;

        if w == 0. {
            return Ok(if b == 0. { 1. } else { std::f64::INFINITY });
        }

        let v = (t - 1) as f64 / t as f64 * w + b / t as f64;
        Ok((v / w).sqrt())
    }

    /// The relative frequency of each value of `id` over every chain, by ascending value. Unset
    /// samples are skipped.
    pub fn distribution(&self, id: &str) -> IndexMap<i64, f64> {
        let mut counts: IndexMap<i64, usize> = IndexMap::new();
        for c in self.chains.iter().filter_map(|chain| chain.column(id)) {
            for x in c.iter().filter(|x| !x.is_nan()) {
                *counts.entry(*x as i64).or_insert(0) += 1;
            }
        }
        counts.sort_keys();

        let total: usize = counts.values().sum();
        counts.into_iter().map(|(x, n)| (x, n as f64 / total as f64)).collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::vertex::reference_id;
    use crate::schema::{Domain, SchemaBuilder};

    fn setup() -> (Schema, Graph) {
        let schema = SchemaBuilder::new().with_attribute("Professor", "fame", 1, Domain::Binary)
                                         .with_attribute("Student", "grade", 1, Domain::Range(1, 3))
                                         .with_exist_attribute("advisor", "exist", 2)
                                         .with_uncertain_dependency(
                                             "Professor.fame", "Student.grade", "advisor.exist", false, 2, None
                                         )
                                         .build()
                                         .unwrap();
        let fame = schema.lookup("Professor.fame").unwrap();
        let grade = schema.lookup("Student.grade").unwrap();
        let dep = schema.attribute(grade).dependencies_child[0];

        let mut graph = Graph::new();
        graph.add_sampling_vertex(String::from("Student.grade.1"), grade, vec![1], true);
        for p in [7, 3, 5].iter() {
            graph.add_sampling_vertex(format!("Professor.fame.{}", p), fame, vec![*p], false);
        }
        graph.add_reference_vertex(reference_id("Student.grade.1"), dep, String::from("Student.grade.1"), true);

        (schema, graph)
    }

    fn tracked() -> Vec<String> {
        vec![String::from("Student.grade.1"), String::from("RefV_Student.grade.1")]
    }

    #[test]
    fn layout() {
        let (schema, graph) = setup();
        let chain = Chain::init_chain(&schema, &graph, &tracked(), 4).unwrap();

        assert_eq!(
            vec!["Student.grade.1", "RefV_Student.grade.1", "RefV_Student.grade.1#1"],
            chain.ids().collect::<Vec<_>>()
        );
        assert_eq!((4, 3), chain.samples().dim());
        assert!(chain.samples().iter().all(|x| x.is_nan()));

        assert!(Chain::init_chain(&schema, &graph, &[String::from("Student.grade.2")], 4).is_err());
    }

    #[test]
    fn collect() {
        let (schema, mut graph) = setup();
        let mut chain = Chain::init_chain(&schema, &graph, &tracked(), 3).unwrap();

        graph.add_reference(&schema, "RefV_Student.grade.1", "Professor.fame.7").unwrap();
        graph.add_reference(&schema, "RefV_Student.grade.1", "Professor.fame.3").unwrap();
        for (i, &value) in [0, 2, 2].iter().enumerate() {
            graph.set_value("Student.grade.1", value).unwrap();
            chain.collect_samples(&schema, &graph, i);
        }

        // domain values, not indices
        assert_eq!(vec![1., 3., 3.], chain.column("Student.grade.1").unwrap().to_vec());
        assert_eq!(vec![3., 3., 3.], chain.column("RefV_Student.grade.1").unwrap().to_vec());
        assert_eq!(vec![7., 7., 7.], chain.column("RefV_Student.grade.1#1").unwrap().to_vec());

        assert!((7. / 3. - chain.mean("Student.grade.1").unwrap()).abs() < 1e-12);
        assert_eq!(vec![1., 2., 7. / 3.], chain.cumulative_mean("Student.grade.1").unwrap());
        assert_eq!(vec![1., 1.], chain.autocorrelation("RefV_Student.grade.1", 1).unwrap());
        assert!(chain.column("Student.grade.2").is_none());
    }

    fn chain_of(schema: &Schema, graph: &mut Graph, values: &[usize]) -> Chain {
        let ids = vec![String::from("Student.grade.1")];
        let mut chain = Chain::init_chain(schema, graph, &ids, values.len()).unwrap();
        for (i, &value) in values.iter().enumerate() {
            graph.set_value("Student.grade.1", value).unwrap();
            chain.collect_samples(schema, graph, i);
        }
        chain
    }

    #[test]
    fn autocorrelation() {
        let (schema, mut graph) = setup();
        let chain = chain_of(&schema, &mut graph, &[0, 1, 0, 1, 0, 1]);

        let rho = chain.autocorrelation("Student.grade.1", 2).unwrap();
        assert!((1. - rho[0]).abs() < 1e-12);
        assert!(rho[1] < -0.5);
        assert!(rho[2] > 0.5);
    }

    #[test]
    fn store() {
        let (schema, mut graph) = setup();
        let mut store = PosteriorStore::new();
        store.push(chain_of(&schema, &mut graph, &[0, 1, 0, 1]));
        assert_eq!(Err(PrmError::EmptyChains), store.gelman_rubin("Student.grade.1"));

        store.push(chain_of(&schema, &mut graph, &[0, 1, 0, 1]));
        assert_eq!(2, store.chains().len());
        assert!((1.5 - store.mean("Student.grade.1").unwrap()).abs() < 1e-12);

        // B = 0, W = 1/3, V = 3/4 * W
        let r = store.gelman_rubin("Student.grade.1").unwrap();
        assert!((0.75f64.sqrt() - r).abs() < 1e-12);

        let distribution = store.distribution("Student.grade.1");
        assert_eq!(vec![(1, 0.5), (2, 0.5)], distribution.into_iter().collect::<Vec<_>>());

        store.push(chain_of(&schema, &mut graph, &[2, 2, 2, 1]));
        assert!(store.gelman_rubin("Student.grade.1").unwrap() > 1.);
        assert!(store.gelman_rubin("Student.grade.2").is_err());
    }
}
