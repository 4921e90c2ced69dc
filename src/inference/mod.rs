//! Defines the inference `Engine`, answering queries of the form
//!     ```P(event | evidence)```
//! over the ground network a query induces on a relational data store.
//!
//! Each call to `infer` unrolls a fresh ground network for the query and runs `chains` Markov
//! chains on it, one after another. The network is re-initialized at the start of every chain.

use crate::builder::NetworkBuilder;
use crate::config::{EngineConfig, Track};
use crate::data::DataInterface;
use crate::likelihood::LikelihoodTables;
use crate::network::Graph;
use crate::posterior::{Chain, PosteriorStore};
use crate::query::Query;
use crate::samplers::McmcSampler;
use crate::schema::{AttrId, Cpd, Schema};
use crate::util::{PrmError, Result};

use rand::rngs::StdRng;
use rand::SeedableRng;


pub struct Engine {
    schema: Schema,
    data: Box<dyn DataInterface>,
    config: EngineConfig,

    /// Built by `configure`, once the CPDs are final
    tables: Option<LikelihoodTables>,
}

impl Engine {

    pub fn new(schema: Schema, data: Box<dyn DataInterface>, config: EngineConfig) -> Self {
        Engine { schema, data, config, tables: None }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate the configuration and precompute the likelihood functions of every attribute.
    /// Must be called again if a CPD changes.
    ///
    /// # Errors
    /// * `Config` if the configuration is invalid
    /// * `MissingCpd` if an attribute with parents has no CPD
    pub fn configure(&mut self) -> Result<()> {
        self.config.validate()?;
        self.tables = Some(LikelihoodTables::configure(&self.schema)?);
        Ok(())
    }

    /// Replace the CPD of an attribute. The likelihood functions are rebuilt on the next query.
    pub fn set_cpd(&mut self, attr: AttrId, cpd: Cpd) -> Result<()> {
        self.schema.set_cpd(attr, cpd)?;
        self.tables = None;
        Ok(())
    }

    /// Sample the posterior of the event of `query` given its evidence
    ///
    /// # Returns
    /// The ground network of the query, in the state of the last iteration, and the samples of
    /// every chain
    pub fn infer(&mut self, query: &Query) -> Result<(Graph, PosteriorStore)> {
        if self.tables.is_none() {
            self.configure()?;
        }

        let tables = self.tables.as_ref().ok_or_else(|| PrmError::General(String::from("engine not configured")))?;
        let schema = &self.schema;
        let config = &self.config;

        //////////////////////////////////////////////////////////////
        // 1) unroll the ground network, with a random source apart from those of the chains
        let mut rng = rng_for(config.seed, config.chains as u64);
        let mut graph = NetworkBuilder::new(schema, self.data.as_ref(), query, config).unroll(&mut rng)?;

        //////////////////////////////////////////////////////////////
        // 2) determine the tracked vertices
        let tracked: Vec<String> = match config.track {
            Track::Events => graph.events().iter().cloned().collect(),
            Track::All => graph.sampling().iter().chain(graph.references().iter()).cloned().collect(),
        };

        //////////////////////////////////////////////////////////////
        // 3) run the chains
        let sampler = McmcSampler::new(schema, tables, config.strategy);
        let mut store = PosteriorStore::new();

        for c in 0..config.chains {
            tracing::info!("Starting chain {} of {}, tracking {} vertices", c + 1, config.chains, tracked.len());
            let mut rng = rng_for(config.seed, c as u64);

            sampler.init(&mut rng, &mut graph)?;
            for _ in 0..config.burn_in {
                sampler.sweep(&mut rng, &mut graph)?;
            }

            let mut chain = Chain::init_chain(schema, &graph, &tracked, config.iterations)?;
            for i in 0..config.iterations {
                sampler.sweep(&mut rng, &mut graph)?;
                chain.collect_samples(schema, &graph, i);
            }

            tracing::info!("Finished chain {} with log-likelihood {:.3}", c + 1, graph.log_likelihood(schema)?);
            store.push(chain);
        }

        Ok((graph, store))
    }
}

/// The random source for `offset`, seeded with `seed + offset` or from the operating system
fn rng_for(seed: Option<u64>, offset: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(offset)),
        None => StdRng::from_entropy(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Strategy;
    use crate::data::InMemoryData;
    use crate::init::Initialization;
    use crate::query::{create_qvar, ObjsConstraint};
    use crate::schema::{Domain, SchemaBuilder};

    fn config(chains: usize, iterations: usize, strategy: Strategy) -> EngineConfig {
        EngineConfig { chains, burn_in: 50, iterations, strategy, seed: Some(3), ..EngineConfig::default() }
    }

    fn chain_engine(config: EngineConfig) -> (Engine, Query) {
        let schema = SchemaBuilder::new().with_attribute("A", "x", 1, Domain::Binary)
                                         .with_attribute("A", "y", 1, Domain::Binary)
                                         .with_dependency("A.x", "A.y", None)
                                         .with_cpd("A.x", Initialization::Binomial(0.5))
                                         .with_cpd("A.y", Initialization::Table(array![[0.8, 0.2], [0.2, 0.8]]))
                                         .build()
                                         .unwrap();
        let x = schema.lookup("A.x").unwrap();
        let y = schema.lookup("A.y").unwrap();

        let mut data = InMemoryData::new();
        data.insert(x, vec![1], Some(1));
        data.insert(y, vec![1], None);

        let event = vec![create_qvar(&schema, "A.y", ObjsConstraint::Inclusive, vec![vec![1]]).unwrap()];
        let evidence = vec![create_qvar(&schema, "A.x", ObjsConstraint::Exclusive, vec![]).unwrap()];
        let query = Query::new(&schema, event, evidence);

        (Engine::new(schema, Box::new(data), config), query)
    }

    #[test_log::test]
    fn posterior_of_child() {
        for &strategy in [Strategy::Standard, Strategy::Block, Strategy::Random].iter() {
            let (mut engine, query) = chain_engine(config(2, 2000, strategy));
            let (graph, store) = engine.infer(&query).unwrap();

            assert_eq!(2, graph.len());
            assert_eq!(2, store.chains().len());
            assert_eq!(vec!["A.y.1"], store.chains()[0].ids().collect::<Vec<_>>());
            assert!((0.8 - store.mean("A.y.1").unwrap()).abs() < 0.03);

            let r = store.gelman_rubin("A.y.1").unwrap();
            assert!(r.is_finite() && r < 1.1);
        }
    }

    #[test]
    fn seeded_runs_repeat() {
        let (mut engine, query) = chain_engine(config(1, 100, Strategy::Standard));
        let (_, first) = engine.infer(&query).unwrap();
        let (_, second) = engine.infer(&query).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn random_streams() {
        use rand::Rng;

        let chains = 3;
        let unroll: u64 = rng_for(Some(3), chains).gen();
        assert_eq!(unroll, rng_for(Some(3), chains).gen::<u64>());
        for c in 0..chains {
            assert_ne!(unroll, rng_for(Some(3), c).gen::<u64>());
        }
    }

    #[test]
    fn configuration_errors() {
        let (mut engine, query) = chain_engine(config(0, 100, Strategy::Standard));
        assert!(matches!(engine.infer(&query), Err(PrmError::Config(_))));

        let schema = SchemaBuilder::new().with_attribute("A", "x", 1, Domain::Binary)
                                         .with_attribute("A", "y", 1, Domain::Binary)
                                         .with_dependency("A.x", "A.y", None)
                                         .build()
                                         .unwrap();
        let mut engine = Engine::new(schema, Box::new(InMemoryData::new()), EngineConfig::default());
        assert_eq!(Err(PrmError::MissingCpd(String::from("A.y"))), engine.configure());
    }

    /// x -> a -> b <- d and b -> c, with b observed and b likely iff exactly one of a and d is.
    /// b is reached as the parent of c before it is reached as the child of a, and d still
    /// explains it away: P(a = 1 | b = 1) = 0.5, while ignoring d would give 0.9.
    #[test]
    fn explaining_away() {
        let schema = SchemaBuilder::new().with_attribute("T", "x", 1, Domain::Binary)
                                         .with_attribute("T", "a", 1, Domain::Binary)
                                         .with_attribute("T", "b", 1, Domain::Binary)
                                         .with_attribute("T", "c", 1, Domain::Binary)
                                         .with_attribute("T", "d", 1, Domain::Binary)
                                         .with_dependency("T.x", "T.a", None)
                                         .with_dependency("T.a", "T.b", None)
                                         .with_dependency("T.d", "T.b", None)
                                         .with_dependency("T.b", "T.c", None)
                                         .with_cpd("T.x", Initialization::Uniform)
                                         .with_cpd("T.a", Initialization::Uniform)
                                         .with_cpd("T.b", Initialization::Table(array![[0.9, 0.1],
                                                                                      [0.1, 0.9],
                                                                                      [0.1, 0.9],
                                                                                      [0.9, 0.1]]))
                                         .with_cpd("T.c", Initialization::Uniform)
                                         .with_cpd("T.d", Initialization::Uniform)
                                         .build()
                                         .unwrap();

        let mut data = InMemoryData::new();
        for attr in schema.attributes() {
            data.insert(attr.id, vec![1], Some(1));
        }

        let event = ["T.c", "T.a"].iter()
                                  .map(|e| create_qvar(&schema, e, ObjsConstraint::Inclusive, vec![vec![1]]).unwrap())
                                  .collect();
        let evidence = vec![create_qvar(&schema, "T.b", ObjsConstraint::Inclusive, vec![vec![1]]).unwrap()];
        let query = Query::new(&schema, event, evidence);

        let mut engine = Engine::new(schema, Box::new(data), config(2, 4000, Strategy::Standard));
        let (graph, store) = engine.infer(&query).unwrap();

        assert!(graph.contains("T.d.1"));
        assert!((0.5 - store.mean("T.a.1").unwrap()).abs() < 0.06);
    }

    /// One student and ten professors, the first five of which have funding. Advising is more
    /// likely with funding, so the posterior of the advisor favors funded professors.
    #[test]
    fn advisor_posterior() {
        let schema = SchemaBuilder::new().with_attribute("Professor", "fame", 1, Domain::Binary)
                                         .with_attribute("Professor", "funding", 1, Domain::Binary)
                                         .with_attribute("Student", "success", 1, Domain::Binary)
                                         .with_exist_attribute("advisor", "exist", 2)
                                         .with_dependency("Professor.funding", "advisor.exist", None)
                                         .with_uncertain_dependency(
                                             "Professor.fame", "Student.success", "advisor.exist", false, 1, None
                                         )
                                         .with_cpd("Professor.fame", Initialization::Binomial(0.5))
                                         .with_cpd("Student.success", Initialization::Uniform)
                                         .with_cpd("advisor.exist", Initialization::Table(array![[0.8, 0.2], [0.2, 0.8]]))
                                         .build()
                                         .unwrap();
        let fame = schema.lookup("Professor.fame").unwrap();
        let funding = schema.lookup("Professor.funding").unwrap();
        let success = schema.lookup("Student.success").unwrap();

        let mut data = InMemoryData::new();
        data.insert(success, vec![1], None);
        for p in 1..=10 {
            data.insert(fame, vec![p], None);
            data.insert(funding, vec![p], Some((p <= 5) as i64));
        }

        let event = vec![create_qvar(&schema, "Student.success", ObjsConstraint::Inclusive, vec![vec![1]]).unwrap()];
        let evidence = vec![create_qvar(&schema, "Professor.funding", ObjsConstraint::Exclusive, vec![]).unwrap()];
        let query = Query::new(&schema, event, evidence);

        let mut engine = Engine::new(schema, Box::new(data), config(2, 3000, Strategy::Standard));
        let (graph, store) = engine.infer(&query).unwrap();

        assert_eq!(1, graph.references().len());
        let distribution = store.distribution("RefV_Student.success.1");
        assert!(distribution.keys().all(|&p| (1..=10).contains(&p)));

        // 5 * 4 / (5 * 4 + 5 * 0.25)
        let funded: f64 = distribution.iter().filter(|(p, _)| **p <= 5).map(|(_, f)| *f).sum();
        assert!((20. / 21.25 - funded).abs() < 0.03);
    }
}
