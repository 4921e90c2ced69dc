//! Provides an example of how to use prm-infer to query a probabilistic relational model of a
//! small university.
//!
//! Students register for courses and are advised by one professor. Who advises whom is unknown:
//! funded professors are more likely to advise. Run with `RUST_LOG=info` to follow the inference.

extern crate prm_infer;
#[macro_use]
extern crate ndarray;

use prm_infer as p;
use p::data::InMemoryData;
use p::init::Initialization;
use p::query::{create_qvar, ObjsConstraint, Query};
use p::schema::{Domain, Schema, SchemaBuilder};

use tracing_subscriber::EnvFilter;

const CONFIG: &str = r#"
chains = 3
burn_in = 200
iterations = 2000
strategy = "standard"
seed = 42
"#;

fn main() -> p::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    /////////////////////////////////////////////////////
    // Step 1: Build the schema
    let schema = build_schema()?;

    /////////////////////////////////////////////////////
    // Step 2: Fill the data store
    let data = build_data(&schema);

    /////////////////////////////////////////////////////
    // Step 3: Ask for the success of student 1 given every grade and every professor's funding
    let event = vec![create_qvar(&schema, "Student.success", ObjsConstraint::Inclusive, vec![vec![1]])?];
    let evidence = vec![
        create_qvar(&schema, "Registration.grade", ObjsConstraint::Exclusive, vec![])?,
        create_qvar(&schema, "Course.difficulty", ObjsConstraint::Exclusive, vec![])?,
        create_qvar(&schema, "Professor.funding", ObjsConstraint::Exclusive, vec![])?,
    ];
    let query = Query::new(&schema, event, evidence);

    /////////////////////////////////////////////////////
    // Step 4: Run the engine
    let config = p::EngineConfig::from_toml_str(CONFIG)?;
    let mut engine = p::Engine::new(schema, Box::new(data), config);
    let (graph, store) = engine.infer(&query)?;

    println!("ground network: {}", graph.statistics());
    for id in store.chains()[0].ids() {
        println!("{}", id);
        println!("    mean:         {:.3}", store.mean(id).unwrap_or(std::f64::NAN));
        println!("    gelman-rubin: {:.3}", store.gelman_rubin(id)?);
        for (value, frequency) in store.distribution(id) {
            println!("    P({} = {}) = {:.3}", id, value, frequency);
        }
    }

    Ok(())
}

fn build_schema() -> p::Result<Schema> {
    SchemaBuilder::new().with_attribute("Professor", "fame", 1, Domain::Binary)
                        .with_attribute("Professor", "funding", 1, Domain::Binary)
                        .with_attribute("Student", "intelligence", 1, Domain::Binary)
                        .with_attribute("Student", "success", 1, Domain::Binary)
                        .with_attribute("Course", "difficulty", 1, Domain::Binary)
                        .with_attribute("Registration", "grade", 2, Domain::Range(1, 3))
                        .with_exist_attribute("advisor", "exist", 2)
                        .with_dependency("Student.intelligence", "Student.success", None)
                        .with_dependency("Student.intelligence", "Registration.grade", None)
                        .with_dependency("Course.difficulty", "Registration.grade", None)
                        .with_dependency("Professor.funding", "advisor.exist", None)
                        .with_uncertain_dependency(
                            "Professor.fame", "Student.success", "advisor.exist", false, 1, None
                        )
                        .with_cpd("Professor.fame", Initialization::Binomial(0.7))
                        .with_cpd("Student.intelligence", Initialization::Binomial(0.6))
                        .with_cpd("Course.difficulty", Initialization::Binomial(0.5))
                        // rows: (intelligence, fame)
                        .with_cpd("Student.success", Initialization::Table(array![[0.9, 0.1],
                                                                                  [0.6, 0.4],
                                                                                  [0.5, 0.5],
                                                                                  [0.1, 0.9]]))
                        // rows: (intelligence, difficulty)
                        .with_cpd("Registration.grade", Initialization::Table(array![[0.3, 0.4, 0.3],
                                                                                     [0.05, 0.25, 0.7],
                                                                                     [0.9, 0.08, 0.02],
                                                                                     [0.5, 0.3, 0.2]]))
                        .with_cpd("advisor.exist", Initialization::Table(array![[0.8, 0.2], [0.2, 0.8]]))
                        .build()
}

fn build_data(schema: &Schema) -> InMemoryData {
    let attr = |name: &str| schema.lookup(name).unwrap_or_else(|| panic!("unknown attribute {}", name));
    let grade = attr("Registration.grade");
    let by_intelligence = schema.attribute(grade).dependencies_child[0];
    let by_difficulty = schema.attribute(grade).dependencies_child[1];

    let mut data = InMemoryData::new();
    for prof in 1..=6 {
        data.insert(attr("Professor.fame"), vec![prof], None);
        data.insert(attr("Professor.funding"), vec![prof], Some((prof % 2 == 0) as i64));
    }

    for student in 1..=4 {
        data.insert(attr("Student.intelligence"), vec![student], None);
        data.insert(attr("Student.success"), vec![student], None);
    }

    for course in 1..=3 {
        data.insert(attr("Course.difficulty"), vec![course], Some(course % 2));
    }

    // (student, course, grade)
    let registrations = [(1, 1, 1), (1, 2, 1), (1, 3, 2), (2, 1, 3), (2, 2, 2), (3, 3, 1), (4, 2, 3)];
    for &(student, course, g) in registrations.iter() {
        data.insert(grade, vec![student, course], Some(g));
        data.link(by_intelligence, vec![student, course], vec![student]);
        data.link(by_difficulty, vec![student, course], vec![course]);
    }

    data
}
