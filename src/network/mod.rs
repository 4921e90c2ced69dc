//! The ground Bayesian network: its vertices, the `Graph` holding them and the `FrontierQueue`
//! used while building it.

pub mod graph;
pub mod queue;
pub mod vertex;

pub use self::graph::{Graph, GraphStatistics};
pub use self::queue::FrontierQueue;
pub use self::vertex::{GroundVertex, ReferenceVertex, Vertex};
