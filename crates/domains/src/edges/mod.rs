pub mod models;

pub use models::graph_edge::GraphEdge;
