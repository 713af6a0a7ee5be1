pub mod models;

pub use models::entity::{ArticleEntity, Entity};
