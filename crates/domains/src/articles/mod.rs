pub mod models;

pub use models::article::Article;
