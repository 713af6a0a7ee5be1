pub mod models;

pub use models::economic_event::EconomicEvent;
