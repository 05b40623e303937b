pub mod answer;
pub mod intent;
pub mod plan;
pub mod schema;
pub mod store;
