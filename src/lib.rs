pub mod config;
pub mod data;
pub mod dates;
pub mod enrich;
pub mod fair_value;
#[cfg(feature = "full")]
pub mod fetch_data;
pub mod model;
pub mod pipeline;
pub mod schema;
