pub mod composite;
pub mod engine;
