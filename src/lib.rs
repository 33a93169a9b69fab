pub mod adapter;
pub mod integration;
pub mod quiz;
pub mod stats;
pub mod types;
