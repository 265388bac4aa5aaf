pub mod config;
pub mod decay;
pub mod error;
pub mod gateway;
pub mod signing;
pub mod trend;
pub mod types;
