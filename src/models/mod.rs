pub mod credential;
pub mod metrics;
pub mod token;
