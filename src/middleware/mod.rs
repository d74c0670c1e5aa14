pub mod bearer;
pub mod headers;
pub mod metrics;
pub mod scope;
