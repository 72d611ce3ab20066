pub mod chain;
pub mod engine;
pub mod mood;
pub mod patterns;
pub mod scheduler;
pub mod sequence;
pub mod session;
pub mod sink;
pub mod store;
pub mod types;
