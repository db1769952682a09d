pub mod adapters;
pub mod config;
pub mod dbconfig;
pub mod domain;
pub mod error;
pub mod findings;
pub mod inputs;
pub mod normalize;
pub mod reads;
pub mod registry;
pub mod runner;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod task;
