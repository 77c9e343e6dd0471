pub mod audit;
pub mod build_info;
pub mod commands;
pub mod config;
pub mod entity;
pub mod error;
pub mod id;
pub mod legacy;
pub mod mapping;
pub mod migrate;
pub mod output;
pub mod record;
pub mod reference;
pub mod report;
pub mod schema;
pub mod store;
pub mod transform;
