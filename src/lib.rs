pub mod config;
pub mod diagnose;
pub mod docs;
pub mod env;
pub mod error;
pub mod http;
pub mod overrides;
pub mod provider;
pub mod registry;
pub mod selection;
