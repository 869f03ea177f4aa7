pub mod alerts;
pub mod api;
pub mod assembler;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod content;
pub mod descriptor;
pub mod engine;
pub mod extensions;
pub mod github;
pub mod model;
pub mod monitoring;
pub mod paging;
pub mod platform;
pub mod registry;
pub mod resolver;

#[cfg(test)]
mod testing;
