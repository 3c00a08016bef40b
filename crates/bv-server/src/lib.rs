pub mod bootstrap;
pub mod config;
pub mod handler;
