//! Core shoplist library (config, session routing, list backend).

pub mod backend;
pub mod config;
pub mod core;
