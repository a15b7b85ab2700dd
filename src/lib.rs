// src/lib.rs - Library root for geoexplorer

pub mod cli;
pub mod core;
pub mod infra;
pub mod memory;
pub mod provider;
pub mod util;
