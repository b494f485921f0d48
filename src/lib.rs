// FISI Library administrative toolkit

pub mod constants;
pub mod error;
pub mod db;
pub mod catalog;
pub mod ingest;
pub mod seed;
pub mod reports;
pub mod diagnostics;
