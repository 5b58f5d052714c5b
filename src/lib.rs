pub mod cache;
pub mod config;
pub mod engine;
pub mod hourly;
pub mod marketplace;
pub mod output;
pub mod sales;
pub mod service;
