
pub mod constants;
pub mod error;
pub mod geodesy;
pub mod flight;
pub mod tracker;
pub mod scene;
pub mod enrichment;
pub mod net;
pub mod coordinator;
pub mod config;
