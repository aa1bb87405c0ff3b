pub mod config;
pub mod error;
pub mod export;
pub mod grid;
pub mod http_client;
pub mod ingest;
pub mod overrides;
pub mod picks;
pub mod reconcile;
pub mod scoreboard;
pub mod sheet_scan;
pub mod standings;
pub mod store;
