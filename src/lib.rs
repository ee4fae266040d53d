//! WorldStats - country statistics aggregated from several providers.
//!
//! # Overview
//!
//! Eight providers each supply part of a country's statistics. A sync run
//! merges their updates into one record per country and stores it; query
//! services serve cached views of the stored data; connected clients are
//! told when a sync lands.
//!
//! # Modules
//!
//! - [`config`]: Environment-driven configuration
//! - [`error`]: HTTP error taxonomy
//! - [`model`]: Countries, category records and in-flight updates
//! - [`storage`]: SQLite storage layer
//! - [`seed`]: Reference countries and baseline values
//! - [`providers`]: Statistics providers and the provider run wrapper
//! - [`sync`]: Sync orchestrator
//! - [`scheduler`]: Cron-driven background sync
//! - [`cache`]: Redis cache with an in-process fallback
//! - [`services`]: Country, chart, comparison and summary views
//! - [`realtime`]: WebSocket and SSE push
//! - [`api`]: HTTP API handlers

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod providers;
pub mod realtime;
pub mod scheduler;
pub mod seed;
pub mod services;
pub mod storage;
pub mod sync;
