//! Enforces collective per-tracker upload speed caps across torrents
//! managed by a single qBittorrent instance.
//!
//! The crate is organized as three core subsystems — the [`matcher`],
//! [`cache`], and [`qbit`] adapter — driven each cycle by the
//! [`engine`], plus the ambient collaborators: [`config`], [`rollback`],
//! [`dry_run`], [`webhook`], and the [`http`] surface. [`app::AppContext`]
//! wires all of it together for `main.rs`.

pub mod app;
pub mod cache;
pub mod config;
pub mod dry_run;
pub mod engine;
pub mod error;
pub mod http;
pub mod matcher;
pub mod qbit;
pub mod rollback;
pub mod telemetry;
pub mod webhook;
