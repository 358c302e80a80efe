//! simplefeed - a small feed entry service
//!
//! This crate provides a JSON API and an HTML index over a single SQLite
//! `feed` table, plus the deploy tool that stages the service onto a host.

pub mod config;
pub mod db;
pub mod deploy;
pub mod models;
pub mod routes;
pub mod telemetry;
pub mod usecases;
