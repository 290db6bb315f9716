//! depflow - policy-driven dependency update engine
//!
//! This library scans a repository for dependency manifests, plans
//! version updates against package registries and applies them:
//! - Node.js (package.json)
//! - Python (requirements*.txt)
//! - Container images (Dockerfile)
//!
//! [`engine::Engine`] drives the Scan, Plan and Update phases across the
//! registered [`integration::Integration`]s.

pub mod cli;
pub mod config;
pub mod datasource;
pub mod domain;
pub mod engine;
pub mod error;
pub mod integration;
pub mod output;
pub mod progress;
pub mod resolve;
pub mod schedule;
pub mod update;
