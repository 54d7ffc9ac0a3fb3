//! # Mindtype
//!
//! Server and CLI for the Mindtype study: PHQ-9 screening followed by two
//! typing tasks, one record per participant.
//!
//! - [`api`]: JSON API for the survey front end (axum)
//! - [`cli`]: command-line interface (clap)
//! - [`config`]: TOML file plus `MINDTYPE_*` environment overrides
//! - [`storage`]: backend selection and the remote spreadsheet driver
//! - [`terminal`]: the interactive wizard on stdin/stdout

pub mod api;
pub mod cli;
pub mod config;
pub mod storage;
pub mod terminal;
