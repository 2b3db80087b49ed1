//! CreatorFlow library
//!
//! Content-production tracker for solo video creators: ideas move through
//! a pipeline of statuses, grouped by channel, scheduled on a calendar.
//! The library holds the store, its persistence backends, and the command
//! layer; the binary is a command-line front end over it.

pub mod app;
pub mod commands;
pub mod config;
pub mod database;
pub mod error;
pub mod router;
pub mod services;
pub mod storage;
