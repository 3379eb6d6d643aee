//! Inkpost - blog platform engagement backend
//!
//! This library provides the storage, caching and engagement-counter
//! coordination layer for the Inkpost blog platform. HTTP transport,
//! session handling and authentication live in the consuming application.

pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
