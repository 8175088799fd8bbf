// src/lib.rs

//! Harvester Library
//!
//! Collects job-market and social signals from several sources, normalizes
//! them into one record shape and runs the collectors as a sequential
//! pipeline.

pub mod collectors;
pub mod credentials;
pub mod error;
pub mod events;
pub mod models;
pub mod normalize;
pub mod runner;
pub mod storage;
pub mod utils;
