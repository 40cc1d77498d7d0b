// src/lib.rs

pub mod config;
pub mod constants;
pub mod content;
pub mod database;
pub mod error;
pub mod generators;
pub mod models;
pub mod payments;
pub mod pedagogy;
pub mod projection;
pub mod repository;
pub mod scoring;
pub mod session;
pub mod unlock;
