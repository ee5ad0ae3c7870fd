//! # Web API Handlers

pub mod batch;
pub mod executions;
pub mod health;
