//! Runtime tuning handed to the core components at construction.

pub mod ai;
pub mod controller;
pub mod gateway;
pub mod monitor;
