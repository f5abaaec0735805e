// Core types and execution engine for Pipeweld workflow automation

pub mod capability;
pub mod error;
pub mod rules;
pub mod storage;
pub mod types;
pub mod workflow;

pub use types::*;
