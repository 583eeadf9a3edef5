//! azgov - resource governance for Azure
//!
//! Enumerate resources of a registered kind, narrow them with filters and run
//! actions on what remains.

pub mod azure;
pub mod config;
pub mod error;
pub mod policy;
pub mod resource;
