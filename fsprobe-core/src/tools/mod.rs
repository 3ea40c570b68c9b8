//! JSON tool surface over the query engine, for an external orchestrator.

pub mod registry;
pub mod r#trait;
