//! Builders to construct the dispatcher from configuration and collaborators.

pub mod supervisor_builder;

pub use supervisor_builder::SupervisorBuilder;
