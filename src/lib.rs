//! Stagehand - stage workflow engine for bank application statements
//!
//! This library provides the core functionality for Stagehand, including:
//! - Stage catalogs and per-variant transition rules
//! - The stage state machine, with role-aware transitions and scoring deferral
//! - Database operations and migrations
//! - Repository layer for bank groups, catalogs and statements
//! - CLI command parsing and execution
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stagehand::models::{RoleContext, StageId, StageState};
//! use stagehand::workflow::{standard_catalog, standard_rules, Subject, Workflow};
//!
//! struct Draft(StageState);
//!
//! impl Subject for Draft {
//!     fn stage_state(&self) -> &StageState { &self.0 }
//!     fn stage_state_mut(&mut self) -> &mut StageState { &mut self.0 }
//!     fn save(&mut self) -> anyhow::Result<()> { Ok(()) }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let workflow = Workflow::new(Arc::new(standard_catalog()?), Arc::new(standard_rules()));
//!     let mut engine = workflow.engine(Draft(StageState::new(StageId::new(1))), RoleContext::new("client"));
//!     engine.set_stage("newOnModer", None)?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod repo;
pub mod workflow;
