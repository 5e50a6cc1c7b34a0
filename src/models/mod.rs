// Core data models for Stagehand
// These structs represent the domain entities

pub mod group;
pub mod role;
pub mod stage;
pub mod statement;

pub use group::*;
pub use role::*;
pub use stage::*;
pub use statement::*;
