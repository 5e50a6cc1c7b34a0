// Stage/workflow engine: catalog, transition rules, state machine

pub mod catalog;
pub mod engine;
pub mod rules;
pub mod subject;
pub mod variants;

pub use catalog::*;
pub use engine::*;
pub use rules::*;
pub use subject::*;
pub use variants::*;
