pub mod group;
pub mod stage;
pub mod statement;

pub use group::*;
pub use stage::*;
pub use statement::*;
