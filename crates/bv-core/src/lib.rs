mod assign;
mod error;
mod position;
mod roster;
mod tally;
mod types;

pub use assign::*;
pub use error::*;
pub use position::*;
pub use roster::*;
pub use tally::*;
pub use types::*;
