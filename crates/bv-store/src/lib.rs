pub mod models;
pub mod store;
pub mod voting;

pub use models::*;
pub use store::*;
pub use voting::*;
