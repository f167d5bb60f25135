pub mod limits;
pub mod session;
pub mod usage;
