pub mod event_bus;
pub mod seq;

pub use event_bus::*;
pub use seq::*;
