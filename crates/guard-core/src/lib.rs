pub mod config;
pub mod control;
pub mod decision;
pub mod deletion;
pub mod denylist;
pub mod error;
pub mod guard;
pub mod io;
pub mod map;
pub mod paths;
pub mod ratchet;
pub mod report;
pub mod scanner;
pub mod selector;
pub mod slice;

pub use error::{ErrorClass, GuardError, Result};
