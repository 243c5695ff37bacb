//! API handlers for Sofin

mod collections;
mod health;
mod loan;

pub use collections::*;
pub use health::*;
pub use loan::*;
