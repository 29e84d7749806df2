//! Command implementations

pub mod common;
pub mod compile;
pub mod ls;
pub mod run;
pub mod test;
