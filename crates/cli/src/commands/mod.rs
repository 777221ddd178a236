//! CLI Commands

pub mod check;
pub mod list;
pub mod probe;
pub mod run;
