pub mod cli;
pub mod config;
pub mod errors;
pub mod git;
pub mod stack;

pub use errors::PatchStackError;
