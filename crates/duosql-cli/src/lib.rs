//! duosql CLI library: argument parsing, input handling, and output
//! formatting for the `duosql` binary.

pub mod cli;
pub mod input;
pub mod output;
