//! CLI subcommands

pub mod top;
