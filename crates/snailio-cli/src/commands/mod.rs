//! CLI subcommands

pub mod demo;
