//
// cli/mod.rs
//
// Subcommands of the csxpp binary
//

pub mod analysis_stats;
pub mod commands;
