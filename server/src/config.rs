//! CLI surface (spec §6 Config), `clap` derive matching the teacher's
//! `maker`/`coordinator` dependency on `clap = { features = ["derive"] }`.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "cash-application-server", about = "Cash application agent: EX/EF/MX/CM orchestration over HTTP")]
pub struct Cli {
    /// Path to the TOML settings file (spec §6 Configuration table).
    #[arg(long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Postgres connection string for the Audit Store. Falls back to the
    /// `DATABASE_URL` env var, then to an in-memory store (non-durable,
    /// for local development only).
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}
