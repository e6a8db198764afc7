//! Launches and supervises the edge programs as child processes.
//!
//! The program list comes from `EDGE_PROGRAMS` (comma separated binary
//! names resolved next to this executable); without it a sensible
//! default set is started.

use home_edge::supervisor::{parse_program_list, ProgramSpec, Supervisor};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PROGRAMS: &[&str] = &["air-sensor", "sound-sensor", "cloud-logger"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "home_edge=debug,edge_supervisor=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let names = match std::env::var("EDGE_PROGRAMS") {
        Ok(raw) => parse_program_list(&raw),
        Err(_) => DEFAULT_PROGRAMS.iter().map(|s| s.to_string()).collect(),
    };
    anyhow::ensure!(!names.is_empty(), "program list is empty");

    let mut programs = Vec::with_capacity(names.len());
    for name in &names {
        programs.push(ProgramSpec::sibling(name)?);
    }
    tracing::info!(programs = ?names, "supervising");

    Supervisor::new(programs).run().await?;
    Ok(())
}
