//! Subprocess supervisor for the edge programs.
//!
//! Spawns the configured child programs with a short stagger, polls
//! liveness once a second, and on shutdown sends SIGTERM to everything,
//! waits out a grace period, then kills whatever is left. A child that
//! exits on its own is logged and dropped, not restarted.

use std::path::PathBuf;
use std::time::Duration;

use tokio::process::{Child, Command};

const LIVENESS_INTERVAL: Duration = Duration::from_secs(1);
const START_STAGGER: Duration = Duration::from_secs(1);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct ProgramSpec {
    pub name: String,
    pub command: PathBuf,
    pub args: Vec<String>,
}

impl ProgramSpec {
    /// A sibling binary living next to the supervisor executable.
    pub fn sibling(name: &str) -> std::io::Result<ProgramSpec> {
        let current = std::env::current_exe()?;
        let dir = current.parent().unwrap_or_else(|| std::path::Path::new("."));
        Ok(ProgramSpec {
            name: name.to_string(),
            command: dir.join(name),
            args: Vec::new(),
        })
    }
}

/// Split the comma-separated program list from the environment.
pub fn parse_program_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

struct Running {
    name: String,
    child: Child,
}

pub struct Supervisor {
    programs: Vec<ProgramSpec>,
}

impl Supervisor {
    pub fn new(programs: Vec<ProgramSpec>) -> Supervisor {
        Supervisor { programs }
    }

    /// Spawn everything and supervise until the shutdown signal.
    pub async fn run(self) -> Result<(), Error> {
        let mut running: Vec<Running> = Vec::new();

        for spec in &self.programs {
            match Command::new(&spec.command).args(&spec.args).spawn() {
                Ok(child) => {
                    tracing::info!(program = %spec.name, pid = ?child.id(), "started");
                    running.push(Running {
                        name: spec.name.clone(),
                        child,
                    });
                }
                Err(e) => {
                    tracing::warn!(program = %spec.name, error = %e, "failed to start, skipping");
                }
            }
            tokio::time::sleep(START_STAGGER).await;
        }

        tracing::info!(count = running.len(), "all programs started");

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);
        let mut interval = tokio::time::interval(LIVENESS_INTERVAL);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    running.retain_mut(|program| match program.child.try_wait() {
                        Ok(Some(status)) => {
                            tracing::warn!(
                                program = %program.name,
                                %status,
                                "terminated unexpectedly, will not be restarted"
                            );
                            false
                        }
                        Ok(None) => true,
                        Err(e) => {
                            tracing::error!(program = %program.name, error = %e, "liveness check failed");
                            false
                        }
                    });
                }
                result = &mut shutdown => {
                    result?;
                    tracing::info!("shutdown signal received, stopping all programs");
                    break;
                }
            }
        }

        self.shutdown(running).await;
        Ok(())
    }

    async fn shutdown(&self, mut running: Vec<Running>) {
        for program in &mut running {
            tracing::info!(program = %program.name, "terminating");
            terminate(&program.child);
        }

        tokio::time::sleep(SHUTDOWN_GRACE).await;

        for program in &mut running {
            match program.child.try_wait() {
                Ok(Some(_)) => {}
                _ => {
                    tracing::warn!(program = %program.name, "still running, force killing");
                    if let Err(e) = program.child.kill().await {
                        tracing::error!(program = %program.name, error = %e, "kill failed");
                    }
                }
            }
        }

        tracing::info!("all programs stopped");
    }
}

#[cfg(unix)]
fn terminate(child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            tracing::warn!(pid, error = %e, "SIGTERM failed");
        }
    }
}

#[cfg(not(unix))]
fn terminate(_child: &Child) {}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_list_parsing() {
        assert_eq!(
            parse_program_list("air-sensor, sound-sensor,cloud-logger"),
            vec!["air-sensor", "sound-sensor", "cloud-logger"]
        );
        assert!(parse_program_list("").is_empty());
        assert_eq!(parse_program_list("vent-motor,"), vec!["vent-motor"]);
    }

    #[test]
    fn sibling_resolves_next_to_current_exe() {
        let spec = ProgramSpec::sibling("air-sensor").unwrap();
        assert_eq!(spec.name, "air-sensor");
        assert!(spec.command.ends_with("air-sensor"));
    }
}
