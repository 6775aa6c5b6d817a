use crate::domain::model::{SessionOutcome, SessionRequest};
use crate::domain::ports::SessionLauncher;
use crate::utils::error::{BastionError, Result};
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};

pub const AWS_CLI: &str = "aws";

/// Starts Session Manager sessions by running the `aws` CLI, which brings
/// the session-manager-plugin that carries the actual tunnel.
#[derive(Debug, Clone)]
pub struct AwsCliSession {
    program: String,
}

impl Default for AwsCliSession {
    fn default() -> Self {
        Self::new(AWS_CLI)
    }
}

impl AwsCliSession {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn spawn(&self, request: &SessionRequest) -> Result<Child> {
        let args = request.cli_args();
        tracing::debug!("Running {} {}", self.program, args.join(" "));

        Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| {
                tracing::error!("Error starting session: {}", source);
                BastionError::SessionSpawnError {
                    program: self.program.clone(),
                    source,
                }
            })
    }
}

#[async_trait]
impl SessionLauncher for AwsCliSession {
    async fn launch(&self, request: &SessionRequest) -> Result<SessionOutcome> {
        let mut child = self.spawn(request)?;
        let mut interrupted = false;

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("Stopping port forwarding...");
                tracing::info!("Interrupt received, forwarding to session process");
                interrupted = true;
                interrupt(&mut child)?;
                child.wait().await?
            }
        };

        let exit_code = exit_code(status);
        tracing::info!("Session ended with code: {:?}", exit_code);
        println!("Session ended with code: {}", display_code(exit_code));

        Ok(SessionOutcome {
            exit_code,
            interrupted,
        })
    }
}

fn exit_code(status: ExitStatus) -> Option<i32> {
    status.code()
}

fn display_code(code: Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "null".to_string())
}

/// Sends SIGINT so the CLI can close the session cleanly.
#[cfg(unix)]
fn interrupt(child: &mut Child) -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        // Already reaped.
        return Ok(());
    };
    match kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(errno) => Err(BastionError::IoError(std::io::Error::from(errno))),
    }
}

#[cfg(not(unix))]
fn interrupt(child: &mut Child) -> Result<()> {
    child.start_kill()?;
    Ok(())
}
