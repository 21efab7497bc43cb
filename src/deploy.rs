//! Deploy executor: update the repository checkout, then run the restart command.

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{error, info};

use crate::config::WebhookConfig;
use crate::error::DeployError;

enum CommandFailure {
    Spawn(std::io::Error),
    TimedOut,
}

/// Runs a prepared command to completion with captured output, bounded by
/// `limit`. The child is killed if the timeout fires.
async fn run_command(command: &mut Command, limit: Duration) -> Result<Output, CommandFailure> {
    command.kill_on_drop(true);
    match timeout(limit, command.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(CommandFailure::Spawn(e)),
        Err(_) => Err(CommandFailure::TimedOut),
    }
}

fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stdout.is_empty() {
        stderr.into_owned()
    } else if stderr.is_empty() {
        stdout.into_owned()
    } else {
        format!("{}\n{}", stdout, stderr)
    }
}

/// Pulls the repository at `config.repo_path`, then runs the configured
/// restart command through a shell. Both commands are scoped to the
/// repository via the spawn working directory; the process-wide current
/// directory is never touched, so concurrent deploys to different
/// repositories cannot interfere.
///
/// Returns the restart command's captured output on success.
pub async fn run_deploy(
    config: &WebhookConfig,
    command_timeout: Duration,
) -> Result<String, DeployError> {
    let seconds = command_timeout.as_secs();

    // 1. git pull
    info!("Running (cwd = '{}'): git pull", config.repo_path);
    let mut pull = Command::new("git");
    pull.arg("pull").current_dir(&config.repo_path);
    let pull_output = match run_command(&mut pull, command_timeout).await {
        Ok(output) => output,
        Err(CommandFailure::Spawn(e)) => {
            error!("git pull failed to start: {}", e);
            return Err(DeployError::UpdateFailed {
                exit_code: None,
                message: format!("git pull failed to start: {}", e),
            });
        }
        Err(CommandFailure::TimedOut) => {
            error!("git pull timed out after {}s", seconds);
            return Err(DeployError::TimedOut {
                step: "git pull",
                seconds,
            });
        }
    };
    if !pull_output.status.success() {
        let message = combined_output(&pull_output);
        error!("git pull failed:\n{}", message);
        return Err(DeployError::UpdateFailed {
            exit_code: pull_output.status.code(),
            message,
        });
    }
    info!(
        "git pull output:\n{}",
        String::from_utf8_lossy(&pull_output.stdout)
    );

    // 2. Restart command, through a shell so config strings like
    //    "systemctl restart app && curl ..." work as written.
    info!(
        "Running (cwd = '{}'): {}",
        config.repo_path, config.restart_command
    );
    let mut restart = Command::new("sh");
    restart
        .arg("-c")
        .arg(&config.restart_command)
        .current_dir(&config.repo_path);
    let restart_output = match run_command(&mut restart, command_timeout).await {
        Ok(output) => output,
        Err(CommandFailure::Spawn(e)) => {
            error!("restart command failed to start: {}", e);
            return Err(DeployError::RestartFailed {
                exit_code: None,
                message: format!("restart command failed to start: {}", e),
            });
        }
        Err(CommandFailure::TimedOut) => {
            error!("restart command timed out after {}s", seconds);
            return Err(DeployError::TimedOut {
                step: "restart command",
                seconds,
            });
        }
    };
    if !restart_output.status.success() {
        let message = combined_output(&restart_output);
        error!("restart command failed:\n{}", message);
        return Err(DeployError::RestartFailed {
            exit_code: restart_output.status.code(),
            message,
        });
    }

    let output = String::from_utf8_lossy(&restart_output.stdout).to_string();
    info!("restart command output:\n{}", output);
    Ok(output)
}
