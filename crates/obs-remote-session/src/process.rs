//! The OBS process itself: detection, launch and termination.
//!
//! obs-websocket has no request that quits OBS, so closing the application
//! happens here with SIGINT, the signal OBS handles as a clean shutdown.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use obs_remote_core::prelude::*;

/// Kernel limit on the `comm` field of `/proc/<pid>/stat` (bytes, without NUL).
const COMM_MAX_LEN: usize = 15;

/// Local process collaborator for the control session.
#[trait_variant::make(TargetProcess: Send)]
pub trait LocalTargetProcess {
    /// Whether a live (non-zombie) target process exists.
    async fn is_target_running(&self) -> bool;

    /// Start the target detached from this process.
    async fn launch_target(&self) -> Result<()>;

    /// Ask every running target process to exit.
    async fn request_target_termination(&self) -> Result<()>;
}

/// [`TargetProcess`] for a locally installed OBS.
#[derive(Debug, Clone)]
pub struct ObsProcess {
    executable: String,
    process_name: String,
}

impl Default for ObsProcess {
    fn default() -> Self {
        Self::new("obs", "obs")
    }
}

impl ObsProcess {
    pub fn new(executable: impl Into<String>, process_name: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            process_name: process_name.into(),
        }
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    /// PIDs of live processes named `process_name`, excluding our own.
    pub async fn find_pids(&self) -> Vec<u32> {
        let name = self.process_name.clone();
        tokio::task::spawn_blocking(move || scan_proc(Path::new("/proc"), &name))
            .await
            .unwrap_or_else(|e| {
                warn!("Process scan failed: {}", e);
                Vec::new()
            })
    }
}

impl TargetProcess for ObsProcess {
    async fn is_target_running(&self) -> bool {
        !self.find_pids().await.is_empty()
    }

    async fn launch_target(&self) -> Result<()> {
        let path = which::which(&self.executable).map_err(|e| Error::ProcessSpawn {
            reason: format!("{}: {}", self.executable, e),
        })?;

        let mut command = Command::new(&path);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        // New process group: a Ctrl+C aimed at us must not reach OBS.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| Error::ProcessSpawn {
            reason: format!("{}: {}", path.display(), e),
        })?;
        info!(
            "Launched {} (pid {})",
            path.display(),
            child.id().unwrap_or_default()
        );

        // Reap it whenever it exits.
        tokio::spawn(async move {
            let _ = child.wait().await;
        });

        Ok(())
    }

    async fn request_target_termination(&self) -> Result<()> {
        let pids = self.find_pids().await;
        if pids.is_empty() {
            debug!("No {} process to terminate", self.process_name);
            return Ok(());
        }

        for pid in pids {
            info!("Sending SIGINT to {} (pid {})", self.process_name, pid);
            let status = Command::new("kill")
                .args(["-INT", &pid.to_string()])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map_err(|e| Error::process(format!("Failed to run kill: {}", e)))?;
            if !status.success() {
                // The process may have exited between scan and signal.
                debug!("kill -INT {} exited with {}", pid, status);
            }
        }
        Ok(())
    }
}

/// Scan a procfs root for live processes whose command name is `name`.
fn scan_proc(root: &Path, name: &str) -> Vec<u32> {
    let own_pid = std::process::id();
    let wanted = comm_name(name);

    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };

    let mut pids: Vec<u32> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
        .filter(|&pid| pid != own_pid)
        .filter(|pid| {
            std::fs::read_to_string(root.join(pid.to_string()).join("stat")).is_ok_and(|stat| {
                parse_proc_stat(&stat).is_some_and(|(comm, state)| comm == wanted && is_live(state))
            })
        })
        .collect();
    pids.sort_unstable();
    pids
}

/// Extract `(comm, state)` from the contents of `/proc/<pid>/stat`.
///
/// `comm` may itself contain spaces and parentheses, so it spans from the
/// first `(` to the last `)`.
pub fn parse_proc_stat(stat: &str) -> Option<(&str, char)> {
    let open = stat.find('(')?;
    let close = stat.rfind(')')?;
    if close < open {
        return None;
    }
    let comm = &stat[open + 1..close];
    let state = stat[close + 1..].trim_start().chars().next()?;
    Some((comm, state))
}

/// Zombie (`Z`) and dead (`X`, `x`) processes do not count as running.
fn is_live(state: char) -> bool {
    !matches!(state, 'Z' | 'X' | 'x')
}

/// The kernel truncates `comm`, so compare against the truncated name.
fn comm_name(name: &str) -> &str {
    if name.len() <= COMM_MAX_LEN {
        return name;
    }
    let mut end = COMM_MAX_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}
