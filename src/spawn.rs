//! Fire-and-forget command spawning.
//!
//! Commands run through `/bin/sh -c` in their own session and are never
//! waited on. [`Children`] keeps their handles and collects exit statuses
//! without blocking, so finished commands do not linger as zombies while
//! SIGCHLD keeps its default disposition for everything we start.

use std::process::{Child, Command};

/// Build the shell command for `command`, expanding a leading `~`
pub fn shell_command(command: &str) -> Command {
    let expanded = shellexpand::tilde(command);
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg(expanded.as_ref());

    // Detach from framewm's session so clients survive if it exits
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }
    }
    cmd
}

/// Start `command` and return immediately
pub fn spawn(command: &str) -> Option<Child> {
    log::info!("Spawning: {}", command);
    match shell_command(command).spawn() {
        Ok(child) => Some(child),
        Err(e) => {
            log::error!("Failed to spawn '{}': {}", command, e);
            None
        }
    }
}

/// Commands started by the manager that have not been collected yet
#[derive(Debug, Default)]
pub struct Children {
    running: Vec<Child>,
}

impl Children {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `command` and keep its handle for [`Children::reap`]
    pub fn spawn(&mut self, command: &str) -> bool {
        match spawn(command) {
            Some(child) => {
                self.running.push(child);
                true
            }
            None => false,
        }
    }

    /// Collect every child that has exited; never blocks
    pub fn reap(&mut self) -> usize {
        let before = self.running.len();
        self.running.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                log::debug!("Child {} exited: {}", child.id(), status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                log::warn!("Lost track of child {}: {}", child.id(), e);
                false
            }
        });
        before - self.running.len()
    }

    /// Number of children still running (or not yet reaped)
    pub fn pending(&self) -> usize {
        self.running.len()
    }
}

/// Stop a child we own and collect it
pub fn terminate(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::debug!("Child {} already gone: {}", child.id(), e);
    }
    if let Err(e) = child.wait() {
        log::warn!("Failed to collect child {}: {}", child.id(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_shell_command_expands_tilde() {
        let cmd = shell_command("~/bin/launcher --flag");
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(cmd.get_program(), "/bin/sh");
        assert_eq!(args[0], "-c");
        assert!(args[1].ends_with("/bin/launcher --flag"));
        if dirs::home_dir().is_some() {
            assert!(!args[1].starts_with('~'));
        }
    }

    #[test]
    fn test_spawn_runs_through_shell() {
        let child = spawn("exit 0");
        assert!(child.is_some());
        let status = child.unwrap().wait().unwrap();
        assert!(status.success());
    }

    #[test]
    fn test_children_are_reaped_without_blocking() {
        let mut children = Children::new();
        assert!(children.spawn("exit 0"));
        assert!(children.spawn("sleep 30"));
        assert_eq!(children.pending(), 2);

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut reaped = 0;
        while reaped == 0 && Instant::now() < deadline {
            reaped += children.reap();
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(reaped, 1);
        assert_eq!(children.pending(), 1);

        // Other commands can still be waited on normally
        let output = Command::new("/bin/sh").arg("-c").arg("echo ok").output().unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "ok");

        let mut sleeper = children.running.pop().unwrap();
        terminate(&mut sleeper);
        assert!(sleeper.try_wait().unwrap().is_some());
    }
}
