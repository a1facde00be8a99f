//! Shell execution of planned commands
//!
//! Every script goes through `sh -c`. When the target user differs from the
//! current one the call is wrapped in `runuser` (when we are root) or a
//! non-interactive `sudo`.

use anyhow::{Context, Result};
use declarative::{CommandOutput, CommandRunner, Invocation};
use std::env;
use std::process::{Command, Stdio};

/// Runs planned commands on the local host
#[derive(Debug, Clone)]
pub struct ShellRunner {
    current_user: Option<String>,
    is_root: bool,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self {
            current_user: current_user(),
            is_root: is_root(),
        }
    }

    fn runs_directly(&self, user: &str) -> bool {
        self.current_user.as_deref() == Some(user)
    }

    /// Program and leading arguments that run `sh -c` as `user`
    ///
    /// `sudo` and `runuser` reset the environment, so extra entries are
    /// passed through `env` after the identity switch.
    fn argv(&self, user: &str, env: &[String]) -> Vec<String> {
        let mut argv: Vec<String> = if self.runs_directly(user) {
            Vec::new()
        } else if self.is_root {
            vec!["runuser".into(), "-u".into(), user.into(), "--".into()]
        } else {
            vec![
                "sudo".into(),
                "-n".into(),
                "-u".into(),
                user.into(),
                "--".into(),
            ]
        };
        if !argv.is_empty() && !env.is_empty() {
            argv.push("env".to_string());
            argv.extend(env.iter().cloned());
        }
        argv.extend(["sh".to_string(), "-c".to_string()]);
        argv
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, invocation: &Invocation<'_>) -> Result<CommandOutput> {
        let argv = self.argv(invocation.user, invocation.env);
        log::debug!("run as {}: {}", invocation.user, invocation.script);

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .arg(invocation.script)
            .stdin(Stdio::null());

        if self.runs_directly(invocation.user) {
            for (key, value) in invocation.env.iter().filter_map(|e| e.split_once('=')) {
                cmd.env(key, value);
            }
        }

        let output = cmd
            .output()
            .with_context(|| format!("Failed to execute: {}", invocation.script))?;
        Ok(output.into())
    }
}

/// Check if a command exists
pub fn command_exists(cmd: &str) -> bool {
    Command::new("sh")
        .args(["-c", &format!("command -v {cmd}")])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Name of the user this process runs as
fn current_user() -> Option<String> {
    if is_root() {
        return Some("root".to_string());
    }
    env::var("USER")
        .or_else(|_| env::var("LOGNAME"))
        .ok()
        .filter(|u| !u.is_empty())
}

/// Whether this process runs with root privileges
#[allow(unsafe_code)]
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(user: &str, is_root: bool) -> ShellRunner {
        ShellRunner {
            current_user: Some(user.to_string()),
            is_root,
        }
    }

    #[test]
    fn same_user_runs_directly() {
        assert_eq!(runner("root", true).argv("root", &[]), vec!["sh", "-c"]);
    }

    #[test]
    fn root_switches_with_runuser() {
        assert_eq!(
            runner("root", true).argv("aptly", &["FOO=bar".to_string()]),
            vec!["runuser", "-u", "aptly", "--", "env", "FOO=bar", "sh", "-c"]
        );
    }

    #[test]
    fn others_switch_with_noninteractive_sudo() {
        assert_eq!(
            runner("alice", false).argv("root", &[]),
            vec!["sudo", "-n", "-u", "root", "--", "sh", "-c"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn captures_exit_code_and_output() {
        let runner = ShellRunner::new();
        let user = runner.current_user.clone().unwrap_or_default();
        let env = vec!["GREETING=hello".to_string()];

        if runner.current_user.is_some() {
            let out = runner
                .run(&Invocation::new("echo $GREETING; echo oops >&2; exit 3", &user, &env))
                .unwrap();
            assert!(!out.success);
            assert_eq!(out.code, Some(3));
            assert_eq!(out.stdout_str().trim(), "hello");
            assert_eq!(out.stderr_str().trim(), "oops");
        }
    }
}
