//! Managed file resource - a file whose whole content is declared

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{ApplyContext, ApplyResult, Resource, ResourceState};

/// A file to keep at exactly `content`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagedFile {
    pub id: String,
    pub resource_type: &'static str,
    pub path: PathBuf,
    pub content: String,
    pub mode: u32,
    pub dependencies: Vec<String>,
}

impl ManagedFile {
    pub fn new(
        id: impl Into<String>,
        resource_type: &'static str,
        path: impl AsRef<Path>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            resource_type,
            path: path.as_ref().to_path_buf(),
            content: content.into(),
            mode: 0o644,
            dependencies: Vec::new(),
        }
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// Read the file on disk; `None` when it does not exist
    fn read_current(&self) -> Result<Option<String>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        }
    }

    fn check_current(&self) -> Result<FileState> {
        Ok(match self.read_current()? {
            None => FileState::Missing,
            Some(current) if current == self.content => FileState::Correct,
            Some(_) => FileState::Differs,
        })
    }

    fn write(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create parent directory: {}", parent.display())
            })?;
        }

        fs::write(&self.path, &self.content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(self.mode))
                .with_context(|| format!("Failed to set mode on {}", self.path.display()))?;
        }

        Ok(())
    }
}

#[derive(Debug)]
enum FileState {
    Missing,
    Correct,
    Differs,
}

impl Resource for ManagedFile {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn description(&self) -> String {
        format!("Write {}", self.path.display())
    }

    fn resource_type(&self) -> &'static str {
        self.resource_type
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }

    fn current_state(&self, _ctx: &ApplyContext) -> Result<ResourceState> {
        match self.check_current()? {
            FileState::Missing => Ok(ResourceState::Absent),
            FileState::Correct => Ok(self.desired_state()),
            FileState::Differs => Ok(ResourceState::Modified {
                from: "current content".to_string(),
                to: "desired content".to_string(),
            }),
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some(self.path.display().to_string()),
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if ctx.dry_run {
            return Ok(ApplyResult::Skipped {
                reason: "Dry run".to_string(),
            });
        }

        match self.check_current()? {
            FileState::Correct => Ok(ApplyResult::NoChange),
            FileState::Missing => {
                self.write()?;
                Ok(ApplyResult::Created)
            }
            FileState::Differs => {
                self.write()?;
                Ok(ApplyResult::Modified)
            }
        }
    }

    fn content_diff(&self) -> Option<(String, String)> {
        self.read_current()
            .ok()
            .map(|current| (current.unwrap_or_default(), self.content.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{CommandOutput, CommandRunner, Invocation};
    use tempfile::TempDir;

    struct NoCommands;

    impl CommandRunner for NoCommands {
        fn run(&self, invocation: &Invocation<'_>) -> Result<CommandOutput> {
            panic!("managed files run no commands, got {}", invocation.script)
        }
    }

    fn file(dir: &TempDir, content: &str) -> ManagedFile {
        ManagedFile::new("config.aptly", "config", dir.path().join("etc/aptly.conf"), content)
    }

    #[test]
    fn missing_file_is_created_with_parents() {
        let dir = TempDir::new().unwrap();
        let f = file(&dir, "{}\n");
        let mut ctx = ApplyContext::new(false, false, &NoCommands);

        assert_eq!(f.current_state(&ctx).unwrap(), ResourceState::Absent);
        assert_eq!(f.apply(&mut ctx).unwrap(), ApplyResult::Created);
        assert_eq!(fs::read_to_string(&f.path).unwrap(), "{}\n");
        assert!(!f.needs_apply(&ctx).unwrap());
    }

    #[test]
    fn differing_file_is_rewritten() {
        let dir = TempDir::new().unwrap();
        let f = file(&dir, "{\"rootDir\":\"/srv\"}\n");
        fs::create_dir_all(f.path.parent().unwrap()).unwrap();
        fs::write(&f.path, "{}\n").unwrap();
        let mut ctx = ApplyContext::new(false, false, &NoCommands);

        assert!(matches!(f.current_state(&ctx).unwrap(), ResourceState::Modified { .. }));
        assert_eq!(
            f.content_diff(),
            Some(("{}\n".to_string(), "{\"rootDir\":\"/srv\"}\n".to_string()))
        );
        assert_eq!(f.apply(&mut ctx).unwrap(), ApplyResult::Modified);
        assert_eq!(fs::read_to_string(&f.path).unwrap(), f.content);
    }

    #[test]
    fn dry_run_leaves_disk_alone() {
        let dir = TempDir::new().unwrap();
        let f = file(&dir, "x");
        let mut ctx = ApplyContext::new(true, false, &NoCommands);

        assert!(matches!(f.apply(&mut ctx).unwrap(), ApplyResult::Skipped { .. }));
        assert!(!f.path.exists());
    }
}
