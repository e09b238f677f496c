//! Hand-off to the downstream import step.
//!
//! After a puzzle is archived, its path can be passed to an external importer
//! (for example a database loader). The hand-off is best-effort: callers log
//! an [`ImportError`] and carry on.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::ImportError;

/// Receives the path of every newly archived puzzle.
pub trait ImportNotifier {
    async fn notify(&self, path: &Path) -> Result<(), ImportError>;
}

/// `None` means no importer is configured.
impl<T: ImportNotifier> ImportNotifier for Option<T> {
    async fn notify(&self, path: &Path) -> Result<(), ImportError> {
        match self {
            Some(inner) => inner.notify(path).await,
            None => Ok(()),
        }
    }
}

/// Runs `program [args...] <path>` and waits for it to exit.
#[derive(Debug, Clone)]
pub struct CommandImporter {
    program: String,
    args: Vec<String>,
}

impl CommandImporter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a whitespace-separated command line such as
    /// `"guardian-cc import"`. Returns `None` for a blank string.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }
}

impl ImportNotifier for CommandImporter {
    #[instrument(level = "debug", skip(self), fields(program = %self.program))]
    async fn notify(&self, path: &Path) -> Result<(), ImportError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| ImportError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            debug!(path = %path.display(), "Importer accepted puzzle");
            Ok(())
        } else {
            Err(ImportError::Failed {
                program: self.program.clone(),
                status: status.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_command_line() {
        let importer = CommandImporter::from_command_line("guardian-cc import").unwrap();
        assert_eq!(importer.program, "guardian-cc");
        assert_eq!(importer.args, vec!["import".to_string()]);
        assert!(CommandImporter::from_command_line("   ").is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_importer_is_noop() {
        let importer: Option<CommandImporter> = None;
        assert!(importer.notify(Path::new("x.json")).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let importer = CommandImporter::new("definitely-not-a-real-importer-binary", vec![]);
        let err = importer.notify(Path::new("x.json")).await.unwrap_err();
        assert!(matches!(err, ImportError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_is_reported() {
        let ok = CommandImporter::new("true", vec![]);
        assert!(ok.notify(Path::new("x.json")).await.is_ok());

        let failing = CommandImporter::new("false", vec![]);
        assert!(matches!(
            failing.notify(Path::new("x.json")).await,
            Err(ImportError::Failed { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_path_is_last_argument() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("copy.json");
        let source = dir.path().join("100.json");
        std::fs::write(&source, "{}").unwrap();

        // The archived path arrives as `$0`.
        let importer = CommandImporter::new(
            "sh",
            vec![
                "-c".to_string(),
                format!("cp \"$0\" '{}'", target.display()),
            ],
        );
        importer.notify(&source).await.unwrap();
        assert_eq!(std::fs::read_to_string(target).unwrap(), "{}");
    }
}
