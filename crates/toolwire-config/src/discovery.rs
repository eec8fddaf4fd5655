//! Where configuration lives and how its layers stack.
//!
//! Built-in servers sit at the bottom and are never written anywhere. On top
//! of them come the user layer, `<config dir>/config.toml`, and then the
//! project layer, `toolwire.toml` in the working directory. Edits made
//! through the CLI only ever touch the user layer.

use std::path::{Path, PathBuf};

use crate::error::{ConfigError, FileOp, Result};
use crate::types::ToolwireConfig;

/// Overrides the platform config directory when set and non-empty.
pub const CONFIG_DIR_ENV: &str = "TOOLWIRE_CONFIG_DIR";

const USER_FILE: &str = "config.toml";
const PROJECT_FILE: &str = "toolwire.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    User,
    Project,
}

/// What loading did with one layer file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerOutcome {
    Absent,
    /// Merged. Lists the server entries that were invalid and left out.
    Applied { dropped: Vec<String> },
    /// Unreadable or not valid TOML; nothing from it was used.
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct LayerReport {
    pub layer: Layer,
    pub path: PathBuf,
    pub outcome: LayerOutcome,
}

/// Paths of both layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFiles {
    /// `None` when no config directory could be determined.
    pub user: Option<PathBuf>,
    pub project: PathBuf,
}

impl ConfigFiles {
    /// Resolve layer paths.
    ///
    /// `config_dir` wins over [`CONFIG_DIR_ENV`] and the platform default;
    /// `project_dir` defaults to the working directory.
    pub fn locate(config_dir: Option<&Path>, project_dir: Option<&Path>) -> Self {
        let user = config_dir
            .map(Path::to_path_buf)
            .or_else(default_config_dir)
            .map(|dir| dir.join(USER_FILE));
        let project = project_dir.map_or_else(|| PathBuf::from(PROJECT_FILE), |d| d.join(PROJECT_FILE));
        Self { user, project }
    }

    /// Read both layers and stack them. Never fails: problems end up in the
    /// per-layer reports.
    pub fn load(&self) -> LoadedConfig {
        let mut config = ToolwireConfig::new();
        let mut reports = Vec::with_capacity(2);

        let layers = self
            .user
            .iter()
            .map(|path| (Layer::User, path))
            .chain(std::iter::once((Layer::Project, &self.project)));
        for (layer, path) in layers {
            let outcome = apply_layer(&mut config, path);
            reports.push(LayerReport {
                layer,
                path: path.clone(),
                outcome,
            });
        }

        LoadedConfig {
            config,
            reports,
            files: self.clone(),
        }
    }
}

/// The stacked configuration plus what happened to each layer.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ToolwireConfig,
    pub reports: Vec<LayerReport>,
    files: ConfigFiles,
}

impl LoadedConfig {
    /// Files that contributed to `config`, lowest precedence first.
    pub fn applied(&self) -> Vec<&Path> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, LayerOutcome::Applied { .. }))
            .map(|r| r.path.as_path())
            .collect()
    }

    /// Human-readable problems: rejected files and dropped server entries.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for report in &self.reports {
            match &report.outcome {
                LayerOutcome::Rejected(reason) => {
                    problems.push(format!("ignoring {}: {reason}", report.path.display()));
                }
                LayerOutcome::Applied { dropped } => {
                    problems.extend(dropped.iter().map(|reason| {
                        format!("{}: skipping {reason}", report.path.display())
                    }));
                }
                LayerOutcome::Absent => {}
            }
        }
        problems
    }

    /// The user layer's file, where edits are written.
    pub fn user_file(&self) -> Option<&Path> {
        self.files.user.as_deref()
    }
}

/// Parse one layer file on its own.
pub fn read_layer(path: &Path) -> Result<ToolwireConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::file(FileOp::Read, path, e))?;
    ToolwireConfig::from_toml(&text)
}

/// Change the user layer and write it back.
///
/// Only the file at `path` is read, so project entries and built-ins never
/// leak into it. Every server entry must validate before anything is written.
pub fn edit_user_layer<R>(
    path: &Path,
    edit: impl FnOnce(&mut ToolwireConfig) -> Result<R>,
) -> Result<R> {
    let mut layer = if path.is_file() {
        read_layer(path)?
    } else {
        ToolwireConfig::new()
    };
    let output = edit(&mut layer)?;
    for entry in &layer.servers {
        entry.validate()?;
    }
    write_layer(&layer, path)?;
    Ok(output)
}

/// The user config directory: [`CONFIG_DIR_ENV`], else the platform's
/// config directory plus `toolwire`.
pub fn default_config_dir() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|d| d.join("toolwire")),
    }
}

fn write_layer(layer: &ToolwireConfig, path: &Path) -> Result<()> {
    let text = layer.to_toml()?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::file(FileOp::Write, dir, e))?;
    }
    std::fs::write(path, text).map_err(|e| ConfigError::file(FileOp::Write, path, e))
}

fn apply_layer(config: &mut ToolwireConfig, path: &Path) -> LayerOutcome {
    if !path.is_file() {
        return LayerOutcome::Absent;
    }
    let mut layer = match read_layer(path) {
        Ok(layer) => layer,
        Err(e) => return LayerOutcome::Rejected(e.to_string()),
    };

    // An invalid entry must not shadow a good one from a lower layer.
    let mut dropped = Vec::new();
    layer.servers.retain(|entry| match entry.validate() {
        Ok(()) => true,
        Err(e) => {
            dropped.push(e.to_string());
            false
        }
    });

    config.merge(layer);
    LayerOutcome::Applied { dropped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    use crate::types::ServerEntry;

    struct Dirs {
        user: TempDir,
        project: TempDir,
    }

    impl Dirs {
        fn new() -> Self {
            Self {
                user: TempDir::new().unwrap(),
                project: TempDir::new().unwrap(),
            }
        }

        fn files(&self) -> ConfigFiles {
            ConfigFiles::locate(Some(self.user.path()), Some(self.project.path()))
        }

        fn write_user(&self, text: &str) {
            fs::write(self.user.path().join("config.toml"), text).unwrap();
        }

        fn write_project(&self, text: &str) {
            fs::write(self.project.path().join("toolwire.toml"), text).unwrap();
        }
    }

    #[test]
    fn test_locate_paths() {
        let dirs = Dirs::new();
        let files = dirs.files();
        assert_eq!(files.user, Some(dirs.user.path().join("config.toml")));
        assert_eq!(files.project, dirs.project.path().join("toolwire.toml"));

        let cwd = ConfigFiles::locate(Some(dirs.user.path()), None);
        assert_eq!(cwd.project, PathBuf::from("toolwire.toml"));
    }

    #[test]
    fn test_nothing_on_disk_leaves_builtins() {
        let dirs = Dirs::new();
        let loaded = dirs.files().load();

        assert!(loaded.applied().is_empty());
        assert!(loaded.problems().is_empty());
        assert!(loaded.reports.iter().all(|r| r.outcome == LayerOutcome::Absent));
        assert!(loaded.config.server("git").unwrap().is_builtin());
        assert_eq!(
            loaded.user_file(),
            Some(dirs.user.path().join("config.toml").as_path())
        );
    }

    #[test]
    fn test_project_layer_wins() {
        let dirs = Dirs::new();
        dirs.write_user(
            r#"
[timeouts]
handshake_secs = 20
call_secs = 40

[[servers]]
name = "git"
command = "mcp-server-git"

[[servers]]
name = "fs"
command = "mcp-server-filesystem"
"#,
        );
        dirs.write_project(
            r#"
[timeouts]
call_secs = 5

[[servers]]
name = "git"
command = "mcp-server-git"
args = ["--repository", "."]
"#,
        );

        let loaded = dirs.files().load();
        let config = &loaded.config;
        assert_eq!(config.timeouts.handshake(), Duration::from_secs(20));
        assert_eq!(config.timeouts.call(), Duration::from_secs(5));
        assert_eq!(config.timeouts.terminate_grace(), Duration::from_secs(3));
        assert_eq!(
            config.server("git").unwrap().display_command(),
            "mcp-server-git --repository ."
        );
        assert!(config.server("fs").is_some());
        assert_eq!(loaded.applied().len(), 2);
    }

    #[test]
    fn test_unparsable_layer_is_rejected_not_fatal() {
        let dirs = Dirs::new();
        dirs.write_user("[timeouts]\ncall_secs = 7\n");
        dirs.write_project("[[servers]\nname = ");

        let loaded = dirs.files().load();
        assert_eq!(loaded.config.timeouts.call(), Duration::from_secs(7));
        assert!(matches!(loaded.reports[1].outcome, LayerOutcome::Rejected(_)));

        let problems = loaded.problems();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].starts_with("ignoring "));
    }

    #[test]
    fn test_invalid_entry_does_not_shadow_lower_layer() {
        let dirs = Dirs::new();
        dirs.write_user(
            r#"
[[servers]]
name = "git"
command = "mcp-server-git"
"#,
        );
        dirs.write_project(
            r#"
[[servers]]
name = "git"
command = "  "

[[servers]]
name = "sqlite"
command = "mcp-server-sqlite"
"#,
        );

        let loaded = dirs.files().load();
        assert_eq!(loaded.config.server("git").unwrap().command, "mcp-server-git");
        assert!(loaded.config.server("sqlite").is_some());
        assert_eq!(
            loaded.reports[1].outcome,
            LayerOutcome::Applied {
                dropped: vec!["server 'git': command is empty".to_string()]
            }
        );
        assert_eq!(loaded.problems().len(), 1);
    }

    #[test]
    fn test_disabled_entry_still_shadows_builtin() {
        let dirs = Dirs::new();
        dirs.write_user("[[servers]]\nname = \"aws-docs\"\ncommand = \"uvx\"\nenabled = false\n");

        let loaded = dirs.files().load();
        assert!(loaded.problems().is_empty());
        let err = loaded.config.resolve_server("aws-docs").unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[test]
    fn test_edit_touches_only_user_layer() {
        let dirs = Dirs::new();
        dirs.write_project("[[servers]]\nname = \"local\"\ncommand = \"local-server\"\n");
        let path = dirs.user.path().join("nested").join("config.toml");

        edit_user_layer(&path, |layer| {
            layer.timeouts.terminate_grace_secs = Some(1);
            layer.upsert_server(ServerEntry::new("sqlite", "mcp-server-sqlite").with_arg("--db"));
            Ok(())
        })
        .unwrap();

        let saved = read_layer(&path).unwrap();
        assert_eq!(saved.servers.len(), 1);
        assert_eq!(saved.servers[0].name, "sqlite");
        assert_eq!(saved.timeouts.terminate_grace(), Duration::from_secs(1));
        assert!(!fs::read_to_string(&path).unwrap().contains("local-server"));

        let removed = edit_user_layer(&path, |layer| Ok(layer.remove_server("sqlite"))).unwrap();
        assert!(removed);
        assert!(read_layer(&path).unwrap().servers.is_empty());
    }

    #[test]
    fn test_edit_rejects_invalid_entry_without_writing() {
        let dirs = Dirs::new();
        let path = dirs.user.path().join("config.toml");

        let err = edit_user_layer(&path, |layer| {
            layer.upsert_server(ServerEntry::new("bad", ""));
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::BadEntry { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_read_layer_errors() {
        let err = read_layer(Path::new("/nonexistent/toolwire/config.toml")).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::File {
                op: FileOp::Read,
                ..
            }
        ));

        let dirs = Dirs::new();
        dirs.write_user("[timeouts]\ncall_secs = \"soon\"\n");
        let err = read_layer(&dirs.user.path().join("config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Schema(_)));
    }
}
