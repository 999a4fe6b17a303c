use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const PROJECT_FILE_NAME: &str = ".ndstatrc";

/// Default arguments read from an `.ndstatrc` / `config.ini` file
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub defaults: Option<String>,
    /// Where the file was loaded from, if anywhere
    pub source: Option<PathBuf>,
}

impl ConfigFile {
    /// Find a project-level .ndstatrc by walking up from `start`
    pub fn find_project_config_from(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(PROJECT_FILE_NAME))
            .find(|candidate| candidate.is_file())
    }

    pub fn find_project_config() -> Option<PathBuf> {
        let cwd = env::current_dir().ok()?;
        Self::find_project_config_from(&cwd)
    }

    /// User config file locations in order of preference
    pub fn get_user_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if cfg!(windows) {
            if let Ok(appdata) = env::var("APPDATA") {
                paths.push(PathBuf::from(appdata).join("ndstat").join("config.ini"));
            }
            if let Ok(userprofile) = env::var("USERPROFILE") {
                paths.push(PathBuf::from(userprofile).join(PROJECT_FILE_NAME));
            }
        } else {
            let xdg_config = env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    env::var("HOME")
                        .map(|h| PathBuf::from(h).join(".config"))
                        .unwrap_or_else(|_| PathBuf::from(".config"))
                });
            paths.push(xdg_config.join("ndstat").join("config.ini"));

            if let Ok(home) = env::var("HOME") {
                paths.push(PathBuf::from(home).join(PROJECT_FILE_NAME));
            }
        }

        paths
    }

    /// All candidate locations, highest precedence first
    pub fn get_config_paths() -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Self::find_project_config().into_iter().collect();
        paths.extend(Self::get_user_config_paths());
        paths
    }

    /// Load the first config file that exists; an empty config if none does
    pub fn load() -> Result<Self> {
        match Self::get_config_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_with_custom_path(custom_path: Option<&str>) -> Result<Self> {
        match custom_path {
            Some(path) => Self::load_from_path(Path::new(path)),
            None => Self::load(),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::parse_ini_content(&content);
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse INI content; only the root-level `defaults` key is used
    fn parse_ini_content(content: &str) -> Self {
        let mut defaults = None;
        let mut in_root = true;

        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                in_root = false;
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                if in_root && key.trim() == "defaults" {
                    defaults = Some(value.trim().to_string());
                }
            }
        }

        Self {
            defaults,
            source: None,
        }
    }

    /// Insert the configured defaults after the program name
    ///
    /// Defaults come first so anything given on the command line wins.
    pub fn process_args(&self, args: Vec<String>) -> Result<Vec<String>> {
        let Some(defaults) = &self.defaults else {
            return Ok(args);
        };

        let default_args = shell_words::split(defaults)
            .with_context(|| "Invalid defaults: failed to parse arguments".to_string())?;

        let mut args = args.into_iter();
        let mut result: Vec<String> = args.next().into_iter().collect();
        result.extend(default_args);
        result.extend(args);
        Ok(result)
    }

    /// Describe where configuration is searched for and what is active
    pub fn describe(custom_path: Option<&str>) -> String {
        let mut out = String::new();
        out.push_str("Configuration precedence: CLI > config file defaults > built-in defaults\n\n");

        match Self::load_with_custom_path(custom_path) {
            Ok(config) => match (&config.source, &config.defaults) {
                (Some(path), Some(defaults)) => {
                    out.push_str(&format!("Configuration loaded from: {}\n", path.display()));
                    out.push_str(&format!("  defaults = {}\n", defaults));
                }
                (Some(path), None) => {
                    out.push_str(&format!(
                        "Configuration loaded from: {} (no defaults set)\n",
                        path.display()
                    ));
                }
                (None, _) => out.push_str("No configuration file found. Using built-in defaults.\n"),
            },
            Err(e) => out.push_str(&format!("Error loading configuration: {:#}\n", e)),
        }

        out.push_str("\nConfiguration search locations (in precedence order):\n");
        let mut index = 1;
        match Self::find_project_config() {
            Some(path) => out.push_str(&format!("  {}. Project: {} (found)\n", index, path.display())),
            None => out.push_str(&format!(
                "  {}. Project: {} (searched up directory tree, not found)\n",
                index, PROJECT_FILE_NAME
            )),
        }
        for path in Self::get_user_config_paths() {
            index += 1;
            let status = if path.is_file() { "(found)" } else { "(not found)" };
            out.push_str(&format!("  {}. User: {} {}\n", index, path.display(), status));
        }

        out.push_str("\nExample configuration file (.ndstatrc):\n\n");
        out.push_str("# Arguments applied to every ndstat run\n");
        out.push_str("defaults = --workers 8 --batch-size 5000 --stats\n");
        out
    }

    pub fn show_config(custom_path: Option<&str>) {
        print!("{}", Self::describe(custom_path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_load_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "defaults = --workers 4 --on-error abort").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "[other]").unwrap();
        writeln!(file, "defaults = --ignored").unwrap();
        file.flush().unwrap();

        let config = ConfigFile::load_from_path(file.path()).unwrap();
        assert_eq!(
            config.defaults,
            Some("--workers 4 --on-error abort".to_string())
        );
        assert_eq!(config.source.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let result = ConfigFile::load_from_path(Path::new("/nonexistent/ndstat/config.ini"));
        assert!(result.is_err());
    }

    #[test]
    fn test_process_args_without_defaults() {
        let config = ConfigFile::default();
        let args = strings(&["ndstat", "input.jsonl"]);
        assert_eq!(config.process_args(args.clone()).unwrap(), args);
    }

    #[test]
    fn test_process_args_with_defaults() {
        let config = ConfigFile {
            defaults: Some("--stats -j 2".to_string()),
            source: None,
        };
        let processed = config
            .process_args(strings(&["ndstat", "-j", "8", "input.jsonl"]))
            .unwrap();
        assert_eq!(
            processed,
            strings(&["ndstat", "--stats", "-j", "2", "-j", "8", "input.jsonl"])
        );
    }

    #[test]
    fn test_process_args_quoted_defaults() {
        let config = ConfigFile {
            defaults: Some("--timeout '1 minute'".to_string()),
            source: None,
        };
        let processed = config.process_args(strings(&["ndstat"])).unwrap();
        assert_eq!(processed, strings(&["ndstat", "--timeout", "1 minute"]));
    }

    #[test]
    fn test_process_args_rejects_unbalanced_quotes() {
        let config = ConfigFile {
            defaults: Some("--timeout '1 minute".to_string()),
            source: None,
        };
        assert!(config.process_args(strings(&["ndstat"])).is_err());
    }

    #[test]
    fn test_project_config_discovery() {
        let temp_dir = TempDir::new().unwrap();
        let project_root = temp_dir.path().canonicalize().unwrap();
        let subdir = project_root.join("data").join("deep");
        fs::create_dir_all(&subdir).unwrap();

        let config_path = project_root.join(".ndstatrc");
        fs::write(&config_path, "defaults = --stats").unwrap();

        assert_eq!(
            ConfigFile::find_project_config_from(&subdir),
            Some(config_path)
        );
    }

    #[test]
    fn test_project_config_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let subdir = temp_dir.path().join("no-config");
        fs::create_dir_all(&subdir).unwrap();

        // A config in a real ancestor of the temp dir would be found, so only
        // check that nothing inside the temp tree is reported
        let found = ConfigFile::find_project_config_from(&subdir);
        assert!(found.map_or(true, |p| !p.starts_with(temp_dir.path())));
    }

    #[test]
    fn test_user_config_paths() {
        for path in ConfigFile::get_user_config_paths() {
            let file_name = path.file_name().unwrap().to_string_lossy();
            assert!(
                file_name == "config.ini" || file_name == ".ndstatrc",
                "Unexpected user config filename: {}",
                file_name
            );
        }
    }

    #[test]
    fn test_describe_custom_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "defaults = --stats").unwrap();
        file.flush().unwrap();

        let text = ConfigFile::describe(file.path().to_str());
        assert!(text.contains("defaults = --stats"));
        assert!(text.contains("Configuration search locations"));
    }
}
