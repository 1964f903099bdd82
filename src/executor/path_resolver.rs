use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

#[derive(Debug, Clone)]
pub struct PathResolver {
    default_path: String,
}

impl Default for PathResolver {
    fn default() -> Self {
        PathResolver::new(DEFAULT_PATH)
    }
}

impl PathResolver {
    /// `default_path` is searched when the shell has no `PATH` variable.
    pub fn new(default_path: impl Into<String>) -> Self {
        PathResolver {
            default_path: default_path.into(),
        }
    }

    /// First executable match for `command`, searching `path_var` in order.
    pub fn resolve(&self, command: &str, path_var: Option<&str>) -> Option<PathBuf> {
        if command.contains('/') {
            let path = Path::new(command);
            return is_executable(path).then(|| path.to_path_buf());
        }

        let paths = path_var.unwrap_or(&self.default_path);
        env::split_paths(paths)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join(command))
            .find(|candidate| is_executable(candidate))
    }
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
