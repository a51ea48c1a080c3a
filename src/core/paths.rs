//! Path helpers: absolute resolution and per-test result file naming.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Extension appended to a test name to form its result sentinel.
pub const RESULT_EXTENSION: &str = "result";

/// Resolve a path to an absolute, normalized path.
///
/// Existing paths are canonicalized. Paths that do not exist yet (a results
/// directory before the first run) are made absolute against CWD and their
/// `..`/`.` components resolved syntactically.
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    if let Ok(canonical) = std::fs::canonicalize(&absolute) {
        return canonical;
    }

    normalize_syntactic(&absolute)
}

/// Sentinel file for a test: `<results_dir>/<test_name>.result`.
pub fn result_file_path(results_dir: &Path, test_name: &str) -> PathBuf {
    results_dir.join(format!("{test_name}.{RESULT_EXTENSION}"))
}

fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}
