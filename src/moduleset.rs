//! Module set resolution.
//!
//! A `ModuleSet` is the primary module plus zero or more extra modules, each
//! carrying an import path, an absolute directory, and an optional node-ID
//! prefix. All package- and file-path classification in the pipeline goes
//! through it: package paths prefer the longest matching module path (so a
//! nested module wins over its parent), file paths prefer the longest
//! matching directory. Files outside every known module resolve to the empty
//! relative path and are excluded from analysis.

use std::path::{Path, PathBuf};

/// One Go module in the analysis set.
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    /// Module import path, e.g. `github.com/example/server`.
    pub mod_path: String,
    /// Absolute path to the module root directory.
    pub dir: PathBuf,
    /// Node-ID prefix: empty for the primary module.
    pub prefix: String,
}

/// All modules under analysis. Built once before any pipeline phase and
/// never reassigned afterwards.
#[derive(Debug, Clone)]
pub struct ModuleSet {
    modules: Vec<ModuleInfo>,
}

impl ModuleSet {
    /// Build a ModuleSet from a primary module and optional extras.
    pub fn new(primary: ModuleInfo, extras: Vec<ModuleInfo>) -> Self {
        let mut modules = Vec::with_capacity(1 + extras.len());
        modules.push(primary);
        modules.extend(extras);
        Self { modules }
    }

    /// True if `pkg_path` belongs to any module in the set.
    pub fn is_known_pkg(&self, pkg_path: &str) -> bool {
        self.modules.iter().any(|m| {
            pkg_path == m.mod_path || pkg_path.starts_with(&format!("{}/", m.mod_path))
        })
    }

    /// Strip the module prefix from a full import path and prepend the
    /// module's prefix. The primary module (empty prefix) yields unprefixed
    /// relative paths; its root package maps to `main`.
    ///
    /// Nested module paths are disambiguated by preferring the longest
    /// matching `mod_path` so a parent module never claims a child's
    /// packages.
    pub fn rel_pkg(&self, full_path: &str) -> String {
        let mut best: Option<(usize, String)> = None;

        for m in &self.modules {
            let candidate = if full_path == m.mod_path {
                Some(if m.prefix.is_empty() {
                    "main".to_string()
                } else {
                    m.prefix.clone()
                })
            } else if let Some(rel) = full_path.strip_prefix(&format!("{}/", m.mod_path)) {
                Some(if m.prefix.is_empty() {
                    rel.to_string()
                } else {
                    format!("{}/{}", m.prefix, rel)
                })
            } else {
                None
            };

            if let Some(result) = candidate {
                if best.as_ref().is_none_or(|(len, _)| m.mod_path.len() > *len) {
                    best = Some((m.mod_path.len(), result));
                }
            }
        }

        best.map(|(_, r)| r).unwrap_or_else(|| full_path.to_string())
    }

    /// Convert an absolute file path to a module-relative path with prefix.
    /// Returns `""` for files outside all known modules.
    ///
    /// Nested module directories prefer the most specific (longest) match.
    pub fn rel_file(&self, abs_path: &Path) -> String {
        let mut best: Option<(usize, String)> = None;

        for m in &self.modules {
            let Ok(rel) = abs_path.strip_prefix(&m.dir) else {
                continue;
            };
            let rel = rel.to_string_lossy().replace('\\', "/");
            let dir_len = m.dir.as_os_str().len();
            if best.as_ref().is_none_or(|(len, _)| dir_len > *len) {
                let prefixed = if m.prefix.is_empty() {
                    rel
                } else {
                    format!("{}/{}", m.prefix, rel)
                };
                best = Some((dir_len, prefixed));
            }
        }

        best.map(|(_, r)| r).unwrap_or_default()
    }

    /// The primary module's directory.
    pub fn primary_dir(&self) -> &Path {
        &self.modules[0].dir
    }

    /// The primary module's import path.
    pub fn primary_mod_path(&self) -> &str {
        &self.modules[0].mod_path
    }

    /// All module infos, primary first.
    pub fn modules(&self) -> &[ModuleInfo] {
        &self.modules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> ModuleSet {
        ModuleSet::new(
            ModuleInfo {
                mod_path: "github.com/example/server".into(),
                dir: PathBuf::from("/work/server"),
                prefix: String::new(),
            },
            vec![
                ModuleInfo {
                    mod_path: "github.com/example/server/internal/tools".into(),
                    dir: PathBuf::from("/work/server/internal/tools"),
                    prefix: "tools".into(),
                },
                ModuleInfo {
                    mod_path: "github.com/example/client".into(),
                    dir: PathBuf::from("/work/client"),
                    prefix: "client".into(),
                },
            ],
        )
    }

    #[test]
    fn rel_pkg_prefers_longest_module_path() {
        let ms = set();
        assert_eq!(
            ms.rel_pkg("github.com/example/server/internal/tools/lint"),
            "tools/lint"
        );
        assert_eq!(ms.rel_pkg("github.com/example/server/scrape"), "scrape");
        assert_eq!(ms.rel_pkg("github.com/example/server"), "main");
        assert_eq!(ms.rel_pkg("github.com/example/client/api"), "client/api");
    }

    #[test]
    fn rel_pkg_passes_through_unknown_paths() {
        let ms = set();
        assert_eq!(ms.rel_pkg("golang.org/x/sync"), "golang.org/x/sync");
        assert!(!ms.is_known_pkg("golang.org/x/sync"));
    }

    #[test]
    fn rel_file_prefers_longest_directory() {
        let ms = set();
        assert_eq!(
            ms.rel_file(Path::new("/work/server/internal/tools/main.go")),
            "tools/main.go"
        );
        assert_eq!(ms.rel_file(Path::new("/work/server/scrape/loop.go")), "scrape/loop.go");
        assert_eq!(ms.rel_file(Path::new("/work/client/api/client.go")), "client/api/client.go");
        assert_eq!(ms.rel_file(Path::new("/elsewhere/x.go")), "");
    }
}
