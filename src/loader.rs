//! Source loading: walks the module set, parses every in-scope Go file,
//! and groups files into packages by directory.
//!
//! The loader owns the skip filters: files excluded here never reach the
//! walker or the metrics pass, so the core can trust that any file whose
//! relative path resolves is meant to be analyzed. Nested submodules
//! (directories with their own `go.mod`) are skipped unless they are
//! themselves members of the module set; `vendor`, `testdata`, and hidden
//! directories are never descended into.

use std::fs;
use std::path::{Path, PathBuf};

use tree_sitter::Tree;
use walkdir::WalkDir;

use crate::error::{CpgError, Result};
use crate::moduleset::ModuleSet;
use crate::progress::Progress;
use crate::syntax;

/// Which file classes to exclude from analysis.
#[derive(Debug, Clone, Copy)]
pub struct SkipConfig {
    pub skip_tests: bool,
    pub skip_generated: bool,
}

impl Default for SkipConfig {
    fn default() -> Self {
        Self {
            skip_tests: true,
            skip_generated: true,
        }
    }
}

impl SkipConfig {
    /// True for generated/test files that should be excluded.
    pub fn should_skip(&self, path: &str) -> bool {
        let base = crate::ids::base_name(path);
        (self.skip_tests && base.ends_with("_test.go"))
            || (self.skip_generated && base.ends_with(".pb.go"))
    }
}

/// One parsed source file.
pub struct SourceFile {
    /// Absolute path on disk.
    pub abs: PathBuf,
    /// Module-relative path (with module prefix for extras).
    pub rel: String,
    /// Raw source text.
    pub source: String,
    /// Parsed syntax tree.
    pub tree: Tree,
}

/// One Go package: all non-skipped files of one directory.
pub struct Package {
    /// Full import path, e.g. `github.com/example/server/scrape`.
    pub import_path: String,
    /// Module-relative package path (node vocabulary), e.g. `scrape`.
    pub rel_pkg: String,
    /// Package clause name, e.g. `scrape` or `main`.
    pub name: String,
    pub files: Vec<SourceFile>,
}

/// The loaded workspace: every package of every module, sorted by import
/// path so downstream passes are deterministic.
pub struct Workspace {
    pub packages: Vec<Package>,
}

/// Load and parse all in-scope packages of the module set.
pub fn load(modset: &ModuleSet, skip: SkipConfig, prog: &Progress) -> Result<Workspace> {
    prog.log(format!(
        "Loading packages from {} module(s)...",
        modset.modules().len()
    ));

    let mut parser = syntax::go_parser()?;
    let mut packages: Vec<Package> = Vec::new();
    let mut skipped_files = 0usize;
    let mut parse_errors = 0usize;

    for module in modset.modules() {
        if !module.dir.is_dir() {
            return Err(CpgError::Loader(format!(
                "module directory does not exist: {}",
                module.dir.display()
            )));
        }

        let mut dir_files: Vec<PathBuf> = Vec::new();
        let walker = WalkDir::new(&module.dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                if e.file_type().is_dir() {
                    if name.starts_with('.') || name == "vendor" || name == "testdata" {
                        return false;
                    }
                    // Nested submodule roots belong to their own ModuleSet entry.
                    if e.depth() > 0 && e.path().join("go.mod").is_file() {
                        return is_member_dir(modset, e.path());
                    }
                }
                true
            });

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("go") {
                continue;
            }
            // Claimed by a more specific module in the set.
            if !is_owned_by(modset, module_dir_len(&module.dir), path) {
                continue;
            }
            dir_files.push(path.to_path_buf());
        }

        for abs in dir_files {
            let rel = modset.rel_file(&abs);
            if rel.is_empty() {
                continue;
            }
            if skip.should_skip(&rel) {
                skipped_files += 1;
                continue;
            }

            let source = match fs::read_to_string(&abs) {
                Ok(s) => s,
                Err(e) => {
                    prog.verbose(format!("  unreadable {}: {e}", abs.display()));
                    continue;
                }
            };
            let tree = match syntax::parse(&mut parser, &source, &rel) {
                Ok(t) => t,
                Err(e) => {
                    parse_errors += 1;
                    prog.verbose(format!("  parse failure: {e}"));
                    continue;
                }
            };

            let pkg_dir = abs.parent().unwrap_or(Path::new("")).to_path_buf();
            let import_path = import_path_for(module, &pkg_dir);
            let rel_pkg = modset.rel_pkg(&import_path);
            let name = package_clause_name(&source, &tree).unwrap_or_else(|| rel_pkg.clone());

            let file = SourceFile {
                abs,
                rel,
                source,
                tree,
            };

            match packages.iter_mut().find(|p| p.import_path == import_path) {
                Some(p) => p.files.push(file),
                None => packages.push(Package {
                    import_path,
                    rel_pkg,
                    name,
                    files: vec![file],
                }),
            }
        }
    }

    packages.sort_by(|a, b| a.import_path.cmp(&b.import_path));
    for p in &mut packages {
        p.files.sort_by(|a, b| a.rel.cmp(&b.rel));
    }

    if packages.is_empty() {
        return Err(CpgError::Loader(
            "no analyzable Go packages found in the module set".to_string(),
        ));
    }

    let file_count: usize = packages.iter().map(|p| p.files.len()).sum();
    let loc: usize = packages
        .iter()
        .flat_map(|p| &p.files)
        .map(|f| f.source.lines().count())
        .sum();
    prog.log(format!(
        "Loaded {} packages ({} files, ~{}k LOC, {} skipped)",
        packages.len(),
        file_count,
        loc / 1000,
        skipped_files
    ));
    if parse_errors > 0 {
        prog.log(format!("  {parse_errors} files had parse errors (continuing)"));
    }

    Ok(Workspace { packages })
}

fn module_dir_len(dir: &Path) -> usize {
    dir.as_os_str().len()
}

/// True if `path` is owned by the module rooted at a directory of length
/// `owner_len` — i.e. no other module in the set has a longer matching dir.
fn is_owned_by(modset: &ModuleSet, owner_len: usize, path: &Path) -> bool {
    !modset
        .modules()
        .iter()
        .any(|m| path.starts_with(&m.dir) && module_dir_len(&m.dir) > owner_len)
}

fn is_member_dir(modset: &ModuleSet, dir: &Path) -> bool {
    modset.modules().iter().any(|m| m.dir == dir)
}

fn import_path_for(module: &crate::moduleset::ModuleInfo, pkg_dir: &Path) -> String {
    match pkg_dir.strip_prefix(&module.dir) {
        Ok(rel) if rel.as_os_str().is_empty() => module.mod_path.clone(),
        Ok(rel) => format!(
            "{}/{}",
            module.mod_path,
            rel.to_string_lossy().replace('\\', "/")
        ),
        Err(_) => module.mod_path.clone(),
    }
}

/// The identifier in the file's `package` clause.
fn package_clause_name(source: &str, tree: &Tree) -> Option<String> {
    let root = tree.root_node();
    let clause = syntax::child_of_kind(root, "package_clause")?;
    let ident = syntax::child_of_kind(clause, "package_identifier")?;
    Some(syntax::text(source, ident).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_config_matches_suffixes() {
        let skip = SkipConfig::default();
        assert!(skip.should_skip("scrape/loop_test.go"));
        assert!(skip.should_skip("api/types.pb.go"));
        assert!(!skip.should_skip("scrape/loop.go"));

        let keep_all = SkipConfig {
            skip_tests: false,
            skip_generated: false,
        };
        assert!(!keep_all.should_skip("scrape/loop_test.go"));
        assert!(!keep_all.should_skip("api/types.pb.go"));
    }
}
