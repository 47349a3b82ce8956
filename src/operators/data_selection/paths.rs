// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Dataset path handling.
//!
//! A dataset path names one or more files joined with [`PATH_SEPARATOR`].
//! Each file may carry an internal dataset path when it is a container
//! (`file.h5/volume/raw`). External paths are resolved against a working
//! directory, `~` is expanded, and shell-style globs (`*`, `?`, `[..]`) are
//! matched against the filesystem. Internal globs are matched against the
//! dataset paths a provider factory lists for the container.

use dirs::home_dir;
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::config::ProviderRegistry;
use crate::errors::ResolutionError;
use crate::observability::messages::selection::PathExpanded;
use crate::observability::messages::StructuredLog;

/// Separator between the files of a stack.
pub const PATH_SEPARATOR: char = ':';

/// Extensions of container formats that hold internal dataset paths.
pub const CONTAINER_EXTENSIONS: &[&str] = &[".h5", ".hdf5", ".ilp", ".n5"];

/// True for `scheme://...` paths.
pub fn is_url(path: &str) -> bool {
    let Some((scheme, rest)) = path.split_once("://") else {
        return false;
    };
    !scheme.is_empty()
        && !rest.is_empty()
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Split a stack path into its files. URLs keep their scheme and port.
pub fn split_path(path: &str) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    for piece in path.split(PATH_SEPARATOR) {
        let joins_previous = match parts.last() {
            Some(prev) if piece.starts_with("//") => {
                prev.chars().all(|c| c.is_ascii_alphabetic()) && !prev.is_empty()
            }
            Some(prev) if is_url(prev) => {
                let host_part = prev.splitn(2, "://").nth(1).unwrap_or_default();
                !host_part.contains('/') && piece.starts_with(|c: char| c.is_ascii_digit())
            }
            _ => false,
        };
        match parts.last_mut() {
            Some(prev) if joins_previous => {
                prev.push(PATH_SEPARATOR);
                prev.push_str(piece);
            }
            _ => parts.push(piece.to_string()),
        }
    }
    parts.retain(|p| !p.is_empty());
    parts
}

pub fn join_paths(paths: &[String]) -> String {
    paths.join(&PATH_SEPARATOR.to_string())
}

/// A file path split at its container extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathComponents {
    /// Path of the file on disk.
    pub external_path: String,
    /// Extension including the dot, lowercase. Empty when there is none.
    pub extension: String,
    /// Dataset path inside a container, starting with `/`.
    pub internal_path: Option<String>,
}

impl PathComponents {
    pub fn parse(path: &str) -> Self {
        let lower = path.to_ascii_lowercase();
        let mut split: Option<(usize, &str)> = None;
        for ext in CONTAINER_EXTENSIONS {
            let mut from = 0;
            while let Some(found) = lower[from..].find(ext) {
                let end = from + found + ext.len();
                if end == lower.len() || lower[end..].starts_with('/') {
                    if split.map_or(true, |(best, _)| end < best) {
                        split = Some((end, *ext));
                    }
                    break;
                }
                from = end;
            }
        }

        match split {
            Some((end, ext)) => {
                let internal = path[end..].trim_end_matches('/');
                Self {
                    external_path: path[..end].to_string(),
                    extension: ext.to_string(),
                    internal_path: (!internal.is_empty()).then(|| internal.to_string()),
                }
            }
            None => Self {
                external_path: path.to_string(),
                extension: Path::new(path)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| format!(".{}", e.to_ascii_lowercase()))
                    .unwrap_or_default(),
                internal_path: None,
            },
        }
    }

    pub fn is_container(&self) -> bool {
        CONTAINER_EXTENSIONS.contains(&self.extension.as_str())
    }

    /// External path without its extension.
    pub fn stem_path(&self) -> &str {
        if self.external_path.to_ascii_lowercase().ends_with(&self.extension) {
            &self.external_path[..self.external_path.len() - self.extension.len()]
        } else {
            &self.external_path
        }
    }

    pub fn total_path(&self) -> String {
        match &self.internal_path {
            Some(internal) => format!("{}{}", self.external_path, internal),
            None => self.external_path.clone(),
        }
    }
}

pub fn has_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Compile a shell-style pattern for a single path segment (or a slash
/// separated internal path) into an anchored regex.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, ResolutionError> {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            '[' => {
                let mut class = String::from("[");
                if chars.peek() == Some(&'!') {
                    chars.next();
                    class.push('^');
                }
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    if c == '\\' {
                        class.push('\\');
                    }
                    class.push(c);
                }
                if !closed {
                    return Err(ResolutionError::InvalidPattern {
                        pattern: pattern.to_string(),
                        reason: "unclosed character class".to_string(),
                    });
                }
                class.push(']');
                re.push_str(&class);
            }
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| ResolutionError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Replace a leading `~` with the home directory.
pub fn expand_user(path: &str) -> String {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return path.to_string(),
    };
    match home_dir() {
        Some(home) => format!("{}{}", home.to_string_lossy().trim_end_matches('/'), rest),
        None => path.to_string(),
    }
}

/// Every existing path matching `pattern`, sorted.
pub fn glob_filesystem(pattern: &Path) -> Result<Vec<PathBuf>, ResolutionError> {
    let mut current: Vec<PathBuf> = vec![PathBuf::new()];
    for component in pattern.components() {
        let segment = component.as_os_str().to_string_lossy();
        if !has_glob(&segment) {
            for path in current.iter_mut() {
                path.push(component.as_os_str());
            }
            continue;
        }

        let matcher = glob_to_regex(&segment)?;
        let mut next = Vec::new();
        for dir in &current {
            let listed = if dir.as_os_str().is_empty() {
                Path::new(".")
            } else {
                dir.as_path()
            };
            // Missing directories simply match nothing.
            if !listed.is_dir() {
                continue;
            }
            let entries = std::fs::read_dir(listed).map_err(|e| ResolutionError::Io {
                path: listed.display().to_string(),
                reason: e.to_string(),
            })?;
            for entry in entries {
                let entry = entry.map_err(|e| ResolutionError::Io {
                    path: listed.display().to_string(),
                    reason: e.to_string(),
                })?;
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with('.') && !segment.starts_with('.') {
                    continue;
                }
                if matcher.is_match(&name) {
                    next.push(dir.join(&name));
                }
            }
        }
        current = next;
    }

    let mut found: Vec<PathBuf> = current.into_iter().filter(|p| p.exists()).collect();
    found.sort();
    Ok(found)
}

/// Resolve a dataset path to the sorted list of files (with internal paths)
/// it refers to.
pub fn expand_path(
    file_path: &str,
    cwd: &Path,
    registry: &ProviderRegistry,
) -> Result<Vec<String>, ResolutionError> {
    let mut expanded = Vec::new();
    for part in split_path(file_path) {
        let components = PathComponents::parse(&part);
        let external = PathBuf::from(expand_user(&components.external_path));
        let external = if external.is_absolute() {
            external
        } else {
            cwd.join(external)
        };

        let matches = glob_filesystem(&external)?;
        PathExpanded {
            pattern: &part,
            matches: matches.len(),
        }
        .log();
        if matches.is_empty() {
            return Err(ResolutionError::FileNotFound {
                path: components.external_path.clone(),
            });
        }

        for file in matches {
            let file_str = file.to_string_lossy().to_string();
            match &components.internal_path {
                Some(internal) if components.is_container() && has_glob(internal) => {
                    for hit in glob_internal_paths(&file, internal, registry)? {
                        expanded.push(format!("{}/{}", file_str, hit));
                    }
                }
                Some(internal) => expanded.push(format!("{}{}", file_str, internal)),
                None => expanded.push(file_str),
            }
        }
    }
    expanded.sort();
    Ok(expanded)
}

fn glob_internal_paths(
    file: &Path,
    pattern: &str,
    registry: &ProviderRegistry,
) -> Result<Vec<String>, ResolutionError> {
    let listed = match registry.for_path(file) {
        Some(factory) => factory.list_internal_paths(file)?,
        None => Vec::new(),
    };
    let matcher = glob_to_regex(pattern.trim_start_matches('/'))?;
    let mut hits: Vec<String> = listed
        .iter()
        .map(|p| p.trim_start_matches('/'))
        .filter(|p| matcher.is_match(p))
        .map(str::to_string)
        .collect();
    hits.sort();
    hits.dedup();
    if hits.is_empty() {
        return Err(ResolutionError::InternalPathNotFound {
            file: file.to_string_lossy().to_string(),
            internal_path: pattern.to_string(),
        });
    }
    Ok(hits)
}

fn common_prefix<'a>(items: &[&'a str]) -> &'a str {
    let Some(first) = items.first() else {
        return "";
    };
    let mut end = first.len();
    for other in &items[1..] {
        end = first
            .char_indices()
            .zip(other.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map_or(0, |((i, a), _)| i + a.len_utf8())
            .min(end);
    }
    &first[..end]
}

/// A short display name for a set of expanded paths.
///
/// Uses the last segment of the common external prefix (without extension),
/// or `stack_at-<first path>` when the files share no usable prefix, followed
/// by the common internal path with slashes turned into dashes.
pub fn create_nickname(expanded: &[String]) -> Result<String, ResolutionError> {
    let components: Vec<PathComponents> = expanded.iter().map(|p| PathComponents::parse(p)).collect();
    let Some(first) = components.first() else {
        return Ok(String::new());
    };
    if components.iter().any(|c| c.extension != first.extension) {
        return Err(ResolutionError::MixedExtensions {
            path: join_paths(expanded),
        });
    }

    let stems: Vec<&str> = components.iter().map(PathComponents::stem_path).collect();
    let prefix = common_prefix(&stems);
    let external = match prefix.rsplit('/').next() {
        Some(last) if !last.is_empty() => last.to_string(),
        _ => format!("stack_at-{}", first.external_path),
    };

    let internals: Vec<&str> = components
        .iter()
        .map(|c| c.internal_path.as_deref().unwrap_or(""))
        .collect();
    let internal = common_prefix(&internals).trim_start_matches('/');
    if internal.is_empty() {
        Ok(external)
    } else {
        Ok(format!("{}-{}", external, internal.replace('/', "-")))
    }
}
