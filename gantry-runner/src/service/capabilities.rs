//! Capabilities service
//!
//! Builds the tag set this runner registers with: the configured tags plus
//! a tag for each well-known tool found on `PATH`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::info;

/// Tools advertised as tags when present
const KNOWN_TOOLS: &[&str] = &["git", "docker", "podman", "make", "cargo", "python3", "node"];

/// Service trait for capability discovery
pub trait CapabilitiesService: Send + Sync {
    /// Returns the tags to register with
    fn discover(&self) -> BTreeSet<String>;
}

/// Looks tools up in a list of directories
pub struct StandardCapabilitiesService {
    configured: BTreeSet<String>,
    search_path: Vec<PathBuf>,
}

impl StandardCapabilitiesService {
    pub fn new(configured: BTreeSet<String>) -> Self {
        let search_path = std::env::var_os("PATH")
            .map(|path| std::env::split_paths(&path).collect())
            .unwrap_or_default();
        Self::with_search_path(configured, search_path)
    }

    pub fn with_search_path(configured: BTreeSet<String>, search_path: Vec<PathBuf>) -> Self {
        Self {
            configured,
            search_path,
        }
    }

    fn has_tool(&self, tool: &str) -> bool {
        self.search_path
            .iter()
            .any(|dir| is_executable(&dir.join(tool)))
    }
}

impl CapabilitiesService for StandardCapabilitiesService {
    fn discover(&self) -> BTreeSet<String> {
        let mut tags = self.configured.clone();
        for tool in KNOWN_TOOLS {
            if self.has_tool(tool) {
                tags.insert(tool.to_string());
            }
        }

        info!("Discovered {} runner tags", tags.len());
        tags
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
