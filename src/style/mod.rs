//! Style resolution.
//!
//! Styles are named property lists layered under a node's own properties.
//! The engine resolves definition-local styles first (they shadow shared
//! names); everything else goes through the [`StyleResolver`] seam, backed by
//! the bundled [`StyleStore`]. Watched style sources feed the store, so a
//! style edit hot-reloads every registered instance.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

use crate::definition::{NodeKind, Property, Style};
use crate::host::HostError;

/// Context a style list resolves against.
#[derive(Debug, Clone, Copy)]
pub struct StyleContext<'a> {
    pub theme: &'a str,
    /// `None` for the registration root, whose kind belongs to the host.
    pub kind: Option<NodeKind>,
}

/// Resolves style names into a flat property list.
///
/// Order matters: the returned list applies first-to-last, and the node's own
/// properties apply after it, so later entries win.
pub trait StyleResolver: Send + Sync {
    fn resolve(
        &self,
        names: &[String],
        ctx: &StyleContext<'_>,
    ) -> Result<Vec<Property>, HostError>;
}

// ============================================================================
// StyleStore
// ============================================================================

/// Shared style table with per-source ownership.
///
/// A reparse of one style source replaces exactly that source's styles;
/// host-seeded styles (no source path) stay until overwritten.
#[derive(Debug, Default)]
pub struct StyleStore {
    styles: RwLock<FxHashMap<String, Style>>,
    owners: RwLock<FxHashMap<PathBuf, Vec<String>>>,
}

impl StyleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host-provided styles, not tied to any watched source.
    pub fn seed(&self, styles: Vec<Style>) {
        let mut table = self.styles.write();
        for style in styles {
            table.insert(style.name.clone(), style);
        }
    }

    /// Replace the styles owned by one watched source.
    pub fn update_source(&self, path: &Path, styles: Vec<Style>) {
        let mut table = self.styles.write();
        let mut owners = self.owners.write();

        if let Some(old) = owners.remove(path) {
            for name in old {
                table.remove(&name);
            }
        }

        let names: Vec<String> = styles.iter().map(|s| s.name.clone()).collect();
        for style in styles {
            table.insert(style.name.clone(), style);
        }
        owners.insert(path.to_path_buf(), names);
    }

    pub fn len(&self) -> usize {
        self.styles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.read().is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.styles.read().contains_key(name)
    }
}

impl StyleResolver for StyleStore {
    fn resolve(
        &self,
        names: &[String],
        ctx: &StyleContext<'_>,
    ) -> Result<Vec<Property>, HostError> {
        let table = self.styles.read();
        let mut out = Vec::new();
        for name in names {
            let style = table
                .get(name)
                .ok_or_else(|| HostError::other(format!("style `{name}` not found")))?;
            out.extend(style.resolved(ctx.theme));
        }
        Ok(out)
    }
}
