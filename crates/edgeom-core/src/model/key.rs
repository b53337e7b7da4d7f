// ── Resource identity types ──
//
// ResourcePath and CompositeKey address one resource instance. They
// replace string-concatenated keys with value types usable directly
// as map keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Maximum number of path segments below a model.
pub const MAX_DEPTH: usize = 4;

// ── ResourcePath ────────────────────────────────────────────────────

/// Up to [`MAX_DEPTH`] ordered path segments below a model.
///
/// Segments fill from the front: once a segment is unset, every deeper
/// segment is unset too. Constructors enforce this, so a value of this
/// type never has gaps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ResourcePath([Option<String>; MAX_DEPTH]);

impl ResourcePath {
    /// The empty path (collection level of a model).
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from leading segments.
    pub fn new<I, S>(segments: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut slots: [Option<String>; MAX_DEPTH] = Default::default();
        for (index, segment) in segments.into_iter().enumerate() {
            let slot = slots.get_mut(index).ok_or_else(|| {
                CoreError::InvalidInput(format!("at most {MAX_DEPTH} path segments are supported"))
            })?;
            *slot = Some(segment.into());
        }
        Ok(Self(slots))
    }

    /// Build a path from four optional slots, rejecting gaps.
    pub fn from_slots(slots: [Option<String>; MAX_DEPTH]) -> Result<Self, CoreError> {
        let depth = slots.iter().take_while(|s| s.is_some()).count();
        if slots.iter().skip(depth).any(Option::is_some) {
            return Err(CoreError::InvalidInput(format!(
                "path segment {} is set after an unset segment",
                depth + 1
            )));
        }
        Ok(Self(slots))
    }

    /// Number of set segments.
    pub fn depth(&self) -> usize {
        self.0.iter().take_while(|s| s.is_some()).count()
    }

    pub fn is_root(&self) -> bool {
        self.0[0].is_none()
    }

    pub fn is_full(&self) -> bool {
        self.depth() == MAX_DEPTH
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(Option::as_deref)
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map_while(Option::as_deref)
    }

    /// Path with `id` placed in the shallowest unset segment.
    ///
    /// Returns `None` when all segments are already set.
    pub fn child(&self, id: impl Into<String>) -> Option<Self> {
        let depth = self.depth();
        if depth == MAX_DEPTH {
            return None;
        }
        let mut slots = self.0.clone();
        slots[depth] = Some(id.into());
        Some(Self(slots))
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in self.segments() {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl TryFrom<Vec<String>> for ResourcePath {
    type Error = CoreError;

    fn try_from(segments: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(segments)
    }
}

impl From<ResourcePath> for Vec<String> {
    fn from(path: ResourcePath) -> Self {
        path.0.into_iter().flatten().collect()
    }
}

// ── CompositeKey ────────────────────────────────────────────────────

/// A model name plus a [`ResourcePath`]: one addressable resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompositeKey {
    pub model: String,
    pub path: ResourcePath,
}

impl CompositeKey {
    pub fn new(model: impl Into<String>, path: ResourcePath) -> Self {
        Self {
            model: model.into(),
            path,
        }
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.model, self.path)
    }
}
