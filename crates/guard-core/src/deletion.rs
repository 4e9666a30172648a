use crate::io;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A path that must be gone once its owning slice is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeletionTarget {
    pub path: String,
    /// Filled from the containing slice when omitted in the record.
    #[serde(default)]
    pub owning_slice_id: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionResult {
    pub path: String,
    pub label: String,
    pub owning_slice_id: String,
    pub exists: bool,
    /// Only targets of done slices are gates; the rest are reminders.
    pub enforced: bool,
    pub ok: bool,
}

impl DeletionTarget {
    pub fn new(
        path: impl Into<String>,
        owning_slice_id: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            owning_slice_id: owning_slice_id.into(),
            label: label.into(),
        }
    }

    pub fn exists_under(&self, root: &Path) -> bool {
        let rel = paths::normalize_record_path(&self.path);
        io::path_present(&root.join(rel))
    }

    pub fn evaluate(&self, root: &Path, slice_done: bool) -> DeletionResult {
        self.result(self.exists_under(root), slice_done)
    }

    /// Build the result from an existence probe taken elsewhere.
    pub fn result(&self, exists: bool, slice_done: bool) -> DeletionResult {
        DeletionResult {
            path: paths::normalize_record_path(&self.path),
            label: self.label.clone(),
            owning_slice_id: self.owning_slice_id.clone(),
            exists,
            enforced: slice_done,
            ok: !(exists && slice_done),
        }
    }
}
