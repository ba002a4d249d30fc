use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// A key/value tag. Tag sets compare by the full (key, value) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// What it takes to move the remote tag set to the desired one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    pub to_add: BTreeSet<Tag>,
    pub to_remove: BTreeSet<Tag>,
}

impl TagDiff {
    /// `to_remove = existing − desired`, `to_add = desired − existing`.
    ///
    /// A changed value shows up in both sets: the old pair is removed and
    /// the new pair added.
    pub fn between(existing: &BTreeSet<Tag>, desired: &BTreeSet<Tag>) -> Self {
        Self {
            to_add: desired.difference(existing).cloned().collect(),
            to_remove: existing.difference(desired).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Keys to untag. A key whose value changed is removed and then re-added.
    pub fn keys_to_remove(&self) -> Vec<String> {
        self.to_remove.iter().map(|t| t.key.clone()).collect()
    }
}

/// Merge stack-level tags with the resource's own tags.
///
/// Resource tags win when both declare the same key.
pub fn effective_tags(
    resource_tags: Option<&[Tag]>,
    stack_tags: &BTreeMap<String, String>,
) -> BTreeSet<Tag> {
    let mut merged = stack_tags.clone();
    for tag in resource_tags.unwrap_or_default() {
        merged.insert(tag.key.clone(), tag.value.clone());
    }
    merged.into_iter().map(|(k, v)| Tag::new(k, v)).collect()
}
