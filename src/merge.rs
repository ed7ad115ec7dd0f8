//! Generic merge engine for metadata trees.
//!
//! [`merge`] folds an incoming tree into a base tree in place. Keys listed in the options'
//! strategy table are handed to their [`MergeStrategy`], which owns the merged result for that
//! key. Every other key follows the default rules:
//!
//! - both values are trees: merge recursively when [`MergeOptions::recursive`] is set, otherwise
//!   overlay the incoming tree's top-level keys onto the existing tree
//! - the incoming value is `null`: the key is removed (a tombstone)
//! - otherwise the incoming value replaces the existing one
//!
//! Stores that are later layered over other stores merge with
//! [`MergeOptions::keep_tombstones`], so a `null` survives in the store and revokes the inherited
//! key when the layers are finally combined.
//!
//! Pre-existing keys keep their position; new keys are appended in the incoming tree's order.

use crate::error::{Error, Result};
use crate::tree::{into_tree, MetadataTree};
use serde_json::Value;

/// Merge function for a single key: `(existing, incoming, options) -> merged`.
///
/// Returning `Ok(None)` removes the key from the base tree.
pub type MergeStrategy = fn(Option<Value>, Value, &MergeOptions<'_>) -> Result<Option<Value>>;

/// Options threaded through a merge
#[derive(Clone, Copy, Default)]
pub struct MergeOptions<'a> {
    /// Merge nested trees recursively instead of overlaying them one level deep
    pub recursive: bool,
    /// Record `null` values instead of removing keys
    pub keep_tombstones: bool,
    /// Per-key strategies consulted before the default rules
    pub strategies: &'a [(&'a str, MergeStrategy)],
}

impl<'a> MergeOptions<'a> {
    pub fn with_strategies(strategies: &'a [(&'a str, MergeStrategy)]) -> Self {
        Self {
            strategies,
            ..Default::default()
        }
    }

    pub fn recursive() -> Self {
        Self {
            recursive: true,
            ..Default::default()
        }
    }

    pub fn keeping_tombstones(self) -> Self {
        Self {
            keep_tombstones: true,
            ..self
        }
    }

    /// Options for merging below a strategy-owned key: same flags, no strategies.
    pub fn nested(&self) -> MergeOptions<'static> {
        MergeOptions {
            recursive: self.recursive,
            keep_tombstones: self.keep_tombstones,
            strategies: &[],
        }
    }

    /// What a strategy yields for a `null` incoming value.
    pub fn tombstone(&self) -> Option<Value> {
        self.keep_tombstones.then_some(Value::Null)
    }

    fn strategy(&self, key: &str) -> Option<MergeStrategy> {
        self.strategies
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, strategy)| *strategy)
    }
}

impl std::fmt::Debug for MergeOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeOptions")
            .field("recursive", &self.recursive)
            .field("keep_tombstones", &self.keep_tombstones)
            .field(
                "strategies",
                &self.strategies.iter().map(|(k, _)| *k).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Merges `incoming` into `base` in place.
pub fn merge(base: &mut MetadataTree, incoming: MetadataTree, opts: &MergeOptions<'_>) -> Result<()> {
    for (key, value) in incoming {
        if let Some(strategy) = opts.strategy(&key) {
            let existing = base.get(&key).cloned();
            match strategy(existing, value, opts)? {
                Some(merged) => {
                    base.insert(key, merged);
                }
                None => {
                    base.shift_remove(&key);
                }
            }
            continue;
        }

        if value.is_null() {
            if opts.keep_tombstones {
                base.insert(key, Value::Null);
            } else {
                base.shift_remove(&key);
            }
            continue;
        }

        let both_trees = value.is_object() && base.get(&key).is_some_and(Value::is_object);
        if !both_trees {
            base.insert(key, value);
            continue;
        }
        if let (Some(Value::Object(existing)), Value::Object(incoming)) = (base.get_mut(&key), value) {
            if opts.recursive {
                merge(existing, incoming, opts)?;
            } else {
                overlay(existing, incoming, opts.keep_tombstones);
            }
        }
    }
    Ok(())
}

/// Merges an arbitrary incoming value, which must be a tree or `null`.
pub fn merge_value(base: &mut MetadataTree, incoming: Value, opts: &MergeOptions<'_>) -> Result<()> {
    match into_tree(incoming) {
        Ok(Some(tree)) => merge(base, tree, opts),
        Ok(None) => Ok(()),
        Err(_) => Err(Error::MergeType("metadata".to_string())),
    }
}

/// Merges into a copy of `base`, leaving the original untouched when the merge fails.
pub fn merged(base: &MetadataTree, incoming: MetadataTree, opts: &MergeOptions<'_>) -> Result<MetadataTree> {
    let mut result = base.clone();
    merge(&mut result, incoming, opts)?;
    Ok(result)
}

/// Strategy helper: merges two values that must both be trees.
///
/// `description` names the expected shape in the failure message (e.g. "header parameters").
/// A `null` incoming value removes the key, or records a tombstone when the options keep them.
pub fn verify_and_merge(
    existing: Option<Value>,
    incoming: Value,
    description: &str,
    opts: &MergeOptions<'_>,
) -> Result<Option<Value>> {
    let incoming = match into_tree(incoming) {
        Ok(Some(tree)) => tree,
        Ok(None) => return Ok(opts.tombstone()),
        Err(_) => return Err(Error::MergeType(description.to_string())),
    };
    let mut base = match existing {
        Some(Value::Object(tree)) => tree,
        _ => MetadataTree::new(),
    };
    merge(&mut base, incoming, &opts.nested())?;
    Ok(Some(Value::Object(base)))
}

fn overlay(existing: &mut MetadataTree, incoming: MetadataTree, keep_tombstones: bool) {
    for (key, value) in incoming {
        if value.is_null() && !keep_tombstones {
            existing.shift_remove(&key);
        } else {
            existing.insert(key, value);
        }
    }
}
