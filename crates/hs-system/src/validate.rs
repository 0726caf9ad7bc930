//! Structural checks run while building a System.

use std::ops::Range;

use crate::error::{SystemError, SystemResult};

pub(crate) fn validate_name(name: &str) -> SystemResult<()> {
    if name.is_empty() {
        return Err(SystemError::InvalidName {
            name: name.to_string(),
            reason: "name must not be empty",
        });
    }
    if name.contains('/') {
        return Err(SystemError::InvalidName {
            name: name.to_string(),
            reason: "name must not contain '/'",
        });
    }
    Ok(())
}

pub(crate) fn validate_unique<'a>(
    siblings: impl IntoIterator<Item = &'a str>,
    name: &str,
    parent_path: &str,
) -> SystemResult<()> {
    if siblings.into_iter().any(|s| s == name) {
        return Err(SystemError::DuplicateName {
            name: name.to_string(),
            parent: parent_path.to_string(),
        });
    }
    Ok(())
}

/// Leaf ranges must tile `0..total` in order, without gaps or overlap.
pub(crate) fn validate_partition(
    root_path: &str,
    leaf_ranges: &[Range<usize>],
    total: usize,
) -> SystemResult<()> {
    let mut cursor = 0;
    for range in leaf_ranges {
        if range.start != cursor {
            return Err(SystemError::PartitionMismatch {
                path: root_path.to_string(),
                declared: total,
                actual: cursor,
            });
        }
        cursor = range.end;
    }
    if cursor != total {
        return Err(SystemError::PartitionMismatch {
            path: root_path.to_string(),
            declared: total,
            actual: cursor,
        });
    }
    Ok(())
}
