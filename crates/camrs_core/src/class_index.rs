//! Target class selection.

use serde::{Deserialize, Serialize};

use crate::error::{CamError, Result};

/// The output class (or classes) a map explains.
///
/// A single index applies to every sample of the batch; a per-sample list
/// picks one class for each batch element.
///
/// # Example
///
/// ```rust
/// use camrs_core::ClassIndex;
///
/// assert_eq!(ClassIndex::from(4).resolve(3, 10).unwrap(), vec![4, 4, 4]);
/// assert!(ClassIndex::from(vec![1, 2]).resolve(3, 10).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassIndex {
    /// Same class for every sample.
    Single(usize),
    /// One class per batch element.
    PerSample(Vec<usize>),
}

impl ClassIndex {
    /// Expand to exactly one class per batch element.
    ///
    /// # Errors
    ///
    /// Returns [`CamError::ClassCountMismatch`] if a per-sample list does not
    /// have `batch` entries, and [`CamError::ClassIndexOutOfRange`] if any
    /// class is `>= n_classes`.
    pub fn resolve(&self, batch: usize, n_classes: usize) -> Result<Vec<usize>> {
        let classes = match self {
            ClassIndex::Single(class) => vec![*class; batch],
            ClassIndex::PerSample(classes) => {
                if classes.len() != batch {
                    return Err(CamError::ClassCountMismatch {
                        expected: batch,
                        got: classes.len(),
                    });
                }
                classes.clone()
            }
        };

        if let Some(&index) = classes.iter().find(|&&c| c >= n_classes) {
            return Err(CamError::ClassIndexOutOfRange { index, n_classes });
        }

        Ok(classes)
    }

    /// Check whether this is a single shared class.
    #[must_use]
    pub const fn is_single(&self) -> bool {
        matches!(self, ClassIndex::Single(_))
    }
}

impl From<usize> for ClassIndex {
    fn from(class: usize) -> Self {
        ClassIndex::Single(class)
    }
}

impl From<Vec<usize>> for ClassIndex {
    fn from(classes: Vec<usize>) -> Self {
        ClassIndex::PerSample(classes)
    }
}

impl From<&[usize]> for ClassIndex {
    fn from(classes: &[usize]) -> Self {
        ClassIndex::PerSample(classes.to_vec())
    }
}

impl std::fmt::Display for ClassIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassIndex::Single(class) => write!(f, "{class}"),
            ClassIndex::PerSample(classes) => write!(f, "{classes:?}"),
        }
    }
}
