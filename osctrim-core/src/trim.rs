//! Classify-then-prune entry point.

use log::info;
use thiserror::Error;

use crate::{
    ChangeDocument, ElementKind, PruneSummary, ReferenceStore, ReferenceStoreError, Region,
    classify, prune,
};

/// Errors that abort a trim run. The document is left untouched.
#[derive(Debug, Error)]
pub enum TrimError {
    /// A reference-store lookup failed during one of the passes.
    #[error("reference store lookup for {kind} rescues failed")]
    Store {
        /// Element kind of the failed pass.
        kind: ElementKind,
        /// Store failure.
        #[source]
        source: ReferenceStoreError,
    },
}

/// Trim `document` in place to `region` and the contents of `store`.
///
/// Classification finishes, including every store lookup, before the
/// document is touched, so a failed run leaves it as it was.
///
/// # Errors
/// Returns [`TrimError`] when a reference-store lookup fails.
///
/// # Examples
///
/// ```
/// use osctrim_core::test_support::MemoryReferenceStore;
/// use osctrim_core::{Action, Boundary, ChangeDocument, Node, Operation, trim};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut document = ChangeDocument::new().with_operation(
///     Operation::new(Action::Create).with(Node::new(1).with_location(2.0, 2.0)),
/// );
/// let region = Boundary::from_bbox(0.0, 0.0, 1.0, 1.0)?;
/// let summary = trim(&mut document, &region, &MemoryReferenceStore::default())?;
/// assert!(document.operations().is_empty());
/// assert_eq!(summary.after.total(), 0);
/// # Ok(())
/// # }
/// ```
pub fn trim<R, S>(
    document: &mut ChangeDocument,
    region: &R,
    store: &S,
) -> Result<PruneSummary, TrimError>
where
    R: Region + ?Sized,
    S: ReferenceStore + ?Sized,
{
    let classification = classify(document, region, store)?;
    let summary = prune(document, &classification);
    info!(
        "trimmed change document: {summary} ({} empty groups removed)",
        summary.removed_operations
    );
    Ok(summary)
}
