//! Scoped host transactions with failure handling
//!
//! Every document mutation made by the bridge goes through
//! [`run_in_transaction`]: the transaction is opened, the body runs, host
//! warnings are drained and dismissed, and the transaction is committed.
//! Any host error or body failure rolls the whole transaction back.

use crate::error::{HostLinkError, Result};
use crate::host::HostDocument;
use crate::types::TransactionId;

/// Run `body` inside a named transaction on `doc`
pub fn run_in_transaction<T, F>(doc: &dyn HostDocument, name: &str, body: F) -> Result<T>
where
    F: FnOnce(&dyn HostDocument, TransactionId) -> Result<T>,
{
    let tx = doc.begin_transaction(name)?;

    let value = match body(doc, tx) {
        Ok(value) => value,
        Err(e) => {
            doc.rollback(tx);
            return Err(e);
        }
    };

    if let Err(e) = drain_failures(doc, tx) {
        doc.rollback(tx);
        return Err(e);
    }

    if let Err(e) = doc.commit(tx) {
        doc.rollback(tx);
        return Err(match e {
            HostLinkError::TransactionRejected { .. } => e,
            other => HostLinkError::rejected(other.to_string()),
        });
    }

    Ok(value)
}

/// Dismiss every pending warning; fail on the first error
fn drain_failures(doc: &dyn HostDocument, tx: TransactionId) -> Result<()> {
    for failure in doc.pending_failures(tx) {
        if failure.is_warning() {
            log::warn!("Host warning dismissed: {}", failure.message);
            doc.dismiss_failure(tx, &failure);
        } else {
            log::warn!("Host error in transaction: {}", failure.message);
            return Err(HostLinkError::rejected(failure.message));
        }
    }
    Ok(())
}
