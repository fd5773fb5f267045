use derive_new::new;

use crate::common::config::TransactionId;

/// Transaction context threaded through index operations.
///
/// The storage core does not consult it yet; the parameter exists so the
/// index API does not change once a transaction manager sits on top.
#[derive(Debug, new)]
pub struct Transaction {
    id: TransactionId,
}

impl Transaction {
    pub fn id(&self) -> TransactionId {
        self.id
    }
}
