//! Transaction boundary of the persistence collaborator.

use drover_proto::DrResult;

/// Commits the changes made by one applied update.
pub trait TransactionMgr: Send + Sync {
    fn commit(&self) -> DrResult<()>;

    fn rollback(&self);
}

/// Satellites keep no database; every commit succeeds.
#[derive(Debug, Default)]
pub struct NoopTransactionMgr;

impl TransactionMgr for NoopTransactionMgr {
    fn commit(&self) -> DrResult<()> {
        Ok(())
    }

    fn rollback(&self) {}
}
