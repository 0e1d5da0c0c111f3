//! Replication bookkeeping run before the first replicated write of a
//! transaction.

use std::sync::Arc;

use sitectx_result::{Error, Result};
use sitectx_types::unique_id::is_mp_unique_id;

use crate::collaborators::{DrStreamUndoAction, DrTupleStream};
use crate::context::ExecutionContext;

impl ExecutionContext {
    /// Gate replicated writes on an active transaction and open the
    /// transaction record of every started DR stream.
    ///
    /// Does nothing while no DR stream is started. With replication enabled,
    /// calling this without an active undo quantum is a
    /// [`Error::ContractViolation`]. Only multi-partition transactions are
    /// opened here; single-partition writers open their record inside the
    /// stream when they append. When a stream opens a new transaction record,
    /// an undo action is registered so a rollback truncates the stream to its
    /// committed position.
    pub fn check_transaction_for_dr(&self) -> Result<()> {
        if !self.is_dr_enabled() {
            return Ok(());
        }
        let Some(undo_quantum) = self.shared.undo_quantum() else {
            tracing::error!(
                txn_id = self.txn_id,
                sp_handle = self.sp_handle,
                "replicated write attempted without an active transaction"
            );
            return Err(Error::contract_violation(
                "replicated write attempted without an active transaction",
            ));
        };
        if !is_mp_unique_id(self.unique_id) {
            return Ok(());
        }

        for stream in self.started_dr_streams() {
            let committed_uso = stream.committed_uso();
            if stream.transaction_checks(
                self.last_committed_sp_handle,
                self.sp_handle,
                self.unique_id,
            ) {
                tracing::trace!(
                    unique_id = self.unique_id,
                    undo_token = undo_quantum.undo_token(),
                    committed_uso,
                    "DR stream opened transaction"
                );
                undo_quantum.register_undo_action(Box::new(DrStreamUndoAction::new(
                    Arc::clone(stream),
                    committed_uso,
                )));
            }
        }
        Ok(())
    }

    /// True when at least one installed DR stream has replication enabled.
    pub fn is_dr_enabled(&self) -> bool {
        self.started_dr_streams().next().is_some()
    }

    fn started_dr_streams(&self) -> impl Iterator<Item = &Arc<dyn DrTupleStream>> {
        [self.dr_stream.as_ref(), self.dr_replicated_stream.as_ref()]
            .into_iter()
            .flatten()
            .filter(|stream| stream.is_started())
    }
}
