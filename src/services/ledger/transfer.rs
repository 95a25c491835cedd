use chrono::Utc;

use super::{Committed, LedgerFacade, ensure_positive, stage};
use crate::cache::Cache;
use crate::error::LedgerError;
use crate::models::{EntryType, LedgerEntry, LedgerEvent};
use crate::requests::TransferRequest;
use crate::responses::TransactionReceipt;

impl<C: Cache> LedgerFacade<C> {
    /// Move funds between two wallets of the same currency
    ///
    /// Both legs, one entry and one `FUNDS_TRANSFERRED` event commit together.
    /// The event is ordered under the source wallet.
    #[tracing::instrument(
        skip(self, request),
        fields(
            source_wallet_id = %request.source_wallet_id,
            destination_wallet_id = %request.destination_wallet_id,
            reference_id = %request.reference_id
        )
    )]
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransactionReceipt, LedgerError> {
        self.observe("transfer", async {
            self.coordinator.validate_write_operation()?;
            if request.source_wallet_id == request.destination_wallet_id {
                return Err(LedgerError::InvalidTransfer(
                    "source and destination wallets are the same".to_string(),
                ));
            }
            ensure_positive(request.amount)?;

            let (source, destination, amount) =
                (request.source_wallet_id, request.destination_wallet_id, request.amount);
            if let Some(receipt) = self
                .replay(EntryType::Transfer, source, Some(destination), amount, &request.reference_id)
                .await?
            {
                return Ok(receipt);
            }

            let result = self.with_version_retry(|_| self.apply_transfer(&request)).await;
            self.settle(
                result,
                EntryType::Transfer,
                source,
                Some(destination),
                amount,
                &request.reference_id,
            )
            .await
        })
        .await
    }

    async fn apply_transfer(&self, request: &TransferRequest) -> Result<Committed, LedgerError> {
        let source = self.store.read_for_update(request.source_wallet_id).await?;
        let destination = self.store.read_for_update(request.destination_wallet_id).await?;

        if source.currency != destination.currency {
            return Err(LedgerError::InvalidTransfer(format!(
                "cannot transfer {} to a {} wallet",
                source.currency, destination.currency
            )));
        }

        let now = Utc::now();
        let source = source.debited(request.amount, now)?;
        let destination = destination.credited(request.amount, now)?;

        let entry = LedgerEntry::new(
            EntryType::Transfer,
            source.id,
            Some(destination.id),
            request.amount,
            request.reference_id.clone(),
            request.description.clone(),
            now,
        );
        let event = LedgerEvent::FundsTransferred {
            source_wallet_id: source.id,
            destination_wallet_id: destination.id,
            entry_id: entry.id,
            amount: entry.amount,
            source_balance: source.balance,
            destination_balance: destination.balance,
            reference_id: entry.reference_id.clone(),
            occurred_at: now,
        };

        let unit = stage(&event)?
            .update_wallet(source.clone())
            .update_wallet(destination.clone())
            .with_entry(entry.clone());
        self.store.write(&unit).await?;
        Ok(Committed {
            entry,
            wallet: source,
            destination: Some(destination),
        })
    }
}
