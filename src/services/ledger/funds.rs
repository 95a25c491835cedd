use chrono::Utc;

use super::{Committed, LedgerFacade, ensure_positive, stage};
use crate::cache::Cache;
use crate::error::LedgerError;
use crate::models::{EntryType, LedgerEntry, LedgerEvent};
use crate::requests::{DepositRequest, WithdrawRequest};
use crate::responses::TransactionReceipt;

impl<C: Cache> LedgerFacade<C> {
    #[tracing::instrument(skip(self, request), fields(wallet_id = %request.wallet_id, reference_id = %request.reference_id))]
    pub async fn deposit(&self, request: DepositRequest) -> Result<TransactionReceipt, LedgerError> {
        self.observe("deposit", async {
            self.coordinator.validate_write_operation()?;
            ensure_positive(request.amount)?;

            let (wallet_id, amount) = (request.wallet_id, request.amount);
            if let Some(receipt) = self
                .replay(EntryType::Deposit, wallet_id, None, amount, &request.reference_id)
                .await?
            {
                return Ok(receipt);
            }

            let result = self.with_version_retry(|_| self.apply_deposit(&request)).await;
            self.settle(result, EntryType::Deposit, wallet_id, None, amount, &request.reference_id)
                .await
        })
        .await
    }

    #[tracing::instrument(skip(self, request), fields(wallet_id = %request.wallet_id, reference_id = %request.reference_id))]
    pub async fn withdraw(&self, request: WithdrawRequest) -> Result<TransactionReceipt, LedgerError> {
        self.observe("withdraw", async {
            self.coordinator.validate_write_operation()?;
            ensure_positive(request.amount)?;

            let (wallet_id, amount) = (request.wallet_id, request.amount);
            if let Some(receipt) = self
                .replay(EntryType::Withdrawal, wallet_id, None, amount, &request.reference_id)
                .await?
            {
                return Ok(receipt);
            }

            let result = self.with_version_retry(|_| self.apply_withdrawal(&request)).await;
            self.settle(result, EntryType::Withdrawal, wallet_id, None, amount, &request.reference_id)
                .await
        })
        .await
    }

    async fn apply_deposit(&self, request: &DepositRequest) -> Result<Committed, LedgerError> {
        let current = self.store.read_for_update(request.wallet_id).await?;
        let now = Utc::now();
        let wallet = current.credited(request.amount, now)?;

        let entry = LedgerEntry::new(
            EntryType::Deposit,
            wallet.id,
            None,
            request.amount,
            request.reference_id.clone(),
            request.description.clone(),
            now,
        );
        let event = LedgerEvent::FundsDeposited {
            wallet_id: wallet.id,
            entry_id: entry.id,
            amount: entry.amount,
            balance: wallet.balance,
            reference_id: entry.reference_id.clone(),
            occurred_at: now,
        };

        let unit = stage(&event)?.update_wallet(wallet.clone()).with_entry(entry.clone());
        self.store.write(&unit).await?;
        Ok(Committed {
            entry,
            wallet,
            destination: None,
        })
    }

    async fn apply_withdrawal(&self, request: &WithdrawRequest) -> Result<Committed, LedgerError> {
        let current = self.store.read_for_update(request.wallet_id).await?;
        let now = Utc::now();
        let wallet = current.debited(request.amount, now)?;

        let entry = LedgerEntry::new(
            EntryType::Withdrawal,
            wallet.id,
            None,
            request.amount,
            request.reference_id.clone(),
            request.description.clone(),
            now,
        );
        let event = LedgerEvent::FundsWithdrawn {
            wallet_id: wallet.id,
            entry_id: entry.id,
            amount: entry.amount,
            balance: wallet.balance,
            reference_id: entry.reference_id.clone(),
            occurred_at: now,
        };

        let unit = stage(&event)?.update_wallet(wallet.clone()).with_entry(entry.clone());
        self.store.write(&unit).await?;
        Ok(Committed {
            entry,
            wallet,
            destination: None,
        })
    }
}
