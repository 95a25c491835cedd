use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::LedgerFacade;
use crate::cache::Cache;
use crate::error::LedgerError;
use crate::responses::{BalanceView, HistoricalBalance};

impl<C: Cache> LedgerFacade<C> {
    /// Current balance via the cache, the replica or the primary, in that order
    ///
    /// Served in every degraded mode, read-only included.
    #[tracing::instrument(skip(self))]
    pub async fn get_balance(&self, wallet_id: Uuid) -> Result<BalanceView, LedgerError> {
        self.observe("get_balance", async {
            match self.cache.get_wallet(wallet_id).await? {
                (Some(wallet), source) => Ok(BalanceView::new(&wallet, source)),
                (None, _) => Err(LedgerError::WalletNotFound(wallet_id)),
            }
        })
        .await
    }

    /// Balance at `at`, replayed from ledger entries
    ///
    /// Entries are read through the authoritative path, so the result does not
    /// depend on cache or replica freshness.
    #[tracing::instrument(skip(self))]
    pub async fn get_historical_balance(
        &self,
        wallet_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<HistoricalBalance, LedgerError> {
        self.observe("get_historical_balance", async {
            let (wallet, _) = self.store.read_wallet(wallet_id).await?;
            let wallet = wallet.ok_or(LedgerError::WalletNotFound(wallet_id))?;

            let entries = self.store.entries_for_wallet(wallet_id, at).await?;
            let balance = entries
                .iter()
                .map(|entry| entry.effect_on(wallet_id))
                .try_fold(Decimal::ZERO, |total, effect| {
                    total
                        .checked_add(effect)
                        .ok_or(LedgerError::BalanceOverflow { wallet_id, amount: effect })
                })?;

            Ok(HistoricalBalance {
                wallet_id,
                currency: wallet.currency,
                at,
                balance,
                entries_applied: entries.len(),
            })
        })
        .await
    }
}
