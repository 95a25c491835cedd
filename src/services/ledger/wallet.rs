use chrono::Utc;
use uuid::Uuid;

use super::{LedgerFacade, stage};
use crate::cache::Cache;
use crate::error::LedgerError;
use crate::models::{Currency, LedgerEvent, Wallet, WalletStatus};
use crate::requests::CreateWalletRequest;

impl<C: Cache> LedgerFacade<C> {
    /// One wallet per (user, currency)
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id, currency = %request.currency))]
    pub async fn create_wallet(&self, request: CreateWalletRequest) -> Result<Wallet, LedgerError> {
        self.observe("create_wallet", async {
            self.coordinator.validate_write_operation()?;
            let currency: Currency = request.currency.parse()?;
            let user_id = request.user_id.trim().to_string();

            if self.store.find_wallet(&user_id, &currency).await?.is_some() {
                return Err(LedgerError::WalletAlreadyExists { user_id, currency });
            }

            let wallet = Wallet::open(user_id, currency, Utc::now());
            let event = LedgerEvent::WalletCreated {
                wallet_id: wallet.id,
                user_id: wallet.user_id.clone(),
                currency: wallet.currency.clone(),
                occurred_at: wallet.created_at,
            };
            self.store.write(&stage(&event)?.insert_wallet(wallet.clone())).await?;
            self.after_commit(&[&wallet]).await;

            tracing::info!(wallet_id = %wallet.id, "Wallet created");
            Ok(wallet)
        })
        .await
    }

    pub async fn list_wallets(&self, user_id: &str) -> Result<Vec<Wallet>, LedgerError> {
        self.observe("list_wallets", self.store.read_wallets_by_user(user_id.trim()))
            .await
    }

    pub async fn freeze_wallet(&self, wallet_id: Uuid) -> Result<Wallet, LedgerError> {
        self.observe("freeze_wallet", self.change_status(wallet_id, WalletStatus::Frozen))
            .await
    }

    pub async fn unfreeze_wallet(&self, wallet_id: Uuid) -> Result<Wallet, LedgerError> {
        self.observe("unfreeze_wallet", self.change_status(wallet_id, WalletStatus::Active))
            .await
    }

    /// Closing requires a zero balance
    pub async fn close_wallet(&self, wallet_id: Uuid) -> Result<Wallet, LedgerError> {
        self.observe("close_wallet", self.change_status(wallet_id, WalletStatus::Closed))
            .await
    }

    #[tracing::instrument(skip(self), fields(to = %status))]
    async fn change_status(&self, wallet_id: Uuid, status: WalletStatus) -> Result<Wallet, LedgerError> {
        self.coordinator.validate_write_operation()?;

        let wallet = self
            .with_version_retry(|_| async move {
                let current = self.store.read_for_update(wallet_id).await?;
                let next = current.with_status(status, Utc::now())?;
                let event = LedgerEvent::WalletStatusChanged {
                    wallet_id,
                    from: current.status,
                    to: next.status,
                    occurred_at: next.updated_at,
                };
                self.store.write(&stage(&event)?.update_wallet(next.clone())).await?;
                Ok(next)
            })
            .await?;

        self.after_commit(&[&wallet]).await;
        tracing::info!(%wallet_id, status = %wallet.status, "Wallet status changed");
        Ok(wallet)
    }
}
