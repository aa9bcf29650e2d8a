//! Frontend-facing vault operations.
//!
//! Every call folds its outcome into an [`ApiResponse`]; errors become
//! messages and never escape.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use mylife_common::ApiResponse;

use crate::{
    error::{Result, VaultError},
    fernet::FernetCipher,
    traits::Cipher,
    vault::{Vault, VaultStatus},
};

pub struct VaultApi<C: Cipher = FernetCipher> {
    vault: Arc<Vault<C>>,
    min_pin_length: usize,
}

impl VaultApi<FernetCipher> {
    /// Facade over [`Vault::from_config`]. The PIN policy is never looser
    /// than the default.
    pub fn from_config(config: &mylife_config::MyLifeConfig) -> Self {
        let min_pin_length = config
            .vault
            .min_pin_length
            .max(mylife_config::schema::DEFAULT_MIN_PIN_LENGTH);
        Self::new(Arc::new(Vault::from_config(config))).with_min_pin_length(min_pin_length)
    }
}

impl<C: Cipher> VaultApi<C> {
    pub fn new(vault: Arc<Vault<C>>) -> Self {
        Self {
            vault,
            min_pin_length: mylife_config::schema::DEFAULT_MIN_PIN_LENGTH,
        }
    }

    #[must_use]
    pub fn with_min_pin_length(mut self, min_pin_length: usize) -> Self {
        self.min_pin_length = min_pin_length;
        self
    }

    pub fn vault(&self) -> &Arc<Vault<C>> {
        &self.vault
    }

    pub async fn status(&self) -> ApiResponse<VaultStatus> {
        ApiResponse::ok(self.vault.status().await)
    }

    pub async fn setup(&self, pin: &str) -> ApiResponse<String> {
        let result = async {
            if pin.chars().count() < self.min_pin_length {
                return Err(VaultError::PinTooShort {
                    min: self.min_pin_length,
                });
            }
            self.vault.setup(pin).await
        }
        .await;
        respond("setup", result.map(|()| "vault created".to_string()))
    }

    pub async fn unlock(&self, pin: &str) -> ApiResponse<String> {
        let result = self.vault.unlock(pin).await;
        respond("unlock", result.map(|()| "vault unlocked".to_string()))
    }

    pub async fn lock(&self) -> ApiResponse<String> {
        let result = self.vault.lock().await;
        respond("lock", result.map(|()| "vault locked".to_string()))
    }

    /// Returns the quarantined paths.
    pub async fn recover(&self) -> ApiResponse<Vec<PathBuf>> {
        respond("recover", self.vault.recover().await)
    }

    pub async fn emergency_export(&self, dest_dir: &Path) -> ApiResponse<PathBuf> {
        respond(
            "emergency_export",
            self.vault.write_emergency_export(dest_dir).await,
        )
    }
}

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
fn respond<T>(operation: &'static str, result: Result<T>) -> ApiResponse<T> {
    #[cfg(feature = "tracing")]
    {
        if let Err(e) = &result {
            tracing::warn!(operation, error = %e, "vault request failed");
        }
    }
    ApiResponse::from_result(result)
}
