//! Vault state machine: setup, unlock/lock, recovery, blob encryption.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    mylife_common::fs as vfs,
    sqlx::{SqlitePool, migrate::Migrator},
    tokio::fs,
    zeroize::Zeroizing,
};

use crate::{
    error::{Result, VaultError},
    fernet::FernetCipher,
    kdf::{self, KEY_LEN, KdfParams},
    layout::{QUARANTINE_MARKER, VaultLayout},
    schema,
    state::{VaultMode, VaultState},
    traits::Cipher,
};

/// Vault status exposed to the API / frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultStatus {
    pub vault_exists: bool,
    pub is_unlocked: bool,
    pub state: VaultMode,
}

/// PIN-protected encrypted vault.
///
/// Generic over [`Cipher`] but defaults to [`FernetCipher`]. The derived key
/// lives in the shared [`VaultState`] only while UNLOCKED.
pub struct Vault<C: Cipher = FernetCipher> {
    layout: VaultLayout,
    cipher: C,
    kdf: KdfParams,
    state: Arc<VaultState>,
    migrator: &'static Migrator,
}

impl Vault<FernetCipher> {
    /// Create a vault with the default Fernet cipher.
    pub fn new(layout: VaultLayout) -> Self {
        Self::with_cipher(layout, FernetCipher)
    }

    pub fn from_config(config: &mylife_config::MyLifeConfig) -> Self {
        Self::new(VaultLayout::from_config(config)).with_kdf_params(KdfParams::from(&config.vault))
    }
}

impl<C: Cipher> Vault<C> {
    /// Create a vault with a custom cipher.
    pub fn with_cipher(layout: VaultLayout, cipher: C) -> Self {
        Self {
            layout,
            cipher,
            kdf: KdfParams::default(),
            state: Arc::new(VaultState::new()),
            migrator: &schema::MIGRATOR,
        }
    }

    #[must_use]
    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// Share an existing state object instead of a private one.
    #[must_use]
    pub fn with_state(mut self, state: Arc<VaultState>) -> Self {
        self.state = state;
        self
    }

    /// Schema applied to the working database of a new vault.
    #[must_use]
    pub fn with_schema(mut self, migrator: &'static Migrator) -> Self {
        self.migrator = migrator;
        self
    }

    pub fn layout(&self) -> &VaultLayout {
        &self.layout
    }

    pub fn state(&self) -> Arc<VaultState> {
        Arc::clone(&self.state)
    }

    /// A vault exists once its salt has been written.
    pub async fn vault_exists(&self) -> bool {
        vfs::exists(&self.layout.salt()).await
    }

    pub async fn status(&self) -> VaultStatus {
        let mode = self.state.mode().await;
        VaultStatus {
            vault_exists: self.vault_exists().await,
            is_unlocked: mode == VaultMode::Unlocked,
            state: mode,
        }
    }

    /// Create a new vault protected by `pin`. Requires LOCKED and stays
    /// LOCKED.
    pub async fn setup(&self, pin: &str) -> Result<()> {
        let transition = self.state.begin_transition().await;
        match transition.mode().await {
            VaultMode::Locked => {},
            VaultMode::Unlocked => return Err(VaultError::AlreadyUnlocked),
            VaultMode::Unavailable => return Err(VaultError::Unavailable),
        }
        if self.vault_exists().await {
            return Err(VaultError::AlreadyExists);
        }

        self.layout.ensure_dirs().await?;

        let container = self.layout.container();
        if vfs::exists(&container).await {
            // A container without a salt cannot be opened, but is kept.
            quarantine(&container).await?;
        }

        let salt = kdf::generate_salt();
        let key = kdf::derive_key_blocking(
            Zeroizing::new(pin.as_bytes().to_vec()),
            salt.to_vec(),
            self.kdf,
        )
        .await?;

        self.remove_working_files().await?;
        let result = self.seal_empty_database(&key, &salt).await;
        self.remove_working_files().await?;
        result?;

        #[cfg(feature = "tracing")]
        tracing::info!("vault created");

        Ok(())
    }

    async fn seal_empty_database(&self, key: &[u8; KEY_LEN], salt: &[u8]) -> Result<()> {
        let working = self.layout.working_db();
        schema::create_empty(&working, self.migrator).await?;
        let plaintext = Zeroizing::new(fs::read(&working).await?);
        let token = self.cipher.encrypt(key, &plaintext)?;
        // Container first: a crash in between leaves no salt, hence no vault.
        vfs::atomic_write(&self.layout.container(), &token).await?;
        vfs::atomic_write(&self.layout.salt(), salt).await?;
        Ok(())
    }

    /// Derive the key from `pin`, decrypt the container and materialize the
    /// working database.
    ///
    /// A wrong PIN leaves the vault LOCKED with nothing written. Structural
    /// problems (missing salt or container, unreadable files) move the vault
    /// to UNAVAILABLE.
    pub async fn unlock(&self, pin: &str) -> Result<()> {
        let transition = self.state.begin_transition().await;
        match transition.mode().await {
            VaultMode::Locked => {},
            VaultMode::Unlocked => return Err(VaultError::AlreadyUnlocked),
            VaultMode::Unavailable => return Err(VaultError::Unavailable),
        }

        match self.materialize(pin).await {
            Ok(key) => {
                transition
                    .publish_unlocked(key, self.layout.working_db())
                    .await;
                #[cfg(feature = "tracing")]
                tracing::info!("vault unlocked");
                Ok(())
            },
            Err(VaultError::InvalidPin) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("unlock rejected");
                Err(VaultError::InvalidPin)
            },
            Err(e) => {
                transition.publish_unavailable().await;
                #[cfg(feature = "tracing")]
                tracing::error!(error = %e, "unlock failed; vault unavailable");
                Err(e)
            },
        }
    }

    async fn materialize(&self, pin: &str) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        let salt_path = self.layout.salt();
        let container = self.layout.container();
        if !vfs::exists(&salt_path).await {
            return Err(VaultError::NotInitialized);
        }
        if !vfs::exists(&container).await {
            return Err(VaultError::MissingContainer);
        }

        let salt = fs::read(&salt_path).await?;
        let key = kdf::derive_key_blocking(
            Zeroizing::new(pin.as_bytes().to_vec()),
            salt,
            self.kdf,
        )
        .await?;

        let token = fs::read(&container).await?;
        let plaintext = Zeroizing::new(self.cipher.decrypt(&key, &token).map_err(|e| match e {
            VaultError::InvalidToken => VaultError::InvalidPin,
            other => other,
        })?);

        fs::create_dir_all(self.layout.runtime_dir()).await?;
        let working = self.layout.working_db();
        #[cfg(feature = "tracing")]
        {
            if vfs::exists(&working).await {
                tracing::warn!("stale working database replaced by container contents");
            }
        }
        // A leftover rollback journal would be replayed into the fresh file.
        self.remove_working_files().await?;
        vfs::atomic_write(&working, &plaintext).await?;
        Ok(key)
    }

    /// Re-encrypt the working database into the container and delete it.
    ///
    /// Open connections to the working database must be closed first. If the
    /// working database has vanished the vault moves to UNAVAILABLE; any
    /// other failure leaves it UNLOCKED so the lock can be retried.
    pub async fn lock(&self) -> Result<()> {
        let transition = self.state.begin_transition().await;
        if transition.mode().await != VaultMode::Unlocked {
            return Err(VaultError::NotUnlocked);
        }

        let working = self.layout.working_db();
        if !vfs::exists(&working).await {
            transition.publish_unavailable().await;
            #[cfg(feature = "tracing")]
            tracing::error!("working database missing at lock; vault unavailable");
            return Err(VaultError::MissingWorkingDatabase);
        }

        let plaintext = Zeroizing::new(fs::read(&working).await?);
        let token = transition
            .with_key(|key| self.cipher.encrypt(key, &plaintext))
            .await?;
        vfs::atomic_write(&self.layout.container(), &token).await?;

        // The container now holds the final bytes; the plaintext can go.
        self.remove_working_files().await?;
        transition.publish_locked().await;

        #[cfg(feature = "tracing")]
        tracing::info!(bytes = token.len(), "vault locked");

        Ok(())
    }

    /// Quarantine the container and salt, delete any working database and
    /// return to LOCKED so a fresh `setup` or an import can follow.
    ///
    /// Returns the quarantine paths. Works from any mode.
    pub async fn recover(&self) -> Result<Vec<PathBuf>> {
        let transition = self.state.begin_transition().await;
        let mut quarantined = Vec::new();
        for path in [self.layout.container(), self.layout.salt()] {
            if vfs::exists(&path).await {
                quarantined.push(quarantine(&path).await?);
            }
        }
        self.remove_working_files().await?;
        transition.publish_locked().await;

        #[cfg(feature = "tracing")]
        tracing::warn!(files = quarantined.len(), "vault recovered; previous files quarantined");

        Ok(quarantined)
    }

    /// Encrypt an opaque blob under the vault key. Requires UNLOCKED.
    pub async fn encrypt_blob(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.state
            .with_key(|key| self.cipher.encrypt(key, plaintext))
            .await
    }

    /// Decrypt a blob produced by [`encrypt_blob`](Self::encrypt_blob).
    pub async fn decrypt_blob(&self, token: &[u8]) -> Result<Vec<u8>> {
        self.state
            .with_key(|key| self.cipher.decrypt(key, token))
            .await
    }

    /// Path of the working database. Requires UNLOCKED.
    pub async fn working_database(&self) -> Result<PathBuf> {
        self.state.require_unlocked().await
    }

    /// Connection pool on the working database. Requires UNLOCKED.
    ///
    /// Close the pool before calling [`lock`](Self::lock).
    pub async fn connect_working_db(&self) -> Result<SqlitePool> {
        let path = self.working_database().await?;
        schema::connect(&path).await
    }

    async fn remove_working_files(&self) -> Result<()> {
        vfs::remove_if_exists(&self.layout.working_db()).await?;
        for sidecar in self.layout.working_db_sidecars() {
            vfs::remove_if_exists(&sidecar).await?;
        }
        Ok(())
    }
}

/// Rename `path` to `<name>.corrupt.<timestamp>` next to it.
async fn quarantine(path: &Path) -> Result<PathBuf> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = vfs::timestamp_suffix(chrono::Utc::now());
    let target = vfs::unused_path(dir, &format!("{name}{QUARANTINE_MARKER}{stamp}"), "").await;
    fs::rename(path, &target).await?;

    #[cfg(feature = "tracing")]
    tracing::warn!(from = %path.display(), to = %target.display(), "file quarantined");

    Ok(target)
}
