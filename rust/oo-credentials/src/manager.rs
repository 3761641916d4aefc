//! Persistence of the principal's key pair under a home directory.

use std::path::{Path, PathBuf};

use base58::{FromBase58, ToBase58};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{KeyManagerError, KeyPair, PublicKey};

const KEY_FILE: &str = "key";

/// On-disk form of a key pair.
#[derive(Serialize, Deserialize)]
struct KeyRecord {
    public: PublicKey,
    private: String,
}

/// Loads, creates and stores the principal's key pair.
///
/// The pair lives in a single JSON file named `key` inside the home
/// directory, readable only by its owner. Two processes creating the pair
/// at the same time race; the last writer wins.
#[derive(Debug, Clone)]
pub struct KeyManager {
    home: PathBuf,
}

impl KeyManager {
    /// A manager rooted at `home`. Nothing is touched until a key is needed.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// The directory holding the key file.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Path of the persisted key record.
    pub fn key_path(&self) -> PathBuf {
        self.home.join(KEY_FILE)
    }

    /// Load the persisted key pair, if there is one.
    ///
    /// # Errors
    ///
    /// Fails when the record exists but cannot be read or decoded.
    #[tracing::instrument(level = "debug", skip(self), fields(path = ?self.key_path()))]
    pub async fn load(&self) -> Result<Option<KeyPair>, KeyManagerError> {
        let path = self.key_path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(KeyManagerError::Io { path, source }),
        };

        let record: KeyRecord = serde_json::from_slice(&bytes)
            .map_err(|error| KeyManagerError::Decode(error.to_string()))?;
        let seed = Zeroizing::new(
            record
                .private
                .from_base58()
                .map_err(|_| KeyManagerError::Decode("private key is not base58".into()))?,
        );
        let key_pair = KeyPair::from_seed_slice(&seed)?;

        if key_pair.public_key() != record.public {
            return Err(KeyManagerError::Decode(
                "public key does not match private key".into(),
            ));
        }

        Ok(Some(key_pair))
    }

    /// Load the persisted key pair, generating and persisting one if absent.
    ///
    /// # Errors
    ///
    /// Fails on I/O, decoding or RNG failure.
    pub async fn load_or_create(&self) -> Result<KeyPair, KeyManagerError> {
        if let Some(key_pair) = self.load().await? {
            return Ok(key_pair);
        }
        let key_pair = KeyPair::generate()?;
        self.save(&key_pair).await?;
        tracing::info!(public_key = %key_pair.public_key(), "created key pair");
        Ok(key_pair)
    }

    /// Generate and persist a new key pair.
    ///
    /// # Errors
    ///
    /// [`KeyManagerError::Exists`] when a key file is already present and
    /// `overwrite` is `false`.
    pub async fn create(&self, overwrite: bool) -> Result<KeyPair, KeyManagerError> {
        let path = self.key_path();
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|source| KeyManagerError::Io {
                path: path.clone(),
                source,
            })?;
        if exists && !overwrite {
            return Err(KeyManagerError::Exists(path));
        }

        let key_pair = KeyPair::generate()?;
        self.save(&key_pair).await?;
        tracing::info!(public_key = %key_pair.public_key(), overwrite, "created key pair");
        Ok(key_pair)
    }

    /// The public key of the persisted pair, creating the pair if needed.
    ///
    /// # Errors
    ///
    /// See [`KeyManager::load_or_create`].
    pub async fn public_key(&self) -> Result<PublicKey, KeyManagerError> {
        Ok(self.load_or_create().await?.public_key())
    }

    async fn save(&self, key_pair: &KeyPair) -> Result<(), KeyManagerError> {
        tokio::fs::create_dir_all(&self.home)
            .await
            .map_err(|source| KeyManagerError::Io {
                path: self.home.clone(),
                source,
            })?;
        restrict(&self.home, 0o700).await?;

        let record = KeyRecord {
            public: key_pair.public_key(),
            private: key_pair.seed().to_base58(),
        };
        let bytes = Zeroizing::new(
            serde_json::to_vec(&record)
                .map_err(|error| KeyManagerError::Decode(error.to_string()))?,
        );

        let path = self.key_path();
        write_private(&path, &bytes).await
    }
}

#[cfg(unix)]
async fn restrict(path: &Path, mode: u32) -> Result<(), KeyManagerError> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|source| KeyManagerError::Io {
            path: path.to_owned(),
            source,
        })
}

#[cfg(not(unix))]
async fn restrict(_path: &Path, _mode: u32) -> Result<(), KeyManagerError> {
    Ok(())
}

async fn write_private(path: &Path, bytes: &[u8]) -> Result<(), KeyManagerError> {
    use tokio::io::AsyncWriteExt;

    let io_error = |source| KeyManagerError::Io {
        path: path.to_owned(),
        source,
    };

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await.map_err(io_error)?;
    file.write_all(bytes).await.map_err(io_error)?;
    file.flush().await.map_err(io_error)?;
    drop(file);

    // An existing file keeps its old mode when truncated.
    restrict(path, 0o600).await
}
