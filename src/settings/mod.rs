#[cfg(test)]
pub mod memory;
pub mod sqlite;

#[cfg(test)]
pub use memory::InMemorySettingsStore;
pub use sqlite::SqliteSettingsStore;

use chrono::{DateTime, Duration, Months, Utc};
use secrecy::SecretString;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::crypto::{CredentialCipher, CryptoError};

/// How long a saved credential stays valid when no expiry is given.
const DEFAULT_EXPIRY_MONTHS: u32 = 6;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Settings database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to prepare settings database: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid timestamp in settings database: {0}")]
    Timestamp(String),

    #[error("Settings store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Persistence seam for per-user settings. Implementations only move rows;
/// they never see plaintext credentials.
pub trait SettingsStore: Send + Sync {
    fn find(&self, user_email: &str) -> Result<Option<SettingsRecord>, StoreError>;

    /// Insert the record, or replace the row with the same user email.
    fn upsert(&self, record: &SettingsRecord) -> Result<(), StoreError>;

    /// Returns whether a row was removed.
    fn delete(&self, user_email: &str) -> Result<bool, StoreError>;
}

/// Which of the two per-user credentials a value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    GeminiApiKey,
    GithubPat,
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialKind::GeminiApiKey => write!(f, "Gemini API key"),
            CredentialKind::GithubPat => write!(f, "GitHub token"),
        }
    }
}

/// One encrypted credential as persisted for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredential {
    pub user_identifier: String,
    /// base64 of IV || ciphertext || tag
    pub cipher_blob: String,
    /// `None` never expires
    pub expires_at: Option<DateTime<Utc>>,
}

/// A `user_settings` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsRecord {
    pub id: String,
    pub user_email: String,
    pub gemini_api_key: Option<String>,
    pub github_pat_token: Option<String>,
    pub gemini_key_expires_at: Option<DateTime<Utc>>,
    pub github_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SettingsRecord {
    pub fn empty(user_email: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_email: user_email.to_string(),
            gemini_api_key: None,
            github_pat_token: None,
            gemini_key_expires_at: None,
            github_token_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn credential(&self, kind: CredentialKind) -> Option<StoredCredential> {
        let (blob, expires_at) = match kind {
            CredentialKind::GeminiApiKey => (&self.gemini_api_key, self.gemini_key_expires_at),
            CredentialKind::GithubPat => (&self.github_pat_token, self.github_token_expires_at),
        };
        blob.as_ref().filter(|b| !b.is_empty()).map(|b| StoredCredential {
            user_identifier: self.user_email.clone(),
            cipher_blob: b.clone(),
            expires_at,
        })
    }

    fn set_credential(&mut self, kind: CredentialKind, blob: Option<String>, expires_at: Option<DateTime<Utc>>) {
        match kind {
            CredentialKind::GeminiApiKey => {
                self.gemini_api_key = blob;
                self.gemini_key_expires_at = expires_at;
            }
            CredentialKind::GithubPat => {
                self.github_pat_token = blob;
                self.github_token_expires_at = expires_at;
            }
        }
    }
}

/// Decrypted view of a user's settings. `None` means no usable credential,
/// whether it was never set, has expired, or failed to decrypt.
#[derive(Debug, Default)]
pub struct UserSettings {
    pub gemini_api_key: Option<SecretString>,
    pub github_pat_token: Option<SecretString>,
    pub gemini_key_expires_at: Option<DateTime<Utc>>,
    pub github_token_expires_at: Option<DateTime<Utc>>,
}

/// Requested changes to a user's settings.
///
/// For each credential: `None` keeps what is stored, `Some("")` clears it,
/// anything else replaces it.
#[derive(Debug, Default)]
pub struct SettingsUpdate {
    pub gemini_api_key: Option<String>,
    pub github_pat_token: Option<String>,
    pub gemini_key_expires_at: Option<DateTime<Utc>>,
    pub github_token_expires_at: Option<DateTime<Utc>>,
}

/// Absent expiry never expires.
pub fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_some_and(|at| now > at)
}

pub fn default_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_add_months(Months::new(DEFAULT_EXPIRY_MONTHS))
        .unwrap_or(now + Duration::days(183))
}

/// Encrypts credentials on the way into a [`SettingsStore`] and decrypts
/// them on the way out.
pub struct SettingsService<S> {
    store: S,
    cipher: CredentialCipher,
}

impl<S: SettingsStore> SettingsService<S> {
    pub fn new(store: S, cipher: CredentialCipher) -> Self {
        Self { store, cipher }
    }

    /// Load and decrypt a user's settings. Store failures are logged and
    /// read as "nothing configured".
    pub fn load(&self, user_email: &str) -> UserSettings {
        self.load_at(user_email, Utc::now())
    }

    #[instrument(skip(self))]
    pub fn load_at(&self, user_email: &str, now: DateTime<Utc>) -> UserSettings {
        let record = match self.store.find(user_email) {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("no settings stored for user");
                return UserSettings::default();
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch user settings");
                return UserSettings::default();
            }
        };

        UserSettings {
            gemini_api_key: self.open(&record, CredentialKind::GeminiApiKey, now),
            github_pat_token: self.open(&record, CredentialKind::GithubPat, now),
            gemini_key_expires_at: record.gemini_key_expires_at,
            github_token_expires_at: record.github_token_expires_at,
        }
    }

    fn open(&self, record: &SettingsRecord, kind: CredentialKind, now: DateTime<Utc>) -> Option<SecretString> {
        let stored = record.credential(kind)?;
        if is_expired(stored.expires_at, now) {
            debug!(credential = %kind, "stored credential has expired");
            return None;
        }
        let plaintext = self.cipher.decrypt(&stored.cipher_blob, &stored.user_identifier);
        if plaintext.is_empty() {
            debug!(credential = %kind, "stored credential is unusable");
            return None;
        }
        Some(SecretString::from(plaintext))
    }

    pub fn save(&self, user_email: &str, update: SettingsUpdate) -> Result<(), SettingsError> {
        self.save_at(user_email, update, Utc::now())
    }

    /// Encrypt and persist the requested changes. Every credential is
    /// encrypted before anything is written, so a rejected credential leaves
    /// the stored row untouched.
    #[instrument(skip(self, update))]
    pub fn save_at(&self, user_email: &str, update: SettingsUpdate, now: DateTime<Utc>) -> Result<(), SettingsError> {
        let mut record = self
            .store
            .find(user_email)?
            .unwrap_or_else(|| SettingsRecord::empty(user_email, now));

        let changes = [
            (CredentialKind::GeminiApiKey, update.gemini_api_key, update.gemini_key_expires_at),
            (CredentialKind::GithubPat, update.github_pat_token, update.github_token_expires_at),
        ];

        let mut sealed = Vec::new();
        for (kind, value, expires_at) in changes {
            let Some(value) = value else {
                continue;
            };
            if value.trim().is_empty() {
                sealed.push((kind, None, None));
            } else {
                let blob = self.cipher.encrypt(&value, user_email)?;
                sealed.push((kind, Some(blob), Some(expires_at.unwrap_or_else(|| default_expiry(now)))));
            }
        }

        for (kind, blob, expires_at) in sealed {
            debug!(credential = %kind, cleared = blob.is_none(), "updating credential");
            record.set_credential(kind, blob, expires_at);
        }
        record.updated_at = now;
        self.store.upsert(&record)?;
        Ok(())
    }

    /// Insert an empty settings row if the user has none yet.
    /// Returns whether a row was created.
    pub fn create_empty(&self, user_email: &str) -> Result<bool, SettingsError> {
        if self.store.find(user_email)?.is_some() {
            return Ok(false);
        }
        self.store.upsert(&SettingsRecord::empty(user_email, Utc::now()))?;
        Ok(true)
    }

    pub fn clear(&self, user_email: &str) -> Result<bool, SettingsError> {
        Ok(self.store.delete(user_email)?)
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }
}
