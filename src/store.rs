//! Credential persistence contracts and built-in store implementations.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::_prelude::*;

/// Boxed future returned by [`CredentialStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persisted credential document.
///
/// Field names match the credential file layout; every field defaults to the
/// empty string when missing from the document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredCredentials {
	/// Label identifying the API these credentials belong to.
	pub api_name: String,
	/// Long-lived access token.
	pub access_token: String,
	/// Secret paired with the access token.
	pub access_secret: String,
	/// Provider-side display name.
	pub screen_name: String,
	/// Provider-side user identifier.
	pub user_id: String,
	/// Encoded variant of the user identifier.
	pub user_id_encoded: String,
	/// Legacy password field some providers echo back.
	pub user_password: String,
	/// Encoded variant of the password field.
	pub user_password_encoded: String,
}
impl StoredCredentials {
	/// Whether the stored access token and secret are both non-empty.
	pub fn is_authorized(&self) -> bool {
		!self.access_token.is_empty() && !self.access_secret.is_empty()
	}
}

/// Storage backend contract for persisted credentials.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Loads the persisted document, if one exists.
	///
	/// A missing document is `Ok(None)`, never an error; the driver logs it
	/// and proceeds with a fresh session.
	fn load(&self) -> StoreFuture<'_, Option<StoredCredentials>>;

	/// Persists or replaces the credential document.
	fn save(&self, credentials: StoredCredentials) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Persists the credential document to a JSON file after each save.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
}
impl FileStore {
	/// Creates a store rooted at the provided path.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	fn load_document(path: &Path) -> Result<Option<StoredCredentials>, StoreError> {
		if !path.exists() {
			return Ok(None);
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(None);
		}

		serde_json::from_slice(&bytes)
			.map(Some)
			.map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})
	}

	fn persist_document(&self, credentials: &StoredCredentials) -> Result<(), StoreError> {
		if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		let serialized =
			serde_json::to_vec_pretty(credentials).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize credentials: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl CredentialStore for FileStore {
	fn load(&self) -> StoreFuture<'_, Option<StoredCredentials>> {
		Box::pin(async move { Self::load_document(&self.path) })
	}

	fn save(&self, credentials: StoredCredentials) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.persist_document(&credentials) })
	}
}

/// Thread-safe in-process store for tests and demos; counts saves so tests
/// can assert persistence happens exactly once.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<MemoryState>>);
#[derive(Debug, Default)]
struct MemoryState {
	document: Option<StoredCredentials>,
	saves: usize,
}
impl MemoryStore {
	/// Seeds the store with an existing document.
	pub fn with_document(credentials: StoredCredentials) -> Self {
		Self(Arc::new(RwLock::new(MemoryState { document: Some(credentials), saves: 0 })))
	}

	/// Number of completed saves.
	pub fn saves(&self) -> usize {
		self.0.read().saves
	}

	/// Snapshot of the stored document, if any.
	pub fn document(&self) -> Option<StoredCredentials> {
		self.0.read().document.clone()
	}
}
impl CredentialStore for MemoryStore {
	fn load(&self) -> StoreFuture<'_, Option<StoredCredentials>> {
		let state = self.0.clone();

		Box::pin(async move { Ok(state.read().document.clone()) })
	}

	fn save(&self, credentials: StoredCredentials) -> StoreFuture<'_, ()> {
		let state = self.0.clone();

		Box::pin(async move {
			let mut guard = state.write();

			guard.document = Some(credentials);
			guard.saves += 1;

			Ok(())
		})
	}
}
