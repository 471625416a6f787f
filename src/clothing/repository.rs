use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::*;
use uuid::Uuid;

use super::{Clothing, ValidationError};

/// Result of a [`ClothingRepository`] call.
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Failures of a [`ClothingRepository`].
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The tenant id is blank.
    #[error("User ID must not be empty or whitespace")]
    EmptyUserId,

    /// The item id is blank.
    #[error("ID cannot be empty or whitespace")]
    EmptyId,

    /// The tenant has no item with this id.
    #[error("No item exists for id {0}")]
    NotFound(String),

    /// The item names a different owner than the calling tenant.
    #[error("Item belongs to user {found}, not {expected}")]
    UserMismatch {
        /// Calling tenant.
        expected: String,
        /// Owner named by the item.
        found: String,
    },

    /// The item breaks a clothing rule.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Failure of the backing store itself.
    #[error("Storage failure: {0}")]
    Storage(String),
}

/// Tenant-partitioned clothing storage.
///
/// The user id is the partition key: every operation is scoped to the items
/// of that user and can neither see nor touch another user's items. Callers
/// must pass the authenticated subject, never a value taken from the request
/// body or path.
pub trait ClothingRepository: Send + Sync {
    /// Stores a new item under a freshly generated id and returns it.
    fn save(&self, user_id: &str, clothing: Clothing) -> RepositoryResult<Clothing>;

    /// All of the user's items, possibly none.
    fn get_all(&self, user_id: &str) -> RepositoryResult<Vec<Clothing>>;

    /// One of the user's items, or [`RepositoryError::NotFound`].
    fn get_by_id(&self, user_id: &str, id: &str) -> RepositoryResult<Clothing>;

    /// Replaces an existing item. The id is taken from `clothing`.
    fn update(&self, user_id: &str, clothing: Clothing) -> RepositoryResult<Clothing>;

    /// Removes an item. Fails with [`RepositoryError::NotFound`] when the
    /// user has no item with that id.
    fn delete(&self, user_id: &str, id: &str) -> RepositoryResult<()>;

    /// Whether the user has an item with this id.
    fn exists(&self, user_id: &str, id: &str) -> RepositoryResult<bool>;
}

fn require_user_id(user_id: &str) -> RepositoryResult<()> {
    if user_id.trim().is_empty() {
        return Err(RepositoryError::EmptyUserId);
    }
    Ok(())
}

fn require_id(id: &str) -> RepositoryResult<()> {
    if id.trim().is_empty() {
        return Err(RepositoryError::EmptyId);
    }
    Ok(())
}

/// Process-local [`ClothingRepository`], keyed by user id and then item id.
#[derive(Debug, Default)]
pub struct InMemoryClothingRepository {
    tenants: Mutex<HashMap<String, BTreeMap<String, Clothing>>>,
}

impl InMemoryClothingRepository {
    /// An empty repository.
    pub fn new() -> InMemoryClothingRepository {
        InMemoryClothingRepository::default()
    }

    fn tenants(&self) -> MutexGuard<'_, HashMap<String, BTreeMap<String, Clothing>>> {
        // Every mutation is a single map operation, so a poisoned map is
        // still consistent.
        self.tenants.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ClothingRepository for InMemoryClothingRepository {
    fn save(&self, user_id: &str, mut clothing: Clothing) -> RepositoryResult<Clothing> {
        require_user_id(user_id)?;
        clothing.validate()?;

        clothing.id = Uuid::new_v4().to_string();
        clothing.user_id = user_id.to_owned();

        self.tenants()
            .entry(user_id.to_owned())
            .or_default()
            .insert(clothing.id.clone(), clothing.clone());

        debug!(user_id, id = %clothing.id, "Saved clothing item");
        Ok(clothing)
    }

    fn get_all(&self, user_id: &str) -> RepositoryResult<Vec<Clothing>> {
        require_user_id(user_id)?;

        Ok(self
            .tenants()
            .get(user_id)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default())
    }

    fn get_by_id(&self, user_id: &str, id: &str) -> RepositoryResult<Clothing> {
        require_user_id(user_id)?;
        require_id(id)?;

        self.tenants()
            .get(user_id)
            .and_then(|items| items.get(id))
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_owned()))
    }

    fn update(&self, user_id: &str, mut clothing: Clothing) -> RepositoryResult<Clothing> {
        require_user_id(user_id)?;
        require_id(&clothing.id)?;
        clothing.validate()?;

        if clothing.user_id.is_empty() {
            clothing.user_id = user_id.to_owned();
        } else if clothing.user_id != user_id {
            return Err(RepositoryError::UserMismatch {
                expected: user_id.to_owned(),
                found: clothing.user_id,
            });
        }

        let mut tenants = self.tenants();
        let existing = tenants
            .get_mut(user_id)
            .and_then(|items| items.get_mut(&clothing.id))
            .ok_or_else(|| RepositoryError::NotFound(clothing.id.clone()))?;
        *existing = clothing.clone();

        debug!(user_id, id = %clothing.id, "Updated clothing item");
        Ok(clothing)
    }

    fn delete(&self, user_id: &str, id: &str) -> RepositoryResult<()> {
        require_user_id(user_id)?;
        require_id(id)?;

        let mut tenants = self.tenants();
        let items = tenants
            .get_mut(user_id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_owned()))?;
        items
            .remove(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_owned()))?;
        if items.is_empty() {
            tenants.remove(user_id);
        }

        debug!(user_id, id, "Deleted clothing item");
        Ok(())
    }

    fn exists(&self, user_id: &str, id: &str) -> RepositoryResult<bool> {
        require_user_id(user_id)?;
        require_id(id)?;

        Ok(self
            .tenants()
            .get(user_id)
            .is_some_and(|items| items.contains_key(id)))
    }
}
