use std::{
    path::{Path, PathBuf},
    sync::{Arc, Weak},
};

use parking_lot::RwLock;

use crate::Error;

use super::{
    ADMIN,
    credential::{self, Users},
};

/// The capabilities a credential store needs from the token manager attached to it.
pub trait TokenAuthority: Send + Sync {
    fn admin_secret(&self) -> &str;

    /// Drops every token owned by `username`, returning how many there were.
    fn revoke_owner(&self, username: &str) -> usize;
}

/// Durable `username -> password hash` registry backed by a JSON file.
///
/// Every mutation rewrites the whole file while holding the write lock. When a
/// [`TokenAuthority`] is attached, the lock is also held across the token cascade
/// on removal, so store-then-manager is the only lock order.
pub struct CredentialStore {
    path: PathBuf,
    users: RwLock<Users>,
    authority: RwLock<Option<Weak<dyn TokenAuthority>>>,
}

impl CredentialStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let users = credential::load_or_initialize(&path)?;
        debug!(path = %path.display(), users = users.len(), "credential store loaded");
        Ok(Self {
            path,
            users: RwLock::new(users),
            authority: RwLock::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    pub(crate) fn attach(&self, authority: Weak<dyn TokenAuthority>) {
        let mut slot = self.authority.write();
        if slot.as_ref().is_some_and(|current| current.strong_count() > 0) {
            warn!("replacing the token manager attached to {}", self.path.display());
        }
        *slot = Some(authority);
    }

    pub fn create(&self, username: &str, password_hash: &str) -> Result<(), Error> {
        let mut users = self.users.write();
        if username == ADMIN || users.contains_key(username) {
            return Err(Error::AlreadyExists(format!("User \"{username}\"")));
        }
        self.persist_with(&mut users, |users| {
            users.insert(username.to_owned(), password_hash.to_owned());
        })?;
        info!(user = username, "user created");
        Ok(())
    }

    pub fn remove(&self, username: &str) -> Result<(), Error> {
        let mut users = self.users.write();
        if !users.contains_key(username) {
            return Err(Error::NotFound(format!("User \"{username}\"")));
        }
        self.persist_with(&mut users, |users| {
            users.remove(username);
        })?;
        info!(user = username, "user removed");

        if let Some(authority) = self.authority() {
            let revoked = authority.revoke_owner(username);
            if revoked > 0 {
                debug!(user = username, revoked, "revoked tokens of removed user");
            }
        }
        Ok(())
    }

    pub fn change_credential(&self, username: &str, new_password_hash: &str) -> Result<(), Error> {
        let mut users = self.users.write();
        if !users.contains_key(username) {
            return Err(Error::NotFound(format!("User \"{username}\"")));
        }
        self.persist_with(&mut users, |users| {
            users.insert(username.to_owned(), new_password_hash.to_owned());
        })?;
        info!(user = username, "password hash changed");
        Ok(())
    }

    pub fn exists(&self, username: &str) -> bool {
        username == ADMIN || self.users.read().contains_key(username)
    }

    pub fn verify(&self, password_hash: &str, username: &str) -> bool {
        let users = self.users.read();
        self.verify_locked(&users, password_hash, username)
    }

    /// Runs `f` only if the credential is valid, keeping the user mapping read-locked
    /// until `f` returns. A concurrent removal of `username` is therefore ordered
    /// entirely before or entirely after `f`.
    pub(crate) fn while_verified<T>(
        &self,
        password_hash: &str,
        username: &str,
        f: impl FnOnce() -> T,
    ) -> Option<T> {
        let users = self.users.read();
        self.verify_locked(&users, password_hash, username).then(f)
    }

    fn verify_locked(&self, users: &Users, password_hash: &str, username: &str) -> bool {
        if username == ADMIN {
            return self.authority().is_some_and(|authority| {
                credential::matches(authority.admin_secret(), password_hash)
            });
        }
        users
            .get(username)
            .is_some_and(|stored| credential::matches(stored, password_hash))
    }

    fn authority(&self) -> Option<Arc<dyn TokenAuthority>> {
        self.authority.read().as_ref().and_then(Weak::upgrade)
    }

    /// Applies `change` to a copy of `users` and swaps it in only once the copy has
    /// been written out.
    fn persist_with(&self, users: &mut Users, change: impl FnOnce(&mut Users)) -> Result<(), Error> {
        let mut next = users.clone();
        change(&mut next);
        credential::commit(&self.path, &next)?;
        *users = next;
        Ok(())
    }
}
