use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use parking_lot::RwLock;

use crate::{Error, util::random_urlsafe_string};

use super::store::{CredentialStore, TokenAuthority};

pub const DEFAULT_TOKEN_SIZE: usize = 30;
/// Fewest random bytes a token may carry.
pub const MIN_TOKEN_SIZE: usize = 16;

/// Volatile `token -> owner` registry. Tokens are only handed out for credentials
/// the attached [`CredentialStore`] accepts.
pub struct TokenManager {
    admin_secret: String,
    token_size: usize,
    store: Arc<CredentialStore>,
    tokens: RwLock<HashMap<String, String>>,
}

impl TokenManager {
    pub fn new(admin_secret: impl Into<String>, store: Arc<CredentialStore>) -> Arc<Self> {
        Self::with_token_size(admin_secret, store, DEFAULT_TOKEN_SIZE)
    }

    /// Builds a manager whose tokens carry `token_size` random bytes (never fewer than
    /// [`MIN_TOKEN_SIZE`]), and attaches it to `store`, replacing any manager attached
    /// before.
    pub fn with_token_size(
        admin_secret: impl Into<String>,
        store: Arc<CredentialStore>,
        token_size: usize,
    ) -> Arc<Self> {
        if token_size < MIN_TOKEN_SIZE {
            warn!(
                "token size {} is below the minimum, using {} bytes",
                token_size, MIN_TOKEN_SIZE
            );
        }
        let manager = Arc::new(Self {
            admin_secret: admin_secret.into(),
            token_size: token_size.max(MIN_TOKEN_SIZE),
            store,
            tokens: RwLock::new(HashMap::new()),
        });
        let authority = Arc::downgrade(&manager) as Weak<dyn TokenAuthority>;
        manager.store.attach(authority);
        manager
    }

    pub fn admin_secret(&self) -> &str {
        &self.admin_secret
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn issue(&self, username: &str, password_hash: &str) -> Result<String, Error> {
        let token = self.store.while_verified(password_hash, username, || {
            let mut tokens = self.tokens.write();
            let token = loop {
                let candidate = random_urlsafe_string(self.token_size);
                if !tokens.contains_key(&candidate) {
                    break candidate;
                }
            };
            tokens.insert(token.clone(), username.to_owned());
            token
        });

        match token {
            Some(token) => {
                debug!(user = username, "token issued");
                Ok(token)
            }
            None => {
                warn!("Reject to create new token for user \"{}\"", username);
                Err(Error::unauthorized(username, "invalid password hash"))
            }
        }
    }

    pub fn owner_of(&self, token: &str) -> Result<String, Error> {
        self.tokens
            .read()
            .get(token)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Token #{token}")))
    }

    pub fn revoke_owner(&self, username: &str) -> usize {
        let mut tokens = self.tokens.write();
        let before = tokens.len();
        tokens.retain(|_, owner| owner != username);
        before - tokens.len()
    }

    pub fn revoke_token(&self, token: &str) -> bool {
        self.tokens.write().remove(token).is_some()
    }

    pub fn reset(&self) {
        let mut tokens = self.tokens.write();
        if !tokens.is_empty() {
            info!(revoked = tokens.len(), "dropping all tokens");
        }
        tokens.clear();
    }

    pub fn token_size(&self) -> usize {
        self.token_size
    }

    pub fn len(&self) -> usize {
        self.tokens.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.read().is_empty()
    }
}

impl TokenAuthority for TokenManager {
    fn admin_secret(&self) -> &str {
        &self.admin_secret
    }

    fn revoke_owner(&self, username: &str) -> usize {
        TokenManager::revoke_owner(self, username)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::auth::ADMIN;

    const ADMIN_TOKEN: &str = "test_admin_token";
    const WRONG_TOKEN: &str = "this_token_should_not_exists";
    const USER1: &str = "test_user1";
    const USER2: &str = "test_user2";
    const HASH1: &str = "test_user1_hash";
    const HASH2: &str = "test_user2_hash";
    const WRONG_HASH1: &str = "test_user1_hash_but_wrong";

    fn open_manager() -> (TempDir, Arc<TokenManager>) {
        let workspace = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(workspace.path().join("dbfile.json")).unwrap();
        let manager = TokenManager::new(ADMIN_TOKEN, Arc::new(store));
        (workspace, manager)
    }

    #[test]
    fn creation_attaches_to_store() {
        let (_workspace, manager) = open_manager();
        assert_eq!(manager.admin_secret(), ADMIN_TOKEN);
        assert!(manager.is_empty());
        assert!(manager.store().verify(ADMIN_TOKEN, ADMIN));
        assert!(!manager.store().verify(WRONG_TOKEN, ADMIN));
    }

    #[test]
    fn second_manager_replaces_first() {
        let (_workspace, first) = open_manager();
        let second = TokenManager::new("another_admin_token", first.store().clone());
        assert!(!first.store().verify(ADMIN_TOKEN, ADMIN));
        assert!(second.store().verify("another_admin_token", ADMIN));
    }

    #[test]
    fn issue_token() {
        let (_workspace, manager) = open_manager();
        manager.store().create(USER1, HASH1).unwrap();

        let token = manager.issue(USER1, HASH1).unwrap();
        assert_eq!(manager.owner_of(&token).unwrap(), USER1);
        assert_eq!(token.len(), 40);
    }

    #[test]
    fn token_size_is_clamped_to_minimum() {
        let workspace = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(workspace.path().join("dbfile.json")).unwrap();
        let manager = TokenManager::with_token_size(ADMIN_TOKEN, Arc::new(store), 0);
        assert_eq!(manager.token_size(), MIN_TOKEN_SIZE);
        manager.store().create(USER1, HASH1).unwrap();

        let first = manager.issue(USER1, HASH1).unwrap();
        let second = manager.issue(USER1, HASH1).unwrap();
        assert_eq!(first.len(), 22);
        assert_ne!(first, second);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn issue_racing_remove_leaves_no_token() {
        for _ in 0..20 {
            let (_workspace, manager) = open_manager();
            manager.store().create(USER1, HASH1).unwrap();

            let issuer = {
                let manager = manager.clone();
                std::thread::spawn(move || {
                    let mut issued = 0;
                    while manager.issue(USER1, HASH1).is_ok() {
                        issued += 1;
                    }
                    issued
                })
            };
            std::thread::yield_now();
            manager.store().remove(USER1).unwrap();
            issuer.join().unwrap();

            assert!(!manager.store().exists(USER1));
            assert_eq!(manager.revoke_owner(USER1), 0);
            assert!(manager.is_empty());
        }
    }

    #[test]
    fn issue_token_with_wrong_hash() {
        let (_workspace, manager) = open_manager();
        manager.store().create(USER1, HASH1).unwrap();

        let err = manager.issue(USER1, WRONG_HASH1).unwrap_err();
        assert!(matches!(err, Error::Unauthorized { ref user, .. } if user == USER1));
        assert_eq!(
            err.to_string(),
            format!("Authorization error for user \"{USER1}\": invalid password hash")
        );
        assert!(manager.is_empty());
    }

    #[test]
    fn issue_token_for_unknown_user() {
        let (_workspace, manager) = open_manager();
        let err = manager.issue(USER1, HASH1).unwrap_err();
        assert!(matches!(err, Error::Unauthorized { .. }));
        assert!(manager.is_empty());
    }

    #[test]
    fn issue_admin_token() {
        let (_workspace, manager) = open_manager();
        let token = manager.issue(ADMIN, ADMIN_TOKEN).unwrap();
        assert_eq!(manager.owner_of(&token).unwrap(), ADMIN);
        assert!(manager.issue(ADMIN, HASH1).is_err());
    }

    #[test]
    fn owner_of_unknown_token() {
        let (_workspace, manager) = open_manager();
        let err = manager.owner_of(WRONG_TOKEN).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn tokens_are_unique_per_issue() {
        let (_workspace, manager) = open_manager();
        manager.store().create(USER1, HASH1).unwrap();

        let first = manager.issue(USER1, HASH1).unwrap();
        let second = manager.issue(USER1, HASH1).unwrap();
        assert_ne!(first, second);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn revoke_token_is_idempotent() {
        let (_workspace, manager) = open_manager();
        manager.store().create(USER1, HASH1).unwrap();
        let token = manager.issue(USER1, HASH1).unwrap();

        assert!(manager.revoke_token(&token));
        assert!(!manager.revoke_token(&token));
        assert!(!manager.revoke_token(WRONG_TOKEN));
        assert!(manager.owner_of(&token).is_err());
    }

    #[test]
    fn revoke_owner_drops_every_token_of_user() {
        let (_workspace, manager) = open_manager();
        manager.store().create(USER1, HASH1).unwrap();
        manager.store().create(USER2, HASH2).unwrap();
        let first = manager.issue(USER1, HASH1).unwrap();
        let second = manager.issue(USER1, HASH1).unwrap();
        let other = manager.issue(USER2, HASH2).unwrap();

        assert_eq!(manager.revoke_owner(USER1), 2);
        assert!(manager.owner_of(&first).is_err());
        assert!(manager.owner_of(&second).is_err());
        assert_eq!(manager.owner_of(&other).unwrap(), USER2);
        assert_eq!(manager.revoke_owner(USER1), 0);
    }

    #[test]
    fn reset_is_idempotent() {
        let (_workspace, manager) = open_manager();
        manager.store().create(USER1, HASH1).unwrap();
        let token = manager.issue(USER1, HASH1).unwrap();

        manager.reset();
        assert!(manager.is_empty());
        manager.reset();
        assert!(manager.is_empty());
        assert!(manager.owner_of(&token).is_err());
    }

    #[test]
    fn removing_user_revokes_tokens() {
        let (_workspace, manager) = open_manager();
        manager.store().create(USER1, HASH1).unwrap();
        let first = manager.issue(USER1, HASH1).unwrap();
        let second = manager.issue(USER1, HASH1).unwrap();

        manager.store().remove(USER1).unwrap();
        assert!(matches!(manager.owner_of(&first), Err(Error::NotFound(_))));
        assert!(matches!(manager.owner_of(&second), Err(Error::NotFound(_))));
        assert!(manager.is_empty());
    }

    #[test]
    fn alice_session_lifecycle() {
        let workspace = tempfile::tempdir().unwrap();
        let path = workspace.path().join("users.json");
        let store = Arc::new(CredentialStore::open(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
        let manager = TokenManager::new(ADMIN_TOKEN, store.clone());

        store.create("alice", "h1").unwrap();
        assert!(store.exists("alice"));
        let token = manager.issue("alice", "h1").unwrap();
        assert_eq!(manager.owner_of(&token).unwrap(), "alice");

        store.remove("alice").unwrap();
        assert!(matches!(manager.owner_of(&token), Err(Error::NotFound(_))));
        assert!(!store.exists("alice"));
    }
}
