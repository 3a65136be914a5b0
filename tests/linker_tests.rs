//! Account linking scenarios
//!
//! Each test wires an `AccountLinker` over in-memory stores and a fixed-pool
//! key source, then checks user/mapping counts and key consumption.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use short_keygen::Error;
use short_keygen::account::{AccountLinker, LinkOutcome};
use short_keygen::entity::{Key, SsoUser, User};
use short_keygen::keygen::{InMemoryKeySource, KeyGenerator};
use short_keygen::store::{
    AccountMappingStore, FileAccountStore, InMemoryAccountMappingStore, InMemoryUserStore,
    UserStore,
};
use tokio::sync::Barrier;

struct Fixture {
    linker: AccountLinker,
    source: Arc<InMemoryKeySource>,
    users: Arc<InMemoryUserStore>,
    mappings: Arc<InMemoryAccountMappingStore>,
}

async fn fixture(
    keys: &[&str],
    users: Vec<User>,
    mappings: Vec<(SsoUser, User)>,
) -> Fixture {
    let source = Arc::new(InMemoryKeySource::new(keys.iter().copied().map(Key::from)));
    let generator = Arc::new(KeyGenerator::new(1, source.clone()).await.unwrap());
    let users = Arc::new(InMemoryUserStore::with_users(users));
    let mappings = Arc::new(InMemoryAccountMappingStore::with_mappings(mappings).unwrap());
    let linker = AccountLinker::new(generator, users.clone(), mappings.clone());
    Fixture {
        linker,
        source,
        users,
        mappings,
    }
}

fn user(id: &str, email: &str, name: &str) -> User {
    User {
        id: Key::from(id),
        email: email.to_string(),
        name: name.to_string(),
    }
}

#[tokio::test]
async fn unknown_identity_is_not_linked() {
    let f = fixture(&["k1"], vec![], vec![]).await;
    let alpha = SsoUser::new("alpha", "alpha@example.com", "Alpha User");

    assert!(!f.linker.is_account_linked(&alpha).await.unwrap());
}

#[tokio::test]
async fn mapped_identity_is_linked() {
    let alpha = SsoUser::new("alpha", "alpha@example.com", "Alpha User");
    let f = fixture(
        &["k1"],
        vec![],
        vec![(alpha.clone(), user("beta", "beta@example.com", "Beta"))],
    )
    .await;

    assert!(f.linker.is_account_linked(&alpha).await.unwrap());
}

#[tokio::test]
async fn new_identity_gets_a_new_account() {
    // GIVEN: empty stores
    let f = fixture(&["k1", "k2"], vec![], vec![]).await;
    let alpha = SsoUser::new("alpha", "a@x.com", "Alpha");

    // WHEN: linking alpha
    let outcome = f.linker.create_and_link_account(&alpha).await.unwrap();

    // THEN: one user with the dispensed key, one mapping, alpha now linked
    assert_eq!(outcome, LinkOutcome::Created(user("k1", "a@x.com", "Alpha")));
    assert_eq!(f.users.len(), 1);
    assert_eq!(f.mappings.len(), 1);
    assert!(f.mappings.is_linked_to("alpha", &Key::from("k1")));
    assert!(f.linker.is_account_linked(&alpha).await.unwrap());
}

#[tokio::test]
async fn existing_email_reuses_account_without_drawing_a_key() {
    // GIVEN: u1 already owns a@x.com
    let f = fixture(&["k1", "k2"], vec![user("u1", "a@x.com", "Original")], vec![]).await;
    let calls_before = f.source.fetch_calls();
    let beta = SsoUser::new("beta", "a@x.com", "Beta");

    // WHEN: beta signs in with the same email
    let outcome = f.linker.create_and_link_account(&beta).await.unwrap();

    // THEN: no new user, mapping beta -> u1, key generator untouched
    assert_eq!(
        outcome,
        LinkOutcome::LinkedExisting(user("u1", "a@x.com", "Original"))
    );
    assert_eq!(f.users.len(), 1);
    assert!(f.mappings.is_linked_to("beta", &Key::from("u1")));
    assert_eq!(f.source.fetch_calls(), calls_before);
    assert_eq!(f.source.remaining(), 1);
}

#[tokio::test]
async fn already_linked_identity_is_a_no_op() {
    // GIVEN: gamma is mapped to alpha
    let gamma = SsoUser::new("gamma", "", "");
    let alpha = user("alpha", "", "");
    let f = fixture(&["k1"], vec![alpha.clone()], vec![(gamma.clone(), alpha.clone())]).await;

    // WHEN: linking gamma again
    let outcome = f.linker.create_and_link_account(&gamma).await.unwrap();

    // THEN: nothing written
    assert_eq!(outcome, LinkOutcome::AlreadyLinked(alpha));
    assert_eq!(f.users.len(), 1);
    assert_eq!(f.mappings.len(), 1);
}

#[tokio::test]
async fn repeated_linking_is_idempotent() {
    let f = fixture(&["k1", "k2"], vec![], vec![]).await;
    let alpha = SsoUser::new("alpha", "a@x.com", "Alpha");

    let first = f.linker.create_and_link_account(&alpha).await.unwrap();
    let second = f.linker.create_and_link_account(&alpha).await.unwrap();

    assert!(first.is_new_account());
    assert_eq!(second, LinkOutcome::AlreadyLinked(first.into_user()));
    assert_eq!(f.users.len(), 1);
    assert_eq!(f.mappings.len(), 1);
}

#[tokio::test]
async fn key_failure_writes_nothing() {
    // GIVEN: the generator's buffer is drained and the pool is empty
    let f = fixture(&["k1"], vec![], vec![]).await;
    f.linker
        .create_and_link_account(&SsoUser::new("first", "first@x.com", ""))
        .await
        .unwrap();

    // WHEN: a second new identity arrives
    let err = f
        .linker
        .create_and_link_account(&SsoUser::new("second", "second@x.com", ""))
        .await
        .unwrap_err();

    // THEN: source error surfaces, no user or mapping for "second"
    assert!(matches!(err, Error::SourceUnavailable(_)));
    assert_eq!(f.users.len(), 1);
    assert_eq!(f.mappings.len(), 1);
    assert!(f.users.find_by_email("second@x.com").await.unwrap().is_none());
}

#[tokio::test]
async fn store_errors_propagate_from_is_account_linked() {
    struct FailingMappings;

    #[async_trait::async_trait]
    impl AccountMappingStore for FailingMappings {
        async fn find_by_sso_user_id(&self, _id: &str) -> short_keygen::Result<Option<User>> {
            Err(Error::Store("connection reset".to_string()))
        }

        async fn create(&self, _sso_user: &SsoUser, _user: &User) -> short_keygen::Result<()> {
            Ok(())
        }
    }

    let source = Arc::new(InMemoryKeySource::new([Key::from("k1")]));
    let generator = Arc::new(KeyGenerator::new(1, source).await.unwrap());
    let linker = AccountLinker::new(
        generator,
        Arc::new(InMemoryUserStore::new()),
        Arc::new(FailingMappings),
    );

    let err = linker
        .is_account_linked(&SsoUser::new("alpha", "", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Store(_)));
}

/// User store that holds every email lookup until two callers have looked up.
struct RendezvousUsers {
    inner: Arc<InMemoryUserStore>,
    barrier: Barrier,
}

#[async_trait::async_trait]
impl UserStore for RendezvousUsers {
    async fn find_by_email(&self, email: &str) -> short_keygen::Result<Option<User>> {
        let found = self.inner.find_by_email(email).await?;
        self.barrier.wait().await;
        Ok(found)
    }

    async fn find_by_id(&self, id: &Key) -> short_keygen::Result<Option<User>> {
        self.inner.find_by_id(id).await
    }

    async fn create(&self, user: &User) -> short_keygen::Result<()> {
        self.inner.create(user).await
    }
}

#[tokio::test]
async fn concurrent_first_sign_ins_with_shared_email_create_two_accounts() {
    // GIVEN: two identities with the same brand-new email, whose email
    // lookups both finish before either account is created
    let source = Arc::new(InMemoryKeySource::new(["k1", "k2", "k3"].map(Key::from)));
    let generator = Arc::new(KeyGenerator::new(1, source.clone()).await.unwrap());
    let users = Arc::new(InMemoryUserStore::new());
    let mappings = Arc::new(InMemoryAccountMappingStore::new());
    let linker = AccountLinker::new(
        generator,
        Arc::new(RendezvousUsers {
            inner: users.clone(),
            barrier: Barrier::new(2),
        }),
        mappings.clone(),
    );
    let a = SsoUser::new("github-1", "shared@x.com", "A");
    let b = SsoUser::new("google-1", "shared@x.com", "B");

    // WHEN: both link concurrently
    let (ra, rb) = tokio::join!(
        linker.create_and_link_account(&a),
        linker.create_and_link_account(&b)
    );

    // THEN: each gets its own new account with a distinct key
    let (ra, rb) = (ra.unwrap(), rb.unwrap());
    assert!(ra.is_new_account());
    assert!(rb.is_new_account());
    assert_ne!(ra.user().id, rb.user().id);
    assert_eq!(users.len(), 2);
    assert_eq!(mappings.len(), 2);
    assert!(mappings.is_linked_to("github-1", &ra.user().id));
    assert!(mappings.is_linked_to("google-1", &rb.user().id));
    assert_eq!(source.remaining(), 1);
}

#[tokio::test]
async fn file_store_backs_the_linker_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");
    let alpha = SsoUser::new("alpha", "a@x.com", "Alpha");

    // First process: creates the account
    {
        let store = Arc::new(FileAccountStore::open(&path).unwrap());
        let source = Arc::new(InMemoryKeySource::new([Key::from("k1")]));
        let generator = Arc::new(KeyGenerator::new(1, source).await.unwrap());
        let linker = AccountLinker::new(generator, store.clone(), store);
        assert!(linker.create_and_link_account(&alpha).await.unwrap().is_new_account());
    }

    // Second process: sees alpha as linked, and a second identity with the
    // same email reuses the account
    let store = Arc::new(FileAccountStore::open(&path).unwrap());
    let source = Arc::new(InMemoryKeySource::new([Key::from("k2")]));
    let generator = Arc::new(KeyGenerator::new(1, source).await.unwrap());
    let linker = AccountLinker::new(generator, store.clone(), store.clone());

    assert!(linker.is_account_linked(&alpha).await.unwrap());
    let outcome = linker
        .create_and_link_account(&SsoUser::new("beta", "a@x.com", "Beta"))
        .await
        .unwrap();
    assert_eq!(outcome.user().id, Key::from("k1"));
    assert_eq!(
        UserStore::find_by_id(store.as_ref(), &Key::from("k1"))
            .await
            .unwrap()
            .map(|u| u.email),
        Some("a@x.com".to_string())
    );
}
