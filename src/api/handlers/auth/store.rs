//! Server-side session state and the store it lives in.
//!
//! Sessions are keyed by the SHA-256 of the client token. The store exposes
//! `get`/`put`/`clear` plus `redeem`, which checks and consumes a pending challenge
//! and promotes the session in one step so a code cannot be spent twice. A promoted
//! session always moves to a fresh id; the pre-login id stops resolving.

use anyhow::Result;
use async_trait::async_trait;
use std::{
    collections::HashMap,
    fmt,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

use super::{
    otp::OtpChallenge,
    principal::{Principal, Role},
    utils::hash_session_token,
};

/// Store key derived from the client's session token.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId([u8; 32]);

impl SessionId {
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        Self(hash_session_token(token))
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({:02x}{:02x}{:02x}{:02x}..)", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub pending_challenge: Option<OtpChallenge>,
    pub principal: Option<Principal>,
}

/// Authorization level of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Anonymous,
    Challenged,
    Authenticated(Role),
}

impl Session {
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        match (&self.principal, &self.pending_challenge) {
            (Some(principal), _) => SessionPhase::Authenticated(principal.role),
            (None, Some(_)) => SessionPhase::Challenged,
            (None, None) => SessionPhase::Anonymous,
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &SessionId) -> Result<Option<Session>>;

    async fn put(&self, id: &SessionId, session: Session) -> Result<()>;

    async fn clear(&self, id: &SessionId) -> Result<()>;

    /// Consume `expected`, attach `principal` and move the session from `id` to
    /// `next`, only if `expected` is still the pending challenge under `id`.
    /// Returns whether the swap happened.
    async fn redeem(
        &self,
        id: &SessionId,
        next: &SessionId,
        expected: &OtpChallenge,
        principal: Principal,
    ) -> Result<bool>;
}

struct Entry {
    session: Session,
    touched_at: Instant,
}

/// Process-local session store with an idle timeout.
pub struct MemorySessionStore {
    idle_ttl: Duration,
    entries: Mutex<HashMap<SessionId, Entry>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            idle_ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn live_entry<'a>(
        entries: &'a mut HashMap<SessionId, Entry>,
        id: &SessionId,
        idle_ttl: Duration,
    ) -> Option<&'a mut Entry> {
        let expired = entries
            .get(id)
            .is_some_and(|entry| entry.touched_at.elapsed() >= idle_ttl);
        if expired {
            entries.remove(id);
            return None;
        }
        let entry = entries.get_mut(id)?;
        entry.touched_at = Instant::now();
        Some(entry)
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<Session>> {
        let mut entries = self.entries.lock().await;
        Ok(Self::live_entry(&mut entries, id, self.idle_ttl).map(|entry| entry.session.clone()))
    }

    async fn put(&self, id: &SessionId, session: Session) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let idle_ttl = self.idle_ttl;
        entries.retain(|_, entry| entry.touched_at.elapsed() < idle_ttl);
        entries.insert(
            *id,
            Entry {
                session,
                touched_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn clear(&self, id: &SessionId) -> Result<()> {
        self.entries.lock().await.remove(id);
        Ok(())
    }

    async fn redeem(
        &self,
        id: &SessionId,
        next: &SessionId,
        expected: &OtpChallenge,
        principal: Principal,
    ) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let matches = Self::live_entry(&mut entries, id, self.idle_ttl)
            .is_some_and(|entry| entry.session.pending_challenge.as_ref() == Some(expected));
        if !matches {
            return Ok(false);
        }
        let Some(mut entry) = entries.remove(id) else {
            return Ok(false);
        };
        entry.session.pending_challenge = None;
        entry.session.principal = Some(principal);
        entry.touched_at = Instant::now();
        entries.insert(*next, entry);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn store() -> MemorySessionStore {
        MemorySessionStore::new(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn get_put_clear_round_trip() -> Result<()> {
        let store = store();
        let id = SessionId::from_token("token");
        assert_eq!(store.get(&id).await?, None);

        let session = Session {
            pending_challenge: Some(OtpChallenge::new("u@x.com", "123456")),
            principal: None,
        };
        store.put(&id, session.clone()).await?;
        assert_eq!(store.get(&id).await?, Some(session));

        store.clear(&id).await?;
        assert_eq!(store.get(&id).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn idle_sessions_expire() -> Result<()> {
        let store = MemorySessionStore::new(Duration::ZERO);
        let id = SessionId::from_token("token");
        store.put(&id, Session::default()).await?;
        assert_eq!(store.get(&id).await?, None);
        assert_eq!(store.len().await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn redeem_consumes_challenge_once() -> Result<()> {
        let store = store();
        let id = SessionId::from_token("token");
        let challenge = OtpChallenge::new("u@x.com", "123456");
        store
            .put(
                &id,
                Session {
                    pending_challenge: Some(challenge.clone()),
                    principal: None,
                },
            )
            .await?;

        let next = SessionId::from_token("rotated");
        let principal = Principal::new("u@x.com", Role::User);
        assert!(store.redeem(&id, &next, &challenge, principal.clone()).await?);
        assert!(!store.redeem(&id, &next, &challenge, principal.clone()).await?);
        assert!(!store.redeem(&next, &next, &challenge, principal.clone()).await?);

        // The pre-login id no longer resolves; the session lives on under `next`.
        assert_eq!(store.get(&id).await?, None);
        let session = store.get(&next).await?.unwrap_or_default();
        assert_eq!(session.pending_challenge, None);
        assert_eq!(session.principal, Some(principal));
        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn redeem_rejects_replaced_challenge() -> Result<()> {
        let store = store();
        let id = SessionId::from_token("token");
        let first = OtpChallenge::new("u@x.com", "111111");
        let second = OtpChallenge::new("u@x.com", "222222");
        store
            .put(
                &id,
                Session {
                    pending_challenge: Some(second),
                    principal: None,
                },
            )
            .await?;
        let next = SessionId::from_token("rotated");
        assert!(
            !store
                .redeem(&id, &next, &first, Principal::new("u@x.com", Role::User))
                .await?
        );
        assert_eq!(store.get(&next).await?, None);
        assert_eq!(store.get(&id).await?.map(|s| s.phase()), Some(SessionPhase::Challenged));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_redeems_yield_single_success() -> Result<()> {
        let store = Arc::new(store());
        let id = SessionId::from_token("token");
        let challenge = OtpChallenge::new("u@x.com", "123456");
        store
            .put(
                &id,
                Session {
                    pending_challenge: Some(challenge.clone()),
                    principal: None,
                },
            )
            .await?;

        let mut handles = Vec::new();
        for attempt in 0..16 {
            let store = Arc::clone(&store);
            let challenge = challenge.clone();
            let next = SessionId::from_token(&format!("rotated-{attempt}"));
            handles.push(tokio::spawn(async move {
                store
                    .redeem(&id, &next, &challenge, Principal::new("u@x.com", Role::User))
                    .await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await?? {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[test]
    fn phase_follows_session_contents() {
        let mut session = Session::default();
        assert_eq!(session.phase(), SessionPhase::Anonymous);

        session.pending_challenge = Some(OtpChallenge::new("u@x.com", "123456"));
        assert_eq!(session.phase(), SessionPhase::Challenged);

        session.principal = Some(Principal::new("u@x.com", Role::User));
        assert_eq!(session.phase(), SessionPhase::Authenticated(Role::User));
    }

    #[test]
    fn session_id_debug_is_truncated() {
        let id = SessionId::from_token("secret-token");
        let rendered = format!("{id:?}");
        assert!(rendered.starts_with("SessionId("));
        assert!(!rendered.contains("secret-token"));
    }
}
