//! Session lifecycle with at most one refresh in flight.
//!
//! State machine: `NoSession -> Refreshing -> Valid -> (Expired | Rejected)
//! -> Refreshing`. The state mutex is held across the credential exchange,
//! so callers that find the session missing or stale while a refresh runs
//! wait for it and reuse its result instead of exchanging again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard, Weak};
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zsdk_common::{Clock, SystemClock};
use zsdk_domain::constants::DEFAULT_SESSION_RELEASE_TIMEOUT_SECS;
use zsdk_domain::{ExpiryPolicy, SdkError};

use super::exchange::CredentialExchange;
use super::session::Session;
use crate::http::RetryingTransport;

#[derive(Default)]
struct SessionState {
    current: Option<Arc<Session>>,
    generation: u64,
}

/// Owns the credential exchange and the session it produced.
pub struct SessionManager {
    exchange: Arc<dyn CredentialExchange>,
    transport: RetryingTransport,
    policy: ExpiryPolicy,
    clock: Arc<dyn Clock>,
    release_timeout: Duration,
    state: Mutex<SessionState>,
    exchanges: AtomicU64,
    keep_alive: StdMutex<Option<JoinHandle<()>>>,
    stop: CancellationToken,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("policy", &self.policy)
            .field("exchanges", &self.exchange_count())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(
        exchange: Arc<dyn CredentialExchange>,
        transport: RetryingTransport,
        policy: ExpiryPolicy,
    ) -> Self {
        Self {
            exchange,
            transport,
            policy,
            clock: Arc::new(SystemClock),
            release_timeout: Duration::from_secs(DEFAULT_SESSION_RELEASE_TIMEOUT_SECS),
            state: Mutex::new(SessionState::default()),
            exchanges: AtomicU64::new(0),
            keep_alive: StdMutex::new(None),
            stop: CancellationToken::new(),
        }
    }

    /// Use `clock` for expiry decisions.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Upper bound on a server-side session release.
    #[must_use]
    pub fn with_release_timeout(mut self, timeout: Duration) -> Self {
        self.release_timeout = timeout;
        self
    }

    /// Current valid session, exchanging credentials first if there is none
    /// or it has expired.
    ///
    /// # Errors
    /// - `SdkError::Cancelled` if `cancel` fires while waiting or exchanging
    /// - whatever the credential exchange fails with
    pub async fn session(&self, cancel: &CancellationToken) -> Result<Arc<Session>, SdkError> {
        let mut state = self.lock_state(cancel).await?;
        if let Some(session) = &state.current {
            if !session.is_expired(self.clock.now()) {
                return Ok(Arc::clone(session));
            }
            debug!(generation = session.generation(), "session expired");
        }
        self.refresh_locked(&mut state, cancel).await
    }

    /// Replace a session the server rejected with 401/403.
    ///
    /// If another request already replaced `rejected`, the newer session is
    /// returned without a second exchange.
    ///
    /// # Errors
    /// Same as [`SessionManager::session`].
    pub async fn refresh_after_rejection(
        &self,
        rejected: &Session,
        cancel: &CancellationToken,
    ) -> Result<Arc<Session>, SdkError> {
        let mut state = self.lock_state(cancel).await?;
        if let Some(current) = &state.current {
            if current.generation() != rejected.generation()
                && !current.is_expired(self.clock.now())
            {
                debug!(
                    rejected = rejected.generation(),
                    current = current.generation(),
                    "session already refreshed"
                );
                return Ok(Arc::clone(current));
            }
        }
        info!(generation = rejected.generation(), "session rejected by server; refreshing");
        self.refresh_locked(&mut state, cancel).await
    }

    /// Exchange credentials unconditionally; used by the keep-alive ticker.
    ///
    /// # Errors
    /// Same as [`SessionManager::session`].
    pub async fn force_refresh(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Arc<Session>, SdkError> {
        let mut state = self.lock_state(cancel).await?;
        self.refresh_locked(&mut state, cancel).await
    }

    /// The cached session without waiting, if one exists and no refresh is
    /// running.
    pub fn current(&self) -> Option<Arc<Session>> {
        self.state.try_lock().ok().and_then(|state| state.current.clone())
    }

    /// Number of credential exchanges attempted so far.
    pub fn exchange_count(&self) -> u64 {
        self.exchanges.load(Ordering::SeqCst)
    }

    async fn lock_state(
        &self,
        cancel: &CancellationToken,
    ) -> Result<MutexGuard<'_, SessionState>, SdkError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(SdkError::Cancelled),
            state = self.state.lock() => Ok(state),
        }
    }

    async fn refresh_locked(
        &self,
        state: &mut SessionState,
        cancel: &CancellationToken,
    ) -> Result<Arc<Session>, SdkError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);

        match self.exchange.exchange(&self.transport, cancel).await {
            Ok(issued) => {
                state.generation += 1;
                let session = Arc::new(Session::from_issued(
                    issued,
                    self.clock.now(),
                    &self.policy,
                    state.generation,
                ));
                let replaced = state.current.replace(Arc::clone(&session));
                info!(generation = state.generation, "session refreshed");
                if let Some(replaced) = replaced {
                    self.release_in_background(replaced);
                }
                Ok(session)
            }
            Err(SdkError::Cancelled) => Err(SdkError::Cancelled),
            Err(err) => {
                // Next caller starts over from NoSession
                if let Some(stale) = state.current.take() {
                    self.release_in_background(stale);
                }
                warn!(error = %err, "session refresh failed");
                Err(err)
            }
        }
    }

    fn release_in_background(&self, session: Arc<Session>) {
        tokio::spawn(release_session(
            Arc::clone(&self.exchange),
            session,
            self.transport.clone(),
            self.release_timeout,
        ));
    }

    /// Refresh the session every `interval` until [`SessionManager::shutdown`].
    ///
    /// Calling this while a ticker is already running has no effect.
    ///
    /// # Errors
    /// Returns `SdkError::Config` when called outside a tokio runtime.
    pub fn start_keep_alive(self: &Arc<Self>, interval: Duration) -> Result<(), SdkError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| SdkError::Config("session keep-alive requires a tokio runtime".into()))?;

        let mut slot = self.keep_alive_slot();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let manager: Weak<Self> = Arc::downgrade(self);
        let stop = self.stop.clone();
        info!(interval_secs = interval.as_secs(), "starting session keep-alive");

        *slot = Some(runtime.spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(manager) = manager.upgrade() else { break };
                        match manager.force_refresh(&stop).await {
                            Ok(session) => {
                                debug!(generation = session.generation(), "keep-alive refresh");
                            }
                            Err(SdkError::Cancelled) => break,
                            Err(err) => warn!(error = %err, "keep-alive refresh failed"),
                        }
                    }
                }
            }
            debug!("session keep-alive stopped");
        }));

        Ok(())
    }

    pub fn is_keep_alive_running(&self) -> bool {
        self.keep_alive_slot().as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the keep-alive ticker and release the session server-side.
    ///
    /// The release is a single attempt bounded by the release timeout, so
    /// shutdown returns promptly even when the provider is throttling.
    pub async fn shutdown(&self) {
        self.stop.cancel();

        let handle = self.keep_alive_slot().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "keep-alive task ended abnormally");
            }
        }

        let session = self.state.lock().await.current.take();
        if let Some(session) = session {
            release_session(
                Arc::clone(&self.exchange),
                session,
                self.transport.clone(),
                self.release_timeout,
            )
            .await;
        }
    }

    fn keep_alive_slot(&self) -> StdMutexGuard<'_, Option<JoinHandle<()>>> {
        match self.keep_alive.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("keep-alive mutex poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// End `session` server-side, giving up after `timeout`.
async fn release_session(
    exchange: Arc<dyn CredentialExchange>,
    session: Arc<Session>,
    transport: RetryingTransport,
    timeout: Duration,
) {
    let cancel = CancellationToken::new();
    let generation = session.generation();
    tokio::select! {
        result = exchange.release(&session, &transport, &cancel) => match result {
            Ok(()) => debug!(generation, "session released"),
            Err(err) => warn!(generation, error = %err, "failed to release session"),
        },
        () = tokio::time::sleep(timeout) => {
            cancel.cancel();
            warn!(generation, ?timeout, "session release timed out");
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
