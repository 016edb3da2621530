//! One-shot join of the authentication signals
//!
//! The gate watches `loading` and `authenticated` and fires once, the first
//! time loading has settled to `false` while the latest authenticated value
//! is `true`. The loading observer detaches as soon as loading settles; both
//! observers detach when the gate fires.
//!
//! A loading change is always judged against the freshest authenticated
//! value, even when the authenticated change has not been polled yet. If the
//! authenticated signal closes while its last value is `true`, the gate keeps
//! waiting for loading to settle.

use crate::source::AuthProvider;
use tokio::sync::watch;

/// Gate lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    /// Trigger has not fired yet
    Waiting,
    /// Trigger fired; further observations are ignored
    Fired,
}

/// How [`AuthGate::wait`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Loading settled while authenticated
    Fired,
    /// Signals closed before the trigger condition was met
    Closed,
}

/// Last-known-value state behind the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateState {
    loading_settled: bool,
    authenticated: bool,
    phase: GatePhase,
}

impl GateState {
    /// Create from the initial signal values
    #[inline]
    #[must_use]
    pub fn new(loading: bool, authenticated: bool) -> Self {
        Self {
            loading_settled: !loading,
            authenticated,
            phase: GatePhase::Waiting,
        }
    }

    /// Current phase
    #[inline]
    #[must_use]
    pub fn phase(&self) -> GatePhase {
        self.phase
    }

    /// Whether loading has been observed `false` at least once
    #[inline]
    #[must_use]
    pub fn loading_settled(&self) -> bool {
        self.loading_settled
    }

    /// Latest authenticated value
    #[inline]
    #[must_use]
    pub fn authenticated(&self) -> bool {
        self.authenticated
    }

    /// Record a loading emission; returns `true` if the gate fires now
    ///
    /// Once settled, later loading emissions are ignored.
    pub fn observe_loading(&mut self, loading: bool) -> bool {
        if !self.loading_settled && !loading {
            self.loading_settled = true;
        }
        self.evaluate()
    }

    /// Record an authenticated emission; returns `true` if the gate fires now
    pub fn observe_authenticated(&mut self, authenticated: bool) -> bool {
        if self.phase == GatePhase::Waiting {
            self.authenticated = authenticated;
        }
        self.evaluate()
    }

    /// Fire if waiting and the trigger condition holds
    pub fn evaluate(&mut self) -> bool {
        if self.phase == GatePhase::Waiting && self.loading_settled && self.authenticated {
            self.phase = GatePhase::Fired;
            return true;
        }
        false
    }
}

/// Waits for the hydration trigger
#[derive(Debug)]
pub struct AuthGate {
    loading: watch::Receiver<bool>,
    authenticated: watch::Receiver<bool>,
}

impl AuthGate {
    /// Subscribe to both signals of an auth provider
    #[inline]
    #[must_use]
    pub fn new<A: AuthProvider + ?Sized>(auth: &A) -> Self {
        Self::from_signals(auth.loading(), auth.authenticated())
    }

    /// Build from already subscribed signals
    #[inline]
    #[must_use]
    pub fn from_signals(
        loading: watch::Receiver<bool>,
        authenticated: watch::Receiver<bool>,
    ) -> Self {
        Self {
            loading,
            authenticated,
        }
    }

    /// Wait until the trigger fires or the signals close
    ///
    /// Consumes the gate, so every receiver is dropped on return.
    pub async fn wait(self) -> GateOutcome {
        let Self {
            loading,
            authenticated,
        } = self;
        let mut loading = Some(loading);
        let mut authenticated = Some(authenticated);

        let mut state = GateState::new(
            loading.as_mut().is_some_and(|rx| *rx.borrow_and_update()),
            authenticated.as_mut().is_some_and(|rx| *rx.borrow_and_update()),
        );
        if state.evaluate() {
            tracing::debug!("auth gate fired on initial values");
            return GateOutcome::Fired;
        }
        if state.loading_settled() {
            loading = None;
        }

        loop {
            tokio::select! {
                value = next_value(&mut loading) => {
                    match value {
                        Some(value) => {
                            tracing::debug!(loading = value, "auth loading changed");
                            if let Some(rx) = authenticated.as_mut() {
                                // an authenticated change may be pending behind this one
                                state.observe_authenticated(*rx.borrow_and_update());
                            }
                            if state.observe_loading(value) {
                                return GateOutcome::Fired;
                            }
                            if state.loading_settled() {
                                loading = None;
                            }
                        }
                        // Loading will never settle
                        None => return GateOutcome::Closed,
                    }
                }
                value = next_value(&mut authenticated) => {
                    match value {
                        Some(value) => {
                            tracing::debug!(authenticated = value, "auth status changed");
                            if state.observe_authenticated(value) {
                                return GateOutcome::Fired;
                            }
                        }
                        None if state.authenticated() && !state.loading_settled() => {
                            tracing::debug!("auth status closed while signed in, waiting for loading");
                            authenticated = None;
                        }
                        None => return GateOutcome::Closed,
                    }
                }
            }
        }
    }
}

/// Next value of a still attached signal; pends forever once detached
async fn next_value(rx: &mut Option<watch::Receiver<bool>>) -> Option<bool> {
    match rx {
        Some(inner) => match inner.changed().await {
            Ok(()) => Some(*inner.borrow_and_update()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ManualAuth;
    use std::time::Duration;

    #[test]
    fn fires_when_loading_settles_while_authenticated() {
        let mut state = GateState::new(true, false);
        assert!(!state.observe_authenticated(true));
        assert_eq!(state.phase(), GatePhase::Waiting);
        assert!(state.observe_loading(false));
        assert_eq!(state.phase(), GatePhase::Fired);
    }

    #[test]
    fn uses_last_authenticated_value_at_settle_time() {
        let mut state = GateState::new(true, false);
        assert!(!state.observe_authenticated(true));
        assert!(!state.observe_authenticated(false));
        assert!(!state.observe_loading(false));
        assert!(state.observe_authenticated(true));
    }

    #[test]
    fn fires_at_most_once() {
        let mut fired = 0;
        let mut state = GateState::new(true, false);
        fired += usize::from(state.observe_loading(false));
        for value in [true, false, true] {
            fired += usize::from(state.observe_authenticated(value));
        }
        fired += usize::from(state.observe_loading(true));
        fired += usize::from(state.observe_loading(false));
        fired += usize::from(state.evaluate());
        assert_eq!(fired, 1);
    }

    #[test]
    fn loading_flapping_after_settle_is_ignored() {
        let mut state = GateState::new(false, false);
        assert!(state.loading_settled());
        assert!(!state.observe_loading(true));
        assert!(state.loading_settled());
        assert!(state.observe_authenticated(true));
    }

    #[test]
    fn never_fires_without_authentication() {
        let mut state = GateState::new(true, false);
        assert!(!state.observe_loading(false));
        assert!(!state.observe_authenticated(false));
        assert_eq!(state.phase(), GatePhase::Waiting);
    }

    #[tokio::test]
    async fn wait_fires_on_initial_values() {
        let auth = ManualAuth::signed_in();
        assert_eq!(AuthGate::new(&auth).wait().await, GateOutcome::Fired);
    }

    #[tokio::test]
    async fn wait_defers_until_loading_settles() {
        let auth = ManualAuth::new(true, true);
        let gate = tokio::spawn(AuthGate::new(&auth).wait());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!gate.is_finished());

        auth.set_loading(false);
        assert_eq!(gate.await.unwrap(), GateOutcome::Fired);
    }

    #[tokio::test]
    async fn wait_fires_when_authentication_arrives_late() {
        let auth = ManualAuth::new(false, false);
        let gate = tokio::spawn(AuthGate::new(&auth).wait());

        tokio::time::sleep(Duration::from_millis(10)).await;
        auth.set_authenticated(true);
        assert_eq!(gate.await.unwrap(), GateOutcome::Fired);
    }

    #[tokio::test]
    async fn wait_reports_closed_signals() {
        let auth = ManualAuth::new(true, false);
        let gate = AuthGate::new(&auth);
        drop(auth);
        assert_eq!(gate.wait().await, GateOutcome::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn sign_out_sent_just_before_settle_is_honored() {
        for _ in 0..64 {
            let auth = ManualAuth::new(true, true);
            let gate = tokio::spawn(AuthGate::new(&auth).wait());
            tokio::task::yield_now().await;

            auth.set_authenticated(false);
            auth.set_loading(false);
            tokio::time::sleep(Duration::from_millis(1)).await;
            assert!(!gate.is_finished());

            auth.set_authenticated(true);
            assert_eq!(gate.await.unwrap(), GateOutcome::Fired);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sign_in_sent_just_before_settle_fires() {
        for _ in 0..64 {
            let auth = ManualAuth::new(true, false);
            let gate = tokio::spawn(AuthGate::new(&auth).wait());
            tokio::task::yield_now().await;

            auth.set_authenticated(true);
            auth.set_loading(false);
            assert_eq!(gate.await.unwrap(), GateOutcome::Fired);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn closed_authenticated_signal_keeps_last_signed_in_value() {
        let (loading, loading_rx) = watch::channel(true);
        let (authenticated, authenticated_rx) = watch::channel(true);
        let gate = tokio::spawn(AuthGate::from_signals(loading_rx, authenticated_rx).wait());
        tokio::task::yield_now().await;

        drop(authenticated);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!gate.is_finished());

        loading.send_replace(false);
        assert_eq!(gate.await.unwrap(), GateOutcome::Fired);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_authenticated_signal_while_signed_out_closes_gate() {
        let (_loading, loading_rx) = watch::channel(true);
        let (authenticated, authenticated_rx) = watch::channel(false);
        let gate = tokio::spawn(AuthGate::from_signals(loading_rx, authenticated_rx).wait());
        tokio::task::yield_now().await;

        drop(authenticated);
        assert_eq!(gate.await.unwrap(), GateOutcome::Closed);
    }

    #[tokio::test]
    async fn wait_closes_when_unauthenticated_provider_goes_away() {
        let auth = ManualAuth::new(false, false);
        let gate = tokio::spawn(AuthGate::new(&auth).wait());
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(auth);
        assert_eq!(gate.await.unwrap(), GateOutcome::Closed);
    }
}
