//! Contains helper functions to reduce boilerplate code in other `app` modules.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::events::SessionEvent;
use super::proxy::EventProxy;
use super::state::AppState;

/// Locks the session state.
///
/// A panic in another holder leaves the state consistent at the command
/// level, so a poisoned lock is recovered instead of propagated.
pub fn lock_state(state: &Mutex<AppState>) -> MutexGuard<'_, AppState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Forwards tree warnings gathered since the last call, then a fresh summary.
pub fn notify<P: EventProxy>(state: &mut AppState, proxy: &P) {
    if let Some(tree) = state.tree.as_mut() {
        for warning in tree.take_events() {
            proxy.send_event(SessionEvent::TreeWarning(warning));
        }
    }
    proxy.send_event(SessionEvent::StateUpdate(Box::new(state.summary())));
}

/// A helper function that locks the `AppState`, performs a mutation,
/// and then automatically sends a `StateUpdate` event.
///
/// The value returned by `update_fn` is handed back to the caller.
pub fn with_state_and_notify<F, R, P: EventProxy>(
    state: &Arc<Mutex<AppState>>,
    proxy: &P,
    update_fn: F,
) -> R
where
    F: FnOnce(&mut AppState) -> R,
{
    let mut state_guard = lock_state(state);

    let result = update_fn(&mut state_guard);
    notify(&mut state_guard, proxy);

    result
}
