use parking_lot::Mutex;
use std::{
    mem,
    time::{
        Duration,
        Instant,
    },
};

/// Cap for configured durations that do not fit into an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `now + after`, saturating at [`FAR_FUTURE`] from now.
pub(crate) fn deadline(after: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after).unwrap_or(now + FAR_FUTURE)
}

/// The session credential returned by `/login`, valid for a fixed window after each refresh.
#[derive(Debug)]
pub struct Token {
    validity: Duration,
    state: Mutex<TokenState>,
}

#[derive(Debug)]
struct TokenState {
    value: String,
    expires_at: Instant,
}

impl Token {
    /// An empty token that already counts as expired.
    pub fn empty(validity: Duration) -> Self {
        Self {
            validity,
            state: Mutex::new(TokenState {
                value: String::new(),
                expires_at: Instant::now(),
            }),
        }
    }

    pub fn with_validity(value: impl Into<String>, validity: Duration) -> Self {
        Self {
            validity,
            state: Mutex::new(TokenState {
                value: value.into(),
                expires_at: deadline(validity),
            }),
        }
    }

    /// Value and expiry observed under the same lock.
    pub fn get(&self) -> (String, bool) {
        let state = self.state.lock();
        (state.value.clone(), Instant::now() >= state.expires_at)
    }

    pub fn value(&self) -> String {
        self.state.lock().value.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().value.is_empty()
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.state.lock().expires_at
    }

    /// Stores a new value, restarts the validity window and returns the previous value.
    pub fn refresh(&self, value: impl Into<String>) -> String {
        let mut state = self.state.lock();
        state.expires_at = deadline(self.validity);
        mem::replace(&mut state.value, value.into())
    }

    pub fn force_expire(&self) {
        self.state.lock().expires_at = Instant::now();
    }

    /// Drops the value and returns it; the token is expired afterwards.
    pub fn clear(&self) -> String {
        let mut state = self.state.lock();
        state.expires_at = Instant::now();
        mem::take(&mut state.value)
    }
}
