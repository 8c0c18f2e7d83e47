use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Registry, fmt, reload};

type ReloadHandle = reload::Handle<LevelFilter, Registry>;

/// Installs the global subscriber behind a reloadable level filter.
pub fn init(base: LevelFilter) -> LogLevel {
    let (filter, handle) = reload::Layer::new(base);
    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();

    LogLevel::new(handle, base)
}

/// Controls the global log level. Cloning shares the same level.
#[derive(Debug, Clone)]
pub struct LogLevel {
    inner: Option<Arc<Inner>>,
}

#[derive(Debug)]
struct Inner {
    handle: ReloadHandle,
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    base: LevelFilter,
    current: LevelFilter,
    raised: usize,
}

impl LogLevel {
    fn new(handle: ReloadHandle, base: LevelFilter) -> Self {
        LogLevel {
            inner: Some(Arc::new(Inner {
                handle,
                state: Mutex::new(State {
                    base,
                    current: base,
                    raised: 0,
                }),
            })),
        }
    }

    /// A log level that never changes anything.
    #[cfg(test)]
    pub fn disabled() -> Self {
        LogLevel { inner: None }
    }

    /// Sets the level that applies while nothing is raised.
    pub fn set_base(&self, level: LevelFilter) {
        let Some(inner) = &self.inner else {
            return;
        };

        let mut state = inner.lock();
        state.base = level;
        if state.raised == 0 {
            inner.apply(&mut state, level);
        }
    }

    /// Logs at least at `level` until the returned guard, and every other outstanding one, is dropped.
    pub fn raise(&self, level: LevelFilter) -> LevelGuard {
        if let Some(inner) = &self.inner {
            let mut state = inner.lock();
            state.raised += 1;
            if level > state.current {
                inner.apply(&mut state, level);
            }
        }

        LevelGuard {
            inner: self.inner.clone(),
        }
    }
}

impl Inner {
    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, state: &mut State, level: LevelFilter) {
        match self.handle.modify(|filter| *filter = level) {
            Ok(()) => state.current = level,
            Err(e) => warn!("⚠️ Unable to change the log level to {}: {}", level, e),
        }
    }

    fn release(&self) {
        let mut state = self.lock();
        state.raised = state.raised.saturating_sub(1);
        if state.raised == 0 && state.current != state.base {
            let base = state.base;
            self.apply(&mut state, base);
        }
    }
}

#[must_use = "the log level is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LevelGuard {
    inner: Option<Arc<Inner>>,
}

impl Drop for LevelGuard {
    fn drop(&mut self) {
        if let Some(inner) = &self.inner {
            inner.release();
        }
    }
}
