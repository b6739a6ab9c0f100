use futures_util::future::BoxFuture;
use log::{debug, error};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default limit used by [`truncate_text`] callers that have no opinion.
pub const DEFAULT_TRUNCATE_LENGTH: usize = 100;

/// Suffix [`truncate_text`] appends to shortened text.
pub const ELLIPSIS: &str = "...";

type DebouncedFn<A> = dyn Fn(A) -> BoxFuture<'static, ()> + Send + Sync;

/// Delays a call until `wait` has passed without another call.
///
/// Each [`Debouncer::call`] aborts the timer left by the previous call, so at
/// most one timer is pending per debouncer. When the timer fires the wrapped
/// future is spawned on its own task; later calls never cancel work that has
/// already started.
///
/// Must be used from inside a tokio runtime.
pub struct Debouncer<A> {
    wait: Duration,
    func: Arc<DebouncedFn<A>>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

/// Wraps `func` so it only runs after `wait` of inactivity, with the arguments
/// of the most recent call.
pub fn debounce<A, F, Fut>(func: F, wait: Duration) -> Debouncer<A>
where
    A: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Debouncer::new(wait, func)
}

impl<A: Send + 'static> Debouncer<A> {
    pub fn new<F, Fut>(wait: Duration, func: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let func: Arc<DebouncedFn<A>> =
            Arc::new(move |args: A| -> BoxFuture<'static, ()> { Box::pin(func(args)) });
        Self {
            wait,
            func,
            pending: Mutex::new(None),
        }
    }

    /// Schedule the wrapped function, replacing any call still waiting.
    pub fn call(&self, args: A) {
        let mut pending = self.lock_pending();
        // Aborting is a no-op if that timer already fired
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        let func = self.func.clone();
        let wait = self.wait;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            // `func` itself runs here on the timer task; only the future it
            // returns is detached, out of reach of the next abort
            tokio::spawn(func(args));
        }));
    }

    /// Drop the pending call, if any, without running it.
    pub fn cancel(&self) {
        if let Some(previous) = self.lock_pending().take() {
            previous.abort();
            debug!("Debouncer: pending call cancelled");
        }
    }

    /// Whether a call is still waiting for its timer.
    pub fn is_pending(&self) -> bool {
        self.lock_pending()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<A> Drop for Debouncer<A> {
    fn drop(&mut self) {
        let pending = self
            .pending
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = pending.take() {
            handle.abort();
        }
    }
}

/// Formats a 0..1 ratio as a percentage with one decimal, e.g. `0.5` → `"50.0%"`.
///
/// The range is not enforced.
pub fn format_percentage(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

/// Cuts `text` to `max_length` characters and appends `"..."`.
///
/// `None` and text that already fits are returned untouched.
pub fn truncate_text(text: Option<&str>, max_length: usize) -> Option<Cow<'_, str>> {
    let text = text?;
    match text.char_indices().nth(max_length) {
        None => Some(Cow::Borrowed(text)),
        Some((cut, _)) => {
            let mut truncated = String::with_capacity(cut + ELLIPSIS.len());
            truncated.push_str(&text[..cut]);
            truncated.push_str(ELLIPSIS);
            Some(Cow::Owned(truncated))
        }
    }
}

/// Parses `json`, handing `fallback` back unchanged if it is malformed.
pub fn safe_json_parse<T: DeserializeOwned>(json: &str, fallback: T) -> T {
    match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => {
            error!("JSON parse error: {}", e);
            fallback
        }
    }
}

/// [`safe_json_parse`] with an empty object as the fallback.
pub fn safe_json_parse_value(json: &str) -> serde_json::Value {
    safe_json_parse(json, serde_json::Value::Object(serde_json::Map::new()))
}
