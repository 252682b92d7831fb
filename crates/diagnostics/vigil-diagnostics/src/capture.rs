//! Process-wide fault capture.
//!
//! Two signals feed the pipeline from outside explicit `report` calls:
//!
//! * panics, observed through the process panic hook, become
//!   [`FaultCategory::Runtime`] events;
//! * `Err` results of tasks nobody awaits become [`FaultCategory::Promise`]
//!   events, either through [`EventCapture::spawn_observed`] or a direct
//!   [`EventCapture::report_rejection`].
//!
//! The hook is installed at most once per process. Installing again from
//! another context only moves the target; the hook that was in place before
//! the first install keeps running after ours.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::Cell;
use std::fmt::Display;
use std::future::Future;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once, Weak};
use tokio::task::JoinHandle;

use crate::diagnostics::Diagnostics;
use crate::event::{FaultCategory, RawFault, SourceLocation};

/// Used when a panic carries no printable payload
pub const UNKNOWN_PANIC_MESSAGE: &str = "Unknown error";

/// Used when a rejection reason renders empty
pub const UNKNOWN_REJECTION_MESSAGE: &str = "Unhandled promise rejection";

static HOOK: Once = Once::new();

static PANIC_TARGET: Lazy<RwLock<Option<Weak<Diagnostics>>>> = Lazy::new(|| RwLock::new(None));

thread_local! {
    static IN_HOOK: Cell<bool> = const { Cell::new(false) };
}

/// Subscribes a [`Diagnostics`] context to process fault signals.
#[derive(Debug)]
pub struct EventCapture {
    context: Weak<Diagnostics>,
    installed: AtomicBool,
}

impl EventCapture {
    pub(crate) fn new(context: Weak<Diagnostics>) -> Self {
        Self {
            context,
            installed: AtomicBool::new(false),
        }
    }

    /// Route panics to this context. Idempotent.
    pub fn install(&self) {
        *PANIC_TARGET.write() = Some(self.context.clone());

        HOOK.call_once(|| {
            let previous = panic::take_hook();
            panic::set_hook(Box::new(move |info| {
                capture_panic(info.payload(), info.location().map(SourceLocation::from));
                previous(info);
            }));
        });

        if !self.installed.swap(true, Ordering::AcqRel) {
            tracing::debug!("fault capture installed");
        }
    }

    /// Stop routing panics to this context.
    ///
    /// The process hook stays in place and becomes a pass-through until some
    /// context installs again.
    pub fn uninstall(&self) {
        let mut target = PANIC_TARGET.write();
        if target.as_ref().is_some_and(|current| current.ptr_eq(&self.context)) {
            *target = None;
        }
        drop(target);

        if self.installed.swap(false, Ordering::AcqRel) {
            tracing::debug!("fault capture uninstalled");
        }
    }

    /// Whether this context currently receives panics. Turns false once
    /// another context installs.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        PANIC_TARGET
            .read()
            .as_ref()
            .is_some_and(|current| current.ptr_eq(&self.context))
    }

    /// Report an unhandled asynchronous failure.
    pub fn report_rejection(&self, reason: impl Display) {
        let Some(context) = self.context.upgrade() else {
            return;
        };
        let message = non_empty(reason.to_string(), UNKNOWN_REJECTION_MESSAGE);
        context.report(RawFault::new(FaultCategory::Promise, message));
    }

    /// Report an error the host caught but could not handle.
    pub fn report_error(&self, error: &(dyn std::error::Error + 'static)) {
        let Some(context) = self.context.upgrade() else {
            return;
        };

        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }

        let message = non_empty(error.to_string(), UNKNOWN_PANIC_MESSAGE);
        let mut fault = RawFault::new(FaultCategory::Runtime, message);
        if !chain.is_empty() {
            fault = fault.with_stack(chain.join("\ncaused by: "));
        }
        context.report(fault);
    }

    /// Spawn a task whose `Err` is reported as a rejection instead of
    /// being silently dropped.
    pub fn spawn_observed<F, T, E>(&self, future: F) -> JoinHandle<Option<T>>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let context = self.context.clone();
        tokio::spawn(async move {
            match future.await {
                Ok(value) => Some(value),
                Err(err) => {
                    if let Some(context) = context.upgrade() {
                        context.capture().report_rejection(err);
                    }
                    None
                }
            }
        })
    }
}

fn capture_panic(payload: &(dyn Any + Send), location: Option<SourceLocation>) {
    // A panic raised while reporting must not recurse into the pipeline.
    // Thread-local storage may already be gone during thread teardown.
    if IN_HOOK.try_with(|flag| flag.replace(true)).unwrap_or(true) {
        return;
    }

    let target = PANIC_TARGET.read().as_ref().and_then(Weak::upgrade);
    if let Some(context) = target {
        report_panic(&context, payload, location);
    }

    let _ = IN_HOOK.try_with(|flag| flag.set(false));
}

fn report_panic(
    context: &Arc<Diagnostics>,
    payload: &(dyn Any + Send),
    location: Option<SourceLocation>,
) {
    let message = payload_message(payload);
    let mut fault = RawFault::new(FaultCategory::Runtime, message);
    if let Some(location) = location {
        fault = fault.with_location(location);
    }
    if context.config().capture_backtraces {
        fault = fault.with_stack(Backtrace::force_capture().to_string());
    }

    let id = context.report(fault);
    tracing::debug!(event_id = %id, "panic captured");
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    let text = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::new()
    };
    non_empty(text, UNKNOWN_PANIC_MESSAGE)
}

fn non_empty(text: String, placeholder: &str) -> String {
    if text.trim().is_empty() {
        placeholder.to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_text_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(payload_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("index out of bounds"));
        assert_eq!(payload_message(boxed.as_ref()), "index out of bounds");

        let boxed: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(payload_message(boxed.as_ref()), UNKNOWN_PANIC_MESSAGE);

        let boxed: Box<dyn Any + Send> = Box::new("");
        assert_eq!(payload_message(boxed.as_ref()), UNKNOWN_PANIC_MESSAGE);
    }

    #[test]
    fn test_placeholder_for_blank_reason() {
        assert_eq!(
            non_empty("  ".to_string(), UNKNOWN_REJECTION_MESSAGE),
            UNKNOWN_REJECTION_MESSAGE
        );
        assert_eq!(non_empty("gone".to_string(), UNKNOWN_REJECTION_MESSAGE), "gone");
    }
}
