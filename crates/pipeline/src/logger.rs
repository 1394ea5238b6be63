//! Per-category front-end handle
//!
//! `Logger` is what producers hold. It stamps records with its category and
//! the current time and forwards them to the pipeline queue. It never returns
//! an error: a full queue makes it wait (or drop, for `try_add`), a disabled
//! or shutting-down pipeline makes it a no-op.

use std::fmt;
use std::sync::Arc;

use crate::pipeline::Ingress;
use crate::record::{EventId, ExceptionInfo, Level, LogRecord};

/// Cheap, cloneable producer handle for one category
#[derive(Clone)]
pub struct Logger {
    category: Arc<str>,
    ingress: Arc<Ingress>,
}

impl Logger {
    pub(crate) fn new(category: Arc<str>, ingress: Arc<Ingress>) -> Self {
        Self { category, ingress }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// False for `Level::Off` and once the pipeline stops accepting records
    pub fn is_enabled(&self, level: Level) -> bool {
        level != Level::Off && self.ingress.is_accepting()
    }

    /// Build a record for this category
    pub fn record(
        &self,
        level: Level,
        event_id: impl Into<EventId>,
        message: impl Into<String>,
    ) -> LogRecord {
        LogRecord::new(Arc::clone(&self.category), level, event_id.into(), message)
    }

    /// Log a message, waiting if the queue is full
    pub async fn log(&self, level: Level, event_id: impl Into<EventId>, message: impl Into<String>) {
        if level == Level::Off {
            return;
        }
        self.add(self.record(level, event_id, message)).await;
    }

    /// Log a message with an error payload
    pub async fn log_error<E>(
        &self,
        level: Level,
        event_id: impl Into<EventId>,
        error: &E,
        message: impl Into<String>,
    ) where
        E: std::error::Error + 'static,
    {
        if level == Level::Off {
            return;
        }
        let exception = ExceptionInfo::from_error(short_type_name::<E>(), error);
        self.add(self.record(level, event_id, message).with_exception(exception))
            .await;
    }

    /// `log` for plain threads; must not be called from async code
    pub fn blocking_log(
        &self,
        level: Level,
        event_id: impl Into<EventId>,
        message: impl Into<String>,
    ) {
        if level == Level::Off {
            return;
        }
        self.blocking_add(self.record(level, event_id, message));
    }

    /// Enqueue a prepared record, waiting while the queue is full
    pub async fn add(&self, record: LogRecord) {
        self.ingress.enqueue(record).await;
    }

    /// `add` for plain threads; must not be called from async code
    pub fn blocking_add(&self, record: LogRecord) {
        self.ingress.blocking_enqueue(record);
    }

    /// Enqueue without waiting; returns false if the record was dropped
    pub fn try_add(&self, record: LogRecord) -> bool {
        self.ingress.try_enqueue(record)
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("category", &self.category)
            .field("accepting", &self.ingress.is_accepting())
            .finish()
    }
}

/// Type name with its nearest meaningful module
///
/// `std::io::Error` -> `io::Error`, `my_crate::db::DbError<T>` -> `db::DbError`.
/// A module named after the type itself (`io::error::Error`) is skipped.
fn short_type_name<E>() -> String {
    let full = std::any::type_name::<E>();
    let without_generics = full.split('<').next().unwrap_or(full);
    let mut segments = without_generics.rsplit("::");

    let Some(name) = segments.next() else {
        return without_generics.to_string();
    };
    let module = match segments.next() {
        Some(module) if module.eq_ignore_ascii_case(name) => segments.next(),
        other => other,
    };

    match module {
        Some(module) => format!("{module}::{name}"),
        None => name.to_string(),
    }
}

#[cfg(test)]
#[path = "logger_test.rs"]
mod logger_test;
