//! This module provides a `tracing` layer that forwards warnings and errors to
//! the log viewer's status bar.
use super::DiagnosticsHandle;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

/// A `tracing` layer that hands WARN and ERROR events to an attached viewer.
///
/// While no viewer is attached the layer does nothing and the regular fmt
/// layer prints to stderr instead.
pub struct DiagnosticsCollector {
    handle: DiagnosticsHandle,
}

impl DiagnosticsCollector {
    /// Creates a new `DiagnosticsCollector`.
    ///
    /// # Arguments
    ///
    /// * `handle` - The handle a viewer attaches its channel to.
    pub fn new(handle: DiagnosticsHandle) -> Self {
        Self { handle }
    }
}

impl<S> Layer<S> for DiagnosticsCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level > Level::WARN || !self.handle.is_attached() {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.handle.forward(format!("{}: {}", level, visitor.into_line()));
    }
}

/// Extracts the message of an event, collecting other fields as `name=value`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn push_field(&mut self, name: &str, value: impl std::fmt::Display) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        self.fields.push_str(&format!("{}={}", name, value));
    }

    fn into_line(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.push_field(field.name(), format!("{:?}", value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), value);
        }
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.push_field(field.name(), value);
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.push_field(field.name(), value);
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.push_field(field.name(), value);
    }
}
