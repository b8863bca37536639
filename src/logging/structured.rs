use tracing::{Level, debug, error, info, trace, warn};

/// Fields stamped on every line a component logs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContext {
    /// Emitting component ("api", "coordinator", "web", ...)
    pub component: String,
    /// Account entry the component works for
    pub entry_id: Option<String>,
    /// Record-level key/value pairs, kept in insertion order
    pub fields: Vec<(String, String)>,
}

impl LogContext {
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            ..Self::default()
        }
    }

    pub fn with_entry_id(mut self, entry_id: impl Into<String>) -> Self {
        self.entry_id = Some(entry_id.into());
        self
    }

    /// Append a field; a repeated key overwrites the earlier value
    pub fn with_field(mut self, key: &str, value: impl ToString) -> Self {
        let value = value.to_string();
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key.to_string(), value)),
        }
        self
    }

    fn render(&self) -> String {
        let mut out = format!("component={}", self.component);
        if let Some(entry_id) = &self.entry_id {
            out.push_str(" entry_id=");
            out.push_str(entry_id);
        }
        for (key, value) in &self.fields {
            out.push(' ');
            out.push_str(key);
            out.push('=');
            out.push_str(value);
        }
        out
    }
}

/// Component logger; cheap to clone and to derive per-record children from
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    pub(crate) context: LogContext,
}

impl StructuredLogger {
    pub fn new(context: LogContext) -> Self {
        Self { context }
    }

    /// Child logger carrying one more field, e.g. the record being processed
    pub fn with_field(&self, key: &str, value: impl ToString) -> Self {
        Self::new(self.context.clone().with_field(key, value))
    }

    fn emit(&self, level: Level, message: &str) {
        let ctx = self.context.render();
        match level {
            Level::ERROR => error!(%ctx, "{}", message),
            Level::WARN => warn!(%ctx, "{}", message),
            Level::INFO => info!(%ctx, "{}", message),
            Level::DEBUG => debug!(%ctx, "{}", message),
            Level::TRACE => trace!(%ctx, "{}", message),
        }
    }

    pub fn error(&self, message: &str) {
        self.emit(Level::ERROR, message);
    }

    pub fn warn(&self, message: &str) {
        self.emit(Level::WARN, message);
    }

    pub fn info(&self, message: &str) {
        self.emit(Level::INFO, message);
    }

    pub fn debug(&self, message: &str) {
        self.emit(Level::DEBUG, message);
    }

    pub fn trace(&self, message: &str) {
        self.emit(Level::TRACE, message);
    }
}

/// Logger for a component
pub fn get_logger(component: &str) -> StructuredLogger {
    StructuredLogger::new(LogContext::new(component))
}

/// Logger with a prepared context
pub fn get_logger_with_context(context: LogContext) -> StructuredLogger {
    StructuredLogger::new(context)
}
