//! Traits and events for change notification and progress reporting

use chrono::NaiveDate;

/// Domain event emitted after a mutating operation has committed.
///
/// Events carry entity ids, not entity snapshots; listeners that need the
/// current state read it back through the bookkeeping handle. A listener
/// must not assume a later event concerns the same bookkeeping instance:
/// period closing produces a fresh one.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    AccountCreated { id: String },
    AccountUpdated { id: String },
    AccountDeleted { id: String },
    PartyCreated { id: String },
    PartyUpdated { id: String },
    PartyDeleted { id: String },
    PartyTagsChanged { id: String },
    JournalEntryAdded { id: String },
    JournalEntryUpdated { id: String },
    JournalEntryRemoved { id: String },
    InvoiceCreated { id: String },
    InvoiceUpdated { id: String },
    InvoiceDeleted { id: String },
    InvoicesGenerated { count: usize },
    PaymentRestored { invoice_id: String },
    SettingChanged { key: String },
    PeriodClosed { closed_from: NaiveDate },
}

/// Callback interface for observing committed mutations.
pub trait ChangeListener {
    fn on_change(&self, event: &ChangeEvent);
}

/// Callback interface for long-running batch operations (template-driven
/// invoice generation, period closing). Invoked after each unit of work;
/// purely informational, cancellation is the caller's concern.
pub trait ProgressListener {
    fn on_progress(&self, done: usize, total: usize);
}

/// Registry of change listeners owned by a bookkeeping instance.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Vec<Box<dyn ChangeListener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Box<dyn ChangeListener>) {
        self.listeners.push(listener);
    }

    /// Dispatch an event to every registered listener, in registration order.
    pub fn notify(&self, event: &ChangeEvent) {
        for listener in &self.listeners {
            listener.on_change(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
