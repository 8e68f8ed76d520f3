/// Injected time source. The core never reads an ambient clock directly
/// (no `SystemTime::now()`, no `Instant::now()`) — every timestamp that
/// enters a `NoesisEvent` or a `MemoryState` comes from here, so that
/// replaying an event log through a fresh engine with the same `Clock`
/// implementation reproduces identical decisions.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// Injected id source for event/id stamping, kept separate from `Clock` for
/// the same reason: an embedder may want deterministic ids with a
/// non-deterministic clock, or vice versa.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}
