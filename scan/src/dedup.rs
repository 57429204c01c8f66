/// Suppresses a decoded value equal to the one most recently emitted.
///
/// Sampling runs far faster than a person can withdraw a badge, so one
/// presentation decodes dozens of times. Only the first decode of a run is
/// let through; the same value passes again only after a different value was
/// emitted or the filter was reset.
#[derive(Debug, Default, Clone)]
pub struct Deduplicator {
    last_emitted: Option<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `value` should be emitted, recording it as the most
    /// recent emission.
    pub fn offer(&mut self, value: &str) -> bool {
        if self.last_emitted.as_deref() == Some(value) {
            return false;
        }
        self.last_emitted = Some(value.to_owned());
        true
    }

    pub fn reset(&mut self) {
        self.last_emitted = None;
    }

    pub fn last_emitted(&self) -> Option<&str> {
        self.last_emitted.as_deref()
    }
}
