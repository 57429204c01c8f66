//! Nullable decoder: decodes whatever code the test says is presented.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use kiosk_scan::{CodeDecoder, ScanError};
use kiosk_types::Frame;

/// Every frame decodes to the currently presented code, if any.
#[derive(Clone, Default)]
pub struct NullDecoder {
    presented: Arc<Mutex<Option<String>>>,
    decodes: Arc<AtomicUsize>,
}

impl NullDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold a code in front of the camera.
    pub fn present(&self, code: &str) {
        *self.presented.lock().unwrap_or_else(|e| e.into_inner()) = Some(code.to_owned());
    }

    /// Take the code away.
    pub fn withdraw(&self) {
        *self.presented.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Number of frames handed to the decoder so far.
    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }
}

impl CodeDecoder for NullDecoder {
    fn decode(&self, _frame: &Frame) -> Result<Option<String>, ScanError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .presented
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_presented_code() {
        let decoder = NullDecoder::new();
        let frame = Frame::blank(1, 1);
        assert_eq!(decoder.decode(&frame).unwrap(), None);

        decoder.present("ABC123");
        assert_eq!(decoder.decode(&frame).unwrap().as_deref(), Some("ABC123"));

        decoder.withdraw();
        assert_eq!(decoder.decode(&frame).unwrap(), None);
        assert_eq!(decoder.decodes(), 3);
    }
}
