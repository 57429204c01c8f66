//! Exclusive, scoped camera acquisition.

use std::sync::{Arc, Mutex};

use kiosk_types::{CameraConstraints, Frame};

use crate::{CameraBackend, CameraError, VideoStream};

/// Bookkeeping shared by a resource and every handle it issued.
#[derive(Debug, Default)]
struct Occupancy {
    holder: Option<(u64, &'static str)>,
    next_id: u64,
}

/// One physical camera, shareable between the components that take turns
/// owning it.
///
/// Cloning is cheap; all clones refer to the same device and the same
/// occupancy record, so at most one [`CameraHandle`] is open at any time.
#[derive(Clone)]
pub struct CameraResource {
    backend: Arc<dyn CameraBackend>,
    occupancy: Arc<Mutex<Occupancy>>,
}

impl CameraResource {
    pub fn new(backend: Arc<dyn CameraBackend>) -> Self {
        Self {
            backend,
            occupancy: Arc::new(Mutex::new(Occupancy::default())),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Open the device on behalf of `owner`.
    ///
    /// Fails with [`CameraError::Busy`] while another handle is open and with
    /// [`CameraError::Unavailable`] when the backend refuses access.
    pub fn acquire(
        &self,
        owner: &'static str,
        constraints: &CameraConstraints,
    ) -> Result<CameraHandle, CameraError> {
        let id = {
            let mut occ = lock(&self.occupancy);
            if let Some((_, holder)) = occ.holder {
                return Err(CameraError::Busy { holder });
            }
            occ.next_id += 1;
            let id = occ.next_id;
            // Reserve before opening so a concurrent acquire cannot slip in.
            occ.holder = Some((id, owner));
            id
        };

        match self.backend.open(constraints) {
            Ok(stream) => {
                tracing::debug!(
                    backend = self.backend.name(),
                    owner,
                    handle = id,
                    width = constraints.width,
                    height = constraints.height,
                    "camera acquired"
                );
                Ok(CameraHandle {
                    id,
                    owner,
                    stream: Some(stream),
                    occupancy: self.occupancy.clone(),
                })
            }
            Err(e) => {
                vacate(&self.occupancy, id);
                tracing::warn!(backend = self.backend.name(), owner, error = %e, "camera acquisition failed");
                Err(e)
            }
        }
    }

    /// Release `handle`. Idempotent.
    pub fn release(&self, handle: &mut CameraHandle) {
        handle.release();
    }

    /// Number of handles currently open (0 or 1).
    pub fn outstanding(&self) -> usize {
        usize::from(lock(&self.occupancy).holder.is_some())
    }

    /// Name of the component currently holding the device, if any.
    pub fn holder(&self) -> Option<&'static str> {
        lock(&self.occupancy).holder.map(|(_, owner)| owner)
    }
}

impl std::fmt::Debug for CameraResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraResource")
            .field("backend", &self.backend.name())
            .field("holder", &self.holder())
            .finish()
    }
}

/// Ownership of an open stream. Released exactly once, at the latest on drop.
pub struct CameraHandle {
    id: u64,
    owner: &'static str,
    stream: Option<Box<dyn VideoStream>>,
    occupancy: Arc<Mutex<Occupancy>>,
}

impl CameraHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn owner(&self) -> &'static str {
        self.owner
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn read_frame(&mut self) -> Result<Frame, CameraError> {
        match self.stream.as_mut() {
            Some(stream) => stream.read_frame(),
            None => Err(CameraError::Released),
        }
    }

    /// Stop every track and give the device back. Returns `false` if the
    /// handle had already been released.
    pub fn release(&mut self) -> bool {
        let Some(mut stream) = self.stream.take() else {
            return false;
        };
        stream.stop();
        vacate(&self.occupancy, self.id);
        tracing::debug!(owner = self.owner, handle = self.id, "camera released");
        true
    }
}

impl Drop for CameraHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for CameraHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraHandle")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("open", &self.is_open())
            .finish()
    }
}

fn lock(occupancy: &Mutex<Occupancy>) -> std::sync::MutexGuard<'_, Occupancy> {
    // Occupancy is a plain record; a poisoned lock still holds valid data.
    occupancy.lock().unwrap_or_else(|e| e.into_inner())
}

fn vacate(occupancy: &Mutex<Occupancy>, id: u64) {
    let mut occ = lock(occupancy);
    if matches!(occ.holder, Some((held, _)) if held == id) {
        occ.holder = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStream {
        stops: Arc<AtomicUsize>,
        stopped: bool,
    }

    impl VideoStream for CountingStream {
        fn read_frame(&mut self) -> Result<Frame, CameraError> {
            Ok(Frame::blank(2, 2))
        }

        fn stop(&mut self) {
            if !self.stopped {
                self.stopped = true;
                self.stops.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    struct CountingBackend {
        stops: Arc<AtomicUsize>,
        deny: bool,
    }

    impl CameraBackend for CountingBackend {
        fn name(&self) -> &str {
            "counting"
        }

        fn open(&self, _: &CameraConstraints) -> Result<Box<dyn VideoStream>, CameraError> {
            if self.deny {
                return Err(CameraError::Unavailable("permission denied".into()));
            }
            Ok(Box::new(CountingStream {
                stops: self.stops.clone(),
                stopped: false,
            }))
        }
    }

    fn resource(deny: bool) -> (CameraResource, Arc<AtomicUsize>) {
        let stops = Arc::new(AtomicUsize::new(0));
        let backend = CountingBackend {
            stops: stops.clone(),
            deny,
        };
        (CameraResource::new(Arc::new(backend)), stops)
    }

    #[test]
    fn release_is_idempotent() {
        let (camera, stops) = resource(false);
        let mut handle = camera.acquire("test", &CameraConstraints::default()).unwrap();
        assert_eq!(camera.outstanding(), 1);

        assert!(handle.release());
        assert!(!handle.release());
        camera.release(&mut handle);

        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(camera.outstanding(), 0);
    }

    #[test]
    fn drop_releases_the_device() {
        let (camera, stops) = resource(false);
        {
            let _handle = camera.acquire("test", &CameraConstraints::default()).unwrap();
            assert_eq!(camera.holder(), Some("test"));
        }
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(camera.outstanding(), 0);
    }

    #[test]
    fn second_owner_waits_for_release() {
        let (camera, _) = resource(false);
        let mut first = camera.acquire("scanner", &CameraConstraints::default()).unwrap();

        let err = camera
            .clone()
            .acquire("capture", &CameraConstraints::default())
            .unwrap_err();
        assert!(matches!(err, CameraError::Busy { holder: "scanner" }));

        first.release();
        let second = camera.acquire("capture", &CameraConstraints::default()).unwrap();
        assert_eq!(second.owner(), "capture");
    }

    #[test]
    fn denied_acquisition_leaves_device_free() {
        let (camera, stops) = resource(true);
        let err = camera.acquire("capture", &CameraConstraints::default()).unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(camera.outstanding(), 0);
        assert_eq!(stops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn reading_after_release_fails_cleanly() {
        let (camera, _) = resource(false);
        let mut handle = camera.acquire("capture", &CameraConstraints::default()).unwrap();
        assert!(handle.read_frame().is_ok());
        handle.release();
        assert!(matches!(handle.read_frame(), Err(CameraError::Released)));
    }

    #[test]
    fn stale_handle_release_does_not_free_newer_holder() {
        let (camera, _) = resource(false);
        let mut old = camera.acquire("scanner", &CameraConstraints::default()).unwrap();
        old.release();
        let _new = camera.acquire("capture", &CameraConstraints::default()).unwrap();
        old.release();
        drop(old);
        assert_eq!(camera.holder(), Some("capture"));
    }
}
