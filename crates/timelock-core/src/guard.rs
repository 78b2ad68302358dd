//! Scoped acquisition for hardware handles.
//!
//! A [`ResourceGuard`] owns a handle for the duration of one `fire`. The
//! handle sits behind a shared [`Lease`] so that `stop()` can revoke it from
//! another call site; whichever side gets there first performs the single
//! underlying release, the other becomes a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::channel::ChannelKind;
use crate::error::ChannelError;
use crate::platform::{Camera, CameraStream};

/// A platform handle that must be given back exactly once.
///
/// Implementations may assume `release` is called at most once per handle;
/// [`Lease`] enforces that.
pub trait Release: Send + Sync {
    fn release(&self);
}

/// Shared ownership of a handle with a one-shot release.
pub struct Lease<H: Release + ?Sized> {
    released: AtomicBool,
    handle: Box<H>,
}

impl<H: Release + ?Sized> Lease<H> {
    fn new(handle: Box<H>) -> Self {
        Self {
            released: AtomicBool::new(false),
            handle,
        }
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Release the handle. Returns `true` only for the call that actually did it.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.handle.release();
        true
    }
}

/// Type-erased view of a [`Lease`], used by channel state to revoke
/// whatever the in-flight call holds.
pub(crate) trait SharedLease: Send + Sync {
    fn revoke(&self) -> bool;
    fn is_released(&self) -> bool;
}

impl<H: Release + ?Sized> SharedLease for Lease<H> {
    fn revoke(&self) -> bool {
        Lease::release(self)
    }

    fn is_released(&self) -> bool {
        Lease::is_released(self)
    }
}

/// Owns a handle for one scope and releases it on drop.
pub struct ResourceGuard<H: Release + ?Sized> {
    lease: Arc<Lease<H>>,
}

impl<H: Release + ?Sized> ResourceGuard<H> {
    pub fn new(handle: Box<H>) -> Self {
        Self {
            lease: Arc::new(Lease::new(handle)),
        }
    }

    pub fn handle(&self) -> &H {
        self.lease.handle()
    }

    /// A second reference to the lease, for revocation from `stop()`.
    pub fn lease(&self) -> Arc<Lease<H>> {
        Arc::clone(&self.lease)
    }

    pub fn is_released(&self) -> bool {
        self.lease.is_released()
    }

    /// Release now instead of at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl<H: Release + ?Sized> Drop for ResourceGuard<H> {
    fn drop(&mut self) {
        if self.lease.release() {
            debug!("resource released by owning scope");
        }
    }
}

impl ResourceGuard<dyn CameraStream> {
    /// Open the rear camera and check it exposes a torch control.
    ///
    /// A stream without torch support is released before returning
    /// [`ChannelError::CapabilityUnavailable`].
    pub async fn acquire_torch(camera: &dyn Camera) -> Result<Self, ChannelError> {
        let stream = camera
            .open_rear_stream()
            .await
            .map_err(|source| ChannelError::AcquisitionFailure {
                channel: ChannelKind::Torch,
                source,
            })?;

        let guard = ResourceGuard::new(stream);
        if !guard.handle().torch_capable() {
            guard.release();
            return Err(ChannelError::CapabilityUnavailable {
                channel: ChannelKind::Torch,
                reason: "camera has no torch control".into(),
            });
        }
        Ok(guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counted(Arc<AtomicUsize>);

    impl Release for Counted {
        fn release(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn drop_releases_once() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let _guard = ResourceGuard::new(Box::new(Counted(Arc::clone(&count))));
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn revoked_lease_is_not_released_again_by_owner() {
        let count = Arc::new(AtomicUsize::new(0));
        let guard = ResourceGuard::new(Box::new(Counted(Arc::clone(&count))));
        let lease = guard.lease();

        assert!(lease.release());
        assert!(!lease.release());
        assert!(guard.is_released());
        drop(guard);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shared_lease_view_revokes() {
        let count = Arc::new(AtomicUsize::new(0));
        let guard: ResourceGuard<dyn Release> =
            ResourceGuard::new(Box::new(Counted(Arc::clone(&count))));
        let shared: Arc<dyn SharedLease> = guard.lease();

        assert!(shared.revoke());
        assert!(shared.is_released());
        guard.release();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
