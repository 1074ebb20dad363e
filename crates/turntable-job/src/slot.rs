use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use turntable_render::Renderer;

use crate::JobError;

/// Holds the one renderer. Previews and jobs take it out with
/// [`RenderSlot::try_lease`]; nobody waits for it.
#[derive(Clone)]
pub struct RenderSlot {
    inner: Arc<Mutex<Option<Renderer>>>,
}

/// Exclusive use of the renderer; puts it back when dropped.
pub struct RenderLease {
    renderer: Renderer,
    slot: RenderSlot,
}

impl RenderSlot {
    pub fn new(renderer: Renderer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(renderer))),
        }
    }

    pub fn try_lease(&self) -> Result<RenderLease, JobError> {
        let renderer = self.lock().take().ok_or(JobError::Busy)?;
        Ok(RenderLease {
            renderer,
            slot: self.clone(),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.lock().is_none()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Renderer>> {
        // Only whole-value swaps happen under the lock, so a poisoned slot is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Deref for RenderLease {
    type Target = Renderer;

    fn deref(&self) -> &Renderer {
        &self.renderer
    }
}

impl DerefMut for RenderLease {
    fn deref_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }
}

impl Drop for RenderLease {
    fn drop(&mut self) {
        let renderer = std::mem::take(&mut self.renderer);
        *self.slot.lock() = Some(renderer);
    }
}
