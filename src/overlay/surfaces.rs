use super::OverlayKind;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// Presentation seam for overlay surfaces.
///
/// The window toolkit implements this; the state machine only decides when
/// each call happens.
pub trait OverlaySurfaces: Send + Sync {
    /// Build the surface and start loading its document. Called once per kind.
    fn create(&self, kind: OverlayKind);

    fn show(&self, kind: OverlayKind);

    fn hide(&self, kind: OverlayKind);

    /// Dimming backdrop shared by both overlay kinds
    fn set_backdrop(&self, active: bool);

    /// Post the "reset state" notification into the surface's document
    fn post_reset(&self, kind: OverlayKind);
}

/// Surface host for windows without a toolkit attached. Tracks visibility only.
#[derive(Default)]
pub struct HeadlessSurfaces {
    visible: Mutex<HashSet<OverlayKind>>,
}

impl HeadlessSurfaces {
    pub fn is_visible(&self, kind: OverlayKind) -> bool {
        self.visible
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&kind)
    }
}

impl OverlaySurfaces for HeadlessSurfaces {
    fn create(&self, kind: OverlayKind) {
        info!("Overlay {:?} created ({})", kind, kind.document());
    }

    fn show(&self, kind: OverlayKind) {
        self.visible
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind);
        debug!("Overlay {:?} shown", kind);
    }

    fn hide(&self, kind: OverlayKind) {
        self.visible
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&kind);
        debug!("Overlay {:?} hidden", kind);
    }

    fn set_backdrop(&self, active: bool) {
        debug!("Overlay backdrop active: {}", active);
    }

    fn post_reset(&self, kind: OverlayKind) {
        debug!("Posted reset state to {:?}", kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::OverlayStateMachine;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn headless_surfaces_track_the_open_overlay() {
        let surfaces = Arc::new(HeadlessSurfaces::default());
        let mut overlays = OverlayStateMachine::new(surfaces.clone(), Duration::from_millis(10));

        overlays.toggle_menu().await;
        assert!(surfaces.is_visible(OverlayKind::MainMenu));

        overlays.toggle_collection_menu().await;
        assert!(!surfaces.is_visible(OverlayKind::MainMenu));
        assert!(surfaces.is_visible(OverlayKind::CollectionMenu));

        overlays.close_any();
        assert!(!surfaces.is_visible(OverlayKind::CollectionMenu));
    }
}
