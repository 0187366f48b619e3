//! Overlay State Machine - main menu and collection menu presentation
//!
//! # States
//!
//! ```text
//!            toggle_menu              toggle_collection_menu
//!  Closed ───────────────► MainOpen ─────────────────────────┐
//!    ▲  ◄───────────────     │  (close main, then open       │
//!    │     toggle_menu       │   collection)                 ▼
//!    └──────────────────────────────────────────────── CollectionOpen
//!              toggle_collection_menu
//! ```
//!
//! At most one overlay is open at any time. Opening one always closes the
//! other first.

pub mod surfaces;

pub use surfaces::{HeadlessSurfaces, OverlaySurfaces};

use crate::input::HandlerRegistry;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Delay after creating a surface before it is shown, to avoid a flash
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_millis(10);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OverlayState {
    #[default]
    Closed,
    MainOpen,
    CollectionOpen,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OverlayKind {
    MainMenu,
    CollectionMenu,
}

impl OverlayKind {
    /// Fixed forwarding order for events
    pub const ALL: [OverlayKind; 2] = [OverlayKind::MainMenu, OverlayKind::CollectionMenu];

    pub fn open_state(self) -> OverlayState {
        match self {
            OverlayKind::MainMenu => OverlayState::MainOpen,
            OverlayKind::CollectionMenu => OverlayState::CollectionOpen,
        }
    }

    pub fn registry(self) -> HandlerRegistry {
        match self {
            OverlayKind::MainMenu => HandlerRegistry::MainMenu,
            OverlayKind::CollectionMenu => HandlerRegistry::CollectionMenu,
        }
    }

    /// Document loaded into the overlay surface
    pub fn document(self) -> &'static str {
        match self {
            OverlayKind::MainMenu => "../../mainmenu/mainmenu.html",
            OverlayKind::CollectionMenu => "../../collectionmenu/collectionmenu.html",
        }
    }
}

impl OverlayState {
    pub fn open_kind(self) -> Option<OverlayKind> {
        match self {
            OverlayState::Closed => None,
            OverlayState::MainOpen => Some(OverlayKind::MainMenu),
            OverlayState::CollectionOpen => Some(OverlayKind::CollectionMenu),
        }
    }
}

pub struct OverlayStateMachine {
    surfaces: Arc<dyn OverlaySurfaces>,
    created: HashSet<OverlayKind>,
    startup_delay: Duration,
    state: watch::Sender<OverlayState>,
}

impl OverlayStateMachine {
    pub fn new(surfaces: Arc<dyn OverlaySurfaces>, startup_delay: Duration) -> Self {
        let (state, _) = watch::channel(OverlayState::Closed);
        Self {
            surfaces,
            created: HashSet::new(),
            startup_delay,
            state,
        }
    }

    pub fn state(&self) -> OverlayState {
        *self.state.borrow()
    }

    /// Observers read the current state without locking the machine
    pub fn subscribe(&self) -> watch::Receiver<OverlayState> {
        self.state.subscribe()
    }

    pub async fn toggle_menu(&mut self) -> OverlayState {
        self.toggle(OverlayKind::MainMenu).await
    }

    pub async fn toggle_collection_menu(&mut self) -> OverlayState {
        self.toggle(OverlayKind::CollectionMenu).await
    }

    pub async fn toggle(&mut self, kind: OverlayKind) -> OverlayState {
        match self.state().open_kind() {
            Some(open) if open == kind => self.close(kind),
            Some(open) => {
                self.close(open);
                self.open(kind).await;
            }
            None => self.open(kind).await,
        }
        let state = self.state();
        info!("Overlay state is now {:?}", state);
        state
    }

    /// Closes whichever overlay is open
    pub fn close_any(&mut self) {
        if let Some(open) = self.state().open_kind() {
            self.close(open);
        }
    }

    async fn open(&mut self, kind: OverlayKind) {
        self.state.send_replace(kind.open_state());
        self.surfaces.set_backdrop(true);

        if self.created.insert(kind) {
            debug!("Creating {:?} surface from {}", kind, kind.document());
            self.surfaces.create(kind);
            tokio::time::sleep(self.startup_delay).await;
        }
        self.surfaces.show(kind);
    }

    fn close(&mut self, kind: OverlayKind) {
        self.state.send_replace(OverlayState::Closed);
        self.surfaces.set_backdrop(false);
        // Hidden, not destroyed; the next open reuses it
        self.surfaces.hide(kind);
        self.surfaces.post_reset(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSurfaces {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingSurfaces {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.calls.lock().unwrap())
        }
    }

    impl OverlaySurfaces for RecordingSurfaces {
        fn create(&self, kind: OverlayKind) {
            self.calls.lock().unwrap().push(format!("create {:?}", kind));
        }
        fn show(&self, kind: OverlayKind) {
            self.calls.lock().unwrap().push(format!("show {:?}", kind));
        }
        fn hide(&self, kind: OverlayKind) {
            self.calls.lock().unwrap().push(format!("hide {:?}", kind));
        }
        fn set_backdrop(&self, active: bool) {
            self.calls.lock().unwrap().push(format!("backdrop {}", active));
        }
        fn post_reset(&self, kind: OverlayKind) {
            self.calls.lock().unwrap().push(format!("reset {:?}", kind));
        }
    }

    fn machine() -> (OverlayStateMachine, Arc<RecordingSurfaces>) {
        let surfaces = Arc::new(RecordingSurfaces::default());
        (
            OverlayStateMachine::new(surfaces.clone(), Duration::from_millis(1)),
            surfaces,
        )
    }

    #[tokio::test]
    async fn surface_is_created_once_and_reused() {
        let (mut overlays, surfaces) = machine();

        assert_eq!(overlays.toggle_menu().await, OverlayState::MainOpen);
        assert_eq!(
            surfaces.take(),
            vec!["backdrop true", "create MainMenu", "show MainMenu"]
        );

        assert_eq!(overlays.toggle_menu().await, OverlayState::Closed);
        assert_eq!(
            surfaces.take(),
            vec!["backdrop false", "hide MainMenu", "reset MainMenu"]
        );

        assert_eq!(overlays.toggle_menu().await, OverlayState::MainOpen);
        assert_eq!(surfaces.take(), vec!["backdrop true", "show MainMenu"]);
    }

    #[tokio::test]
    async fn opening_collection_closes_main_first() {
        let (mut overlays, surfaces) = machine();
        overlays.toggle_menu().await;
        surfaces.take();

        assert_eq!(
            overlays.toggle_collection_menu().await,
            OverlayState::CollectionOpen
        );
        assert_eq!(
            surfaces.take(),
            vec![
                "backdrop false",
                "hide MainMenu",
                "reset MainMenu",
                "backdrop true",
                "create CollectionMenu",
                "show CollectionMenu",
            ]
        );

        // And symmetric the other way round
        assert_eq!(overlays.toggle_menu().await, OverlayState::MainOpen);
        assert_eq!(overlays.state(), OverlayState::MainOpen);
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let (mut overlays, _) = machine();
        let rx = overlays.subscribe();
        overlays.toggle_collection_menu().await;
        assert_eq!(*rx.borrow(), OverlayState::CollectionOpen);
        overlays.close_any();
        assert_eq!(*rx.borrow(), OverlayState::Closed);
    }
}
