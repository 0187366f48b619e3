//! Routes action tokens to exactly one handler registry.
//!
//! ```text
//!                    ┌── CollectionOpen ──► collection-menu handlers
//! InputAction ──► OverlayState ─ MainOpen ──► main-menu handlers
//!                    └── Closed ──────────► theme handlers
//! ```

use super::actions::InputAction;
use crate::overlay::OverlayState;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

/// Async callback receiving action tokens
pub type InputHandler = Arc<dyn Fn(InputAction) -> BoxFuture<'static, ()> + Send + Sync>;

/// Wraps an async closure as an [`InputHandler`]
pub fn input_handler<F, Fut>(f: F) -> InputHandler
where
    F: Fn(InputAction) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |action| Box::pin(f(action)))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandlerRegistry {
    Theme,
    MainMenu,
    CollectionMenu,
}

impl HandlerRegistry {
    pub fn for_state(state: OverlayState) -> Self {
        match state {
            OverlayState::CollectionOpen => HandlerRegistry::CollectionMenu,
            OverlayState::MainOpen => HandlerRegistry::MainMenu,
            OverlayState::Closed => HandlerRegistry::Theme,
        }
    }
}

#[derive(Default)]
pub struct InputRouter {
    primary: bool,
    theme: Vec<InputHandler>,
    main_menu: Vec<InputHandler>,
    collection_menu: Vec<InputHandler>,
}

impl InputRouter {
    pub fn new(primary: bool) -> Self {
        Self {
            primary,
            ..Self::default()
        }
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn set_primary(&mut self, primary: bool) {
        self.primary = primary;
    }

    /// Theme handlers are only accepted on the input-owning window.
    ///
    /// Returns `false` when the handler was refused.
    pub fn register_input_handler(&mut self, handler: InputHandler) -> bool {
        if !self.primary {
            debug!("Ignoring theme input handler on non-primary window");
            return false;
        }
        info!("Registered theme input handler");
        self.theme.push(handler);
        true
    }

    pub fn register_input_handler_menu(&mut self, handler: InputHandler) {
        info!("Registered main menu input handler");
        self.main_menu.push(handler);
    }

    pub fn register_input_handler_collection_menu(&mut self, handler: InputHandler) {
        info!("Registered collection menu input handler");
        self.collection_menu.push(handler);
    }

    /// Whole-registry reset, used when an overlay's document goes away
    pub fn clear(&mut self, registry: HandlerRegistry) {
        let handlers = self.registry_mut(registry);
        let count = handlers.len();
        handlers.clear();
        info!("Cleared {} {:?} input handlers", count, registry);
    }

    pub fn handler_count(&self, registry: HandlerRegistry) -> usize {
        self.registry(registry).len()
    }

    /// Snapshot of the handlers that should receive input in `state`
    pub fn handlers_for(&self, state: OverlayState) -> (HandlerRegistry, Vec<InputHandler>) {
        let registry = HandlerRegistry::for_state(state);
        (registry, self.registry(registry).clone())
    }

    /// Invokes every handler of the registry selected by `state`, in
    /// registration order. Returns the registry that received the action.
    pub async fn trigger_input_action(
        &self,
        action: InputAction,
        state: OverlayState,
    ) -> HandlerRegistry {
        let (registry, handlers) = self.handlers_for(state);
        invoke_handlers(&handlers, action).await;
        registry
    }

    fn registry(&self, registry: HandlerRegistry) -> &Vec<InputHandler> {
        match registry {
            HandlerRegistry::Theme => &self.theme,
            HandlerRegistry::MainMenu => &self.main_menu,
            HandlerRegistry::CollectionMenu => &self.collection_menu,
        }
    }

    fn registry_mut(&mut self, registry: HandlerRegistry) -> &mut Vec<InputHandler> {
        match registry {
            HandlerRegistry::Theme => &mut self.theme,
            HandlerRegistry::MainMenu => &mut self.main_menu,
            HandlerRegistry::CollectionMenu => &mut self.collection_menu,
        }
    }
}

/// Runs `handlers` one after another with `action`
pub async fn invoke_handlers(handlers: &[InputHandler], action: InputAction) {
    debug!("Dispatching {} to {} handlers", action, handlers.len());
    for handler in handlers {
        handler(action).await;
    }
}
