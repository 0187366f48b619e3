//! Window Session - per-window context tying the subsystems together
//!
//! ```text
//!  ChannelEvent ──► frame pump ──api_response──► CallCorrelator::resolve
//!                       │
//!                       ├──Opened / event──► event worker ──► ready sequence
//!                       │                    (arrival order)   EventDispatcher
//!                       │
//!  ButtonPress ─────────┴──────────────────► input worker ──► ButtonActionMap
//!                                                              InputRouter
//!                                                              OverlayStateMachine
//! ```
//!
//! Responses are resolved on the pump itself, so a handler awaiting a host
//! call never blocks the frame that would answer it.

use crate::assets::{asset_url, ImageKind, MISSING_ASSET_URL};
use crate::config::BridgeConfig;
use crate::events::{event_handler, DeliveryReport, EventDispatcher, EventHandler, SoundPlayer};
use crate::gamepad::{ButtonPress, GamepadGate};
use crate::host::{FilterCriteria, HostApi, Monitor, TableRecord};
use crate::input::{
    router::invoke_handlers, ButtonActionMap, InputAction, InputHandler, InputRouter, KeyCommand,
    KeyInput,
};
use crate::overlay::{OverlayKind, OverlayState, OverlayStateMachine, OverlaySurfaces};
use crate::protocol::{EventMessage, EventType, InboundFrame};
use crate::rpc::{CallCorrelator, CallError};
use crate::transport::ChannelEvent;
use serde_json::Value;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Collection selector meaning "every table, unfiltered"
pub const ALL_TABLES_COLLECTION: &str = "None";

enum EventWork {
    Opened,
    Event { message: EventMessage, forward: bool },
}

pub struct WindowSession {
    config: BridgeConfig,
    host: HostApi,
    dispatcher: Arc<EventDispatcher>,
    router: Mutex<InputRouter>,
    overlays: tokio::sync::Mutex<OverlayStateMachine>,
    overlay_state: watch::Receiver<OverlayState>,
    button_map: RwLock<ButtonActionMap>,
    gate: GamepadGate,
    tables: RwLock<Vec<TableRecord>>,
    monitors: RwLock<Vec<Monitor>>,
    window_name: RwLock<String>,
    identified: watch::Sender<Option<bool>>,
    assets_port: AtomicU16,
    current_index: AtomicUsize,
    quit: CancellationToken,
}

impl WindowSession {
    /// Builds the session and installs its `handle_event` as the dispatcher's
    /// local receiver.
    pub fn new(
        config: BridgeConfig,
        correlator: Arc<CallCorrelator>,
        surfaces: Arc<dyn OverlaySurfaces>,
        sound: Option<Arc<dyn SoundPlayer>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let dispatcher = Arc::new(EventDispatcher::new(sound));
            let receiver = weak.clone();
            dispatcher.set_local_receiver(event_handler(move |message| {
                let receiver = receiver.clone();
                async move {
                    if let Some(session) = receiver.upgrade() {
                        session.handle_event(message).await;
                    }
                }
            }));

            let overlays = OverlayStateMachine::new(surfaces, config.overlay_startup_delay());
            let overlay_state = overlays.subscribe();
            let primary = config.host.window == config.input.primary_window;

            Self {
                host: HostApi::new(correlator),
                dispatcher,
                router: Mutex::new(InputRouter::new(primary)),
                overlays: tokio::sync::Mutex::new(overlays),
                overlay_state,
                button_map: RwLock::new(ButtonActionMap::default()),
                gate: GamepadGate::default(),
                tables: RwLock::new(Vec::new()),
                monitors: RwLock::new(Vec::new()),
                window_name: RwLock::new(config.host.window.clone()),
                identified: watch::channel(None).0,
                assets_port: AtomicU16::new(config.assets.fallback_port),
                current_index: AtomicUsize::new(0),
                quit: CancellationToken::new(),
                config,
            }
        })
    }

    pub fn host(&self) -> &HostApi {
        &self.host
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    pub fn gate(&self) -> &GamepadGate {
        &self.gate
    }

    /// Cancelled once the user asked to quit
    pub fn quit_token(&self) -> CancellationToken {
        self.quit.clone()
    }

    pub fn is_primary(&self) -> bool {
        self.lock_router().is_primary()
    }

    /// Primary status as last answered by the host. `None` until the first
    /// ready sequence has named this window.
    pub fn subscribe_primary(&self) -> watch::Receiver<Option<bool>> {
        self.identified.subscribe()
    }

    pub fn window_name(&self) -> String {
        read(&self.window_name).clone()
    }

    pub fn overlay_state(&self) -> OverlayState {
        *self.overlay_state.borrow()
    }

    pub fn assets_port(&self) -> u16 {
        self.assets_port.load(Ordering::SeqCst)
    }

    pub fn monitors(&self) -> Vec<Monitor> {
        read(&self.monitors).clone()
    }

    // ---------------------------------------------------------------
    // Ready sequence
    // ---------------------------------------------------------------

    /// Runs after every (re)connect: monitors, tables, window identity,
    /// asset port, and on the primary window the button map.
    pub async fn on_opened(&self) -> Result<(), CallError> {
        info!("Host link open, running ready sequence");

        let monitors = self.host.monitors().await?;
        debug!("Host reports {} monitors", monitors.len());
        *write(&self.monitors) = monitors;

        self.reload_tables(false).await?;

        let name = self.host.window_name().await?;
        let primary = name == self.config.input.primary_window;
        info!("Window is {} (primary: {})", name, primary);
        *write(&self.window_name) = name;
        self.lock_router().set_primary(primary);
        self.identified.send_replace(Some(primary));

        match self.host.assets_port().await {
            Ok(port) => self.assets_port.store(port, Ordering::SeqCst),
            Err(e) => warn!(
                "Could not get asset port, keeping {}: {}",
                self.assets_port(),
                e
            ),
        }

        if primary {
            let mapping = self.host.joy_mapping().await?;
            let map = ButtonActionMap::from_host_mapping(mapping.iter());
            info!("Gamepad map covers {} buttons", map.len());
            *write(&self.button_map) = map;
        }
        Ok(())
    }

    /// Replaces the cached table list wholesale
    pub async fn reload_tables(&self, reset: bool) -> Result<usize, CallError> {
        let tables = self.host.tables(reset).await?;
        let count = tables.len();
        *write(&self.tables) = tables;
        if self.current_index.load(Ordering::SeqCst) >= count {
            self.current_index.store(0, Ordering::SeqCst);
        }
        debug!("Cached {} tables", count);
        Ok(count)
    }

    // ---------------------------------------------------------------
    // Table data
    // ---------------------------------------------------------------

    pub fn table_count(&self) -> usize {
        read(&self.tables).len()
    }

    /// Parsed meta.ini sections of a table
    pub fn table_meta(&self, index: usize) -> Option<Value> {
        read(&self.tables).get(index).map(|t| t.meta.clone())
    }

    /// Asset URL of one of a table's images; the missing-file image for an
    /// unknown index or an absent path.
    pub fn image_url(&self, index: usize, kind: ImageKind) -> String {
        let tables = read(&self.tables);
        match tables.get(index) {
            Some(table) => asset_url(kind.path_of(table), self.assets_port()),
            None => {
                debug!("No table at index {}", index);
                MISSING_ASSET_URL.to_string()
            }
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index.load(Ordering::SeqCst)
    }

    pub fn set_current_index(&self, index: usize) {
        self.current_index.store(index, Ordering::SeqCst);
    }

    // ---------------------------------------------------------------
    // Host actions
    // ---------------------------------------------------------------

    /// Launches a table with gamepad input suspended until the host returns
    pub async fn launch_table(&self, index: usize) -> Result<(), CallError> {
        info!("Launching table {}", index);
        let _suspended = self.gate.suspend();
        self.host.launch_table(index).await
    }

    pub async fn send_message_to_all_windows(&self, message: Value) -> Result<(), CallError> {
        self.host.send_event_all_windows(message).await
    }

    pub async fn send_message_to_all_windows_inc_self(
        &self,
        message: Value,
    ) -> Result<(), CallError> {
        self.host.send_event_all_windows_inc_self(message).await
    }

    pub async fn request_quit(&self) {
        info!("Quit requested");
        if let Err(e) = self.host.close_app().await {
            warn!("Host did not acknowledge close_app: {}", e);
        }
        self.quit.cancel();
    }

    // ---------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------

    pub fn register_input_handler(&self, handler: InputHandler) -> bool {
        self.lock_router().register_input_handler(handler)
    }

    pub fn register_input_handler_menu(&self, handler: InputHandler) {
        self.lock_router().register_input_handler_menu(handler);
    }

    pub fn register_input_handler_collection_menu(&self, handler: InputHandler) {
        self.lock_router().register_input_handler_collection_menu(handler);
    }

    pub fn register_event_handler(&self, event_type: EventType, handler: EventHandler) {
        self.dispatcher.register_event_handler(event_type, handler);
    }

    /// An overlay document finished loading and can receive forwarded events
    pub fn register_overlay(&self, kind: OverlayKind, receiver: EventHandler) {
        self.dispatcher.register_overlay_receiver(kind, receiver);
    }

    /// An overlay document went away: stop forwarding to it and drop every
    /// input handler it registered.
    pub fn deregister_overlay(&self, kind: OverlayKind) {
        self.dispatcher.deregister_overlay_receiver(kind);
        self.lock_router().clear(kind.registry());
    }

    // ---------------------------------------------------------------
    // Input
    // ---------------------------------------------------------------

    /// Keyboard entry point. Keys are ignored on non-primary windows.
    pub async fn on_key_down(&self, key: KeyInput) {
        if !self.is_primary() {
            return;
        }
        let Some(command) = self.config.input.keys.command_for(key) else {
            return;
        };
        debug!("Key {:?} -> {:?}", key, command);
        match command {
            KeyCommand::Quit => self.request_quit().await,
            KeyCommand::ToggleMenu => {
                self.toggle_menu().await;
            }
            KeyCommand::ToggleCollectionMenu => {
                self.toggle_collection_menu().await;
            }
            KeyCommand::Action(action) => self.trigger_input_action(action).await,
        }
    }

    /// Gamepad entry point. Every action bound to `button` is processed in
    /// map order. Returns the actions that were processed.
    pub async fn on_button_pressed(&self, button: u32, slot: usize) -> Vec<InputAction> {
        info!("Button: {} (slot {})", button, slot);
        let actions: Vec<InputAction> = read(&self.button_map).actions_for(button).collect();
        if actions.is_empty() {
            debug!("Button {} on slot {} is not mapped", button, slot);
            return actions;
        }

        let primary = self.is_primary();
        for &action in &actions {
            match action {
                InputAction::JoyExit if primary => self.request_quit().await,
                InputAction::JoyMenu if primary => {
                    self.toggle_menu().await;
                }
                InputAction::JoyCollectionMenu if primary => {
                    self.toggle_collection_menu().await;
                }
                _ => self.trigger_input_action(action).await,
            }
        }
        actions
    }

    /// Hands `action` to the registry selected by the current overlay state
    pub async fn trigger_input_action(&self, action: InputAction) {
        let (registry, handlers) = self.lock_router().handlers_for(self.overlay_state());
        debug!("{} -> {:?} registry", action, registry);
        invoke_handlers(&handlers, action).await;
    }

    pub async fn toggle_menu(&self) -> OverlayState {
        self.overlays.lock().await.toggle_menu().await
    }

    pub async fn toggle_collection_menu(&self) -> OverlayState {
        self.overlays.lock().await.toggle_collection_menu().await
    }

    // ---------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------

    /// Fans a pushed event out to this window and, when forwarded, its overlays
    pub async fn deliver_event(&self, message: EventMessage, forward: bool) -> DeliveryReport {
        self.dispatcher.deliver(message, forward).await
    }

    /// Local receive entrypoint: built-in table scope handling first, then
    /// every custom handler for the message type. Returns how many custom
    /// handlers ran.
    pub async fn handle_event(&self, message: EventMessage) -> usize {
        if message.event_type() == Some(EventType::TableDataChange) {
            if let Err(e) = self.apply_table_data_change(&message).await {
                error!("Failed to apply table data change: {}", e);
            }
        }
        self.dispatcher.run_handlers(&message).await
    }

    async fn apply_table_data_change(&self, message: &EventMessage) -> Result<(), CallError> {
        let collection = message.get_str("collection").filter(|c| !c.is_empty());
        let filters = message
            .get("filters")
            .and_then(|v| match serde_json::from_value::<FilterCriteria>(v.clone()) {
                Ok(criteria) => Some(criteria),
                Err(e) => {
                    warn!("Ignoring malformed filter criteria: {}", e);
                    None
                }
            })
            .filter(|criteria| !criteria.is_empty());
        let sort = message.get_str("sort").filter(|s| !s.is_empty());

        let reset = match (collection, filters, sort) {
            (Some(ALL_TABLES_COLLECTION), _, _) => {
                info!("Table scope reset to all tables");
                true
            }
            (Some(name), _, _) => {
                info!("Table scope set to collection {}", name);
                self.host.set_collection(name).await?;
                false
            }
            (None, Some(criteria), sort) => {
                info!("Applying table filters {:?}", criteria);
                self.host.apply_filters(&criteria).await?;
                if let Some(sort) = sort {
                    self.host.apply_sort(sort).await?;
                }
                false
            }
            (None, None, Some(sort)) => {
                info!("Applying table sort {}", sort);
                self.host.apply_sort(sort).await?;
                false
            }
            (None, None, None) => false,
        };

        self.reload_tables(reset).await.map(drop)
    }

    // ---------------------------------------------------------------
    // Run loop
    // ---------------------------------------------------------------

    /// Drives the session until the channel ends or quit is requested.
    ///
    /// Channel events are handled strictly in arrival order. Button presses
    /// are handled on their own worker so a long input handler never delays
    /// response resolution.
    pub async fn run(
        self: Arc<Self>,
        mut channel: mpsc::Receiver<ChannelEvent>,
        mut presses: mpsc::UnboundedReceiver<ButtonPress>,
    ) {
        let (work_tx, mut work_rx) = mpsc::unbounded_channel::<EventWork>();

        let session = self.clone();
        let event_worker = tokio::spawn(async move {
            while let Some(work) = work_rx.recv().await {
                match work {
                    EventWork::Opened => {
                        if let Err(e) = session.on_opened().await {
                            error!("Ready sequence failed: {}", e);
                        }
                    }
                    EventWork::Event { message, forward } => {
                        let report = session.deliver_event(message, forward).await;
                        debug!("Event delivered: {:?}", report);
                    }
                }
            }
        });

        let session = self.clone();
        let input_worker = tokio::spawn(async move {
            while let Some(press) = presses.recv().await {
                session.on_button_pressed(press.button, press.slot).await;
            }
            debug!("Button press stream ended");
        });

        info!("Window session running");
        loop {
            tokio::select! {
                _ = self.quit.cancelled() => {
                    info!("Quit requested, stopping window session");
                    break;
                }
                event = channel.recv() => {
                    let Some(event) = event else {
                        info!("Channel closed, stopping window session");
                        break;
                    };
                    if !self.pump(event, &work_tx) {
                        break;
                    }
                }
            }
        }

        event_worker.abort();
        input_worker.abort();
        self.host.correlator().abandon_all();
    }

    fn pump(&self, event: ChannelEvent, work: &mpsc::UnboundedSender<EventWork>) -> bool {
        let queued = match event {
            ChannelEvent::Opened => work.send(EventWork::Opened),
            ChannelEvent::Frame(InboundFrame::ApiResponse(response)) => {
                self.host.correlator().resolve(response);
                Ok(())
            }
            ChannelEvent::Frame(InboundFrame::Event {
                message,
                forward_iframe,
            }) => work.send(EventWork::Event {
                message: EventMessage::from(message),
                forward: forward_iframe,
            }),
            ChannelEvent::Frame(InboundFrame::Error { message }) => {
                warn!("Host reported an error: {}", message);
                Ok(())
            }
            ChannelEvent::Closed => {
                warn!("Host link lost, waiting for reconnect");
                self.host.correlator().abandon_all();
                Ok(())
            }
        };
        if queued.is_err() {
            error!("Event worker is gone");
            return false;
        }
        true
    }

    fn lock_router(&self) -> MutexGuard<'_, InputRouter> {
        self.router.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
