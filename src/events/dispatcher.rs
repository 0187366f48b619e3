use super::sound::SoundPlayer;
use crate::overlay::OverlayKind;
use crate::protocol::{EventMessage, EventType};
use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Async callback receiving event messages
pub type EventHandler = Arc<dyn Fn(EventMessage) -> BoxFuture<'static, ()> + Send + Sync>;

/// Wraps an async closure as an [`EventHandler`]
pub fn event_handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(EventMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |message| Box::pin(f(message)))
}

/// Which targets an event reached
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sound: bool,
    pub local: bool,
    pub overlays: Vec<OverlayKind>,
}

#[derive(Default)]
struct Registry {
    handlers: IndexMap<EventType, Vec<EventHandler>>,
    local: Option<EventHandler>,
    overlays: HashMap<OverlayKind, EventHandler>,
}

pub struct EventDispatcher {
    registry: Mutex<Registry>,
    sound: Option<Arc<dyn SoundPlayer>>,
}

impl EventDispatcher {
    pub fn new(sound: Option<Arc<dyn SoundPlayer>>) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            sound,
        }
    }

    /// Subscribes `handler` to `event_type`. Handlers run in registration order.
    pub fn register_event_handler(&self, event_type: EventType, handler: EventHandler) {
        debug!("Registered handler for {}", event_type);
        self.lock()
            .handlers
            .entry(event_type)
            .or_default()
            .push(handler);
    }

    /// Installs this window's receive entrypoint
    pub fn set_local_receiver(&self, receiver: EventHandler) {
        self.lock().local = Some(receiver);
    }

    /// Called by an overlay surface once its document has loaded
    pub fn register_overlay_receiver(&self, kind: OverlayKind, receiver: EventHandler) {
        info!("Overlay {:?} registered for forwarded events", kind);
        self.lock().overlays.insert(kind, receiver);
    }

    /// Called on overlay teardown. Returns whether a receiver was registered.
    pub fn deregister_overlay_receiver(&self, kind: OverlayKind) -> bool {
        let removed = self.lock().overlays.remove(&kind).is_some();
        if removed {
            info!("Overlay {:?} deregistered", kind);
        }
        removed
    }

    pub fn handler_count(&self, event_type: &EventType) -> usize {
        self.lock()
            .handlers
            .get(event_type)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Delivers a pushed event.
    ///
    /// Sound directives are executed directly and go nowhere else. Otherwise
    /// the local receiver gets the message first, then, when `forward` is set,
    /// each registered overlay receiver in [`OverlayKind::ALL`] order. Targets
    /// without a receiver are skipped.
    pub async fn deliver(&self, message: EventMessage, forward: bool) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        if message.event_type() == Some(EventType::PlaySound) {
            match (&self.sound, message.get_str("sound")) {
                (Some(player), Some(sound)) => player.play(sound),
                (None, _) => debug!("No sound player installed, dropping playSound"),
                (_, None) => warn!("playSound directive without a sound"),
            }
            report.sound = true;
            return report;
        }

        let (local, overlays) = {
            let registry = self.lock();
            let overlays: Vec<(OverlayKind, EventHandler)> = if forward {
                OverlayKind::ALL
                    .into_iter()
                    .filter_map(|kind| registry.overlays.get(&kind).map(|r| (kind, r.clone())))
                    .collect()
            } else {
                Vec::new()
            };
            (registry.local.clone(), overlays)
        };

        if let Some(local) = local {
            local(message.clone()).await;
            report.local = true;
        }
        for (kind, receiver) in overlays {
            receiver(message.clone()).await;
            report.overlays.push(kind);
        }
        report
    }

    /// Runs every handler subscribed to the message's type, one at a time.
    /// Returns how many ran.
    pub async fn run_handlers(&self, message: &EventMessage) -> usize {
        let Some(event_type) = message.event_type() else {
            debug!("Event without a type, no handlers to run");
            return 0;
        };
        let handlers = self
            .lock()
            .handlers
            .get(&event_type)
            .cloned()
            .unwrap_or_default();

        for handler in &handlers {
            handler(message.clone()).await;
        }
        handlers.len()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, tag: &'static str) -> EventHandler {
        let log = log.clone();
        event_handler(move |message| {
            let log = log.clone();
            async move {
                let kind = message.get_str("type").unwrap_or("?").to_string();
                log.lock().unwrap().push(format!("{}:{}", tag, kind));
            }
        })
    }

    #[derive(Default)]
    struct RecordingSound(Mutex<Vec<String>>);

    impl SoundPlayer for RecordingSound {
        fn play(&self, sound: &str) {
            self.0.lock().unwrap().push(sound.to_string());
        }
    }

    #[tokio::test]
    async fn forwarded_events_reach_local_then_overlays_in_fixed_order() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = EventDispatcher::new(None);
        // Registered out of order on purpose
        dispatcher.register_overlay_receiver(OverlayKind::CollectionMenu, recorder(&log, "collection"));
        dispatcher.register_overlay_receiver(OverlayKind::MainMenu, recorder(&log, "menu"));
        dispatcher.set_local_receiver(recorder(&log, "local"));

        let message = EventMessage::new(json!({"type": "TableIndexUpdate", "index": 3}));
        let report = dispatcher.deliver(message, true).await;

        assert!(report.local);
        assert_eq!(
            report.overlays,
            vec![OverlayKind::MainMenu, OverlayKind::CollectionMenu]
        );
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "local:TableIndexUpdate",
                "menu:TableIndexUpdate",
                "collection:TableIndexUpdate"
            ]
        );
    }

    #[tokio::test]
    async fn unforwarded_events_stay_local_and_missing_targets_are_skipped() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = EventDispatcher::new(None);
        dispatcher.register_overlay_receiver(OverlayKind::MainMenu, recorder(&log, "menu"));

        let message = EventMessage::new(json!({"type": "TableLaunching"}));
        let report = dispatcher.deliver(message.clone(), false).await;
        assert_eq!(report, DeliveryReport::default());

        // No local receiver and no collection overlay: only the menu gets it
        let report = dispatcher.deliver(message, true).await;
        assert!(!report.local);
        assert_eq!(report.overlays, vec![OverlayKind::MainMenu]);

        assert!(dispatcher.deregister_overlay_receiver(OverlayKind::MainMenu));
        assert!(!dispatcher.deregister_overlay_receiver(OverlayKind::MainMenu));
    }

    #[tokio::test]
    async fn play_sound_short_circuits() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let sound = Arc::new(RecordingSound::default());
        let dispatcher = EventDispatcher::new(Some(sound.clone()));
        dispatcher.set_local_receiver(recorder(&log, "local"));

        let message = EventMessage::new(json!({"type": "playSound", "sound": "flipper.wav"}));
        let report = dispatcher.deliver(message, true).await;

        assert!(report.sound);
        assert!(!report.local);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(*sound.0.lock().unwrap(), vec!["flipper.wav"]);
    }

    #[tokio::test]
    async fn handlers_run_sequentially_in_registration_order() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = EventDispatcher::new(None);

        let slow_log = log.clone();
        dispatcher.register_event_handler(
            EventType::TableIndexUpdate,
            event_handler(move |_| {
                let log = slow_log.clone();
                async move {
                    log.lock().unwrap().push("slow:start".to_string());
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    log.lock().unwrap().push("slow:end".to_string());
                }
            }),
        );
        dispatcher.register_event_handler(EventType::TableIndexUpdate, recorder(&log, "fast"));
        dispatcher.register_event_handler(EventType::TableLaunching, recorder(&log, "other"));

        let ran = dispatcher
            .run_handlers(&EventMessage::new(json!({"type": "TableIndexUpdate"})))
            .await;

        assert_eq!(ran, 2);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["slow:start", "slow:end", "fast:TableIndexUpdate"]
        );
    }
}
