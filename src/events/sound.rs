use crate::host::HostApi;
use tracing::{debug, warn};

/// Executes `playSound` directives
pub trait SoundPlayer: Send + Sync {
    fn play(&self, sound: &str);
}

/// Hands sounds to the host, which owns the audio device.
pub struct HostSoundPlayer {
    host: HostApi,
}

impl HostSoundPlayer {
    pub fn new(host: HostApi) -> Self {
        Self { host }
    }
}

impl SoundPlayer for HostSoundPlayer {
    fn play(&self, sound: &str) {
        debug!("Playing sound {}", sound);
        let host = self.host.clone();
        let sound = sound.to_string();
        // Fire and forget; a missing sound must not stall event delivery
        tokio::spawn(async move {
            if let Err(e) = host.play_sound(&sound).await {
                warn!("Failed to play sound {}: {}", sound, e);
            }
        });
    }
}
