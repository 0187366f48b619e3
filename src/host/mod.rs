//! Typed access to the host's call surface.
//!
//! Every method here is a thin wrapper over [`CallCorrelator::call`] that
//! shapes arguments and decodes the result. Errors are always returned to the
//! caller; nothing in this module retries.

pub mod console;
pub mod types;

pub use console::{forward_to_host, HostConsoleLayer};
pub use types::{FilterCriteria, Monitor, TableRecord};

use crate::rpc::{CallCorrelator, CallError};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct HostApi {
    correlator: Arc<CallCorrelator>,
}

impl HostApi {
    pub fn new(correlator: Arc<CallCorrelator>) -> Self {
        Self { correlator }
    }

    pub fn correlator(&self) -> &Arc<CallCorrelator> {
        &self.correlator
    }

    /// Untyped escape hatch for host methods without a wrapper
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, CallError> {
        self.correlator.call(method, args).await
    }

    pub async fn window_name(&self) -> Result<String, CallError> {
        self.call_typed("get_my_window_name", vec![]).await
    }

    /// Fetches the (filtered) table list. The host encodes it as a JSON string.
    pub async fn tables(&self, reset: bool) -> Result<Vec<TableRecord>, CallError> {
        let args = if reset { vec![json!(true)] } else { vec![] };
        let payload = self.call("get_tables", args).await?;
        let payload = match payload {
            Value::String(encoded) => {
                serde_json::from_str(&encoded).map_err(|e| CallError::Decode {
                    method: "get_tables".to_string(),
                    reason: e.to_string(),
                })?
            }
            Value::Null => Value::Array(Vec::new()),
            other => other,
        };
        decode("get_tables", payload)
    }

    pub async fn monitors(&self) -> Result<Vec<Monitor>, CallError> {
        self.call_typed("get_monitors", vec![]).await
    }

    /// Logical action name to button index(es), in the host's order
    pub async fn joy_mapping(&self) -> Result<IndexMap<String, Value>, CallError> {
        self.call_typed("get_joymaping", vec![]).await
    }

    pub async fn assets_port(&self) -> Result<u16, CallError> {
        let value = self.call("get_theme_assets_port", vec![]).await?;
        match &value {
            Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| CallError::Decode {
            method: "get_theme_assets_port".to_string(),
            reason: format!("not a port: {}", value),
        })
    }

    pub async fn collections(&self) -> Result<Vec<String>, CallError> {
        self.call_typed("get_collections", vec![]).await
    }

    pub async fn set_collection(&self, collection: &str) -> Result<(), CallError> {
        self.call("set_tables_by_collection", vec![json!(collection)])
            .await
            .map(drop)
    }

    pub async fn apply_filters(&self, criteria: &FilterCriteria) -> Result<(), CallError> {
        self.call("apply_filters", criteria.to_args()).await.map(drop)
    }

    pub async fn apply_sort(&self, sort: &str) -> Result<(), CallError> {
        self.call("apply_sort", vec![json!(sort)]).await.map(drop)
    }

    pub async fn reset_filters(&self) -> Result<(), CallError> {
        self.call("reset_filters", vec![]).await.map(drop)
    }

    /// Theme `config.json`, or `Null` when the theme ships none
    pub async fn theme_config(&self) -> Result<Value, CallError> {
        self.call("get_theme_config", vec![]).await
    }

    pub async fn close_app(&self) -> Result<(), CallError> {
        self.call("close_app", vec![]).await.map(drop)
    }

    /// Blocks on the host until the launched table process exits
    pub async fn launch_table(&self, index: usize) -> Result<(), CallError> {
        self.call("launch_table", vec![json!(index)]).await.map(drop)
    }

    pub async fn console_out(&self, text: &str) -> Result<(), CallError> {
        self.call("console_out", vec![json!(text)]).await.map(drop)
    }

    pub async fn send_event(&self, window: &str, message: Value) -> Result<(), CallError> {
        self.call("send_event", vec![json!(window), message])
            .await
            .map(drop)
    }

    /// Broadcast to every other window
    pub async fn send_event_all_windows(&self, message: Value) -> Result<(), CallError> {
        self.call("send_event_all_windows", vec![message])
            .await
            .map(drop)
    }

    /// Broadcast to every window, this one included
    pub async fn send_event_all_windows_inc_self(&self, message: Value) -> Result<(), CallError> {
        self.call("send_event_all_windows_incself", vec![message])
            .await
            .map(drop)
    }

    pub async fn play_sound(&self, sound: &str) -> Result<(), CallError> {
        self.call("playSound", vec![json!(sound)]).await.map(drop)
    }

    async fn call_typed<T: DeserializeOwned>(
        &self,
        method: &str,
        args: Vec<Value>,
    ) -> Result<T, CallError> {
        let value = self.call(method, args).await?;
        decode(method, value)
    }
}

fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T, CallError> {
    serde_json::from_value(value).map_err(|e| {
        debug!("Failed to decode result of `{}`: {}", method, e);
        CallError::Decode {
            method: method.to_string(),
            reason: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedTransport;

    fn host(
        script: impl Fn(&str, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    ) -> (HostApi, Arc<ScriptedTransport>) {
        let transport = ScriptedTransport::open();
        let correlator = Arc::new(CallCorrelator::new(transport.clone()));
        transport.answer_with(correlator.clone(), script);
        (HostApi::new(correlator), transport)
    }

    #[tokio::test]
    async fn tables_decodes_json_string_payload() {
        let (api, transport) = host(|method, args| match method {
            "get_tables" => {
                assert_eq!(args, &[json!(true)]);
                Ok(json!(r#"[{"tableDirName":"Attack from Mars"}]"#))
            }
            _ => Err("unexpected".into()),
        });

        let tables = api.tables(true).await.unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].table_dir_name, "Attack from Mars");
        assert_eq!(transport.sent_methods(), vec!["get_tables"]);
    }

    #[tokio::test]
    async fn tables_rejects_garbage_payload() {
        let (api, _) = host(|_, _| Ok(json!("not json")));
        assert!(matches!(
            api.tables(false).await,
            Err(CallError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn assets_port_accepts_string_or_number() {
        let (api, _) = host(|_, _| Ok(json!("8000")));
        assert_eq!(api.assets_port().await.unwrap(), 8000);

        let (api, _) = host(|_, _| Ok(json!(8123)));
        assert_eq!(api.assets_port().await.unwrap(), 8123);
    }

    #[tokio::test]
    async fn joy_mapping_keeps_host_order() {
        let (api, _) = host(|_, _| Ok(json!({"joyright": "5", "joyleft": "4", "joyexit": "8"})));
        let mapping = api.joy_mapping().await.unwrap();
        let keys: Vec<_> = mapping.keys().cloned().collect();
        assert_eq!(keys, vec!["joyright", "joyleft", "joyexit"]);
    }

    #[tokio::test]
    async fn one_malformed_record_does_not_fail_the_table_list() {
        use crate::assets::{asset_url, MISSING_ASSET_URL};

        let (api, _) = host(|_, _| {
            Ok(json!(
                r#"[{"tableDirName":"Good","BGImagePath":"/t/Good/medias/bg.png"},{"tableDirName":"Bad","BGImagePath":false},{"tableDirName":null}]"#
            ))
        });

        let tables = api.tables(false).await.unwrap();
        assert_eq!(tables.len(), 3);
        assert_eq!(tables[1].table_dir_name, "Bad");
        assert_eq!(
            asset_url(tables[1].bg_image_path.as_deref(), 8000),
            MISSING_ASSET_URL
        );
        assert_eq!(tables[2].table_dir_name, "");
        assert_ne!(
            asset_url(tables[0].bg_image_path.as_deref(), 8000),
            MISSING_ASSET_URL
        );
    }

    #[tokio::test]
    async fn catalogue_wrappers_use_host_method_names() {
        let (api, transport) = host(|method, _| match method {
            "get_collections" => Ok(json!(["Favorites", "Williams"])),
            "get_theme_config" => Ok(json!({"accent": "#ff0"})),
            "reset_filters" => Ok(Value::Null),
            _ => Err("unexpected".into()),
        });

        assert_eq!(
            api.collections().await.unwrap(),
            vec!["Favorites".to_string(), "Williams".to_string()]
        );
        api.reset_filters().await.unwrap();
        assert_eq!(api.theme_config().await.unwrap()["accent"], "#ff0");

        let frames: Vec<_> = transport
            .sent_frames()
            .into_iter()
            .map(|(_, method, args)| (method, args))
            .collect();
        assert_eq!(
            frames,
            vec![
                ("get_collections".to_string(), vec![]),
                ("reset_filters".to_string(), vec![]),
                ("get_theme_config".to_string(), vec![]),
            ]
        );
    }

    #[tokio::test]
    async fn send_event_targets_one_window() {
        let (api, transport) = host(|_, _| Ok(Value::Null));

        api.send_event("dmd", json!({"type": "TableIndexUpdate", "index": 3}))
            .await
            .unwrap();

        let (_, method, args) = transport.sent_frames().remove(0);
        assert_eq!(method, "send_event");
        assert_eq!(
            args,
            vec![json!("dmd"), json!({"type": "TableIndexUpdate", "index": 3})]
        );
    }
}
