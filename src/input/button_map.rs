//! Inverse of the host's joystick map: button index -> actions.

use super::actions::InputAction;
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tracing::{debug, warn};

/// Button index to the ordered set of actions it triggers.
///
/// Several logical actions may share one physical button, so each entry is a
/// set. Order follows the host map, which is also the dispatch order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ButtonActionMap {
    buttons: IndexMap<u32, IndexSet<InputAction>>,
}

impl ButtonActionMap {
    /// Inverts the host's `action -> button(s)` mapping.
    ///
    /// A value may be a number, a numeric string, a comma separated string or
    /// an array of those. Unknown action names and unparsable values are
    /// skipped with a warning.
    pub fn from_host_mapping<'a, I>(mapping: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        let mut map = Self::default();
        for (name, value) in mapping {
            let action = match name.parse::<InputAction>() {
                Ok(action) => action,
                Err(e) => {
                    warn!("Skipping joystick mapping entry: {}", e);
                    continue;
                }
            };

            let indices = button_indices(value);
            if indices.is_empty() {
                warn!("No usable button index for {}: {}", action, value);
            }
            for index in indices {
                map.insert(index, action);
            }
        }
        debug!("Built button map with {} buttons", map.buttons.len());
        map
    }

    pub fn insert(&mut self, button: u32, action: InputAction) {
        self.buttons.entry(button).or_default().insert(action);
    }

    /// Actions bound to `button`, in dispatch order
    pub fn actions_for(&self, button: u32) -> impl Iterator<Item = InputAction> + '_ {
        self.buttons
            .get(&button)
            .into_iter()
            .flat_map(|actions| actions.iter().copied())
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buttons.len()
    }
}

fn button_indices(value: &Value) -> Vec<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .into_iter()
            .collect(),
        Value::String(s) => s
            .split(',')
            .filter_map(|part| part.trim().parse::<u32>().ok())
            .collect(),
        Value::Array(items) => items.iter().flat_map(button_indices).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    fn host_map(value: Value) -> IndexMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn shared_button_keeps_every_action_in_host_order() {
        let mapping = host_map(json!({
            "joyselect": "0",
            "joyleft": "4",
            "joymenu": "0",
            "joyright": 5,
        }));
        let map = ButtonActionMap::from_host_mapping(&mapping);

        let on_zero: Vec<_> = map.actions_for(0).collect();
        assert_eq!(on_zero, vec![InputAction::JoySelect, InputAction::JoyMenu]);
        assert_eq!(map.actions_for(5).collect::<Vec<_>>(), vec![InputAction::JoyRight]);
        assert_eq!(map.actions_for(9).count(), 0);
    }

    #[test]
    fn accepts_lists_and_skips_junk() {
        let mapping = host_map(json!({
            "joyback": "1, 7",
            "joyexit": [8, "9"],
            "joyturbo": "3",
            "joyup": "",
        }));
        let map = ButtonActionMap::from_host_mapping(&mapping);

        assert_eq!(map.actions_for(7).collect::<Vec<_>>(), vec![InputAction::JoyBack]);
        assert_eq!(map.actions_for(9).collect::<Vec<_>>(), vec![InputAction::JoyExit]);
        assert_eq!(map.actions_for(3).count(), 0);
        assert_eq!(map.len(), 4);
    }
}
