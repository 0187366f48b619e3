use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Abstract input tokens handed to theme and menu handlers.
///
/// The wire names (`joyleft`, ...) are what the host's joystick map and the
/// theme scripts use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputAction {
    JoyLeft,
    JoyRight,
    JoyUp,
    JoyDown,
    JoySelect,
    JoyMenu,
    JoyCollectionMenu,
    JoyBack,
    JoyExit,
}

impl InputAction {
    pub const ALL: [InputAction; 9] = [
        InputAction::JoyLeft,
        InputAction::JoyRight,
        InputAction::JoyUp,
        InputAction::JoyDown,
        InputAction::JoySelect,
        InputAction::JoyMenu,
        InputAction::JoyCollectionMenu,
        InputAction::JoyBack,
        InputAction::JoyExit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InputAction::JoyLeft => "joyleft",
            InputAction::JoyRight => "joyright",
            InputAction::JoyUp => "joyup",
            InputAction::JoyDown => "joydown",
            InputAction::JoySelect => "joyselect",
            InputAction::JoyMenu => "joymenu",
            InputAction::JoyCollectionMenu => "joycollectionmenu",
            InputAction::JoyBack => "joyback",
            InputAction::JoyExit => "joyexit",
        }
    }
}

impl fmt::Display for InputAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown input action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for InputAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InputAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}
