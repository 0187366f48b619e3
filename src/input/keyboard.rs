//! Keyboard handling for the primary window.

use super::actions::InputAction;
use serde::{Deserialize, Serialize};

/// Key identity as delivered by the window toolkit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyInput {
    Escape,
    Enter,
    ArrowLeft,
    ArrowRight,
    ControlLeft,
    ControlRight,
    Char(char),
}

/// What a key press asks the session to do
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyCommand {
    Quit,
    Action(InputAction),
    ToggleMenu,
    ToggleCollectionMenu,
}

/// Configurable letter keys. Arrows, Enter, Escape and the Control keys are fixed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub quit: char,
    pub menu: char,
    pub collection_menu: char,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            quit: 'q',
            menu: 'm',
            collection_menu: 'c',
        }
    }
}

impl KeyBindings {
    pub fn command_for(&self, key: KeyInput) -> Option<KeyCommand> {
        match key {
            KeyInput::Escape => Some(KeyCommand::Quit),
            KeyInput::ArrowLeft | KeyInput::ControlLeft => {
                Some(KeyCommand::Action(InputAction::JoyLeft))
            }
            KeyInput::ArrowRight | KeyInput::ControlRight => {
                Some(KeyCommand::Action(InputAction::JoyRight))
            }
            KeyInput::Enter => Some(KeyCommand::Action(InputAction::JoySelect)),
            KeyInput::Char(c) => {
                if c.eq_ignore_ascii_case(&self.quit) {
                    Some(KeyCommand::Quit)
                } else if c.eq_ignore_ascii_case(&self.menu) {
                    Some(KeyCommand::ToggleMenu)
                } else if c.eq_ignore_ascii_case(&self.collection_menu) {
                    Some(KeyCommand::ToggleCollectionMenu)
                } else {
                    None
                }
            }
        }
    }
}
