use serde::{Deserialize, Serialize};

/// Which keystrokes count as taps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    /// Single ASCII letters
    #[default]
    Letters,
    AnyCharacter,
    OneOf(String),
}

impl KeyPolicy {
    pub fn accepts(&self, key: char) -> bool {
        match self {
            KeyPolicy::Letters => key.is_ascii_alphabetic(),
            KeyPolicy::AnyCharacter => !key.is_control(),
            KeyPolicy::OneOf(keys) => keys.contains(key),
        }
    }
}

#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub struct KeyPress {
    pub key: char,
    /// Set for auto-repeat events generated while the key is held
    pub repeat: bool,
}

impl KeyPress {
    pub fn new(key: char) -> Self {
        Self { key, repeat: false }
    }

    pub fn repeated(key: char) -> Self {
        Self { key, repeat: true }
    }
}
