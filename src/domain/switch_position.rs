use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchPosition {
    On,
    Off,
}

impl SwitchPosition {
    pub fn is_on(self) -> bool {
        self == SwitchPosition::On
    }
}

impl From<bool> for SwitchPosition {
    fn from(on: bool) -> Self {
        if on { SwitchPosition::On } else { SwitchPosition::Off }
    }
}

impl Display for SwitchPosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SwitchPosition::On => write!(f, "on"),
            SwitchPosition::Off => write!(f, "off"),
        }
    }
}
