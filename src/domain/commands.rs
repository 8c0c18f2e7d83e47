/// A request to change the state of a single light.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetOn { light_id: u32, on: bool },
}

impl Command {
    pub fn light_id(&self) -> u32 {
        match self {
            Command::SetOn { light_id, .. } => *light_id,
        }
    }
}
