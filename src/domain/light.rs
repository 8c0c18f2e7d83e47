#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub id: u32,
    pub name: String,
    pub model_id: Option<String>,
    pub state: LightState,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightState {
    pub on: bool,
    /// Whether the bridge can currently talk to the light. Cutting its power makes it unreachable.
    pub reachable: bool,
    pub brightness: Option<u8>,
}
