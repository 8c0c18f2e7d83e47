use serde::{Deserialize, Serialize};

// API: https://developers.meethue.com/develop/hue-api/lights-api/#get-attr-and-state
#[derive(Debug, Deserialize)]
pub struct LightGet {
    pub name: String,
    pub modelid: Option<String>,
    pub state: LightStateGet,
}

#[derive(Debug, Deserialize)]
pub struct LightStateGet {
    pub on: bool,
    pub bri: Option<u8>,
    #[serde(default)]
    pub reachable: bool,
}

// API: https://developers.meethue.com/develop/hue-api/lights-api/#set-light-state
#[derive(Debug, Serialize)]
pub struct StateRequest {
    pub on: bool,
}
