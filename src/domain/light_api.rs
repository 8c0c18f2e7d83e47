use crate::domain::commands::Command;
use crate::domain::light::Light;
use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt::Debug;
use thiserror::Error;

#[async_trait]
pub trait LightApi: Debug + Send + Sync {
    async fn lights(&self) -> Result<Vec<Light>, LightApiError>;

    async fn light(&self, light_id: u32) -> Result<Light, LightApiError>;

    async fn execute(&self, command: &Command) -> Result<(), LightApiError>;
}

#[derive(Error, Debug)]
pub enum LightApiError {
    #[error("unknown light '{light_id}'")]
    UnknownLight { light_id: u32 },
    #[error("unable to reach the lights: {0}")]
    Unreachable(#[source] Box<dyn StdError + Send + Sync>),
    #[error("{0}")]
    Failed(#[source] Box<dyn StdError + Send + Sync>),
}

impl LightApiError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, LightApiError::Unreachable(_))
    }
}
