use async_trait::async_trait;
use db::DBService;
use serde::Serialize;
use services::services::{
    auth::AuthService,
    config::{Config, ConfigError},
    events::{ChangeEvent, EventService, Table},
    storage::{StorageError, StorageService},
    weather::{WeatherError, WeatherService},
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Weather(#[from] WeatherError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Everything a request handler can reach.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new(config: Config) -> Result<Self, DeploymentError>;

    fn config(&self) -> &Config;

    fn db(&self) -> &DBService;

    fn events(&self) -> &EventService;

    fn weather(&self) -> &WeatherService;

    fn storage(&self) -> &StorageService;

    fn auth(&self) -> &AuthService;

    fn publish_insert<T: Serialize>(&self, table: Table, id: Uuid, record: &T) {
        self.events().publish(ChangeEvent::insert(table, id, record));
    }

    fn publish_update<T: Serialize>(&self, table: Table, id: Uuid, record: &T) {
        self.events().publish(ChangeEvent::update(table, id, record));
    }

    fn publish_delete(&self, table: Table, id: Uuid) {
        self.events().publish(ChangeEvent::delete(table, id));
    }
}
