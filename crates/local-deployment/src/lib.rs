use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use services::services::{
    auth::AuthService,
    config::Config,
    events::{DEFAULT_CAPACITY, EventService},
    storage::StorageService,
    weather::WeatherService,
};
use tracing::{info, warn};

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<Config>,
    db: DBService,
    events: EventService,
    weather: WeatherService,
    storage: StorageService,
    auth: AuthService,
}

impl LocalDeployment {
    /// Same wiring as [`Deployment::new`] over a private in-memory database.
    pub async fn in_memory(config: Config) -> Result<Self, DeploymentError> {
        let db = DBService::new_in_memory().await?;
        Self::assemble(config, db)
    }

    fn assemble(config: Config, db: DBService) -> Result<Self, DeploymentError> {
        let weather = WeatherService::new(config.weather_url.clone(), config.weather_ttl)?;
        let storage = StorageService::new(config.storage_url.as_deref(), config.storage_bucket.clone())?;
        let auth = AuthService::new(config.jwt_secret.as_ref(), config.jwt_audience.clone());

        if !auth.is_configured() {
            warn!("OBRA_JWT_SECRET is not set; every gated request will be rejected");
        }
        if config.storage_url.is_none() {
            warn!("OBRA_STORAGE_URL is not set; photo and receipt links are disabled");
        }

        Ok(Self {
            config: Arc::new(config),
            db,
            events: EventService::new(DEFAULT_CAPACITY),
            weather,
            storage,
            auth,
        })
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new(config: Config) -> Result<Self, DeploymentError> {
        let db = if config.database_url.contains(":memory:") {
            DBService::new_in_memory().await?
        } else {
            DBService::new(&config.database_url).await?
        };
        let deployment = Self::assemble(config, db)?;
        info!(
            storage_bucket = %deployment.config.storage_bucket,
            currency = %deployment.config.currency,
            "Deployment ready"
        );
        Ok(deployment)
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn events(&self) -> &EventService {
        &self.events
    }

    fn weather(&self) -> &WeatherService {
        &self.weather
    }

    fn storage(&self) -> &StorageService {
        &self.storage
    }

    fn auth(&self) -> &AuthService {
        &self.auth
    }
}

#[cfg(test)]
mod tests {
    use db::models::project::{CreateProject, Project};
    use services::services::events::{EventFilter, LiveMessage, Table};
    use tokio_stream::StreamExt;
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn file_database_is_created_and_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("obra.sqlite").display());
        let config = Config {
            database_url: url,
            ..Config::for_tests("secret")
        };

        let deployment = LocalDeployment::new(config).await.unwrap();
        deployment.db().health_check().await.unwrap();
        assert!(dir.path().join("obra.sqlite").exists());
        assert!(deployment.auth().is_configured());
    }

    #[tokio::test]
    async fn publish_reaches_the_event_bus() {
        let deployment = LocalDeployment::in_memory(Config::for_tests("secret")).await.unwrap();
        let project = Project::create(
            &deployment.db().pool,
            &CreateProject::named("Nave Industrial", "Aceros"),
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        let rx = deployment.events().subscribe(EventFilter::default());
        tokio::pin!(rx);
        assert_eq!(deployment.events().subscriber_count(), 1);
        deployment.publish_insert(Table::Projects, project.id, &project);

        let message = tokio::time::timeout(std::time::Duration::from_secs(1), rx.next())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            message,
            LiveMessage::Change(ref e) if e.id == project.id
        ));
    }
}
