pub mod error;
pub mod middleware;
pub mod routes;

pub type DeploymentImpl = local_deployment::LocalDeployment;

/// Default log filter; `RUST_LOG` overrides it.
pub const DEFAULT_LOG_FILTER: &str = "info,server=debug,services=debug,db=info";
