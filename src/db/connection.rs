use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;

pub type Db = Surreal<Any>;

/// Embedded on-disk database used by the CLI unless told otherwise. State
/// survives between invocations run from the same directory.
pub const DEFAULT_CLI_DB_URL: &str = "surrealkv://cluster.db";

/// Url for an embedded SurrealKV database stored at `path`.
pub fn local_db_url(path: &Path) -> String {
    format!("surrealkv://{}", path.display())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("CLUSTER_DB_URL").unwrap_or_else(|_| "memory".to_string()),
            namespace: env::var("CLUSTER_DB_NAMESPACE").unwrap_or_else(|_| "cluster".to_string()),
            database: env::var("CLUSTER_DB_DATABASE")
                .unwrap_or_else(|_| "control_plane".to_string()),
            username: env::var("CLUSTER_DB_USERNAME").ok(),
            password: env::var("CLUSTER_DB_PASSWORD").ok(),
        }
    }
}

pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    let db = surrealdb::engine::any::connect(config.url).await?;

    // Sign in if credentials are provided
    if let (Some(username), Some(password)) = (config.username, config.password) {
        db.signin(Root {
            username: &username,
            password: &password,
        })
        .await?;
    }

    db.use_ns(config.namespace).use_db(config.database).await?;

    Ok(db)
}

/// Define the single `resource` table every repository writes through.
///
/// Record ids are the store keys, so point lookups never scan. Values are kept
/// as JSON text; typed decoding happens in the repositories.
pub async fn ensure_schema(db: &Db) -> Result<()> {
    let schema_queries = vec![
        "DEFINE TABLE IF NOT EXISTS resource SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS key ON TABLE resource TYPE string;
         DEFINE FIELD IF NOT EXISTS value ON TABLE resource TYPE string;",
        "DEFINE INDEX IF NOT EXISTS resource_key ON TABLE resource COLUMNS key UNIQUE;",
    ];

    for query in schema_queries {
        db.query(query).await?.check()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        let db = create_connection(config).await.unwrap();

        ensure_schema(&db).await.unwrap();
        ensure_schema(&db).await.unwrap();
    }
}
