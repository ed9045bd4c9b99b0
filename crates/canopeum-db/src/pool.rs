use canopeum_config::DatabaseConfig;
use deadpool_postgres::{Object, Pool, PoolConfig, Runtime};
use tokio_postgres::NoTls;

use crate::Result;

/// Connection pool shared by request handlers.
#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

impl Database {
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut cfg = deadpool_postgres::Config::new();
        cfg.url = Some(config.url().to_string());
        cfg.pool = Some(PoolConfig::new(config.max_connections()));
        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;
        tracing::info!(
            database = %mask_password(config.url()),
            max_connections = config.max_connections(),
            "connection pool ready"
        );
        Ok(Database { pool })
    }

    pub fn from_pool(pool: Pool) -> Self {
        Database { pool }
    }

    /// Check out a connection.
    pub async fn get(&self) -> Result<Object> {
        Ok(self.pool.get().await?)
    }
}

/// Hide the password part of a connection URL before logging it.
pub fn mask_password(url: &str) -> String {
    let Some(scheme_end) = url.find("://").map(|i| i + 3) else {
        return url.to_string();
    };
    let Some(at) = url[scheme_end..].rfind('@').map(|i| scheme_end + i) else {
        return url.to_string();
    };
    match url[scheme_end..at].find(':') {
        Some(colon) => {
            let user = &url[scheme_end..scheme_end + colon];
            format!("{}{user}:***{}", &url[..scheme_end], &url[at..])
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn masks_password() {
        assert_eq!(
            mask_password("postgres://canopeum:hunter2@db:5432/canopeum"),
            "postgres://canopeum:***@db:5432/canopeum"
        );
    }

    #[test]
    fn leaves_urls_without_password_alone() {
        assert_eq!(
            mask_password("postgres://canopeum@db/canopeum"),
            "postgres://canopeum@db/canopeum"
        );
        assert_eq!(mask_password("host=localhost"), "host=localhost");
    }

    #[test]
    fn password_may_contain_at_sign() {
        assert_eq!(
            mask_password("postgres://me:p@ss@db/x"),
            "postgres://me:***@db/x"
        );
    }
}
