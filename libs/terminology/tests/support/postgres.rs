use anyhow::Context as _;
use ferrum_terminology::{
    config::DatabaseConfig,
    db::{self, PostgresTerminologyStore},
    Config,
};
use futures::FutureExt as _;
use sqlx::{Connection as _, PgPool};
use url::Url;
use uuid::Uuid;

/// Migrated, private schema on the test server
pub struct TestDatabase {
    pub pool: PgPool,
    pub store: PostgresTerminologyStore,
    schema: String,
    admin_database_url: String,
}

/// `TEST_DATABASE_URL`, falling back to `database.test_database_url` of the loaded config
pub fn test_database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL")
        .ok()
        .filter(|url| !url.is_empty())
        .or_else(|| {
            Config::load()
                .ok()
                .and_then(|config| config.database.test_database_url)
        })
}

impl TestDatabase {
    pub async fn new(admin_database_url: String) -> anyhow::Result<Self> {
        super::init_tracing();

        let schema = format!("test_{}", Uuid::new_v4().simple());
        let mut admin_conn = sqlx::PgConnection::connect(&admin_database_url)
            .await
            .context("connect admin db for schema create")?;
        sqlx::query(&format!(r#"CREATE SCHEMA "{}""#, schema))
            .execute(&mut admin_conn)
            .await
            .context("create test schema")?;

        let config = DatabaseConfig {
            url: with_search_path(&admin_database_url, &schema)?,
            pool_min_size: 0,
            // Tests run in parallel, each with its own pool.
            pool_max_size: 4,
            lock_timeout_seconds: 5,
            run_migrations: true,
            ..DatabaseConfig::default()
        };

        let pool = db::connect(&config).await.context("connect test pool")?;
        let store = PostgresTerminologyStore::new(pool.clone());

        Ok(Self {
            pool,
            store,
            schema,
            admin_database_url,
        })
    }

    pub async fn cleanup(self) -> anyhow::Result<()> {
        self.pool.close().await;

        let mut admin_conn = sqlx::PgConnection::connect(&self.admin_database_url)
            .await
            .context("connect admin db for schema drop")?;
        sqlx::query(&format!(r#"DROP SCHEMA "{}" CASCADE"#, self.schema))
            .execute(&mut admin_conn)
            .await
            .context("drop test schema")?;

        Ok(())
    }
}

/// Run `f` against a fresh schema; skipped when no test database is configured
pub async fn with_test_database<F>(f: F) -> anyhow::Result<()>
where
    F: for<'a> FnOnce(
        &'a TestDatabase,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send + 'a>,
    >,
{
    let Some(url) = test_database_url() else {
        eprintln!("TEST_DATABASE_URL not set, skipping PostgreSQL test");
        return Ok(());
    };

    let database = TestDatabase::new(url).await?;

    let result = std::panic::AssertUnwindSafe(f(&database))
        .catch_unwind()
        .await;
    let cleanup_result = database.cleanup().await;

    if let Err(e) = cleanup_result {
        eprintln!("test schema cleanup failed: {e:?}");
    }

    match result {
        Ok(r) => r,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

fn with_search_path(database_url: &str, schema: &str) -> anyhow::Result<String> {
    let mut url = Url::parse(database_url).context("parse database URL")?;
    url.query_pairs_mut()
        .append_pair("options", &format!("-c search_path={}", schema));
    Ok(url.to_string())
}
