use crate::config::AppConfig;
use crate::entities;
use sea_orm::sea_query::{
    Alias, ColumnDef, ColumnSpec, ColumnType, TableCreateStatement,
};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr,
    Schema,
};
use std::time::Duration;
use tracing::{debug, info};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Establishes a connection pool to the database.
pub async fn establish_connection(database_url: &str) -> Result<DbPool, DbErr> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };

    establish_connection_with_config(&config).await
}

/// Establishes a connection pool with custom configuration.
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, DbErr> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db_pool = Database::connect(opt).await?;

    info!("Database connection pool established");
    Ok(db_pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, DbErr> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Creates any missing tables from the entity definitions. Used at startup
/// when `auto_migrate` is set and by the test harness.
pub async fn ensure_schema(db: &DbPool) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements = vec![
        schema.create_table_from_entity(entities::User),
        schema.create_table_from_entity(entities::Product),
        schema.create_table_from_entity(entities::Address),
        schema.create_table_from_entity(entities::CartItem),
        schema.create_table_from_entity(entities::Order),
    ];

    for stmt in statements.iter_mut() {
        stmt.if_not_exists();
        // sea-query's SQLite table builder panics on a Decimal column whose
        // precision exceeds 16 (SQLite stores REAL as an 8-byte float, so the
        // precision/scale are cosmetic and ignored). The entity schema follows
        // the Postgres-oriented `Decimal(19, 2)` convention, so on the SQLite
        // backend (used by the in-memory integration tests) we rewrite those
        // columns to the largest precision the builder accepts. The Postgres
        // DDL is produced from the same statements, untouched, below.
        if backend == DatabaseBackend::Sqlite {
            *stmt = clamp_decimal_precision_for_sqlite(stmt);
        }
        db.execute(backend.build(&*stmt)).await?;
    }

    info!("Database schema ensured");
    Ok(())
}

/// Rebuilds a `CREATE TABLE` statement with every `Decimal(precision, scale)`
/// column capped at precision 16, the SQLite table builder's hard limit. Only
/// the decimal precision changes; column names, specs, foreign keys and indexes
/// are copied verbatim, so the resulting table is identical in every observable
/// respect for the SQLite backend.
fn clamp_decimal_precision_for_sqlite(stmt: &TableCreateStatement) -> TableCreateStatement {
    let mut rebuilt = TableCreateStatement::new();

    if let Some(table) = stmt.get_table_name() {
        rebuilt.table(table.clone());
    }
    if let Some(comment) = stmt.get_comment() {
        rebuilt.comment(comment.clone());
    }

    for column in stmt.get_columns() {
        let clamped_type = column.get_column_type().map(|ty| match ty {
            ColumnType::Decimal(Some((precision, scale))) if *precision > 16 => {
                ColumnType::Decimal(Some((16, *scale)))
            }
            other => other.clone(),
        });

        let column_name = Alias::new(column.get_column_name());
        let mut new_column = match clamped_type {
            Some(ty) => ColumnDef::new_with_type(column_name, ty),
            None => ColumnDef::new(column_name),
        };

        for spec in column.get_column_spec() {
            match spec {
                ColumnSpec::Null => {
                    new_column.null();
                }
                ColumnSpec::NotNull => {
                    new_column.not_null();
                }
                ColumnSpec::Default(expr) => {
                    new_column.default(expr.clone());
                }
                ColumnSpec::AutoIncrement => {
                    new_column.auto_increment();
                }
                ColumnSpec::UniqueKey => {
                    new_column.unique_key();
                }
                ColumnSpec::PrimaryKey => {
                    new_column.primary_key();
                }
                ColumnSpec::Check(expr) => {
                    new_column.check(expr.clone());
                }
                ColumnSpec::Generated { expr, stored } => {
                    new_column.generated(expr.clone(), *stored);
                }
                ColumnSpec::Extra(extra) => {
                    new_column.extra(extra.clone());
                }
                ColumnSpec::Comment(comment) => {
                    new_column.comment(comment.clone());
                }
                ColumnSpec::Using(expr) => {
                    new_column.using(expr.clone());
                }
            }
        }

        rebuilt.col(&mut new_column);
    }

    for foreign_key in stmt.get_foreign_key_create_stmts() {
        rebuilt.foreign_key(&mut foreign_key.clone());
    }
    for index in stmt.get_indexes() {
        rebuilt.index(&mut index.clone());
    }

    rebuilt.if_not_exists();
    rebuilt.take()
}
