use mobc::{Manager, Pool};
use rusqlite::{Connection, Result as SqliteResult};
use std::path::Path;
use tracing::{debug, error, info};

fn log_rusqlite_error(context: &str, err: &rusqlite::Error) {
    error!("🔥 SQLite error in {}: {:?}", context, err);
}

pub struct SqliteManager {
    db_path: String,
}

impl SqliteManager {
    pub fn new(db_path: String) -> Self {
        debug!("🔧 Creating SqliteManager for path: {}", db_path);
        Self { db_path }
    }
}

#[async_trait::async_trait]
impl Manager for SqliteManager {
    type Connection = Connection;
    type Error = rusqlite::Error;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        debug!("🔌 Opening database: {}", self.db_path);

        let conn = match Connection::open(&self.db_path) {
            Ok(c) => c,
            Err(e) => {
                log_rusqlite_error("Connection::open", &e);
                return Err(e);
            }
        };

        // Some PRAGMA statements return a row, so execute() alone won't do
        let exec_pragma =
            |conn: &Connection, pragma: &str, name: &str| -> Result<(), rusqlite::Error> {
                match conn.execute(pragma, []) {
                    Ok(_) => Ok(()),
                    Err(rusqlite::Error::ExecuteReturnedResults) => {
                        conn.query_row(pragma, [], |_| Ok(()))
                    }
                    Err(e) => {
                        debug!("❌ {} failed: {}", name, e);
                        Err(e)
                    }
                }
            };

        exec_pragma(&conn, "PRAGMA journal_mode=WAL", "PRAGMA journal_mode")?;
        exec_pragma(&conn, "PRAGMA synchronous=NORMAL", "PRAGMA synchronous")?;
        exec_pragma(&conn, "PRAGMA foreign_keys=ON", "PRAGMA foreign_keys")?;

        if let Err(e) = init_database(&conn) {
            log_rusqlite_error("init_database", &e);
            return Err(e);
        }

        Ok(conn)
    }

    async fn check(&self, conn: Self::Connection) -> Result<Self::Connection, Self::Error> {
        match conn.query_row("SELECT 1", [], |_| Ok(())) {
            Ok(_) => Ok(conn),
            Err(e) => {
                log_rusqlite_error("connection check", &e);
                Err(e)
            }
        }
    }
}

fn init_database(conn: &Connection) -> SqliteResult<()> {
    debug!("🏗️ init_database() - Creating tables and indexes...");

    create_orders_tables(conn)?;
    create_coupons_table(conn)?;
    create_email_log_table(conn)?;
    create_indexes(conn)?;

    // The customer tracking table is owned by CustomerTracker, which
    // carries its table name explicitly and creates it via ensure_table().

    Ok(())
}

pub type DbPool = Pool<SqliteManager>;

pub async fn create_db_pool(
    db_path: &str,
) -> Result<DbPool, Box<dyn std::error::Error + Send + Sync>> {
    debug!("🏊 Creating connection pool for: {}", db_path);

    // Ensure directory exists
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let manager = SqliteManager::new(db_path.to_string());
    let pool = Pool::builder().max_open(10).max_idle(5).build(manager);

    info!("✓ SQLite connection pool created: {}", db_path);
    Ok(pool)
}

/// Shop order tables. The host platform owns this data; this service only
/// reads it, but creates the schema so a fresh database works end to end.
fn create_orders_tables(conn: &Connection) -> SqliteResult<()> {
    debug!("🛒 Creating orders tables...");
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            billing_email TEXT NOT NULL,
            billing_first_name TEXT,
            billing_last_name TEXT,
            status TEXT NOT NULL,
            total REAL NOT NULL DEFAULT 0,
            placed_at TEXT NOT NULL
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS order_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id INTEGER NOT NULL,
            product_name TEXT,
            category_id INTEGER NOT NULL,
            FOREIGN KEY (order_id) REFERENCES orders (id)
        )
        "#,
        [],
    )?;

    Ok(())
}

/// The coupon store. One row per issued code; `trashed` is the soft-delete
/// flag used when a dispatch failure rolls a coupon back.
fn create_coupons_table(conn: &Connection) -> SqliteResult<()> {
    debug!("🎟️ Creating coupons table...");
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS coupons (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT UNIQUE NOT NULL,
            discount_percent INTEGER NOT NULL,
            usage_limit INTEGER NOT NULL DEFAULT 1,
            usage_count INTEGER NOT NULL DEFAULT 0,
            expiry_date TEXT NOT NULL,
            restricted_email TEXT NOT NULL,
            minimum_order_amount REAL,
            excluded_categories TEXT,
            trashed INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
        [],
    )?;
    Ok(())
}

fn create_email_log_table(conn: &Connection) -> SqliteResult<()> {
    debug!("📧 Creating email_log table...");
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS email_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL,
            coupon_code TEXT NOT NULL,
            sent_at TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'sent'
        )
        "#,
        [],
    )?;
    Ok(())
}

fn create_indexes(conn: &Connection) -> SqliteResult<()> {
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_orders_email ON orders(billing_email)",
        "CREATE INDEX IF NOT EXISTS idx_orders_placed_at ON orders(placed_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items(order_id)",
        "CREATE INDEX IF NOT EXISTS idx_coupons_code ON coupons(code)",
        "CREATE INDEX IF NOT EXISTS idx_coupons_email ON coupons(restricted_email)",
        "CREATE INDEX IF NOT EXISTS idx_email_log_email ON email_log(email)",
        "CREATE INDEX IF NOT EXISTS idx_email_log_sent_at ON email_log(sent_at DESC)",
    ];

    for (i, index_sql) in indexes.iter().enumerate() {
        if let Err(e) = conn.execute(index_sql, []) {
            log_rusqlite_error(&format!("create index {}", i + 1), &e);
            return Err(e);
        }
    }

    Ok(())
}

/// True when `table_name` exists in the connected database.
pub fn table_exists(conn: &Connection, table_name: &str) -> Result<bool, rusqlite::Error> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
        [table_name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
