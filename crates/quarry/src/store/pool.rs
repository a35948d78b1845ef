// crates/quarry/src/store/pool.rs
// Async connection pool using deadpool-sqlite
//
// Every closure passed to `interact` runs on deadpool's blocking thread pool,
// so SQLite work never stalls the async runtime.

use anyhow::{Context, Result};
use deadpool_sqlite::{Config, Hook, Pool, Runtime};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// Pooled connections to one SQLite database file
pub struct DatabasePool {
    pool: Pool,
    path: PathBuf,
}

impl DatabasePool {
    /// Open a pool over an existing database file.
    ///
    /// The file must already exist; this pool only reads question data.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            anyhow::bail!("database not found: {}", path.display());
        }

        let cfg = Config::new(path);
        let pool = cfg
            .builder(Runtime::Tokio1)
            .context("Failed to create pool builder")?
            .max_size(4)
            .post_create(make_post_create_hook())
            .build()
            .context("Failed to build connection pool")?;

        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a closure with a connection from the pool.
    pub async fn interact<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get connection from pool")?;

        conn.interact(move |conn| f(conn))
            .await
            .map_err(|e| anyhow::anyhow!("interact failed: {e}"))?
    }
}

/// Apply connection pragmas to each new pooled connection
fn make_post_create_hook() -> Hook {
    Hook::async_fn(|conn, _metrics| {
        Box::pin(async move {
            conn.interact(setup_connection)
                .await
                .map_err(|e| {
                    deadpool_sqlite::HookError::Message(format!("interact failed: {e}").into())
                })?
                .map_err(|e| {
                    deadpool_sqlite::HookError::Message(
                        format!("connection setup failed: {e}").into(),
                    )
                })
        })
    })
}

/// Read-heavy tuning: WAL, relaxed sync, larger page cache, in-memory temp
/// tables and a 256 MiB memory map.
fn setup_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL; \
         PRAGMA synchronous=NORMAL; \
         PRAGMA cache_size=5000; \
         PRAGMA temp_store=MEMORY; \
         PRAGMA mmap_size=268435456; \
         PRAGMA busy_timeout=10000;",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_missing_file() {
        let err = DatabasePool::open(Path::new("/nonexistent/quarry.sqlite"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("database not found"));
    }

    #[tokio::test]
    async fn test_interact_runs_query() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.sqlite");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (7);")
            .unwrap();

        let pool = DatabasePool::open(&path).unwrap();
        let x: i64 = pool
            .interact(|conn| Ok(conn.query_row("SELECT x FROM t", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(x, 7);
        assert_eq!(pool.path(), path.as_path());
    }
}
