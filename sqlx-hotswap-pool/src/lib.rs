//! A [`sqlx::Pool`] wrapper that can swap its inner pool when credentials
//! rotate, without every caller needing to re-fetch a new pool handle.
//! `sqlx` itself has no notion of a DSN changing under a live pool; this
//! crate works around that by holding the current pool behind a lock and
//! re-pointing every new connection request at whichever pool is current.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

use std::sync::Arc;

use observability_deps::tracing::info;
use parking_lot::RwLock;
use sqlx::{Connection, Database, Pool};

/// Wraps a `sqlx::Pool<DB>` so it can be atomically replaced. Cloning is
/// cheap — every clone shares the same swap point.
#[derive(Clone)]
pub struct HotSwapPool<DB: Database> {
    inner: Arc<RwLock<Pool<DB>>>,
}

impl<DB: Database> std::fmt::Debug for HotSwapPool<DB> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotSwapPool").finish()
    }
}

impl<DB: Database> HotSwapPool<DB> {
    pub fn new(pool: Pool<DB>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(pool)),
        }
    }

    /// The currently-active pool. Cloning a `sqlx::Pool` is cheap (it's
    /// itself an `Arc` internally), so callers can use the returned value
    /// for the duration of one logical operation without racing a
    /// concurrent `replace`.
    pub fn current(&self) -> Pool<DB> {
        self.inner.read().clone()
    }

    /// Atomically swaps in `new_pool`. The old pool is dropped once every
    /// connection borrowed from it is returned; `sqlx` pools close their
    /// connections lazily on drop, so in-flight queries against the old
    /// pool are not interrupted.
    pub fn replace(&self, new_pool: Pool<DB>) {
        info!("hot-swapping database connection pool");
        *self.inner.write() = new_pool;
    }

    /// Tests a new DSN by connecting once, and swaps it in only if that
    /// succeeds — a bad rotation must never tear down a working pool.
    pub async fn try_replace_with_dsn(&self, dsn: &str) -> Result<(), sqlx::Error>
    where
        DB::Connection: Sized,
    {
        let mut conn = DB::Connection::connect(dsn).await?;
        conn.close().await?;
        let new_pool = Pool::<DB>::connect(dsn).await?;
        self.replace(new_pool);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::Sqlite;

    #[tokio::test]
    async fn current_reflects_the_latest_replace() {
        let a = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let b = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();

        let hotswap = HotSwapPool::<Sqlite>::new(a.clone());
        assert_eq!(
            hotswap.current().options().get_max_connections(),
            a.options().get_max_connections()
        );

        hotswap.replace(b.clone());
        // Both pools are independent in-memory databases; swapping changes
        // which one `current()` hands out.
        assert_eq!(hotswap.current().options().get_max_connections(), b.options().get_max_connections());
    }
}
