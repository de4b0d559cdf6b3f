use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbErr,
    Statement, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;

use crate::locks::AuditoriumLocks;

/// Connects and brings the schema up to date. sqlx enables `foreign_keys`
/// on every pooled SQLite connection, so required relations are enforced.
pub async fn connect_and_migrate(
    database_url: &str,
    max_connections: u32,
) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url);
    opt.max_connections(max_connections)
        .connect_timeout(Duration::from_secs(5))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;

    db.execute(Statement::from_string(
        db.get_database_backend(),
        "PRAGMA journal_mode=WAL".to_string(),
    ))
    .await?;

    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

/// Entry point to the persistence layer.
///
/// Every top-level booking operation opens exactly one [`UnitOfWork`] and
/// either commits it once or drops it, discarding everything it staged.
#[derive(Clone)]
pub struct Store {
    db: DatabaseConnection,
    locks: AuditoriumLocks,
    commits: Arc<AtomicU64>,
}

impl Store {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db, locks: AuditoriumLocks::new(), commits: Arc::new(AtomicU64::new(0)) }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn locks(&self) -> &AuditoriumLocks {
        &self.locks
    }

    pub async fn begin(&self) -> Result<UnitOfWork, DbErr> {
        let txn = self.db.begin().await?;
        Ok(UnitOfWork { txn, commits: self.commits.clone() })
    }

    /// Number of units of work committed through this store.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }
}

/// Staged changes of one operation. Dropping it without [`commit`] rolls
/// every staged change back.
///
/// [`commit`]: UnitOfWork::commit
pub struct UnitOfWork {
    txn: DatabaseTransaction,
    commits: Arc<AtomicU64>,
}

impl UnitOfWork {
    pub fn conn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    pub async fn commit(self) -> Result<(), DbErr> {
        self.txn.commit().await?;
        let seq = self.commits.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(commit = seq, "unit of work committed");
        Ok(())
    }
}
