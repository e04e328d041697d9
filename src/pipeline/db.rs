//! SQLite metadata store
//!
//! Backs both `ChainDirectory` (chains, explorers, account links) and
//! `DenomStore` (denomination metadata). Schema lives in `/sql/*.sql`.

use super::denoms::{DenomStore, DenomTable};
use super::directory::ChainDirectory;
use crate::errors::StoreError;
use crate::types::{AccountTarget, ChainInfo, DenomKey, DenomMetadata, Explorer, NetworkName};
use async_trait::async_trait;
use rusqlite::{params_from_iter, Connection};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Run schema migrations from SQL files
///
/// Reads all .sql files from the specified directory and executes them in
/// file-name order. Every file must use `IF NOT EXISTS` so reruns are no-ops.
pub fn run_schema_migrations(conn: &mut Connection, schema_dir: &str) -> Result<(), StoreError> {
    let schema_path = Path::new(schema_dir);

    if !schema_path.exists() {
        return Err(StoreError::SchemaMissing(schema_dir.to_string()));
    }

    // PRAGMA journal_mode returns a row, so go through pragma_update
    conn.pragma_update(None, "journal_mode", "WAL")?;

    let mut sql_files: Vec<_> = fs::read_dir(schema_path)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();

    sql_files.sort_by_key(|entry| entry.file_name());

    log::info!("🔧 Running schema migrations from: {}", schema_dir);

    for entry in sql_files {
        let path = entry.path();
        let filename = entry.file_name().to_string_lossy().into_owned();

        log::debug!("   ├─ Executing: {}", filename);
        let sql_content = fs::read_to_string(&path)?;
        conn.execute_batch(&sql_content)?;
    }

    log::info!("✅ Schema migrations completed");
    Ok(())
}

/// `?, ?, ?` with `n` placeholders
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn parse_network(table: &'static str, raw: &str) -> Result<NetworkName, StoreError> {
    NetworkName::parse(raw).map_err(|e| StoreError::Corrupt {
        table,
        reason: e.to_string(),
    })
}

pub struct SqliteMetadataStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMetadataStore {
    /// Open an existing database; the schema must already be migrated
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn upsert_chain(&self, chain: &ChainInfo) -> Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp();
        self.conn()?.execute(
            r#"
            INSERT INTO chains (name, lcd_url, bond_denom, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(name) DO UPDATE SET
                lcd_url = excluded.lcd_url,
                bond_denom = excluded.bond_denom,
                updated_at = excluded.updated_at
            "#,
            rusqlite::params![chain.name.as_str(), chain.lcd_url, chain.bond_denom, now],
        )?;
        Ok(())
    }

    pub fn upsert_explorer(&self, network: &NetworkName, explorer: &Explorer) -> Result<(), StoreError> {
        self.conn()?.execute(
            r#"
            INSERT INTO explorers (chain, account_url, validator_url)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(chain) DO UPDATE SET
                account_url = excluded.account_url,
                validator_url = excluded.validator_url
            "#,
            rusqlite::params![network.as_str(), explorer.account_url, explorer.validator_url],
        )?;
        Ok(())
    }

    pub fn upsert_denomination(&self, key: &DenomKey, meta: &DenomMetadata) -> Result<(), StoreError> {
        self.conn()?.execute(
            r#"
            INSERT INTO denominations (chain, base, display, exponent, ignored, price_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(chain, base) DO UPDATE SET
                display = excluded.display,
                exponent = excluded.exponent,
                ignored = excluded.ignored,
                price_id = excluded.price_id
            "#,
            rusqlite::params![
                key.network.as_str(),
                key.denom,
                meta.display,
                meta.exponent,
                meta.ignored,
                meta.price_id,
            ],
        )?;
        Ok(())
    }

    /// Link an account to a user; relinking updates the operator address
    pub fn link_account(&self, user_id: i64, account: &AccountTarget) -> Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp();
        self.conn()?.execute(
            r#"
            INSERT INTO accounts (user_id, chain, address, operator_address, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id, chain, address) DO UPDATE SET
                operator_address = excluded.operator_address
            "#,
            rusqlite::params![
                user_id,
                account.network.as_str(),
                account.address,
                account.operator_address,
                now,
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl ChainDirectory for SqliteMetadataStore {
    async fn chains(&self, names: &BTreeSet<NetworkName>) -> Result<HashMap<NetworkName, ChainInfo>, StoreError> {
        if names.is_empty() {
            return Ok(HashMap::new());
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT name, lcd_url, bond_denom FROM chains WHERE name IN ({})",
            placeholders(names.len())
        ))?;
        let rows = stmt.query_map(params_from_iter(names.iter().map(NetworkName::as_str)), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut chains = HashMap::new();
        for row in rows {
            let (name, lcd_url, bond_denom) = row?;
            let name = parse_network("chains", &name)?;
            chains.insert(
                name.clone(),
                ChainInfo {
                    name,
                    lcd_url,
                    bond_denom,
                },
            );
        }
        Ok(chains)
    }

    async fn explorers(&self, names: &BTreeSet<NetworkName>) -> Result<HashMap<NetworkName, Explorer>, StoreError> {
        if names.is_empty() {
            return Ok(HashMap::new());
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT chain, account_url, validator_url FROM explorers WHERE chain IN ({})",
            placeholders(names.len())
        ))?;
        let rows = stmt.query_map(params_from_iter(names.iter().map(NetworkName::as_str)), |row| {
            Ok((
                row.get::<_, String>(0)?,
                Explorer {
                    account_url: row.get(1)?,
                    validator_url: row.get(2)?,
                },
            ))
        })?;

        let mut explorers = HashMap::new();
        for row in rows {
            let (chain, explorer) = row?;
            explorers.insert(parse_network("explorers", &chain)?, explorer);
        }
        Ok(explorers)
    }

    async fn linked_accounts(&self, user_id: i64) -> Result<Vec<AccountTarget>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT chain, address, operator_address FROM accounts
             WHERE user_id = ?1
             ORDER BY chain, address",
        )?;
        let rows = stmt.query_map([user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut accounts = Vec::new();
        for row in rows {
            let (chain, address, operator_address) = row?;
            accounts.push(AccountTarget {
                network: parse_network("accounts", &chain)?,
                address,
                operator_address,
            });
        }
        Ok(accounts)
    }
}

#[async_trait]
impl DenomStore for SqliteMetadataStore {
    /// Single `(chain, base) IN (VALUES ...)` query for the whole batch
    async fn resolve_denominations(&self, keys: &BTreeSet<DenomKey>) -> Result<DenomTable, StoreError> {
        if keys.is_empty() {
            return Ok(DenomTable::new());
        }

        let values = vec!["(?, ?)"; keys.len()].join(", ");
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT chain, base, display, exponent, ignored, price_id FROM denominations
             WHERE (chain, base) IN (VALUES {})",
            values
        ))?;
        let params = keys
            .iter()
            .flat_map(|key| [key.network.as_str(), key.denom.as_str()]);
        let rows = stmt.query_map(params_from_iter(params), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, bool>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut table = DenomTable::new();
        for row in rows {
            let (chain, base, display, exponent, ignored, price_id) = row?;
            let exponent = u32::try_from(exponent).map_err(|_| StoreError::Corrupt {
                table: "denominations",
                reason: format!("negative exponent {} for {}", exponent, base),
            })?;
            table.insert(
                DenomKey::new(parse_network("denominations", &chain)?, base),
                DenomMetadata {
                    display,
                    exponent,
                    ignored,
                    price_id,
                },
            );
        }
        Ok(table)
    }
}
