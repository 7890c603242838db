/// Position persistence
///
/// `PositionStore` is the seam the engine talks to; `SqliteStore` is the
/// production implementation (single connection, WAL). Every write that
/// touches a non-closed order re-upserts its `monitored_positions` row in the
/// same transaction; closing an order removes every row of its group.
use super::types::{
    AssetType, MonitoredPosition, OperationType, OrderType, Position, PositionStatus,
    TraderAccount, Venue,
};
use super::update::PositionUpdate;
use crate::arguments::is_debug_store_enabled;
use crate::errors::StoreError;
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

// =============================================================================
// DATABASE SCHEMA DEFINITIONS
// =============================================================================

const SCHEMA_POSITIONS: &str = r#"
CREATE TABLE IF NOT EXISTS positions (
    order_id INTEGER PRIMARY KEY AUTOINCREMENT,
    position_id INTEGER NOT NULL,
    trade_order INTEGER NOT NULL DEFAULT 1,
    trader_id INTEGER NOT NULL,
    trade_pair TEXT NOT NULL,
    asset_type TEXT NOT NULL,
    order_type TEXT NOT NULL,
    source TEXT NOT NULL,
    entry_price REAL NOT NULL DEFAULT 0,
    initial_price REAL NOT NULL DEFAULT 0,
    close_price REAL,
    min_price REAL NOT NULL DEFAULT 0,
    max_price REAL NOT NULL DEFAULT 0,
    limit_order REAL NOT NULL DEFAULT 0,
    average_entry_price REAL NOT NULL DEFAULT 0,
    upward INTEGER NOT NULL DEFAULT -1,
    leverage REAL NOT NULL DEFAULT 0,
    cumulative_leverage REAL NOT NULL DEFAULT 0,
    cumulative_order_type TEXT NOT NULL,
    stop_loss REAL NOT NULL DEFAULT 0,
    take_profit REAL NOT NULL DEFAULT 0,
    cumulative_stop_loss REAL NOT NULL DEFAULT 0,
    cumulative_take_profit REAL NOT NULL DEFAULT 0,
    trailing BOOLEAN NOT NULL DEFAULT false,
    profit_loss REAL NOT NULL DEFAULT 0,
    profit_loss_without_fee REAL NOT NULL DEFAULT 0,
    max_profit_loss REAL NOT NULL DEFAULT 0,
    venue_profit_loss REAL NOT NULL DEFAULT 0,
    venue_profit_loss_without_fee REAL NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    old_status TEXT,
    operation_type TEXT NOT NULL,
    open_time TEXT NOT NULL,
    adjust_time TEXT,
    close_time TEXT,
    modified_by TEXT NOT NULL DEFAULT 'system',
    uuid TEXT NOT NULL DEFAULT '',
    hot_key TEXT NOT NULL DEFAULT '',
    order_level INTEGER NOT NULL DEFAULT 0
);
"#;

const SCHEMA_MONITORED_POSITIONS: &str = r#"
CREATE TABLE IF NOT EXISTS monitored_positions (
    position_id INTEGER NOT NULL,
    order_id INTEGER NOT NULL,
    trader_id INTEGER NOT NULL,
    trade_pair TEXT NOT NULL,
    asset_type TEXT NOT NULL,
    entry_price REAL NOT NULL,
    cumulative_leverage REAL NOT NULL,
    cumulative_order_type TEXT NOT NULL,
    cumulative_stop_loss REAL NOT NULL,
    cumulative_take_profit REAL NOT NULL,
    PRIMARY KEY (position_id, order_id)
);
"#;

const SCHEMA_TRADER_ACCOUNTS: &str = r#"
CREATE TABLE IF NOT EXISTS trader_accounts (
    trader_id INTEGER PRIMARY KEY,
    hot_key TEXT NOT NULL,
    venue TEXT NOT NULL DEFAULT 'main',
    email TEXT
);
"#;

const POSITIONS_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_positions_status ON positions(status);",
    "CREATE INDEX IF NOT EXISTS idx_positions_trader_pair ON positions(trader_id, trade_pair);",
    "CREATE INDEX IF NOT EXISTS idx_positions_position_id ON positions(position_id);",
];

const POSITION_COLUMNS: &str = "order_id, position_id, trade_order, trader_id, trade_pair, \
    asset_type, order_type, source, entry_price, initial_price, close_price, min_price, \
    max_price, limit_order, average_entry_price, upward, leverage, cumulative_leverage, \
    cumulative_order_type, stop_loss, take_profit, cumulative_stop_loss, \
    cumulative_take_profit, trailing, profit_loss, profit_loss_without_fee, max_profit_loss, \
    venue_profit_loss, venue_profit_loss_without_fee, status, old_status, operation_type, \
    open_time, adjust_time, close_time, modified_by, uuid, hot_key, order_level";

// =============================================================================
// STORE TRAIT
// =============================================================================

#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn list_by_status(&self, statuses: &[PositionStatus]) -> Result<Vec<Position>, StoreError>;

    async fn get_position(&self, order_id: i64) -> Result<Option<Position>, StoreError>;

    /// Latest non-closed order for a trader/pair
    async fn find_non_closed(&self, trader_id: i64, trade_pair: &str)
        -> Result<Option<Position>, StoreError>;

    async fn list_non_closed_for_trader(&self, trader_id: i64) -> Result<Vec<Position>, StoreError>;

    /// `max(position_id) + 1` for the trader
    async fn next_position_id(&self, trader_id: i64) -> Result<i64, StoreError>;

    /// Inserts a new order row and returns its order_id
    async fn insert_position(&self, position: &Position) -> Result<i64, StoreError>;

    /// Applies one update in its own transaction
    async fn update_position(&self, order_id: i64, update: &PositionUpdate) -> Result<(), StoreError>;

    /// Applies every update in one transaction; all or nothing
    async fn bulk_update(&self, updates: &[(i64, PositionUpdate)]) -> Result<usize, StoreError>;

    /// Closes `order_id` with `retire` and inserts `successor` atomically
    async fn supersede(
        &self,
        order_id: i64,
        retire: &PositionUpdate,
        successor: &Position,
    ) -> Result<i64, StoreError>;

    async fn upsert_monitored_position(&self, monitored: &MonitoredPosition) -> Result<(), StoreError>;

    async fn list_monitored_positions(&self) -> Result<Vec<MonitoredPosition>, StoreError>;

    async fn list_trader_accounts(&self) -> Result<Vec<TraderAccount>, StoreError>;

    async fn upsert_trader_account(&self, account: &TraderAccount) -> Result<(), StoreError>;
}

// =============================================================================
// SQLITE IMPLEMENTATION
// =============================================================================

pub struct SqliteStore {
    conn: Mutex<Connection>,
    database_path: String,
    bulk_writes: AtomicUsize,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        let store = Self::with_connection(conn, path.to_string_lossy().to_string())?;
        logger::info(
            LogTag::Store,
            &format!("Positions database ready at {}", store.database_path),
        );
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, ":memory:".to_string())
    }

    fn with_connection(conn: Connection, database_path: String) -> Result<Self, StoreError> {
        conn.execute(SCHEMA_POSITIONS, [])?;
        conn.execute(SCHEMA_MONITORED_POSITIONS, [])?;
        conn.execute(SCHEMA_TRADER_ACCOUNTS, [])?;
        for index_sql in POSITIONS_INDEXES {
            conn.execute(index_sql, [])?;
        }
        Ok(Self {
            conn: Mutex::new(conn),
            database_path,
            bulk_writes: AtomicUsize::new(0),
        })
    }

    pub fn database_path(&self) -> &str {
        &self.database_path
    }

    /// Number of committed bulk updates since open
    pub fn bulk_write_count(&self) -> usize {
        self.bulk_writes.load(Ordering::Relaxed)
    }

    fn query_positions(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Position>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, row_to_position)?;
        let positions = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(positions)
    }
}

#[async_trait]
impl PositionStore for SqliteStore {
    async fn list_by_status(&self, statuses: &[PositionStatus]) -> Result<Vec<Position>, StoreError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM positions WHERE status IN ({}) ORDER BY order_id",
            POSITION_COLUMNS, placeholders
        );
        self.query_positions(&sql, params_from_iter(statuses.iter().map(|s| s.as_str())))
    }

    async fn get_position(&self, order_id: i64) -> Result<Option<Position>, StoreError> {
        let conn = self.conn.lock();
        load_position(&conn, order_id)
    }

    async fn find_non_closed(
        &self,
        trader_id: i64,
        trade_pair: &str,
    ) -> Result<Option<Position>, StoreError> {
        let sql = format!(
            "SELECT {} FROM positions WHERE trader_id = ?1 AND trade_pair = ?2 \
             AND status != 'CLOSED' ORDER BY trade_order DESC, order_id DESC LIMIT 1",
            POSITION_COLUMNS
        );
        Ok(self
            .query_positions(&sql, params![trader_id, trade_pair])?
            .into_iter()
            .next())
    }

    async fn list_non_closed_for_trader(&self, trader_id: i64) -> Result<Vec<Position>, StoreError> {
        let sql = format!(
            "SELECT {} FROM positions WHERE trader_id = ?1 AND status != 'CLOSED' ORDER BY order_id",
            POSITION_COLUMNS
        );
        self.query_positions(&sql, params![trader_id])
    }

    async fn next_position_id(&self, trader_id: i64) -> Result<i64, StoreError> {
        let conn = self.conn.lock();
        let max: Option<i64> = conn.query_row(
            "SELECT MAX(position_id) FROM positions WHERE trader_id = ?1",
            params![trader_id],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0) + 1)
    }

    async fn insert_position(&self, position: &Position) -> Result<i64, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let order_id = insert_row(&tx, position)?;
        sync_projection(&tx, order_id)?;
        tx.commit()?;

        if is_debug_store_enabled() {
            logger::debug(
                LogTag::Store,
                &format!(
                    "inserted order {} (group {}, {} trader {}, {})",
                    order_id, position.position_id, position.trade_pair, position.trader_id, position.status
                ),
            );
        }
        Ok(order_id)
    }

    async fn update_position(&self, order_id: i64, update: &PositionUpdate) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        apply_update(&tx, order_id, update)?;
        tx.commit()?;
        Ok(())
    }

    async fn bulk_update(&self, updates: &[(i64, PositionUpdate)]) -> Result<usize, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut written = 0;
        for (order_id, update) in updates {
            match apply_update(&tx, *order_id, update) {
                Ok(()) => written += 1,
                Err(StoreError::Stale { order_id, found }) => {
                    logger::warning(
                        LogTag::Store,
                        &format!("dropped stale deferred update for order {} (now {})", order_id, found),
                    );
                }
                Err(e) => return Err(e),
            }
        }
        tx.commit()?;
        self.bulk_writes.fetch_add(1, Ordering::Relaxed);
        Ok(written)
    }

    async fn supersede(
        &self,
        order_id: i64,
        retire: &PositionUpdate,
        successor: &Position,
    ) -> Result<i64, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        apply_update(&tx, order_id, retire)?;
        let successor_id = insert_row(&tx, successor)?;
        sync_projection(&tx, successor_id)?;
        tx.commit()?;
        Ok(successor_id)
    }

    async fn upsert_monitored_position(&self, monitored: &MonitoredPosition) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        upsert_monitored(&conn, monitored)?;
        Ok(())
    }

    async fn list_monitored_positions(&self) -> Result<Vec<MonitoredPosition>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT position_id, order_id, trader_id, trade_pair, asset_type, entry_price, \
             cumulative_leverage, cumulative_order_type, cumulative_stop_loss, \
             cumulative_take_profit FROM monitored_positions ORDER BY position_id, order_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(MonitoredPosition {
                position_id: row.get("position_id")?,
                order_id: row.get("order_id")?,
                trader_id: row.get("trader_id")?,
                trade_pair: row.get("trade_pair")?,
                asset_type: parse_column(row, "asset_type")?,
                entry_price: row.get("entry_price")?,
                cumulative_leverage: row.get("cumulative_leverage")?,
                cumulative_order_type: parse_column(row, "cumulative_order_type")?,
                cumulative_stop_loss: row.get("cumulative_stop_loss")?,
                cumulative_take_profit: row.get("cumulative_take_profit")?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn list_trader_accounts(&self) -> Result<Vec<TraderAccount>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT trader_id, hot_key, venue, email FROM trader_accounts ORDER BY trader_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(TraderAccount {
                trader_id: row.get("trader_id")?,
                hot_key: row.get("hot_key")?,
                venue: parse_column(row, "venue")?,
                email: row.get("email")?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn upsert_trader_account(&self, account: &TraderAccount) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO trader_accounts (trader_id, hot_key, venue, email) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (trader_id) DO UPDATE SET
                hot_key = excluded.hot_key,
                venue = excluded.venue,
                email = excluded.email",
            params![
                account.trader_id,
                account.hot_key,
                account.venue.as_str(),
                account.email
            ],
        )?;
        Ok(())
    }
}

// =============================================================================
// ROW HELPERS
// =============================================================================

fn load_position(conn: &Connection, order_id: i64) -> Result<Option<Position>, StoreError> {
    let sql = format!("SELECT {} FROM positions WHERE order_id = ?1", POSITION_COLUMNS);
    Ok(conn
        .query_row(&sql, params![order_id], row_to_position)
        .optional()?)
}

fn insert_row(tx: &Transaction<'_>, p: &Position) -> Result<i64, StoreError> {
    tx.execute(
        "INSERT INTO positions (
            position_id, trade_order, trader_id, trade_pair, asset_type, order_type, source,
            entry_price, initial_price, close_price, min_price, max_price, limit_order,
            average_entry_price, upward, leverage, cumulative_leverage, cumulative_order_type,
            stop_loss, take_profit, cumulative_stop_loss, cumulative_take_profit, trailing,
            profit_loss, profit_loss_without_fee, max_profit_loss, venue_profit_loss,
            venue_profit_loss_without_fee, status, old_status, operation_type, open_time,
            adjust_time, close_time, modified_by, uuid, hot_key, order_level
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19,
            ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31, ?32, ?33, ?34, ?35, ?36,
            ?37, ?38
        )",
        params![
            p.position_id,
            p.trade_order,
            p.trader_id,
            p.trade_pair,
            p.asset_type.as_str(),
            p.order_type.as_str(),
            p.source.as_str(),
            p.entry_price,
            p.initial_price,
            p.close_price,
            p.min_price,
            p.max_price,
            p.limit_order,
            p.average_entry_price,
            p.upward,
            p.leverage,
            p.cumulative_leverage,
            p.cumulative_order_type.as_str(),
            p.stop_loss,
            p.take_profit,
            p.cumulative_stop_loss,
            p.cumulative_take_profit,
            p.trailing,
            p.profit_loss,
            p.profit_loss_without_fee,
            p.max_profit_loss,
            p.venue_profit_loss,
            p.venue_profit_loss_without_fee,
            p.status.as_str(),
            p.old_status.map(|s| s.as_str()),
            p.operation_type.as_str(),
            p.open_time.to_rfc3339(),
            p.adjust_time.map(|t| t.to_rfc3339()),
            p.close_time.map(|t| t.to_rfc3339()),
            p.modified_by,
            p.uuid,
            p.hot_key,
            p.order_level,
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Column/value pairs for the `Some` fields of an update
fn update_columns(update: &PositionUpdate) -> Vec<(&'static str, Value)> {
    let mut columns: Vec<(&'static str, Value)> = Vec::new();
    let mut real = |name: &'static str, value: Option<f64>| {
        if let Some(v) = value {
            columns.push((name, Value::Real(v)));
        }
    };
    real("entry_price", update.entry_price);
    real("initial_price", update.initial_price);
    real("close_price", update.close_price);
    real("min_price", update.min_price);
    real("max_price", update.max_price);
    real("average_entry_price", update.average_entry_price);
    real("profit_loss", update.profit_loss);
    real("profit_loss_without_fee", update.profit_loss_without_fee);
    real("max_profit_loss", update.max_profit_loss);
    real("venue_profit_loss", update.venue_profit_loss);
    real("venue_profit_loss_without_fee", update.venue_profit_loss_without_fee);

    let text = |value: &str| Value::Text(value.to_string());
    if let Some(status) = update.status {
        columns.push(("status", text(status.as_str())));
    }
    if let Some(old_status) = update.old_status {
        columns.push(("old_status", text(old_status.as_str())));
    }
    if let Some(operation) = update.operation_type {
        columns.push(("operation_type", text(operation.as_str())));
    }
    for (name, time) in [
        ("open_time", update.open_time),
        ("adjust_time", update.adjust_time),
        ("close_time", update.close_time),
    ] {
        if let Some(t) = time {
            columns.push((name, Value::Text(t.to_rfc3339())));
        }
    }
    for (name, value) in [
        ("modified_by", &update.modified_by),
        ("uuid", &update.uuid),
        ("hot_key", &update.hot_key),
    ] {
        if let Some(v) = value {
            columns.push((name, text(v)));
        }
    }
    if let Some(level) = update.order_level {
        columns.push(("order_level", Value::Integer(level)));
    }
    columns
}

/// Compare-and-set write of one planned update
///
/// A status change only lands while the row still holds the status it was
/// planned from (`old_status`); any other update only lands on a non-closed
/// row. Otherwise `StoreError::Stale` and nothing is written.
fn apply_update(tx: &Transaction<'_>, order_id: i64, update: &PositionUpdate) -> Result<(), StoreError> {
    let columns = update_columns(update);
    if !columns.is_empty() {
        let assignments = columns
            .iter()
            .enumerate()
            .map(|(i, (name, _))| format!("{} = ?{}", name, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let (guard, expected) = match (update.status, update.old_status) {
            (Some(_), Some(from)) => ("status =", from),
            _ => ("status <>", PositionStatus::Closed),
        };
        let sql = format!(
            "UPDATE positions SET {} WHERE order_id = ?{} AND {} ?{}",
            assignments,
            columns.len() + 1,
            guard,
            columns.len() + 2
        );
        let mut values: Vec<Value> = columns.into_iter().map(|(_, v)| v).collect();
        values.push(Value::Integer(order_id));
        values.push(Value::Text(expected.as_str().to_string()));

        let changed = tx.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Err(match current_status(tx, order_id)? {
                Some(found) => StoreError::Stale { order_id, found },
                None => StoreError::NotFound(order_id),
            });
        }
    }
    sync_projection(tx, order_id)
}

fn current_status(conn: &Connection, order_id: i64) -> Result<Option<PositionStatus>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT status FROM positions WHERE order_id = ?1",
            params![order_id],
            |row| parse_column::<PositionStatus>(row, "status"),
        )
        .optional()?)
}

/// Keep `monitored_positions` in step with the order's current row
fn sync_projection(tx: &Transaction<'_>, order_id: i64) -> Result<(), StoreError> {
    let position = load_position(tx, order_id)?.ok_or(StoreError::NotFound(order_id))?;
    if position.status.is_terminal() {
        tx.execute(
            "DELETE FROM monitored_positions WHERE position_id = ?1 AND trader_id = ?2",
            params![position.position_id, position.trader_id],
        )?;
    } else {
        upsert_monitored(tx, &position.monitored())?;
    }
    Ok(())
}

fn upsert_monitored(conn: &Connection, m: &MonitoredPosition) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO monitored_positions (
            position_id, order_id, trader_id, trade_pair, asset_type, entry_price,
            cumulative_leverage, cumulative_order_type, cumulative_stop_loss, cumulative_take_profit
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT (position_id, order_id) DO UPDATE SET
            cumulative_leverage = excluded.cumulative_leverage,
            cumulative_order_type = excluded.cumulative_order_type,
            cumulative_stop_loss = excluded.cumulative_stop_loss,
            cumulative_take_profit = excluded.cumulative_take_profit,
            asset_type = excluded.asset_type,
            entry_price = excluded.entry_price",
        params![
            m.position_id,
            m.order_id,
            m.trader_id,
            m.trade_pair,
            m.asset_type.as_str(),
            m.entry_price,
            m.cumulative_leverage,
            m.cumulative_order_type.as_str(),
            m.cumulative_stop_loss,
            m.cumulative_take_profit,
        ],
    )?;
    Ok(())
}

fn parse_column<T: FromStr<Err = String>>(row: &Row<'_>, column: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(column)?;
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(StoreError::InvalidColumn {
                column: "enum",
                value: e,
            }),
        )
    })
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_optional_time(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(column)?
        .map(|raw| parse_time(&raw))
        .transpose()
}

fn row_to_position(row: &Row<'_>) -> rusqlite::Result<Position> {
    let open_time: String = row.get("open_time")?;
    let old_status: Option<String> = row.get("old_status")?;

    Ok(Position {
        order_id: row.get("order_id")?,
        position_id: row.get("position_id")?,
        trade_order: row.get("trade_order")?,
        trader_id: row.get("trader_id")?,
        trade_pair: row.get("trade_pair")?,
        asset_type: parse_column::<AssetType>(row, "asset_type")?,
        order_type: parse_column::<OrderType>(row, "order_type")?,
        source: parse_column::<Venue>(row, "source")?,
        entry_price: row.get("entry_price")?,
        initial_price: row.get("initial_price")?,
        close_price: row.get("close_price")?,
        min_price: row.get("min_price")?,
        max_price: row.get("max_price")?,
        limit_order: row.get("limit_order")?,
        average_entry_price: row.get("average_entry_price")?,
        upward: row.get("upward")?,
        leverage: row.get("leverage")?,
        cumulative_leverage: row.get("cumulative_leverage")?,
        cumulative_order_type: parse_column::<OrderType>(row, "cumulative_order_type")?,
        stop_loss: row.get("stop_loss")?,
        take_profit: row.get("take_profit")?,
        cumulative_stop_loss: row.get("cumulative_stop_loss")?,
        cumulative_take_profit: row.get("cumulative_take_profit")?,
        trailing: row.get("trailing")?,
        profit_loss: row.get("profit_loss")?,
        profit_loss_without_fee: row.get("profit_loss_without_fee")?,
        max_profit_loss: row.get("max_profit_loss")?,
        venue_profit_loss: row.get("venue_profit_loss")?,
        venue_profit_loss_without_fee: row.get("venue_profit_loss_without_fee")?,
        status: parse_column::<PositionStatus>(row, "status")?,
        old_status: match old_status {
            Some(raw) => Some(raw.parse::<PositionStatus>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(StoreError::InvalidColumn {
                        column: "old_status",
                        value: e,
                    }),
                )
            })?),
            None => None,
        },
        operation_type: parse_column::<OperationType>(row, "operation_type")?,
        open_time: parse_time(&open_time)?,
        adjust_time: parse_optional_time(row, "adjust_time")?,
        close_time: parse_optional_time(row, "close_time")?,
        modified_by: row.get("modified_by")?,
        uuid: row.get("uuid")?,
        hot_key: row.get("hot_key")?,
        order_level: row.get("order_level")?,
    })
}
