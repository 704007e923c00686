//! The facets archive: one facet tree per directory.
//!
//! A tree is stored across one table per nesting level (see [`schema`]).
//! Every write goes through the sync engine, which diffs the stored tree
//! against the new one and touches only rows that changed.

mod schema;
mod sync;
mod tree;

use self::schema::{ALL_TABLES, Child, Column, ROOT, Table};
use self::sync::Op;
use self::tree::Tree;
use crate::db::{Catalog, Database};
use crate::error::{ErrorKind, Result};
use curator_facets::{Context, Facets, Probe, Registry};
use curator_metadata::ContentType;
use curator_storage::BackendHandle;
use exn::{OptionExt, ResultExt};
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;

/// Rows written by one synchronisation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub upserts: usize,
    pub deletes: usize,
}

impl SyncStats {
    pub fn is_empty(&self) -> bool {
        self.upserts == 0 && self.deletes == 0
    }
}

fn path_key(path: &Path) -> Result<&str> {
    path.to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))
}

/// Directory and file name of a file event.
fn split(file_path: &Path) -> Result<(&Path, &str)> {
    let file = file_path.file_name().and_then(|name| name.to_str()).ok_or_raise(|| ErrorKind::InvalidData("file name"))?;
    Ok((file_path.parent().unwrap_or(Path::new("")), file))
}

#[derive(Clone)]
pub struct FacetsArchive {
    pool: SqlitePool,
    backend: BackendHandle,
    probe: Arc<dyn Probe>,
    registry: Arc<Registry>,
}

impl FacetsArchive {
    pub fn new(db: &Database, backend: BackendHandle, probe: Arc<dyn Probe>, registry: Arc<Registry>) -> Result<Self> {
        if db.catalog() != Catalog::Facets {
            exn::bail!(ErrorKind::BackendMisuse("facets archive requires the facets database"));
        }
        if db.pool().is_closed() {
            exn::bail!(ErrorKind::BackendMisuse("facets archive requires an open database"));
        }
        Ok(Self { pool: db.pool().clone(), backend, probe, registry })
    }

    fn context<'a>(&'a self, dir: &'a Path) -> Context<'a> {
        Context::new(self.backend.as_ref(), self.probe.as_ref(), dir)
    }

    // =========================================================================
    // Get/Fetch
    // =========================================================================

    /// The stored facets of a directory, with exactly the kinds named by its
    /// `facet_types`.
    pub async fn get_facets(&self, dir: impl AsRef<Path>) -> Result<Option<Facets>> {
        let dir = path_key(dir.as_ref())?;
        let mut conn = self.pool.acquire().await.or_raise(|| ErrorKind::Database)?;
        load_tree(&mut conn, dir).await?.map(tree::from_tree).transpose()
    }

    // =========================================================================
    // File events
    // =========================================================================

    /// Fold a created or modified file into the facets of its directory.
    #[instrument(level = "debug", skip_all, fields(path = %file_path.as_ref().display()))]
    pub async fn update_facets(&self, file_path: impl AsRef<Path>, partial: bool) -> Result<SyncStats> {
        let (dir, file) = split(file_path.as_ref())?;
        let old = self.get_facets(dir).await?;
        let mut new = old.clone().unwrap_or_else(|| Facets::new(dir.to_string_lossy()));
        let cx = self.context(dir);
        self.registry.update_file(&cx, &mut new, file, partial).await.or_raise(|| ErrorKind::Facets)?;
        self.save_facets(old.as_ref(), Some(&new)).await
    }

    /// Take a deleted file out of the facets of its directory. A directory
    /// left without files loses its facets altogether.
    #[instrument(level = "debug", skip_all, fields(path = %file_path.as_ref().display()))]
    pub async fn remove_facets(&self, file_path: impl AsRef<Path>) -> Result<SyncStats> {
        let (dir, file) = split(file_path.as_ref())?;
        let Some(old) = self.get_facets(dir).await? else {
            return Ok(SyncStats::default());
        };
        let cx = self.context(dir);
        let mut new = old.clone();
        self.registry.remove_file(&cx, &mut new, file).await.or_raise(|| ErrorKind::Facets)?;
        let empty = cx.files().await.or_raise(|| ErrorKind::Storage)?.is_empty();
        self.save_facets(Some(&old), (!empty).then_some(&new)).await
    }

    /// Drop the facets of a directory and of every directory below it. The
    /// empty path clears the whole archive. Returns the number of
    /// directories dropped.
    #[instrument(level = "debug", skip_all, fields(dir = %dir.as_ref().display()))]
    pub async fn remove_dir(&self, dir: impl AsRef<Path>) -> Result<u64> {
        let dir = path_key(dir.as_ref())?;
        let prefix = format!("{dir}/");
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let mut removed = 0;
        for table in ALL_TABLES {
            let sql = match dir.is_empty() {
                true => format!(r#"DELETE FROM "{}""#, table.name),
                false => format!(r#"DELETE FROM "{}" WHERE path = ?1 OR substr(path, 1, length(?2)) = ?2"#, table.name),
            };
            let mut query = sqlx::query(&sql);
            if !dir.is_empty() {
                query = query.bind(dir).bind(&prefix);
            }
            let result = query.execute(&mut *tx).await.or_raise(|| ErrorKind::Database)?;
            if table == &ROOT {
                removed = result.rows_affected();
            }
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(removed)
    }

    // =========================================================================
    // Generation
    // =========================================================================

    /// Facets of a directory built from scratch, without storing them.
    pub async fn generate(&self, dir: impl AsRef<Path>, partial: bool) -> Result<Option<Facets>> {
        self.registry.generate(&self.context(dir.as_ref()), partial).await.or_raise(|| ErrorKind::Facets)
    }

    /// Regenerate a directory's facets with full detail and store the
    /// difference.
    #[instrument(level = "debug", skip_all, fields(dir = %dir.as_ref().display()))]
    pub async fn rebuild(&self, dir: impl AsRef<Path>) -> Result<SyncStats> {
        let dir = dir.as_ref();
        let old = self.get_facets(dir).await?;
        let new = self.generate(dir, false).await?;
        self.save_facets(old.as_ref(), new.as_ref()).await
    }

    // =========================================================================
    // Synchronisation
    // =========================================================================

    /// Persist the difference between two versions of a directory's facets
    /// in one transaction. `facet_types` is recomputed from `new`; `None`
    /// deletes the stored tree.
    pub async fn save_facets(&self, old: Option<&Facets>, new: Option<&Facets>) -> Result<SyncStats> {
        let old = old.map(tree::to_tree).transpose()?;
        let new = new.map(tree::to_tree).transpose()?;
        let mut ops = Vec::new();
        sync::plan(&ROOT, old.as_ref(), new.as_ref(), &mut ops);
        if ops.is_empty() {
            return Ok(SyncStats::default());
        }
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let stats = apply(&mut tx, ops).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::debug!(upserts = stats.upserts, deletes = stats.deletes, "Saved facets");
        Ok(stats)
    }
}

// =============================================================================
// Row I/O
// =============================================================================

fn bind_value(builder: &mut QueryBuilder<'_, Sqlite>, value: Value) {
    match value {
        Value::Null => builder.push_bind(None::<String>),
        Value::Bool(flag) => builder.push_bind(flag),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => builder.push_bind(integer),
            None => builder.push_bind(number.as_f64()),
        },
        Value::String(text) => builder.push_bind(text),
        other => builder.push_bind(other.to_string()),
    };
}

async fn apply(conn: &mut SqliteConnection, ops: Vec<Op>) -> Result<SyncStats> {
    let mut stats = SyncStats::default();
    for op in ops {
        tracing::trace!(table = op.table().name, upsert = matches!(op, Op::Upsert { .. }), "Writing facet row");
        let mut builder = match op {
            Op::Upsert { table, values } => {
                let columns: Vec<String> = values.iter().map(|(name, _)| format!(r#""{name}""#)).collect();
                let mut builder = QueryBuilder::new(format!(r#"INSERT OR REPLACE INTO "{}" ({}) VALUES ("#, table.name, columns.join(", ")));
                for (index, (_, value)) in values.into_iter().enumerate() {
                    if index > 0 {
                        builder.push(", ");
                    }
                    bind_value(&mut builder, value);
                }
                builder.push(")");
                stats.upserts += 1;
                builder
            },
            Op::Delete { table, keys } => {
                let mut builder = QueryBuilder::new(format!(r#"DELETE FROM "{}" WHERE "#, table.name));
                for (index, (name, value)) in keys.into_iter().enumerate() {
                    if index > 0 {
                        builder.push(" AND ");
                    }
                    builder.push(format!(r#""{name}" = "#));
                    bind_value(&mut builder, value);
                }
                stats.deletes += 1;
                builder
            },
        };
        builder.build().execute(&mut *conn).await.or_raise(|| ErrorKind::Database)?;
    }
    Ok(stats)
}

fn row_to_tree(table: &'static Table, row: &SqliteRow) -> Result<Tree> {
    let mut tree = Tree::new();
    for (index, (name, column)) in table.columns.iter().enumerate() {
        let value = match column {
            Column::Text => row.try_get::<Option<String>, _>(index).map(Value::from),
            Column::Integer => row.try_get::<Option<i64>, _>(index).map(Value::from),
            Column::Real => row.try_get::<Option<f64>, _>(index).map(Value::from),
        };
        tree.insert(name.to_string(), value.or_raise(|| ErrorKind::Database)?);
    }
    Ok(tree)
}

/// Every row of `table` belonging to a directory, list rows ordered by
/// their remaining key columns.
async fn load_rows(conn: &mut SqliteConnection, table: &'static Table, path: &str) -> Result<Vec<Tree>> {
    let columns: Vec<String> = table.columns.iter().map(|(name, _)| format!(r#""{name}""#)).collect();
    let mut builder = QueryBuilder::new(format!(r#"SELECT {} FROM "{}" WHERE path = "#, columns.join(", "), table.name));
    builder.push_bind(path);
    if table.key.len() > 1 {
        let order: Vec<String> = table.key[1..].iter().map(|name| format!(r#""{name}""#)).collect();
        builder.push(format!(" ORDER BY {}", order.join(", ")));
    }
    let rows = builder.build().fetch_all(&mut *conn).await.or_raise(|| ErrorKind::Database)?;
    rows.iter().map(|row| row_to_tree(table, row)).collect()
}

/// Load the kind tables hanging off the root: each is a single row, with
/// lists below it.
async fn load_child(conn: &mut SqliteConnection, child: &Child, path: &str) -> Result<Option<Value>> {
    let table = match child {
        Child::Many(table) => {
            let rows = load_rows(conn, table, path).await?;
            return Ok(Some(Value::Array(rows.into_iter().map(Value::Object).collect())));
        },
        Child::One(table) => table,
    };
    let Some(mut row) = load_rows(conn, table, path).await?.into_iter().next() else {
        return Ok(None);
    };
    for (key, nested) in table.children {
        if let Child::Many(list) = nested {
            let rows = load_rows(conn, list, path).await?;
            row.insert(key.to_string(), Value::Array(rows.into_iter().map(Value::Object).collect()));
        }
    }
    Ok(Some(Value::Object(row)))
}

async fn load_tree(conn: &mut SqliteConnection, path: &str) -> Result<Option<Tree>> {
    let Some(mut root) = load_rows(conn, &ROOT, path).await?.into_iter().next() else {
        return Ok(None);
    };
    let mask = root
        .get("facet_types")
        .and_then(Value::as_i64)
        .and_then(ContentType::from_stored)
        .ok_or_raise(|| ErrorKind::InvalidData("facet types"))?;
    for (key, child) in ROOT.children {
        let wanted = match child {
            Child::One(table) | Child::Many(table) => table.mask.is_none_or(|kind| mask.contains(kind)),
        };
        if !wanted {
            continue;
        }
        if let Some(value) = load_child(conn, child, path).await? {
            root.insert(key.to_string(), value);
        }
    }
    Ok(Some(root))
}

#[cfg(test)]
mod tests;
