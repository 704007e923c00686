//! The content archive: one record per content directory.
//!
//! Records are built from the directory's descriptor at ingestion time.
//! Counters and flags owned by the index (views, favorite, tags, disabled)
//! survive re-ingestion of the same path.

mod kinds;
mod models;
mod query;

pub use self::models::{ContentQuery, ContentRecord, Projection, TagCount};
use self::models::ContentRow;
use crate::db::{Catalog, Database};
use crate::error::{ErrorKind, Result};
use curator_metadata::ContentType;
use curator_storage::BackendHandle;
use exn::{OptionExt, ResultExt};
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::instrument;

/// Host part of a URL, lowercased and without a leading `www.`.
fn url_host(url: &str) -> Option<String> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?.split(':').next()?.to_lowercase();
    match host.strip_prefix("www.") {
        Some(stripped) => Some(stripped.to_string()),
        None if host.is_empty() => None,
        None => Some(host),
    }
}

#[derive(Clone)]
pub struct ContentArchive {
    pool: SqlitePool,
    backend: BackendHandle,
    meta_filenames: Vec<String>,
}

impl ContentArchive {
    /// Fails fast when handed anything but an open content database.
    pub fn new(db: &Database, backend: BackendHandle, meta_filenames: Vec<String>) -> Result<Self> {
        if db.catalog() != Catalog::Content {
            exn::bail!(ErrorKind::BackendMisuse("content archive requires the content database"));
        }
        if db.pool().is_closed() {
            exn::bail!(ErrorKind::BackendMisuse("content archive requires an open database"));
        }
        Ok(Self { pool: db.pool().clone(), backend, meta_filenames })
    }

    fn sqlx_hates_paths(path: &Path) -> Result<String> {
        Ok(path.to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?.to_string())
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// Number of records [`content`](Self::content) would list without
    /// paging.
    pub async fn count(&self, query: &ContentQuery) -> Result<u64> {
        let count: i64 = query::count(query)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("count"))
    }

    /// A page of enabled records matching every filter, most recently
    /// updated first, then most viewed.
    ///
    /// Records are not hydrated, except for prefetchable kinds named by the
    /// content type filter.
    #[instrument(level = "debug", skip(self))]
    pub async fn content(&self, query: &ContentQuery, offset: u32, limit: Option<u32>) -> Result<Vec<ContentRecord>> {
        let rows: Vec<ContentRow> = query::page(query, offset, limit)
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let mut records = rows.into_iter().map(ContentRecord::try_from).collect::<Result<Vec<_>>>()?;
        let prefetch = query.content_type.unwrap_or_default() & ContentType::PREFETCHABLE;
        if !prefetch.is_empty() {
            let mut conn = self.pool.acquire().await.or_raise(|| ErrorKind::Database)?;
            for record in &mut records {
                record.content = kinds::load(&mut *conn, &record.path, prefetch).await?;
            }
        }
        Ok(records)
    }

    // =========================================================================
    // Get/Fetch
    // =========================================================================

    /// A fully hydrated record, or `None` if there is no record at `path`.
    pub async fn single(&self, path: impl AsRef<Path>) -> Result<Option<ContentRecord>> {
        let path = Self::sqlx_hates_paths(path.as_ref())?;
        let mut conn = self.pool.acquire().await.or_raise(|| ErrorKind::Database)?;
        let row: Option<ContentRow> = sqlx::query_as(include_str!("../../queries/content/get_content.sql"))
            .bind(&path)
            .fetch_optional(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut record = ContentRecord::try_from(row)?;
        record.content = kinds::load(&mut *conn, &record.path, record.content_type).await?;
        Ok(Some(record))
    }

    /// Fully hydrated records for every path that has one, projected onto
    /// `fields` (every field when `None`).
    pub async fn multiple(&self, paths: &[String], fields: Option<&[&str]>) -> Result<Vec<Projection>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.pool.acquire().await.or_raise(|| ErrorKind::Database)?;
        let rows: Vec<ContentRow> =
            query::by_paths(paths).build_query_as().fetch_all(&mut *conn).await.or_raise(|| ErrorKind::Database)?;
        let mut projections = Vec::with_capacity(rows.len());
        for row in rows {
            let mut record = ContentRecord::try_from(row)?;
            record.content = kinds::load(&mut *conn, &record.path, record.content_type).await?;
            projections.push(record.project(fields)?);
        }
        Ok(projections)
    }

    /// Copy `fields` of every replaced record into the record replacing it,
    /// under `replaces_<field>`.
    pub async fn add_replacement_data(&self, records: &mut [Projection], fields: &[&str]) -> Result<()> {
        let replaced: Vec<String> = records
            .iter()
            .filter_map(|record| record.get("replaces").and_then(Value::as_str).map(str::to_string))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if replaced.is_empty() {
            return Ok(());
        }
        let found: BTreeMap<String, Projection> = self
            .multiple(&replaced, Some(fields))
            .await?
            .into_iter()
            .filter_map(|p| Some((p.get("path")?.as_str()?.to_string(), p)))
            .collect();
        for record in records.iter_mut() {
            let Some(old) = record.get("replaces").and_then(Value::as_str).and_then(|path| found.get(path)) else {
                continue;
            };
            let extra: Vec<(String, Value)> =
                fields.iter().filter_map(|field| Some((format!("replaces_{field}"), old.get(*field)?.clone()))).collect();
            record.extend(extra);
        }
        Ok(())
    }

    // =========================================================================
    // Ingestion
    // =========================================================================

    /// Read the descriptor of every directory and upsert its record.
    ///
    /// Directories whose descriptor is missing or invalid are logged and
    /// skipped. Returns the number of records written.
    #[instrument(level = "debug", skip_all)]
    pub async fn add_to_archive<P: AsRef<Path>>(&self, paths: impl IntoIterator<Item = P>) -> Result<usize> {
        let mut added = 0;
        for path in paths {
            let path = path.as_ref();
            match self.ingest(path).await {
                Ok(()) => added += 1,
                Err(err) => tracing::warn!(path = %path.display(), error = ?err, "Skipping content directory"),
            }
        }
        Ok(added)
    }

    async fn ingest(&self, dir: &Path) -> Result<()> {
        let descriptor =
            curator_metadata::load(self.backend.as_ref(), dir, &self.meta_filenames).await.or_raise(|| ErrorKind::Metadata)?;
        let size = self.backend.stat(dir).await.or_raise(|| ErrorKind::Storage)?.size;
        let mut record = ContentRecord::from_descriptor(Self::sqlx_hates_paths(dir)?, descriptor, size, OffsetDateTime::now_utc());
        for reference in [&mut record.cover, &mut record.thumbnail] {
            if let Some(file) = reference.as_deref() {
                let exists = self.backend.exists(&dir.join(file)).await.or_raise(|| ErrorKind::Storage)?;
                if !exists {
                    tracing::debug!(path = %dir.display(), file, "Dropping reference to missing file");
                    *reference = None;
                }
            }
        }
        self.upsert(&record).await
    }

    /// Insert or update a record and its kinds, deleting the record it
    /// replaces, all in one transaction.
    pub async fn upsert(&self, record: &ContentRecord) -> Result<()> {
        let row = ContentRow::try_from(record)?;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../../queries/content/upsert_content.sql"))
            .bind(&row.path)
            .bind(row.url)
            .bind(row.title)
            .bind(row.timestamp)
            .bind(row.updated)
            .bind(row.favorite)
            .bind(row.views)
            .bind(row.is_partner)
            .bind(row.is_sponsored)
            .bind(row.archive)
            .bind(row.publisher)
            .bind(row.license)
            .bind(row.tags)
            .bind(row.language)
            .bind(row.size)
            .bind(row.broadcast)
            .bind(row.keywords)
            .bind(row.disabled)
            .bind(row.content_type)
            .bind(row.cover)
            .bind(row.thumbnail)
            .bind(&row.replaces)
            .bind(row.r#gen)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        kinds::clear(&mut *tx, &row.path).await?;
        kinds::insert(&mut *tx, &row.path, &record.content).await?;
        if let Some(replaced) = row.replaces.as_deref().filter(|replaced| *replaced != row.path) {
            let result = sqlx::query(include_str!("../../queries/content/delete_content.sql"))
                .bind(replaced)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            tracing::debug!(path = %row.path, replaced, found = result.rows_affected() > 0, "Replaced content");
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Delete content directories from storage, then their records.
    ///
    /// The two steps are independent: a directory that cannot be deleted is
    /// logged and its record is removed all the same. Returns the number of
    /// records removed.
    #[instrument(level = "debug", skip_all)]
    pub async fn remove_from_archive<P: AsRef<Path>>(&self, paths: impl IntoIterator<Item = P>) -> Result<usize> {
        let mut removed = 0;
        for path in paths {
            let path = path.as_ref();
            if let Err(err) = self.backend.remove(path).await {
                tracing::warn!(path = %path.display(), error = ?err, "Could not delete content files");
            }
            match self.delete_record(path).await {
                Ok(true) => removed += 1,
                Ok(false) => {},
                Err(err) => tracing::warn!(path = %path.display(), error = ?err, "Could not delete content record"),
            }
        }
        Ok(removed)
    }

    /// Delete records (and their taggings) without touching storage.
    ///
    /// A record that cannot be deleted is logged and skipped. Returns the
    /// number of records removed.
    #[instrument(level = "debug", skip_all)]
    pub async fn forget<P: AsRef<Path>>(&self, paths: impl IntoIterator<Item = P>) -> Result<usize> {
        let mut removed = 0;
        for path in paths {
            let path = path.as_ref();
            match self.delete_record(path).await {
                Ok(true) => removed += 1,
                Ok(false) => {},
                Err(err) => tracing::warn!(path = %path.display(), error = ?err, "Could not forget content record"),
            }
        }
        Ok(removed)
    }

    async fn delete_record(&self, path: &Path) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/content/delete_content.sql"))
            .bind(Self::sqlx_hates_paths(path)?)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Tags
    // =========================================================================

    /// Tag a record, creating tags that don't exist yet. Returns the
    /// record's tags afterwards.
    pub async fn add_tags(&self, path: impl AsRef<Path>, names: &[&str]) -> Result<BTreeMap<String, i64>> {
        let path = Self::sqlx_hates_paths(path.as_ref())?;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        Self::ensure_exists(&mut *tx, &path).await?;
        for name in names {
            sqlx::query(include_str!("../../queries/content/insert_tag.sql"))
                .bind(*name)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            let tag_id: i64 = sqlx::query_scalar(include_str!("../../queries/content/get_tag_id.sql"))
                .bind(*name)
                .fetch_one(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            sqlx::query(include_str!("../../queries/content/insert_tagging.sql"))
                .bind(tag_id)
                .bind(&path)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        let tags = Self::sync_tags(&mut *tx, &path).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(tags)
    }

    /// Untag a record. Tag rows are kept for reuse. Returns the record's
    /// tags afterwards.
    pub async fn remove_tags(&self, path: impl AsRef<Path>, names: &[&str]) -> Result<BTreeMap<String, i64>> {
        let path = Self::sqlx_hates_paths(path.as_ref())?;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        Self::ensure_exists(&mut *tx, &path).await?;
        for name in names {
            sqlx::query(include_str!("../../queries/content/delete_tagging.sql"))
                .bind(&path)
                .bind(*name)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        let tags = Self::sync_tags(&mut *tx, &path).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(tags)
    }

    async fn ensure_exists(conn: &mut SqliteConnection, path: &str) -> Result<()> {
        let exists: bool = sqlx::query_scalar(include_str!("../../queries/content/content_exists.sql"))
            .bind(path)
            .fetch_one(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if !exists {
            exn::bail!(ErrorKind::ContentNotFound(path.to_string()));
        }
        Ok(())
    }

    /// Rewrite the record's denormalised tag mapping from the join table.
    async fn sync_tags(conn: &mut SqliteConnection, path: &str) -> Result<BTreeMap<String, i64>> {
        let tags: Vec<(String, i64)> = sqlx::query_as(include_str!("../../queries/content/record_tags.sql"))
            .bind(path)
            .fetch_all(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let tags: BTreeMap<String, i64> = tags.into_iter().collect();
        sqlx::query(include_str!("../../queries/content/update_tags.sql"))
            .bind(serde_json::to_string(&tags).or_raise(|| ErrorKind::InvalidData("tags"))?)
            .bind(path)
            .execute(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(tags)
    }

    pub async fn tag_cloud(&self) -> Result<Vec<TagCount>> {
        sqlx::query_as(include_str!("../../queries/content/tag_cloud.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    pub async fn tag_name(&self, tag_id: i64) -> Result<Option<String>> {
        sqlx::query_scalar(include_str!("../../queries/content/tag_name.sql"))
            .bind(tag_id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    // =========================================================================
    // Misc
    // =========================================================================

    /// Count one more view. Returns `false` if there is no record at `path`.
    pub async fn add_view(&self, path: impl AsRef<Path>) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/content/add_view.sql"))
            .bind(Self::sqlx_hates_paths(path.as_ref())?)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// When the most recently ingested record was written.
    pub async fn last_update(&self) -> Result<Option<OffsetDateTime>> {
        let updated: Option<i64> = sqlx::query_scalar(include_str!("../../queries/content/last_update.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        updated
            .map(|t| OffsetDateTime::from_unix_timestamp(t).or_raise(|| ErrorKind::InvalidData("updated")))
            .transpose()
    }

    pub async fn content_languages(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(include_str!("../../queries/content/content_languages.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Enabled records whose URL points at `domain` (a leading `www.` is
    /// ignored on both sides).
    pub async fn content_for_domain(&self, domain: &str) -> Result<Vec<ContentRecord>> {
        let Some(domain) = url_host(domain) else {
            return Ok(Vec::new());
        };
        let rows: Vec<ContentRow> = sqlx::query_as(include_str!("../../queries/content/content_by_domain.sql"))
            .bind(&domain)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter()
            .filter(|row| url_host(&row.url).as_deref() == Some(domain.as_str()))
            .map(ContentRecord::try_from)
            .collect()
    }

    // =========================================================================
    // Rescan
    // =========================================================================

    /// Every directory holding a descriptor file, sorted.
    pub async fn find_content_dirs(&self) -> Result<Vec<PathBuf>> {
        let query = self.meta_filenames.join(" ");
        let found = self.backend.search(&query, true).await.or_raise(|| ErrorKind::Storage)?;
        let dirs: BTreeSet<PathBuf> = found.files.iter().filter_map(|file| file.path.parent().map(Path::to_path_buf)).collect();
        Ok(dirs.into_iter().collect())
    }

    /// Ingest every content directory in storage.
    #[instrument(level = "info", skip(self))]
    pub async fn reload_content(&self) -> Result<usize> {
        let dirs = self.find_content_dirs().await?;
        let added = self.add_to_archive(&dirs).await?;
        tracing::info!(found = dirs.len(), added, "Reloaded content");
        Ok(added)
    }

    /// Drop every record, then [`reload_content`](Self::reload_content).
    pub async fn clear_and_reload(&self) -> Result<usize> {
        sqlx::query(include_str!("../../queries/content/clear_content.sql"))
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        self.reload_content().await
    }
}

#[cfg(test)]
mod tests;
