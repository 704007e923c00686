//! Dynamic listing queries.

use super::models::ContentQuery;
use curator_metadata::ContentType;
use sqlx::{QueryBuilder, Sqlite};

/// Make `%`, `_` and the escape character itself match literally in a
/// `LIKE ... ESCAPE '\'` pattern.
fn escape_like(terms: &str) -> String {
    let mut escaped = String::with_capacity(terms.len());
    for c in terms.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Append the `FROM ... WHERE ...` part shared by counting and listing.
pub(crate) fn push_filters<'q>(builder: &mut QueryBuilder<'q, Sqlite>, query: &'q ContentQuery) {
    builder.push(" FROM content");
    if query.tag.is_some() {
        builder.push(" INNER JOIN taggings ON taggings.path = content.path");
    }
    builder.push(" WHERE content.disabled = 0");
    if let Some(terms) = query.terms.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = format!("%{}%", escape_like(&terms.to_lowercase()));
        builder.push(" AND (lower(content.title) LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(r" ESCAPE '\' OR lower(coalesce(content.publisher, '')) LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(r" ESCAPE '\' OR lower(content.keywords) LIKE ");
        builder.push_bind(pattern);
        builder.push(r" ESCAPE '\')");
    }
    if let Some(tag) = query.tag {
        builder.push(" AND taggings.tag_id = ");
        builder.push_bind(tag);
    }
    if let Some(lang) = &query.lang {
        builder.push(" AND content.language = ");
        builder.push_bind(lang);
    }
    match query.content_type {
        Some(filter) => {
            builder.push(" AND (content.content_type & ");
            builder.push_bind(filter.stored());
            builder.push(") = ");
            builder.push_bind(filter.stored());
        },
        None => {
            // Leave out items whose every kind is excluded from mixed listings.
            builder.push(" AND (content.content_type & ");
            builder.push_bind((ContentType::all() - ContentType::EXCLUDED).stored());
            builder.push(") != 0");
        },
    }
}

pub(crate) fn count(query: &ContentQuery) -> QueryBuilder<'_, Sqlite> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*)");
    push_filters(&mut builder, query);
    builder
}

pub(crate) fn page(query: &ContentQuery, offset: u32, limit: Option<u32>) -> QueryBuilder<'_, Sqlite> {
    let mut builder = QueryBuilder::new("SELECT content.*");
    push_filters(&mut builder, query);
    builder.push(" ORDER BY content.updated DESC, content.views DESC");
    // A negative limit means "no limit" to SQLite.
    builder.push(" LIMIT ");
    builder.push_bind(limit.map_or(-1, i64::from));
    builder.push(" OFFSET ");
    builder.push_bind(i64::from(offset));
    builder
}

/// `SELECT * FROM content WHERE path IN (...)`.
pub(crate) fn by_paths<'q>(paths: &'q [String]) -> QueryBuilder<'q, Sqlite> {
    let mut builder = QueryBuilder::new("SELECT * FROM content WHERE path IN (");
    let mut separated = builder.separated(", ");
    for path in paths {
        separated.push_bind(path);
    }
    separated.push_unseparated(")");
    builder
}
