//! Title to app identifier resolution

use std::collections::HashMap;
use uuid::Uuid;

use super::{IngestError, IngestResult};
use crate::database::IngestStore;

/// Import-scoped map from title to app id
///
/// Built once per import and dropped with it; nothing is shared between
/// imports.
#[derive(Debug, Clone, Default)]
pub struct TitleCache {
    ids: HashMap<String, Uuid>,
    created: usize,
}

impl TitleCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a title
    pub fn get(&self, title: &str) -> Option<Uuid> {
        self.ids.get(title).copied()
    }

    /// Add a mapping
    pub fn insert(&mut self, title: impl Into<String>, id: Uuid, created: bool) {
        self.ids.insert(title.into(), id);
        if created {
            self.created += 1;
        }
    }

    /// Number of distinct titles resolved
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if no titles were resolved
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of apps inserted while resolving
    pub fn created(&self) -> usize {
        self.created
    }
}

/// How rows are bound to an app
#[derive(Debug, Clone)]
pub enum EntityBinding {
    /// Every row uses the same app; the title column is ignored
    Fixed(Uuid),
    /// Each row's title is looked up in the cache
    PerTitle(TitleCache),
}

impl EntityBinding {
    /// Check if rows need a title to be bound
    pub fn uses_titles(&self) -> bool {
        matches!(self, EntityBinding::PerTitle(_))
    }
}

/// Treat blank titles like missing ones
pub(crate) fn normalize_title(title: &str) -> Option<&str> {
    if title.trim().is_empty() {
        None
    } else {
        Some(title)
    }
}

/// Resolve every distinct title once, inside the given write scope
///
/// Titles are resolved in the order given. Blank titles are skipped: rows
/// carrying them are rejected later rather than bound to a fabricated app.
/// The check-then-insert is not guarded against another process importing
/// the same new title concurrently.
pub async fn resolve_titles<'t, S, I>(
    store: &S,
    scope: &mut S::Scope,
    titles: I,
) -> IngestResult<TitleCache>
where
    S: IngestStore + ?Sized,
    I: IntoIterator<Item = &'t str>,
{
    let mut cache = TitleCache::new();

    for title in titles.into_iter().filter_map(normalize_title) {
        if cache.get(title).is_some() {
            continue;
        }

        let resolved = store
            .resolve_or_create_entity(scope, title)
            .await
            .map_err(|source| IngestError::Resolution {
                title: title.to_string(),
                source,
            })?;
        cache.insert(title, resolved.id, resolved.created);
    }

    tracing::debug!(
        titles = cache.len(),
        created = cache.created(),
        "Resolved app titles"
    );
    Ok(cache)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_counts_created() {
        let mut cache = TitleCache::new();
        cache.insert("Acme", Uuid::new_v4(), true);
        cache.insert("Globex", Uuid::new_v4(), false);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.created(), 1);
        assert!(cache.get("Acme").is_some());
        assert!(cache.get("Initech").is_none());
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("Acme"), Some("Acme"));
        assert_eq!(normalize_title("  "), None);
        assert_eq!(normalize_title(""), None);
    }

    #[test]
    fn test_binding_uses_titles() {
        assert!(!EntityBinding::Fixed(Uuid::new_v4()).uses_titles());
        assert!(EntityBinding::PerTitle(TitleCache::new()).uses_titles());
    }

    #[cfg(feature = "duckdb-backend")]
    #[tokio::test]
    async fn test_resolve_titles_deduplicates_and_skips_blank() {
        use crate::database::DuckDBStore;

        let store = DuckDBStore::in_memory().unwrap();
        store.initialize().await.unwrap();

        let mut scope = store.begin_write().await.unwrap();
        let cache = resolve_titles(&store, &mut scope, ["Acme", "", "Globex", "Acme"])
            .await
            .unwrap();
        store.commit(scope).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.created(), 2);
        assert_eq!(store.count_entities().await.unwrap(), 3);
    }
}
