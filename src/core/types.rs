// ============================================================================
// Shared identifier types
// ============================================================================

/// Generated primary key of a stored row. Zero means "not yet persisted".
pub type RowId = i64;

/// Identifier of a site (4chan, 8kun, ...) as assigned by the site registry.
pub type SiteId = i32;

/// Post or thread number as assigned by the remote site.
pub type PostNo = i64;

/// Row id of a persisted loadable.
pub type LoadableId = RowId;
