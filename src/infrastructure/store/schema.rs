//! Local database layout. Statements are idempotent and run on every open.

pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS records (
        collection TEXT NOT NULL,
        record_key TEXT NOT NULL,
        data TEXT NOT NULL,
        is_synced INTEGER NOT NULL DEFAULT 0,
        local_id TEXT,
        offline_created INTEGER NOT NULL DEFAULT 0,
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (collection, record_key)
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_records_local_id
        ON records(collection, local_id)
        WHERE local_id IS NOT NULL
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS record_index (
        collection TEXT NOT NULL,
        index_name TEXT NOT NULL,
        index_value TEXT NOT NULL,
        record_key TEXT NOT NULL,
        PRIMARY KEY (collection, index_name, record_key)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_record_index_lookup
        ON record_index(collection, index_name, index_value)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sync_queue (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        idempotency_key TEXT NOT NULL UNIQUE,
        tag TEXT NOT NULL,
        table_name TEXT NOT NULL,
        action TEXT NOT NULL,
        record_key TEXT,
        payload TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        retry_count INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'pending',
        local_id TEXT,
        server_id TEXT,
        last_error TEXT,
        last_attempt_at INTEGER
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_sync_queue_status ON sync_queue(status, id)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_sync_queue_record ON sync_queue(table_name, record_key)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cached_data (
        cache_name TEXT NOT NULL,
        cache_key TEXT NOT NULL,
        data BLOB NOT NULL,
        content_type TEXT,
        status INTEGER NOT NULL,
        timestamp INTEGER NOT NULL,
        ttl INTEGER,
        expires INTEGER,
        critical INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (cache_name, cache_key)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_cached_data_expires ON cached_data(expires)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS critical_alerts (
        id TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        severity TEXT NOT NULL,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        payload TEXT NOT NULL,
        timestamp INTEGER NOT NULL,
        acknowledged INTEGER NOT NULL DEFAULT 0,
        acknowledged_at INTEGER
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_critical_alerts_ack
        ON critical_alerts(acknowledged, timestamp)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS wizard_drafts (
        wizard_type TEXT PRIMARY KEY,
        step INTEGER NOT NULL,
        data TEXT NOT NULL,
        timestamp INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
];
