pub(super) const UPSERT_RECORD: &str = r#"
    INSERT INTO records (
        collection, record_key, data, is_synced, local_id, offline_created, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT(collection, record_key) DO UPDATE SET
        data = excluded.data,
        is_synced = excluded.is_synced,
        local_id = COALESCE(excluded.local_id, records.local_id),
        offline_created = excluded.offline_created,
        updated_at = excluded.updated_at
"#;

pub(super) const SELECT_RECORD: &str = r#"
    SELECT record_key, data, is_synced, local_id, offline_created, updated_at
    FROM records
    WHERE collection = ?1 AND record_key = ?2
"#;

pub(super) const SELECT_RECORDS: &str = r#"
    SELECT record_key, data, is_synced, local_id, offline_created, updated_at
    FROM records
    WHERE collection = ?1
    ORDER BY record_key ASC
"#;

pub(super) const SELECT_SYNCED_KEYS: &str = r#"
    SELECT record_key
    FROM records
    WHERE collection = ?1 AND is_synced = 1
"#;

pub(super) const SELECT_RECORDS_BY_INDEX: &str = r#"
    SELECT r.record_key, r.data, r.is_synced, r.local_id, r.offline_created, r.updated_at
    FROM records r
    INNER JOIN record_index i
        ON i.collection = r.collection AND i.record_key = r.record_key
    WHERE i.collection = ?1 AND i.index_name = ?2 AND i.index_value = ?3
    ORDER BY r.record_key ASC
"#;

pub(super) const DELETE_RECORD: &str = r#"
    DELETE FROM records
    WHERE collection = ?1 AND record_key = ?2
"#;

pub(super) const INSERT_INDEX_ENTRY: &str = r#"
    INSERT INTO record_index (collection, index_name, index_value, record_key)
    VALUES (?1, ?2, ?3, ?4)
"#;

pub(super) const DELETE_INDEX_ENTRIES: &str = r#"
    DELETE FROM record_index
    WHERE collection = ?1 AND record_key = ?2
"#;

pub(super) const INSERT_CHANGE: &str = r#"
    INSERT INTO sync_queue (
        idempotency_key, tag, table_name, action, record_key, payload,
        created_at, retry_count, status, local_id
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 'pending', ?8)
"#;

pub(super) const SELECT_CHANGE: &str = r#"
    SELECT id, idempotency_key, tag, table_name, action, record_key, payload, created_at,
           retry_count, status, local_id, server_id, last_error, last_attempt_at
    FROM sync_queue
    WHERE id = ?1
"#;

pub(super) const SELECT_QUEUED_CHANGES: &str = r#"
    SELECT id, idempotency_key, tag, table_name, action, record_key, payload, created_at,
           retry_count, status, local_id, server_id, last_error, last_attempt_at
    FROM sync_queue
    ORDER BY id ASC
"#;

pub(super) const SELECT_FAILED_CHANGES: &str = r#"
    SELECT id, idempotency_key, tag, table_name, action, record_key, payload, created_at,
           retry_count, status, local_id, server_id, last_error, last_attempt_at
    FROM sync_queue
    WHERE status = 'failed'
    ORDER BY id ASC
"#;

pub(super) const SELECT_CHANGES_FOR_RECORD: &str = r#"
    SELECT id, payload
    FROM sync_queue
    WHERE table_name = ?1 AND record_key = ?2 AND id != ?3
"#;

pub(super) const REKEY_CHANGE: &str = r#"
    UPDATE sync_queue
    SET record_key = ?1, server_id = ?2, payload = ?3
    WHERE id = ?4
"#;

pub(super) const RECORD_CHANGE_FAILURE: &str = r#"
    UPDATE sync_queue
    SET retry_count = retry_count + 1,
        last_error = ?1,
        last_attempt_at = ?2,
        status = CASE
            WHEN ?3 = 1 OR retry_count + 1 >= ?4 THEN 'failed'
            ELSE status
        END
    WHERE id = ?5
"#;

pub(super) const DELETE_CHANGE: &str = r#"
    DELETE FROM sync_queue WHERE id = ?1
"#;

pub(super) const RETRY_FAILED_CHANGES: &str = r#"
    UPDATE sync_queue
    SET status = 'pending', retry_count = 0, last_error = NULL
    WHERE status = 'failed' AND (?1 IS NULL OR id = ?1)
"#;

pub(super) const DELETE_FAILED_CHANGES: &str = r#"
    DELETE FROM sync_queue
    WHERE status = 'failed' AND (?1 IS NULL OR id = ?1)
"#;

pub(super) const COUNT_CHANGES_BY_STATUS: &str = r#"
    SELECT status, COUNT(*) AS count
    FROM sync_queue
    GROUP BY status
"#;

pub(super) const UPSERT_CACHED: &str = r#"
    INSERT INTO cached_data (
        cache_name, cache_key, data, content_type, status, timestamp, ttl, expires, critical
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(cache_name, cache_key) DO UPDATE SET
        data = excluded.data,
        content_type = excluded.content_type,
        status = excluded.status,
        timestamp = excluded.timestamp,
        ttl = excluded.ttl,
        expires = excluded.expires,
        critical = excluded.critical
"#;

pub(super) const SELECT_CACHED: &str = r#"
    SELECT cache_name, cache_key, data, content_type, status, timestamp, ttl, expires, critical
    FROM cached_data
    WHERE cache_name = ?1 AND cache_key = ?2
"#;

pub(super) const SELECT_CACHE_NAMES: &str = r#"
    SELECT DISTINCT cache_name FROM cached_data ORDER BY cache_name ASC
"#;

pub(super) const DELETE_CACHE: &str = r#"
    DELETE FROM cached_data WHERE cache_name = ?1
"#;

pub(super) const DELETE_EXPIRED_CACHED: &str = r#"
    DELETE FROM cached_data
    WHERE expires IS NOT NULL AND expires < ?1
"#;

pub(super) const COUNT_CACHED: &str = r#"
    SELECT COUNT(*) FROM cached_data
"#;

pub(super) const INSERT_ALERT: &str = r#"
    INSERT INTO critical_alerts (
        id, kind, severity, title, body, payload, timestamp, acknowledged, acknowledged_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(id) DO NOTHING
"#;

pub(super) const SELECT_ALERT: &str = r#"
    SELECT id, kind, severity, title, body, payload, timestamp, acknowledged, acknowledged_at
    FROM critical_alerts
    WHERE id = ?1
"#;

pub(super) const SELECT_ALERTS: &str = r#"
    SELECT id, kind, severity, title, body, payload, timestamp, acknowledged, acknowledged_at
    FROM critical_alerts
    WHERE ?1 = 1 OR acknowledged = 0
    ORDER BY timestamp DESC
"#;

pub(super) const ACKNOWLEDGE_ALERT: &str = r#"
    UPDATE critical_alerts
    SET acknowledged = 1, acknowledged_at = ?1
    WHERE id = ?2 AND acknowledged = 0
"#;

pub(super) const COUNT_UNACKNOWLEDGED_ALERTS: &str = r#"
    SELECT COUNT(*) FROM critical_alerts WHERE acknowledged = 0
"#;

pub(super) const DELETE_ACKNOWLEDGED_ALERTS: &str = r#"
    DELETE FROM critical_alerts
    WHERE acknowledged = 1 AND acknowledged_at IS NOT NULL AND acknowledged_at < ?1
"#;

pub(super) const UPSERT_DRAFT: &str = r#"
    INSERT INTO wizard_drafts (wizard_type, step, data, timestamp)
    VALUES (?1, ?2, ?3, ?4)
    ON CONFLICT(wizard_type) DO UPDATE SET
        step = excluded.step,
        data = excluded.data,
        timestamp = excluded.timestamp
"#;

pub(super) const SELECT_DRAFT: &str = r#"
    SELECT wizard_type, step, data, timestamp
    FROM wizard_drafts
    WHERE wizard_type = ?1
"#;

pub(super) const DELETE_DRAFT: &str = r#"
    DELETE FROM wizard_drafts WHERE wizard_type = ?1
"#;

pub(super) const DELETE_DRAFTS_BEFORE: &str = r#"
    DELETE FROM wizard_drafts WHERE timestamp < ?1
"#;

pub(super) const UPSERT_SETTING: &str = r#"
    INSERT INTO settings (key, value, updated_at)
    VALUES (?1, ?2, ?3)
    ON CONFLICT(key) DO UPDATE SET
        value = excluded.value,
        updated_at = excluded.updated_at
"#;

pub(super) const SELECT_SETTING: &str = r#"
    SELECT value FROM settings WHERE key = ?1
"#;
