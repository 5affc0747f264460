use bytes::Bytes;

/// A cached network response. Timestamps and TTLs are epoch milliseconds.
///
/// `expires` is always `timestamp + ttl`; entries without a TTL (static
/// assets) never expire on their own and only go away with version rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub key: String,
    pub cache_name: String,
    pub data: Bytes,
    pub content_type: Option<String>,
    pub status: u16,
    pub timestamp: i64,
    pub ttl: Option<i64>,
    pub expires: Option<i64>,
    pub critical: bool,
}

impl CachedResponse {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: String,
        cache_name: String,
        data: Bytes,
        content_type: Option<String>,
        status: u16,
        timestamp: i64,
        ttl: Option<i64>,
        critical: bool,
    ) -> Self {
        Self {
            key,
            cache_name,
            data,
            content_type,
            status,
            timestamp,
            ttl,
            expires: ttl.map(|ttl| timestamp + ttl),
            critical,
        }
    }

    pub fn is_fresh_at(&self, now_ms: i64) -> bool {
        match self.expires {
            Some(expires) => now_ms < expires,
            None => true,
        }
    }

    pub fn age_at(&self, now_ms: i64) -> i64 {
        (now_ms - self.timestamp).max(0)
    }

    /// Whether the entry expired more than `grace_ms` before `now_ms`.
    pub fn expired_beyond(&self, now_ms: i64, grace_ms: i64) -> bool {
        match self.expires {
            Some(expires) => expires + grace_ms < now_ms,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = 1_700_000_000_000;

    fn entry(ttl: Option<i64>) -> CachedResponse {
        CachedResponse::new(
            "GET http://port.local/api/berths".into(),
            "api-v1".into(),
            Bytes::from_static(b"[]"),
            Some("application/json".into()),
            200,
            T,
            ttl,
            true,
        )
    }

    #[test]
    fn expires_is_timestamp_plus_ttl() {
        assert_eq!(entry(Some(120_000)).expires, Some(T + 120_000));
        assert_eq!(entry(None).expires, None);
    }

    #[test]
    fn two_minute_entry_is_fresh_then_stale() {
        let cached = entry(Some(120_000));
        assert!(cached.is_fresh_at(T + 100_000));
        assert!(!cached.is_fresh_at(T + 121_000));
    }

    #[test]
    fn static_entries_never_expire() {
        let cached = entry(None);
        assert!(cached.is_fresh_at(T + 365 * 24 * 3_600_000));
        assert!(!cached.expired_beyond(T + 365 * 24 * 3_600_000, 0));
    }

    #[test]
    fn sweep_respects_grace() {
        let cached = entry(Some(1_000));
        assert!(!cached.expired_beyond(T + 5_000, 10_000));
        assert!(cached.expired_beyond(T + 20_000, 10_000));
    }
}
