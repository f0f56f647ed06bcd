use tracing::debug;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter. Returns `true` while `key` is within `limit`.
    pub async fn check_rate_limit(
        &self,
        key: &str,
        limit: i64,
        window_seconds: i64,
    ) -> redis::RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = window_pipeline(key, window_seconds)
            .query_async(&mut conn)
            .await?;

        if count > limit {
            debug!("Rate limit hit for {}: {} requests", key, count);
        }
        Ok(count <= limit)
    }
}

/// The TTL is only set by the request that opens the window, so the window
/// does not slide while a client keeps sending.
fn window_pipeline(key: &str, window_seconds: i64) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .cmd("SET")
        .arg(key)
        .arg(0)
        .arg("EX")
        .arg(window_seconds)
        .arg("NX")
        .ignore()
        .incr(key, 1);
    pipe
}

pub fn rate_limit_key(client_ip: &str) -> String {
    format!("parcel:ratelimit:{}", client_ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_key_is_namespaced() {
        assert_eq!(rate_limit_key("10.0.0.1"), "parcel:ratelimit:10.0.0.1");
    }

    #[test]
    fn test_window_ttl_is_set_once() {
        let packed = String::from_utf8(window_pipeline("k", 60).get_packed_pipeline()).unwrap();
        assert!(packed.contains("NX"));
        assert!(packed.contains("INCR"));
        assert!(!packed.contains("EXPIRE"));
    }
}
