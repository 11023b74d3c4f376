use anyhow::{Context, Result, ensure};

const DEFAULT_POOL_SIZE: u32 = 10;

/// Connection settings shared by the gateway and the scheduler. Both
/// services hit the same store — the batch pass sequentially, the
/// gateway's per-read reconciliation concurrently — so the pool size is
/// a deployment knob rather than a constant.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub database_url: String,
    pub redis_url: String,
    pub db_pool_size: u32,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;
        let redis_url = std::env::var("REDIS_URL").context("REDIS_URL is required")?;
        let db_pool_size = parse_pool_size(std::env::var("DB_POOL_SIZE").ok())?;

        Ok(Self {
            database_url,
            redis_url,
            db_pool_size,
        })
    }

    /// Bind address for HTTP-facing services. Workers never read this,
    /// so it lives outside the shared config.
    pub fn http_addr(default: &str) -> String {
        std::env::var("HTTP_ADDR").unwrap_or_else(|_| default.to_string())
    }
}

fn parse_pool_size(raw: Option<String>) -> Result<u32> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_POOL_SIZE);
    };

    let size: u32 = raw
        .trim()
        .parse()
        .context("DB_POOL_SIZE must be an integer")?;
    ensure!(size > 0, "DB_POOL_SIZE must be at least 1");
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_size_defaults_when_unset() {
        assert_eq!(parse_pool_size(None).unwrap(), DEFAULT_POOL_SIZE);
    }

    #[test]
    fn pool_size_parses_and_trims() {
        assert_eq!(parse_pool_size(Some(" 4 ".to_string())).unwrap(), 4);
    }

    #[test]
    fn pool_size_rejects_zero_and_garbage() {
        assert!(parse_pool_size(Some("0".to_string())).is_err());
        assert!(parse_pool_size(Some("many".to_string())).is_err());
    }
}
