use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub max_file_size: usize,
    /// How long converted documents stay available for download.
    pub download_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let max_file_size_mb: usize = std::env::var("MAX_FILE_SIZE_MB")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(25);

        let download_ttl_seconds = std::env::var("DOWNLOAD_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3600);

        Self {
            port,
            max_file_size: megabytes(max_file_size_mb),
            download_ttl: Duration::from_secs(download_ttl_seconds),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            max_file_size: megabytes(25),
            download_ttl: Duration::from_secs(3600),
        }
    }
}

fn megabytes(count: usize) -> usize {
    count.saturating_mul(1024 * 1024)
}
