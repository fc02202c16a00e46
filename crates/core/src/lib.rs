pub mod domain;
pub mod ingest;
pub mod service;

pub mod config {
    use anyhow::Context;

    pub const DEFAULT_FMP_BASE_URL: &str = "https://financialmodelingprep.com/api/v3";

    #[derive(Debug, Clone, Default)]
    pub struct Settings {
        pub fmp_api_key: Option<String>,
        pub fmp_base_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub data_provider_timeout_secs: Option<u64>,
        pub data_provider_retries: Option<u32>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                fmp_api_key: env_non_empty("FMP_API_KEY"),
                fmp_base_url: env_non_empty("FMP_BASE_URL"),
                sentry_dsn: env_non_empty("SENTRY_DSN"),
                data_provider_timeout_secs: env_parse("DATA_PROVIDER_TIMEOUT_SECS")?,
                data_provider_retries: env_parse("DATA_PROVIDER_RETRIES")?,
            })
        }

        pub fn require_fmp_api_key(&self) -> anyhow::Result<&str> {
            self.fmp_api_key
                .as_deref()
                .context("FMP_API_KEY is required")
        }

        pub fn fmp_base_url(&self) -> &str {
            self.fmp_base_url
                .as_deref()
                .unwrap_or(DEFAULT_FMP_BASE_URL)
        }
    }

    pub(crate) fn env_non_empty(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Unset or blank is `None`; a value that does not parse is an error rather than a silent
    /// fallback to the default.
    pub(crate) fn env_parse<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match env_non_empty(key) {
            None => Ok(None),
            Some(s) => s
                .parse::<T>()
                .map(Some)
                .map_err(|e| anyhow::anyhow!("{key}={s:?} is invalid: {e}")),
        }
    }
}
