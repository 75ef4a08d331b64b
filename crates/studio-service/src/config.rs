//! Service configuration.

use studio_core::PricingTable;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// PostgreSQL connection URL (default: "postgres://localhost/studio").
    pub database_url: String,

    /// Directory generated assets are written into (default: "/data/studio-assets").
    pub asset_dir: String,

    /// Public base URL assets are served under.
    pub asset_base_url: String,

    /// HS256 secret for JWT validation. Tokens are rejected when unset.
    pub auth_jwt_secret: Option<String>,

    /// Expected JWT audience (default: "design-studio").
    pub auth_audience: String,

    /// Admin API key for privileged endpoints (ticket grants).
    pub admin_api_key: Option<String>,

    /// Lumina API URL (optional).
    pub lumina_api_url: Option<String>,

    /// Lumina API key (optional).
    pub lumina_api_key: Option<String>,

    /// FluxQueue API URL (optional).
    pub fluxqueue_api_url: Option<String>,

    /// FluxQueue API key (optional).
    pub fluxqueue_api_key: Option<String>,

    /// Vireo API URL (optional).
    pub vireo_api_url: Option<String>,

    /// Vireo API key (optional).
    pub vireo_api_key: Option<String>,

    /// Reconciler poll interval in seconds (default: 3).
    pub poll_interval_seconds: u64,

    /// Ceiling after which a non-terminal job is force-failed (default: 300).
    pub job_timeout_seconds: u64,

    /// Maximum non-terminal jobs per user (default: 4).
    pub max_inflight_jobs: usize,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Ticket pricing table.
    pub pricing: PricingTable,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/studio".into()),
            asset_dir: std::env::var("ASSET_DIR").unwrap_or_else(|_| "/data/studio-assets".into()),
            asset_base_url: std::env::var("ASSET_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080/assets".into()),
            auth_jwt_secret: std::env::var("AUTH_JWT_SECRET").ok(),
            auth_audience: std::env::var("AUTH_AUDIENCE")
                .unwrap_or_else(|_| "design-studio".into()),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            lumina_api_url: std::env::var("LUMINA_API_URL").ok(),
            lumina_api_key: std::env::var("LUMINA_API_KEY").ok(),
            fluxqueue_api_url: std::env::var("FLUXQUEUE_API_URL").ok(),
            fluxqueue_api_key: std::env::var("FLUXQUEUE_API_KEY").ok(),
            vireo_api_url: std::env::var("VIREO_API_URL").ok(),
            vireo_api_key: std::env::var("VIREO_API_KEY").ok(),
            poll_interval_seconds: std::env::var("POLL_INTERVAL_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            job_timeout_seconds: std::env::var("JOB_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
            max_inflight_jobs: std::env::var("MAX_INFLIGHT_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            pricing: PricingTable::default(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            database_url: "postgres://localhost/studio".into(),
            asset_dir: "/data/studio-assets".into(),
            asset_base_url: "http://localhost:8080/assets".into(),
            auth_jwt_secret: None,
            auth_audience: "design-studio".into(),
            admin_api_key: None,
            lumina_api_url: None,
            lumina_api_key: None,
            fluxqueue_api_url: None,
            fluxqueue_api_key: None,
            vireo_api_url: None,
            vireo_api_key: None,
            poll_interval_seconds: 3,
            job_timeout_seconds: 300,
            max_inflight_jobs: 4,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            pricing: PricingTable::default(),
        }
    }
}
