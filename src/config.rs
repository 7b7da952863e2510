use serde::Deserialize;

/// Deployment environment. Drives CSP enforcement, the CSRF cookie `Secure`
/// attribute and plain-HTTP redirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }

    /// CSP is enforced in production and report-only everywhere else.
    pub fn csp_mode(self) -> CspMode {
        match self {
            Environment::Production => CspMode::Enforce,
            Environment::Development => CspMode::ReportOnly,
        }
    }
}

/// Content-Security-Policy delivery mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CspMode {
    Enforce,
    ReportOnly,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
}

/// Fixed-window rate limit policy.
///
/// Two profiles ship in `config/default.toml`: the primary profile
/// (100 requests / 15 minutes) and the edge-tier profile (30 requests / 60
/// seconds). A deployment selects exactly one; the profiles are alternates,
/// not layers.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub window_seconds: u64,
    pub max_requests: u32,
    pub exempt_paths: Vec<String>,
}

impl RateLimitConfig {
    /// The edge-tier profile for deployments sitting directly on the public
    /// edge.
    pub fn edge_tier() -> Self {
        Self { window_seconds: 60, max_requests: 30, exempt_paths: vec!["/healthz".to_string()] }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CsrfConfig {
    pub cookie_max_age_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub hsts_max_age: u64,
    pub hsts_include_subdomains: bool,
    pub hsts_preload: bool,
    pub llm_gateway_origin: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub csrf: CsrfConfig,
    pub security: SecurityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        let defaults: &str = include_str!("../config/default.toml");
        match ::config::Config::builder()
            .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let defaults: &str = include_str!("../config/default.toml");
    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
        // Optional local file: medichat.toml (in CWD)
        .add_source(::config::File::with_name("medichat").required(false));

    if let Ok(custom_path) = std::env::var("MEDICHAT_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(::config::Environment::with_prefix("MEDICHAT").separator("__"));

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub(crate) fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    // Warn for privileged ports on Unix-like systems
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }

    // Rate limiting
    if cfg.rate_limit.window_seconds == 0 {
        return Err(anyhow::anyhow!("rate_limit.window_seconds must be > 0"));
    }
    if cfg.rate_limit.max_requests == 0 {
        return Err(anyhow::anyhow!("rate_limit.max_requests must be > 0"));
    }
    for path in &cfg.rate_limit.exempt_paths {
        if !path.starts_with('/') {
            return Err(anyhow::anyhow!("rate_limit.exempt_paths entries must start with '/': {}", path));
        }
    }

    // CSRF
    if cfg.csrf.cookie_max_age_seconds == 0 {
        return Err(anyhow::anyhow!("csrf.cookie_max_age_seconds must be > 0"));
    }

    // Security headers
    if cfg.security.llm_gateway_origin.trim().is_empty() {
        return Err(anyhow::anyhow!("security.llm_gateway_origin must not be empty"));
    }
    if !cfg.security.llm_gateway_origin.starts_with("https://") {
        return Err(anyhow::anyhow!(
            "security.llm_gateway_origin must be an https origin: {}",
            cfg.security.llm_gateway_origin
        ));
    }

    Ok(())
}
