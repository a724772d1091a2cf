//! Configuration types for secrets-walker
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros (every option can also
//!   come from the environment)
//! - Store address parsing
//! - Runtime configuration with validation

use crate::auth::AuthToken;
use crate::error::ConfigError;
use clap::Parser;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

/// Port used when the store address does not name one
pub const DEFAULT_STORE_PORT: u16 = 8200;

/// Default sink directory (s6 container environment)
pub const DEFAULT_OUTPUT_DIR: &str = "/var/run/s6/container_environment/";

/// Maximum concurrent store requests
const MAX_IN_FLIGHT: usize = 512;

/// Maximum walker depth guard
const MAX_DEPTH_LIMIT: usize = 1024;

/// Regex for parsing store addresses
static STORE_ADDR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    // Matches: scheme://host, scheme://host:port, optionally with a trailing slash
    Regex::new(r"^([A-Za-z][A-Za-z0-9+.-]*)://([^/:\s]+)(?::(\d+))?/?$")
        .expect("Invalid store address regex")
});

/// Recursive secret-store walker that writes every secret field to a directory
#[derive(Parser, Debug, Clone)]
#[command(
    name = "secrets-walker",
    version,
    about = "Materialize every secret under a store namespace as one file per field",
    long_about = "Walks a hierarchical secret store (Vault KV) under <mount>/<group>/,\n\
                  fetches every leaf secret concurrently and writes each field to\n\
                  the output directory as a file named after the field.\n\n\
                  All options can be supplied through the environment.",
    after_help = "EXAMPLES:\n    \
        VAULT_ADDR=https://vault:8200 VAULT_GROUP=billing EXCHANGE_HOST=auth.local secrets-walker\n    \
        secrets-walker --vault-addr http://127.0.0.1:8200 --group dev --token s.xyz -o ./env\n    \
        secrets-walker --vault-addr https://vault --group prod --ca-cert /etc/ssl/vault-ca.pem --require-secrets"
)]
pub struct CliArgs {
    /// Secret store address (scheme://host[:port], default port 8200)
    #[arg(long, env = "VAULT_ADDR", value_name = "URL")]
    pub vault_addr: Option<String>,

    /// Group (namespace) whose secrets are materialized
    #[arg(long, env = "VAULT_GROUP", value_name = "GROUP")]
    pub group: Option<String>,

    /// Secret engine mount
    #[arg(long, env = "VAULT_MOUNT", default_value = "secret", value_name = "MOUNT")]
    pub mount: String,

    /// Token exchange host (host, host:port or URL)
    #[arg(long, env = "EXCHANGE_HOST", value_name = "HOST")]
    pub exchange_host: Option<String>,

    /// Pre-issued token; skips the token exchange
    #[arg(long, env = "VAULT_TOKEN", value_name = "TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// PEM file with additional trusted CA certificates
    #[arg(long, env = "VAULT_CACERT", value_name = "FILE")]
    pub ca_cert: Option<PathBuf>,

    /// Directory receiving one file per secret field
    #[arg(
        short,
        long,
        env = "SECRETS_OUTPUT_DIR",
        default_value = DEFAULT_OUTPUT_DIR,
        value_name = "DIR"
    )]
    pub output_dir: PathBuf,

    /// Fail when no secrets exist under the group
    #[arg(
        long,
        env = "VAULT_REQUIRE_SECRETS",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub require_secrets: bool,

    /// Maximum concurrent store requests
    #[arg(long, env = "VAULT_MAX_IN_FLIGHT", default_value = "32", value_name = "NUM")]
    pub max_in_flight: usize,

    /// Maximum directory depth before the walk is aborted
    #[arg(short = 'd', long, env = "VAULT_MAX_DEPTH", default_value = "64", value_name = "NUM")]
    pub max_depth: usize,

    /// Per-request timeout in seconds
    #[arg(long, env = "VAULT_TIMEOUT", default_value = "30", value_name = "SECS")]
    pub timeout: u64,

    /// Number of retry attempts for transient transport errors
    #[arg(long, env = "VAULT_RETRIES", default_value = "3", value_name = "NUM")]
    pub retries: u32,

    /// Quiet mode - suppress header, spinner and summary
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Transport scheme of the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// Parsed store address components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreAddr {
    pub scheme: Scheme,

    /// Hostname or IP
    pub host: String,

    /// Port (8200 when the address does not name one)
    pub port: u16,
}

impl StoreAddr {
    /// Parse a store address
    ///
    /// Accepts formats:
    /// - https://vault.example.com
    /// - http://10.0.0.5:8300
    /// - https://vault/ (trailing slash is ignored)
    pub fn parse(addr: &str) -> Result<Self, ConfigError> {
        let addr = addr.trim();

        let invalid = |reason: &str| ConfigError::InvalidStoreAddress {
            addr: addr.to_string(),
            reason: reason.to_string(),
        };

        let caps = STORE_ADDR_REGEX
            .captures(addr)
            .ok_or_else(|| invalid("Expected format: scheme://host[:port]"))?;

        let scheme = match caps.get(1).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
            Some("https") => Scheme::Https,
            Some("http") => Scheme::Http,
            Some(other) => return Err(invalid(&format!("Unsupported scheme '{}'", other))),
            None => return Err(invalid("Missing scheme")),
        };

        let host = caps
            .get(2)
            .ok_or_else(|| invalid("Missing host"))?
            .as_str()
            .to_string();

        let port = match caps.get(3) {
            Some(m) => m
                .as_str()
                .parse::<u16>()
                .map_err(|_| invalid(&format!("Invalid port '{}'", m.as_str())))?,
            None => DEFAULT_STORE_PORT,
        };

        Ok(Self { scheme, host, port })
    }

    /// Base URL of the store (scheme://host:port/)
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.to_string()).map_err(|e| ConfigError::InvalidStoreAddress {
            addr: self.to_string(),
            reason: e.to_string(),
        })
    }
}

impl fmt::Display for StoreAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}

/// Where the run's token comes from
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// Pre-issued token; the exchange is never contacted
    Override(AuthToken),

    /// Exchange endpoint URL for this group
    Exchange(Url),
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Parsed store address
    pub store_addr: StoreAddr,

    /// Group (namespace) identifier
    pub group: String,

    /// Secret engine mount
    pub mount: String,

    /// Token override or exchange endpoint
    pub token_source: TokenSource,

    /// Custom trust anchors (PEM bundle)
    pub ca_cert: Option<PathBuf>,

    /// Sink directory
    pub output_dir: PathBuf,

    /// Zero leaves is fatal
    pub require_secrets: bool,

    /// Concurrent request bound
    pub max_in_flight: usize,

    /// Walker depth guard
    pub max_depth: usize,

    /// Per-request timeout
    pub timeout: Duration,

    /// Retry count for transient transport errors
    pub retry_count: u32,

    /// Show header, spinner and summary
    pub show_progress: bool,
}

impl RunConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        // Store address is checked first: nothing else matters without it
        let addr = args
            .vault_addr
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .ok_or(ConfigError::MissingStoreAddress)?;
        let store_addr = StoreAddr::parse(addr)?;

        let group = args
            .group
            .as_deref()
            .filter(|g| !g.trim().is_empty())
            .ok_or(ConfigError::MissingGroup)?;
        let group = normalize_segments(group).ok_or_else(|| ConfigError::InvalidGroup {
            group: group.to_string(),
            reason: "Must be one or more non-empty path segments without '.' or '..'".into(),
        })?;

        let mount = normalize_segments(&args.mount).ok_or_else(|| ConfigError::InvalidMount {
            mount: args.mount.clone(),
        })?;

        let token_source = match args.token.filter(|t| !t.trim().is_empty()) {
            Some(token) => TokenSource::Override(AuthToken::new(token.trim().to_string())),
            None => {
                let host = args
                    .exchange_host
                    .as_deref()
                    .filter(|h| !h.trim().is_empty())
                    .ok_or(ConfigError::MissingExchangeHost)?;
                TokenSource::Exchange(exchange_url(host, &group)?)
            }
        };

        if args.max_in_flight == 0 || args.max_in_flight > MAX_IN_FLIGHT {
            return Err(ConfigError::InvalidInFlight {
                count: args.max_in_flight,
                max: MAX_IN_FLIGHT,
            });
        }

        if args.max_depth == 0 || args.max_depth > MAX_DEPTH_LIMIT {
            return Err(ConfigError::InvalidMaxDepth {
                depth: args.max_depth,
                max: MAX_DEPTH_LIMIT,
            });
        }

        if args.timeout == 0 {
            return Err(ConfigError::InvalidTimeout { secs: args.timeout });
        }

        if let Some(ref ca) = args.ca_cert {
            if !ca.is_file() {
                return Err(ConfigError::InvalidCaCert {
                    path: ca.clone(),
                    reason: "File does not exist".to_string(),
                });
            }
        }

        if args.output_dir.exists() && !args.output_dir.is_dir() {
            return Err(ConfigError::InvalidOutputDir {
                path: args.output_dir.clone(),
                reason: "Not a directory".to_string(),
            });
        }

        Ok(Self {
            store_addr,
            group,
            mount,
            token_source,
            ca_cert: args.ca_cert,
            output_dir: args.output_dir,
            require_secrets: args.require_secrets,
            max_in_flight: args.max_in_flight,
            max_depth: args.max_depth,
            timeout: Duration::from_secs(args.timeout),
            retry_count: args.retries,
            show_progress: !args.quiet,
        })
    }

    /// Load the configured trust anchors, if any
    pub fn load_trust_anchors(&self) -> Result<Vec<reqwest::Certificate>, ConfigError> {
        match self.ca_cert {
            Some(ref path) => load_pem_bundle(path),
            None => Ok(Vec::new()),
        }
    }
}

/// Build the exchange URL for a group
///
/// A bare host (or host:port) is reached over https.
fn exchange_url(host: &str, group: &str) -> Result<Url, ConfigError> {
    let host = host.trim();
    let base = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };

    let invalid = |reason: String| ConfigError::InvalidExchangeAddress {
        addr: host.to_string(),
        reason,
    };

    let mut url = Url::parse(&base).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("Address cannot carry a path".to_string()))?
        .pop_if_empty()
        .extend(["group", "token"])
        .extend(group.split('/'));
    Ok(url)
}

/// Trim slashes and reject empty, `.` or `..` segments
fn normalize_segments(value: &str) -> Option<String> {
    let trimmed = value.trim().trim_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    let valid = trimmed
        .split('/')
        .all(|seg| !seg.is_empty() && seg != "." && seg != "..");
    valid.then(|| trimmed.to_string())
}

fn load_pem_bundle(path: &Path) -> Result<Vec<reqwest::Certificate>, ConfigError> {
    let pem = std::fs::read(path).map_err(|e| ConfigError::InvalidCaCert {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let certs =
        reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| ConfigError::InvalidCaCert {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if certs.is_empty() {
        return Err(ConfigError::InvalidCaCert {
            path: path.to_path_buf(),
            reason: "No certificates found".to_string(),
        });
    }

    Ok(certs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const TEST_CA_PEM: &str = "-----BEGIN CERTIFICATE-----
MIIBmDCCAT+gAwIBAgIUaLLhMEf813UCpJROteQ+knLJvd0wCgYIKoZIzj0EAwIw
ITEfMB0GA1UEAwwWc2VjcmV0cy13YWxrZXItdGVzdC1jYTAgFw0yNjEwMTUxODIw
MTlaGA8yMTI2MDkyMTE4MjAxOVowITEfMB0GA1UEAwwWc2VjcmV0cy13YWxrZXIt
dGVzdC1jYTBZMBMGByqGSM49AgEGCCqGSM49AwEHA0IABKuIjx7HcSNAoVosdoSn
QKgAKPirGIMecDrMDyp/t63UEdIj4xcj0Gf4uUnHhHOtZJG5Mq3qyXCA4wiO5HIW
bFCjUzBRMB0GA1UdDgQWBBQ2pefyU/mcV1H18xtKirNDhOJjVjAfBgNVHSMEGDAW
gBQ2pefyU/mcV1H18xtKirNDhOJjVjAPBgNVHRMBAf8EBTADAQH/MAoGCCqGSM49
BAMCA0cAMEQCIEgAaruveJp/4cOhvBVVsD0c+uOMNIHU3+TUqkL9gVEtAiBzyIGL
e8bDPPb1n+w2vNusoEiySJWb8XwjMzkVOY/WGA==
-----END CERTIFICATE-----
";

    /// Arguments built field by field so exported VAULT_* variables cannot leak in
    fn args() -> CliArgs {
        CliArgs {
            vault_addr: Some("https://v".to_string()),
            group: Some("app".to_string()),
            mount: "secret".to_string(),
            exchange_host: None,
            token: Some("t".to_string()),
            ca_cert: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            require_secrets: false,
            max_in_flight: 32,
            max_depth: 64,
            timeout: 30,
            retries: 3,
            quiet: false,
            verbose: false,
        }
    }

    #[test]
    fn test_parse_store_addr_default_port() {
        let addr = StoreAddr::parse("https://vault.internal").unwrap();
        assert_eq!(addr.scheme, Scheme::Https);
        assert_eq!(addr.host, "vault.internal");
        assert_eq!(addr.port, DEFAULT_STORE_PORT);
    }

    #[test]
    fn test_parse_store_addr_with_port() {
        let addr = StoreAddr::parse("http://10.0.0.5:8300/").unwrap();
        assert_eq!(addr.scheme, Scheme::Http);
        assert_eq!(addr.host, "10.0.0.5");
        assert_eq!(addr.port, 8300);
        assert_eq!(addr.to_string(), "http://10.0.0.5:8300");
    }

    #[test]
    fn test_parse_store_addr_invalid() {
        assert!(StoreAddr::parse("vault:8200").is_err());
        assert!(StoreAddr::parse("ftp://vault").is_err());
        assert!(StoreAddr::parse("https://vault:99999").is_err());
        assert!(StoreAddr::parse("https://").is_err());
    }

    #[test]
    fn test_missing_store_addr() {
        let mut cli = args();
        cli.vault_addr = None;
        let result = RunConfig::from_args(cli);
        assert!(matches!(result, Err(ConfigError::MissingStoreAddress)));
    }

    #[test]
    fn test_missing_group() {
        let mut cli = args();
        cli.group = None;
        let result = RunConfig::from_args(cli);
        assert!(matches!(result, Err(ConfigError::MissingGroup)));
    }

    #[test]
    fn test_exchange_required_without_override() {
        let mut cli = args();
        cli.token = None;
        let result = RunConfig::from_args(cli);
        assert!(matches!(result, Err(ConfigError::MissingExchangeHost)));
    }

    #[test]
    fn test_token_override_wins() {
        let mut cli = args();
        cli.group = Some("/app/".to_string());
        cli.token = Some("s.abc".to_string());
        cli.exchange_host = Some("auth.local".to_string());
        let config = RunConfig::from_args(cli).unwrap();

        assert_eq!(config.group, "app");
        match config.token_source {
            TokenSource::Override(token) => assert_eq!(token.expose(), "s.abc"),
            TokenSource::Exchange(_) => panic!("override should skip the exchange"),
        }
    }

    #[test]
    fn test_exchange_url() {
        let url = exchange_url("auth.local", "billing").unwrap();
        assert_eq!(url.as_str(), "https://auth.local/group/token/billing");

        let url = exchange_url("http://127.0.0.1:9000", "team/app").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/group/token/team/app");
    }

    #[test]
    fn test_bounds_validation() {
        let mut cli = args();
        cli.max_in_flight = 0;
        assert!(matches!(
            RunConfig::from_args(cli),
            Err(ConfigError::InvalidInFlight { .. })
        ));

        let mut cli = args();
        cli.max_in_flight = MAX_IN_FLIGHT + 1;
        assert!(matches!(
            RunConfig::from_args(cli),
            Err(ConfigError::InvalidInFlight { .. })
        ));

        let mut cli = args();
        cli.max_depth = 0;
        assert!(matches!(
            RunConfig::from_args(cli),
            Err(ConfigError::InvalidMaxDepth { .. })
        ));

        let mut cli = args();
        cli.timeout = 0;
        assert!(matches!(
            RunConfig::from_args(cli),
            Err(ConfigError::InvalidTimeout { .. })
        ));
    }

    #[test]
    fn test_cli_flags_parse() {
        let cli = CliArgs::try_parse_from([
            "secrets-walker",
            "--vault-addr",
            "https://vault:8200",
            "--group",
            "billing",
            "--token",
            "s.abc",
            "--require-secrets",
            "--max-depth",
            "8",
            "-o",
            "/tmp/env",
        ])
        .unwrap();

        assert_eq!(cli.vault_addr.as_deref(), Some("https://vault:8200"));
        assert_eq!(cli.group.as_deref(), Some("billing"));
        assert!(cli.require_secrets);
        assert_eq!(cli.max_depth, 8);
        assert_eq!(cli.output_dir, PathBuf::from("/tmp/env"));
    }

    #[test]
    fn test_trust_anchors_loaded_from_pem() {
        let dir = tempdir().unwrap();
        let pem = dir.path().join("ca.pem");
        fs::write(&pem, TEST_CA_PEM).unwrap();

        let mut cli = args();
        cli.ca_cert = Some(pem.clone());
        let config = RunConfig::from_args(cli).unwrap();

        assert_eq!(config.ca_cert.as_deref(), Some(pem.as_path()));
        assert_eq!(config.load_trust_anchors().unwrap().len(), 1);
    }

    #[test]
    fn test_trust_anchors_bundle_with_two_certificates() {
        let dir = tempdir().unwrap();
        let pem = dir.path().join("bundle.pem");
        fs::write(&pem, format!("{}{}", TEST_CA_PEM, TEST_CA_PEM)).unwrap();

        let certs = load_pem_bundle(&pem).unwrap();
        assert_eq!(certs.len(), 2);
    }

    #[test]
    fn test_no_trust_anchors_without_ca_cert() {
        let config = RunConfig::from_args(args()).unwrap();
        assert!(config.load_trust_anchors().unwrap().is_empty());
    }

    #[test]
    fn test_trust_anchors_reject_empty_and_garbage_files() {
        let dir = tempdir().unwrap();

        let empty = dir.path().join("empty.pem");
        fs::write(&empty, "").unwrap();
        let garbage = dir.path().join("garbage.pem");
        fs::write(&garbage, "not a certificate\n").unwrap();

        for path in [empty, garbage] {
            let mut cli = args();
            cli.ca_cert = Some(path.clone());
            let config = RunConfig::from_args(cli).unwrap();

            let err = config.load_trust_anchors().unwrap_err();
            assert!(matches!(err, ConfigError::InvalidCaCert { .. }), "{err}");
        }
    }

    #[test]
    fn test_missing_ca_cert_file() {
        let dir = tempdir().unwrap();
        let mut cli = args();
        cli.ca_cert = Some(dir.path().join("absent.pem"));

        let result = RunConfig::from_args(cli);
        assert!(matches!(result, Err(ConfigError::InvalidCaCert { .. })));
    }

    #[test]
    fn test_normalize_segments() {
        assert_eq!(normalize_segments("/team/app/"), Some("team/app".to_string()));
        assert_eq!(normalize_segments("//"), None);
        assert_eq!(normalize_segments("team/../app"), None);
        assert_eq!(normalize_segments("team//app"), None);
    }
}
