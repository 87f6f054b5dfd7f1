//! `CapabilityRecord` parsing from the `_amtp.<domain>` TXT record body:
//! `v=amtp1;gateway=<https-url>[;max_size=<bytes>][;schemas=<csv>][;auth=<csv>]`.

use std::time::Instant;

use agentry_common::SchemaIdentifier;

use crate::error::DiscoveryError;

const SUPPORTED_VERSION: &str = "amtp1";
const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct CapabilityRecord {
    pub version: String,
    pub gateway: String,
    pub max_size: u64,
    pub schemas: Vec<SchemaIdentifier>,
    pub auth: Vec<String>,
}

/// A cached capability record paired with when it was fetched, used to
/// compute TTL expiry independent of wall-clock skew.
#[derive(Debug, Clone)]
pub(crate) struct CachedCapability {
    pub record: CapabilityRecord,
    pub cached_at: Instant,
}

impl CapabilityRecord {
    /// Parses the semicolon-separated TXT record body. `allow_http` is
    /// threaded straight from [`crate::resolver::DiscoveryConfig::allow_http`]
    /// into the embedded gateway URL check, per spec §4.1: "Gateway URL must
    /// use `https://` unless an `allow_http` flag is set (development only)".
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::InvalidRecord`] if `v` is absent or not
    /// `amtp1`, or `gateway` is absent or fails [`validate_gateway_url`].
    pub fn parse(domain: &str, body: &str, allow_http: bool) -> Result<Self, DiscoveryError> {
        let mut version = None;
        let mut gateway = None;
        let mut max_size = DEFAULT_MAX_SIZE;
        let mut schemas = Vec::new();
        let mut auth = Vec::new();

        for field in body.split(';') {
            let field = field.trim();
            let Some((key, value)) = field.split_once('=') else {
                continue;
            };
            match key.trim() {
                "v" => version = Some(value.trim().to_string()),
                "gateway" => gateway = Some(value.trim().to_string()),
                "max_size" => {
                    if let Ok(n) = value.trim().parse() {
                        max_size = n;
                    }
                }
                "schemas" => {
                    schemas = value
                        .split(',')
                        .filter_map(|s| SchemaIdentifier::parse(s.trim()).ok())
                        .collect();
                }
                "auth" => {
                    auth = value
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect();
                }
                _ => {} // unknown fields are ignored, per spec §6
            }
        }

        let version = version.ok_or_else(|| DiscoveryError::InvalidRecord {
            domain: domain.to_string(),
            reason: "missing 'v' field".to_string(),
        })?;
        if version != SUPPORTED_VERSION {
            return Err(DiscoveryError::InvalidRecord {
                domain: domain.to_string(),
                reason: format!("unsupported protocol version {version:?}"),
            });
        }

        let gateway = gateway.ok_or_else(|| DiscoveryError::InvalidRecord {
            domain: domain.to_string(),
            reason: "missing 'gateway' field".to_string(),
        })?;
        validate_gateway_url(&gateway, allow_http)
            .map_err(|_| DiscoveryError::InvalidGateway(domain.to_string()))?;

        Ok(Self {
            version,
            gateway,
            max_size,
            schemas,
            auth,
        })
    }

    /// Serializes back into TXT record body form; used by the gateway's own
    /// `/v1/capabilities/{domain}` endpoint and by capability round-trip
    /// tests.
    #[must_use]
    pub fn to_txt_record(&self) -> String {
        let mut out = format!("v={};gateway={}", self.version, self.gateway);
        out.push_str(&format!(";max_size={}", self.max_size));
        if !self.schemas.is_empty() {
            let csv = self
                .schemas
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            out.push_str(&format!(";schemas={csv}"));
        }
        if !self.auth.is_empty() {
            out.push_str(&format!(";auth={}", self.auth.join(",")));
        }
        out
    }

    /// True if any advertised schema equals `schema_id`, or is a wildcard
    /// whose domain matches `schema_id`'s domain.
    #[must_use]
    pub fn supports_schema(&self, schema_id: &SchemaIdentifier) -> bool {
        self.schemas.iter().any(|s| s.matches(schema_id))
    }
}

/// Rejects non-http(s) schemes, empty hosts, and plaintext URLs outside dev
/// mode.
///
/// # Errors
///
/// Returns [`DiscoveryError::InvalidGateway`] on any rejected URL.
pub fn validate_gateway_url(url: &str, allow_http: bool) -> Result<(), DiscoveryError> {
    let scheme_end = url.find("://").ok_or_else(|| invalid(url))?;
    let scheme = &url[..scheme_end];
    let rest = &url[scheme_end + 3..];
    let host = rest.split(['/', ':']).next().unwrap_or("");

    if host.is_empty() {
        return Err(invalid(url));
    }

    match scheme {
        "https" => Ok(()),
        "http" if allow_http => Ok(()),
        _ => Err(invalid(url)),
    }
}

fn invalid(url: &str) -> DiscoveryError {
    DiscoveryError::InvalidGateway(url.to_string())
}
