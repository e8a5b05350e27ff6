//! Cross-subdomain session hand-off.
//!
//! After a platform-host login, a tenant-scoped principal is sent to its
//! tenant subdomain with the principal embedded in the `auth` query
//! parameter. The tenant host consumes the token once on load.
//!
//! [`Base64JsonCodec`] is the wire format in production: base64 of the
//! principal JSON, neither signed nor expiring. Anyone able to set the query
//! parameter can impersonate any user. [`JwtHandoffCodec`] (feature
//! `handoff-jwt`) is an opt-in signed replacement; switching to it changes
//! the token format and must be done on both hosts at once.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use url::Url;

use crate::config::GateConfig;
use crate::error::{Error, Result};
use crate::principal::Principal;

/// Encodes and decodes hand-off tokens.
pub trait HandoffCodec: Send + Sync {
    /// Encodes a principal into a token.
    fn encode(&self, principal: &Principal) -> Result<String>;

    /// Decodes a token. Failures are [`Error::MalformedHandoffToken`].
    fn decode(&self, token: &str) -> Result<Principal>;
}

/// Unsigned base64-encoded principal JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64JsonCodec;

impl HandoffCodec for Base64JsonCodec {
    fn encode(&self, principal: &Principal) -> Result<String> {
        let json = serde_json::to_vec(principal)
            .map_err(|err| Error::MalformedHandoffToken(err.to_string()))?;
        Ok(STANDARD.encode(json))
    }

    fn decode(&self, token: &str) -> Result<Principal> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::MalformedHandoffToken("empty token".to_string()));
        }
        // An unescaped '+' arrives as a space after query decoding.
        let repaired = token.replace(' ', "+");
        let bytes = STANDARD
            .decode(&repaired)
            .or_else(|_| URL_SAFE_NO_PAD.decode(repaired.trim_end_matches('=')))
            .map_err(|err| Error::MalformedHandoffToken(format!("base64: {err}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|err| Error::MalformedHandoffToken(format!("json: {err}")))
    }
}

/// Where tenant subdomains live, used to build the hand-off redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffTarget {
    /// Scheme of the page that built the hand-off.
    pub scheme: String,
    /// Domain the tenant slug is prefixed to, e.g. `localhost` or `example.com`.
    pub base_domain: String,
    /// Explicit port, carried over to the tenant host.
    pub port: Option<u16>,
}

impl HandoffTarget {
    /// Derives the target from the current platform URL.
    ///
    /// A leading `www.` is dropped so `www.example.com` hands off to
    /// `{slug}.example.com`.
    pub fn from_url(url: &Url) -> Result<Self> {
        let host = url
            .host_str()
            .ok_or_else(|| Error::InvalidRoute(format!("url {url} has no host")))?;
        let base_domain = host.strip_prefix("www.").unwrap_or(host).to_string();
        Ok(Self {
            scheme: url.scheme().to_string(),
            base_domain,
            port: url.port(),
        })
    }

    /// Builds `{scheme}://{slug}.{base_domain}[:port]{tenant_home}?{param}={token}`.
    ///
    /// Platform-scoped principals have no tenant to hand off to and yield `Ok(None)`.
    pub fn url_for(
        &self,
        principal: &Principal,
        codec: &dyn HandoffCodec,
        config: &GateConfig,
    ) -> Result<Option<Url>> {
        let Some(slug) = principal.tenant_slug() else {
            return Ok(None);
        };
        let origin = match self.port {
            Some(port) => format!("{}://{}.{}:{}", self.scheme, slug, self.base_domain, port),
            None => format!("{}://{}.{}", self.scheme, slug, self.base_domain),
        };
        let mut url = Url::parse(&origin)
            .and_then(|base| base.join(&config.tenant_home))
            .map_err(|err| Error::InvalidRoute(format!("hand-off url: {err}")))?;
        let token = codec.encode(principal)?;
        url.query_pairs_mut().append_pair(&config.handoff_param, &token);
        tracing::debug!(
            principal = %principal.id(),
            tenant = %slug,
            "built hand-off redirect"
        );
        Ok(Some(url))
    }
}

#[cfg(feature = "handoff-jwt")]
pub use jwt::JwtHandoffCodec;

#[cfg(feature = "handoff-jwt")]
mod jwt {
    use std::fmt;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
    use serde::{Deserialize, Serialize};

    use super::HandoffCodec;
    use crate::error::{Error, Result};
    use crate::principal::Principal;

    #[derive(Serialize, Deserialize)]
    struct HandoffClaims {
        principal: Principal,
        exp: u64,
    }

    /// HS256-signed hand-off token with a short expiry.
    #[derive(Clone)]
    pub struct JwtHandoffCodec {
        encoding_key: EncodingKey,
        decoding_key: DecodingKey,
        ttl: Duration,
    }

    impl fmt::Debug for JwtHandoffCodec {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("JwtHandoffCodec")
                .field("secret", &"<redacted>")
                .field("ttl", &self.ttl)
                .finish()
        }
    }

    impl JwtHandoffCodec {
        /// Creates a codec sharing `secret` between platform and tenant hosts.
        pub fn new(secret: &[u8], ttl: Duration) -> Self {
            Self {
                encoding_key: EncodingKey::from_secret(secret),
                decoding_key: DecodingKey::from_secret(secret),
                ttl,
            }
        }
    }

    impl HandoffCodec for JwtHandoffCodec {
        fn encode(&self, principal: &Principal) -> Result<String> {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_err(|err| Error::MalformedHandoffToken(err.to_string()))?;
            let claims = HandoffClaims {
                principal: principal.clone(),
                exp: (now + self.ttl).as_secs(),
            };
            encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
                .map_err(|err| Error::MalformedHandoffToken(err.to_string()))
        }

        fn decode(&self, token: &str) -> Result<Principal> {
            let mut validation = Validation::new(Algorithm::HS256);
            validation.leeway = 0;
            decode::<HandoffClaims>(token.trim(), &self.decoding_key, &validation)
                .map(|data| data.claims.principal)
                .map_err(|err| Error::MalformedHandoffToken(err.to_string()))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::types::{Email, PrincipalId};

        #[test]
        fn signed_token_should_reject_other_secret() {
            let principal = Principal::platform(
                PrincipalId::new(99),
                Email::try_from("superadmin@fuel.com").unwrap(),
                "Super Admin",
            );
            let issuer = JwtHandoffCodec::new(b"platform-secret", Duration::from_secs(60));
            let token = issuer.encode(&principal).unwrap();

            assert_eq!(issuer.decode(&token).unwrap(), principal);
            let other = JwtHandoffCodec::new(b"other-secret", Duration::from_secs(60));
            assert!(matches!(
                other.decode(&token),
                Err(Error::MalformedHandoffToken(_))
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;
    use crate::types::{Email, PrincipalId, TenantId, TenantSlug};

    fn tenant_admin() -> Principal {
        Principal::tenant(
            PrincipalId::new(1),
            Email::try_from("admin@empresaA.com").unwrap(),
            "Company A Admin",
            Role::Admin,
            TenantId::new(1),
            TenantSlug::try_from("empresaa").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn decode_should_accept_space_mangled_plus() {
        let codec = Base64JsonCodec;
        let principal = tenant_admin();
        // Query decoding turns every '+' into a space.
        let token = codec.encode(&principal).unwrap().replace('+', " ");
        assert_eq!(codec.decode(&token).unwrap(), principal);
    }

    #[test]
    fn decode_should_accept_legacy_btoa_payload() {
        let json = r#"{"id":1,"email":"admin@empresaA.com","name":"Admin Empresa A","role":"admin","empresaId":1,"empresaSubdomain":"empresaA"}"#;
        let token = STANDARD.encode(json);
        let principal = Base64JsonCodec.decode(&token).unwrap();
        assert_eq!(principal.role(), Role::Admin);
        assert_eq!(principal.tenant_slug().unwrap().as_str(), "empresaa");
    }

    #[test]
    fn decode_should_reject_garbage() {
        for token in ["", "!!!", "bm90IGpzb24=", "e30="] {
            assert!(
                matches!(Base64JsonCodec.decode(token), Err(Error::MalformedHandoffToken(_))),
                "token {token:?}"
            );
        }
    }

    #[test]
    fn url_for_should_target_tenant_subdomain() {
        let platform = Url::parse("http://localhost:5173/a/login").unwrap();
        let target = HandoffTarget::from_url(&platform).unwrap();
        let url = target
            .url_for(&tenant_admin(), &Base64JsonCodec, &GateConfig::default())
            .unwrap()
            .unwrap();

        assert_eq!(url.host_str(), Some("empresaa.localhost"));
        assert_eq!(url.port(), Some(5173));
        assert_eq!(url.path(), "/s");
        let token = crate::location::query_param(&url, "auth").unwrap();
        assert_eq!(Base64JsonCodec.decode(&token).unwrap(), tenant_admin());
    }

    #[test]
    fn url_for_should_skip_platform_principal() {
        let target = HandoffTarget::from_url(&Url::parse("https://www.example.com/a").unwrap()).unwrap();
        assert_eq!(target.base_domain, "example.com");
        let superadmin = Principal::platform(
            PrincipalId::new(99),
            Email::try_from("superadmin@fuel.com").unwrap(),
            "Super Admin",
        );
        assert!(
            target
                .url_for(&superadmin, &Base64JsonCodec, &GateConfig::default())
                .unwrap()
                .is_none()
        );
    }
}
