//! Authentication levels and credentials.
//!
//! | Level | Needs | Unlocks |
//! |-------|-------|---------|
//! | L0 | nothing | public market data |
//! | L1 | signer | API key creation and derivation, order signing |
//! | L2 | signer + API credentials | order submission |
//!
//! The level is never stored: [`AuthContext::level`] derives it from what the
//! context holds.

use alloy_primitives::Address;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::api::VenueApi;
use crate::signing::headers::{build_l1_headers, build_l2_headers};
use crate::signing::{ClobHeaders, RequestArgs, Signer};
use crate::{Error, Result};

/// Progressive authentication level, ordered `L0 < L1 < L2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AuthLevel {
    L0,
    L1,
    L2,
}

impl AuthLevel {
    /// Level implied by the material at hand.
    pub fn from_material(has_signer: bool, has_credentials: bool) -> Self {
        match (has_signer, has_credentials) {
            (true, true) => AuthLevel::L2,
            (true, false) => AuthLevel::L1,
            (false, _) => AuthLevel::L0,
        }
    }
}

impl fmt::Display for AuthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthLevel::L0 => write!(f, "L0"),
            AuthLevel::L1 => write!(f, "L1"),
            AuthLevel::L2 => write!(f, "L2"),
        }
    }
}

/// API credentials for authenticated CLOB requests.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub api_key: String,
    /// URL-safe base64 HMAC key.
    pub api_secret: String,
    pub api_passphrase: String,
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .field("api_passphrase", &"[REDACTED]")
            .finish()
    }
}

impl ApiCredentials {
    pub fn new(api_key: String, api_secret: String, api_passphrase: String) -> Self {
        Self {
            api_key,
            api_secret,
            api_passphrase,
        }
    }

    /// Load from environment variables.
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| Error::Config {
                message: format!("{} environment variable not set", name),
            })
        };

        Ok(Self {
            api_key: var("POLY_API_KEY")?,
            api_secret: var("POLY_API_SECRET")?,
            api_passphrase: var("POLY_API_PASSPHRASE")?,
        })
    }

    /// Read a create/derive response body.
    ///
    /// Returns `None` when any of `apiKey`, `secret` or `passphrase` is
    /// missing; the caller treats that as "no credentials".
    pub fn from_response(body: &Value) -> Option<Self> {
        let field = |name: &str| body.get(name).and_then(Value::as_str).map(str::to_string);

        match (field("apiKey"), field("secret"), field("passphrase")) {
            (Some(api_key), Some(api_secret), Some(api_passphrase)) => Some(Self {
                api_key,
                api_secret,
                api_passphrase,
            }),
            _ => None,
        }
    }
}

/// Signer, credentials and chain that together determine the auth level.
#[derive(Clone)]
pub struct AuthContext {
    signer: Option<Arc<dyn Signer>>,
    credentials: Option<ApiCredentials>,
    chain_id: u64,
}

impl AuthContext {
    pub fn new(
        signer: Option<Arc<dyn Signer>>,
        credentials: Option<ApiCredentials>,
        chain_id: u64,
    ) -> Self {
        Self {
            signer,
            credentials,
            chain_id,
        }
    }

    pub fn level(&self) -> AuthLevel {
        AuthLevel::from_material(self.signer.is_some(), self.credentials.is_some())
    }

    /// Fail unless the context is at `required` or above.
    pub fn require_level(&self, required: AuthLevel) -> Result<()> {
        let actual = self.level();
        if actual < required {
            return Err(Error::AuthLevel { required, actual });
        }
        Ok(())
    }

    /// Install API credentials, raising a signer-backed context to L2.
    pub fn install_credentials(&mut self, credentials: ApiCredentials) {
        self.credentials = Some(credentials);
        info!(level = %self.level(), "API credentials installed");
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn signer(&self) -> Option<&Arc<dyn Signer>> {
        self.signer.as_ref()
    }

    pub fn credentials(&self) -> Option<&ApiCredentials> {
        self.credentials.as_ref()
    }

    /// Address of the signing identity, when there is one.
    pub fn address(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.address())
    }

    fn require_signer(&self) -> Result<&Arc<dyn Signer>> {
        self.require_level(AuthLevel::L1)?;
        self.signer.as_ref().ok_or(Error::AuthLevel {
            required: AuthLevel::L1,
            actual: self.level(),
        })
    }

    /// L1 headers over the `ClobAuth` challenge for `nonce`.
    pub async fn l1_headers(&self, nonce: Option<u64>) -> Result<ClobHeaders> {
        let signer = self.require_signer()?;
        build_l1_headers(signer.as_ref(), self.chain_id, nonce).await
    }

    /// L2 headers authenticating exactly `request`.
    pub fn l2_headers(&self, request: &RequestArgs) -> Result<ClobHeaders> {
        self.require_level(AuthLevel::L2)?;
        match (&self.signer, &self.credentials) {
            (Some(signer), Some(credentials)) => {
                build_l2_headers(signer.address(), credentials, request)
            }
            _ => Err(Error::AuthLevel {
                required: AuthLevel::L2,
                actual: self.level(),
            }),
        }
    }

    /// Headers for `level`: empty at L0, the challenge at L1, the request
    /// HMAC at L2.
    pub async fn build_headers(
        &self,
        level: AuthLevel,
        request: Option<&RequestArgs>,
    ) -> Result<ClobHeaders> {
        match level {
            AuthLevel::L0 => Ok(ClobHeaders::default()),
            AuthLevel::L1 => self.l1_headers(None).await,
            AuthLevel::L2 => {
                let request = request.ok_or_else(|| Error::Signing {
                    message: "L2 headers need the request being signed".to_string(),
                })?;
                self.l2_headers(request)
            }
        }
    }

    /// Provision new credentials for this identity.
    pub async fn create_api_key(
        &self,
        venue: &dyn VenueApi,
        nonce: Option<u64>,
    ) -> Result<Option<ApiCredentials>> {
        let headers = self.l1_headers(nonce).await?;
        let body = venue.create_api_key(&headers).await?;

        let credentials = ApiCredentials::from_response(&body);
        if credentials.is_none() {
            error!("Couldn't parse created CLOB credentials");
        } else {
            info!("Created API credentials");
        }
        Ok(credentials)
    }

    /// Recover the credentials already provisioned for this identity and nonce.
    pub async fn derive_api_key(
        &self,
        venue: &dyn VenueApi,
        nonce: Option<u64>,
    ) -> Result<Option<ApiCredentials>> {
        let headers = self.l1_headers(nonce).await?;
        let body = venue.derive_api_key(&headers).await?;

        let credentials = ApiCredentials::from_response(&body);
        if credentials.is_none() {
            error!("Couldn't parse derived CLOB credentials");
        } else {
            info!("Derived API credentials");
        }
        Ok(credentials)
    }

    /// Create credentials, falling back to derive when creation fails.
    ///
    /// Only venue and transport failures fall back. A context below L1 or a
    /// failing signer would fail derive the same way, so those propagate.
    pub async fn obtain_credentials(
        &self,
        venue: &dyn VenueApi,
        nonce: Option<u64>,
    ) -> Result<Option<ApiCredentials>> {
        match self.create_api_key(venue, nonce).await {
            Ok(credentials) => Ok(credentials),
            Err(e) if e.is_signer_failure() || matches!(e, Error::AuthLevel { .. }) => Err(e),
            Err(create_err) => {
                warn!(error = %create_err, "create_api_key failed, trying derive");
                self.derive_api_key(venue, nonce).await
            }
        }
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("address", &self.address())
            .field("level", &self.level())
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::clob::MockVenueApi;
    use crate::signing::codec::CanonicalSignature;
    use crate::signing::headers::{POLY_API_KEY, POLY_NONCE, POLY_SIGNATURE};
    use crate::signing::{LocalSigner, POLYGON_CHAIN_ID};
    use alloy_primitives::B256;
    use async_trait::async_trait;
    use std::time::Duration;

    const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn signer() -> Arc<dyn Signer> {
        Arc::new(LocalSigner::from_private_key(TEST_PRIVATE_KEY).unwrap())
    }

    fn creds() -> ApiCredentials {
        ApiCredentials::new(
            "key".to_string(),
            "c2VjcmV0".to_string(), // "secret"
            "pass".to_string(),
        )
    }

    fn creds_body() -> Value {
        serde_json::json!({ "apiKey": "key", "secret": "c2VjcmV0", "passphrase": "pass" })
    }

    struct TimedOutSigner;

    #[async_trait]
    impl Signer for TimedOutSigner {
        fn address(&self) -> Address {
            Address::ZERO
        }

        async fn sign(&self, _message_hash: B256) -> Result<CanonicalSignature> {
            Err(Error::SignerTimeout {
                elapsed: Duration::from_secs(60),
            })
        }
    }

    #[test]
    fn test_level_is_function_of_material() {
        assert_eq!(AuthLevel::from_material(false, false), AuthLevel::L0);
        assert_eq!(AuthLevel::from_material(false, true), AuthLevel::L0);
        assert_eq!(AuthLevel::from_material(true, false), AuthLevel::L1);
        assert_eq!(AuthLevel::from_material(true, true), AuthLevel::L2);

        let cases = [
            (None, None, AuthLevel::L0),
            (None, Some(creds()), AuthLevel::L0),
            (Some(signer()), None, AuthLevel::L1),
            (Some(signer()), Some(creds()), AuthLevel::L2),
        ];
        for (signer, creds, expected) in cases {
            assert_eq!(AuthContext::new(signer, creds, POLYGON_CHAIN_ID).level(), expected);
        }
    }

    #[test]
    fn test_level_ordering() {
        assert!(AuthLevel::L0 < AuthLevel::L1);
        assert!(AuthLevel::L1 < AuthLevel::L2);
    }

    #[test]
    fn test_require_l2_on_l1_context() {
        let context = AuthContext::new(Some(signer()), None, POLYGON_CHAIN_ID);

        assert!(context.require_level(AuthLevel::L1).is_ok());
        let err = context.require_level(AuthLevel::L2).unwrap_err();
        assert!(matches!(
            err,
            Error::AuthLevel {
                required: AuthLevel::L2,
                actual: AuthLevel::L1
            }
        ));
    }

    #[test]
    fn test_install_credentials_is_idempotent() {
        let mut context = AuthContext::new(Some(signer()), None, POLYGON_CHAIN_ID);

        context.install_credentials(creds());
        assert_eq!(context.level(), AuthLevel::L2);
        context.install_credentials(creds());
        assert_eq!(context.level(), AuthLevel::L2);
        assert_eq!(context.credentials(), Some(&creds()));
    }

    #[test]
    fn test_credentials_without_signer_stay_l0() {
        let mut context = AuthContext::new(None, None, POLYGON_CHAIN_ID);
        context.install_credentials(creds());
        assert_eq!(context.level(), AuthLevel::L0);
    }

    #[tokio::test]
    async fn test_build_headers_per_level() {
        let mut context = AuthContext::new(Some(signer()), None, POLYGON_CHAIN_ID);

        assert!(context.build_headers(AuthLevel::L0, None).await.unwrap().is_empty());

        let l1 = context.build_headers(AuthLevel::L1, None).await.unwrap();
        assert_eq!(l1.get(POLY_NONCE), Some("0"));
        assert!(l1.get(POLY_SIGNATURE).unwrap().starts_with("0x"));

        let request = RequestArgs::new("GET", "/orders");
        let err = context
            .build_headers(AuthLevel::L2, Some(&request))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthLevel { .. }));

        context.install_credentials(creds());
        let l2 = context
            .build_headers(AuthLevel::L2, Some(&request))
            .await
            .unwrap();
        assert_eq!(l2.get(POLY_API_KEY), Some("key"));
        assert_eq!(l2.get(POLY_NONCE), None);
    }

    #[tokio::test]
    async fn test_l1_headers_need_signer() {
        let context = AuthContext::new(None, None, POLYGON_CHAIN_ID);
        let err = context.build_headers(AuthLevel::L1, None).await.unwrap_err();
        assert!(matches!(
            err,
            Error::AuthLevel {
                required: AuthLevel::L1,
                actual: AuthLevel::L0
            }
        ));
    }

    #[test]
    fn test_credentials_from_response() {
        assert_eq!(ApiCredentials::from_response(&creds_body()), Some(creds()));
        assert_eq!(
            ApiCredentials::from_response(&serde_json::json!({ "apiKey": "key", "secret": "s" })),
            None
        );
        assert_eq!(ApiCredentials::from_response(&serde_json::json!("oops")), None);
    }

    #[tokio::test]
    async fn test_obtain_uses_create_when_it_succeeds() {
        let mut venue = MockVenueApi::new();
        venue
            .expect_create_api_key()
            .times(1)
            .returning(|_| Ok(creds_body()));
        venue.expect_derive_api_key().never();

        let context = AuthContext::new(Some(signer()), None, POLYGON_CHAIN_ID);
        let obtained = context.obtain_credentials(&venue, None).await.unwrap();

        assert_eq!(obtained, Some(creds()));
    }

    #[tokio::test]
    async fn test_obtain_falls_back_to_derive() {
        let mut venue = MockVenueApi::new();
        venue.expect_create_api_key().times(1).returning(|_| {
            Err(Error::Api {
                message: "key already exists".to_string(),
                status: Some(400),
            })
        });
        venue
            .expect_derive_api_key()
            .times(1)
            .returning(|_| Ok(creds_body()));

        let context = AuthContext::new(Some(signer()), None, POLYGON_CHAIN_ID);
        let obtained = context.obtain_credentials(&venue, Some(3)).await.unwrap();

        assert_eq!(obtained, Some(creds()));
    }

    #[tokio::test]
    async fn test_malformed_response_yields_none() {
        let mut venue = MockVenueApi::new();
        venue
            .expect_create_api_key()
            .times(1)
            .returning(|_| Ok(serde_json::json!({ "apiKey": "key" })));
        venue.expect_derive_api_key().never();

        let context = AuthContext::new(Some(signer()), None, POLYGON_CHAIN_ID);
        assert_eq!(context.obtain_credentials(&venue, None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_signer_failure_does_not_fall_back() {
        let mut venue = MockVenueApi::new();
        venue.expect_create_api_key().never();
        venue.expect_derive_api_key().never();

        let context = AuthContext::new(Some(Arc::new(TimedOutSigner)), None, POLYGON_CHAIN_ID);
        let err = context.obtain_credentials(&venue, None).await.unwrap_err();

        assert!(matches!(err, Error::SignerTimeout { .. }));
    }

    #[tokio::test]
    async fn test_obtain_requires_l1() {
        let mut venue = MockVenueApi::new();
        venue.expect_create_api_key().never();
        venue.expect_derive_api_key().never();

        let context = AuthContext::new(None, None, POLYGON_CHAIN_ID);
        let err = context.obtain_credentials(&venue, None).await.unwrap_err();

        assert!(matches!(err, Error::AuthLevel { .. }));
    }

    #[test]
    fn test_debug_does_not_expose_credentials() {
        let context = AuthContext::new(Some(signer()), Some(creds()), POLYGON_CHAIN_ID);

        let debug_str = format!("{:?} {:?}", context, creds());
        assert!(!debug_str.contains("c2VjcmV0"));
        assert!(!debug_str.contains("pass\""));
        assert!(debug_str.contains("L2"));
    }
}
