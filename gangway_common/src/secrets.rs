//! Credential resolution.
//!
//! Deployment needs two sets of credentials: an access token and address
//! for the cluster orchestrator, and a basic-auth triple for the dashboard.
//! Both normally live in the secret store, with process environment
//! variables as the fallback source used by CI runners that can't reach
//! the store. Sources are modeled as an ordered chain of
//! [`CredentialProvider`]s; the first provider that can supply a complete
//! set wins.

use reqwest::blocking::Client;
use std::{env, time::Duration};

use crate::prelude::*;

/// Header used to authenticate against the secret store.
const STORE_TOKEN_HEADER: &str = "X-Vault-Token";

/// Secret path holding the orchestrator `{token, address}` pair.
pub const ORCHESTRATOR_SECRET_PATH: &str = "deploy/orchestrator";

/// Secret path holding the dashboard `{username, password, auth}` triple.
pub const DASHBOARD_SECRET_PATH: &str = "deploy/dashboard";

/// Credentials used to talk to the orchestrator's HTTP API.
#[derive(Clone, Debug)]
pub struct OrchestratorCredentials {
    /// The access token, sent as `X-Auth-Token`.
    pub token: String,
    /// The base address of the orchestrator's API.
    pub address: Url,
}

/// Basic-auth credentials for the dashboard, injected into the job
/// description before conversion.
#[derive(Clone, Debug, Serialize)]
pub struct DashboardCredentials {
    /// The dashboard login user.
    pub username: String,
    /// The dashboard login password, in the clear.
    pub password: String,
    /// The pre-hashed `user:hash` line the proxy's basic-auth middleware
    /// consumes.
    pub auth: String,
}

/// Everything the deploy sequence needs from credential resolution.
#[derive(Clone, Debug)]
pub struct ResolvedCredentials {
    /// Credentials for the orchestrator's HTTP API.
    pub orchestrator: OrchestratorCredentials,
    /// Credentials templated into the job description.
    pub dashboard: DashboardCredentials,
    /// Name of the provider that satisfied the request.
    pub provider: &'static str,
}

/// A client for the secret store's versioned key-value read API.
pub struct SecretStore {
    address: Url,
    token: String,
    client: Client,
}

/// The secret store's read response wraps the fields in two levels of
/// `data`: the outer one is API framing, the inner one holds the actual
/// key-value pairs.
#[derive(Debug, Deserialize)]
struct KvReadResponse {
    data: KvReadData,
}

#[derive(Debug, Deserialize)]
struct KvReadData {
    data: HashMap<String, serde_json::Value>,
}

impl SecretStore {
    /// Create a client for the store at `address`, authenticating with
    /// `token`.
    pub fn new(address: &str, token: &str) -> Result<SecretStore> {
        let address = Url::parse(address)
            .with_context(|| format!("can't parse secret store address {:?}", address))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("can't build HTTP client")?;
        Ok(SecretStore {
            address,
            token: token.to_owned(),
            client,
        })
    }

    /// Create a client from the standard `VAULT_ADDR` and `VAULT_TOKEN`
    /// variables.
    pub fn from_env() -> Result<SecretStore> {
        let address = env::var("VAULT_ADDR").context("couldn't get VAULT_ADDR")?;
        let token = env::var("VAULT_TOKEN").context("couldn't get VAULT_TOKEN")?;
        SecretStore::new(&address, &token)
    }

    fn secret_url(&self, path: &str) -> String {
        format!(
            "{}/v1/secret/data/{}",
            self.address.as_str().trim_end_matches('/'),
            path
        )
    }

    /// Fetch a single named field from the secret at `path`.
    ///
    /// Values are returned unchanged apart from whitespace trimming. Any
    /// failure along the way (unreachable store, missing secret, missing or
    /// empty field) is reported as [`CredentialUnavailable`] naming the
    /// exact lookup that failed.
    pub fn fetch_field(&self, path: &str, field: &str) -> Result<String> {
        let unavailable = |reason: String| -> Error {
            Error::new(CredentialUnavailable {
                path: path.to_owned(),
                field: field.to_owned(),
                reason,
            })
        };

        let url = self.secret_url(path);
        trace!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .header(STORE_TOKEN_HEADER, &self.token)
            .send()
            .map_err(|err| unavailable(format!("lookup request failed: {}", err)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("secret store returned {}", status)));
        }
        let parsed: KvReadResponse = response
            .json()
            .map_err(|err| unavailable(format!("can't parse secret response: {}", err)))?;
        let value = parsed
            .data
            .data
            .get(field)
            .ok_or_else(|| unavailable("field is missing".to_owned()))?;
        let value = value
            .as_str()
            .ok_or_else(|| unavailable("field is not a string".to_owned()))?
            .trim();
        if value.is_empty() {
            return Err(unavailable("field is empty".to_owned()));
        }
        Ok(value.to_owned())
    }
}

/// A source of deployment credentials.
///
/// Providers are consulted in order; the first one that supplies a complete
/// set of credentials wins, and later providers are never consulted.
pub trait CredentialProvider {
    /// Short human-readable name, used in logs and by `gangway check`.
    fn name(&self) -> &'static str;

    /// The orchestrator `{token, address}` pair.
    fn orchestrator_credentials(&self) -> Result<OrchestratorCredentials>;

    /// The dashboard `{username, password, auth}` triple.
    fn dashboard_credentials(&self) -> Result<DashboardCredentials>;
}

/// Credentials read from the secret store.
pub struct VaultProvider {
    store: SecretStore,
}

impl VaultProvider {
    /// Wrap a [`SecretStore`] as a credential provider.
    pub fn new(store: SecretStore) -> VaultProvider {
        VaultProvider { store }
    }
}

impl CredentialProvider for VaultProvider {
    fn name(&self) -> &'static str {
        "secret store"
    }

    fn orchestrator_credentials(&self) -> Result<OrchestratorCredentials> {
        let token = self.store.fetch_field(ORCHESTRATOR_SECRET_PATH, "token")?;
        let address = self.store.fetch_field(ORCHESTRATOR_SECRET_PATH, "address")?;
        let address = Url::parse(&address)
            .with_context(|| format!("can't parse orchestrator address {:?}", address))?;
        Ok(OrchestratorCredentials { token, address })
    }

    fn dashboard_credentials(&self) -> Result<DashboardCredentials> {
        Ok(DashboardCredentials {
            username: self.store.fetch_field(DASHBOARD_SECRET_PATH, "username")?,
            password: self.store.fetch_field(DASHBOARD_SECRET_PATH, "password")?,
            auth: self.store.fetch_field(DASHBOARD_SECRET_PATH, "auth")?,
        })
    }
}

/// Credentials read from process environment variables.
///
/// This is the fallback source for CI runners that hold deployment secrets
/// as masked pipeline variables instead of a reachable secret store.
pub struct EnvProvider {
    prefix: String,
}

impl EnvProvider {
    /// A provider reading the unprefixed standard variable names
    /// (`ORCHESTRATOR_TOKEN` and friends).
    pub fn new() -> EnvProvider {
        EnvProvider::with_prefix("")
    }

    /// A provider reading `{prefix}ORCHESTRATOR_TOKEN` and friends.
    pub fn with_prefix(prefix: &str) -> EnvProvider {
        EnvProvider {
            prefix: prefix.to_owned(),
        }
    }

    fn var(&self, name: &str) -> Result<String> {
        let full = format!("{}{}", self.prefix, name);
        match env::var(&full) {
            Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_owned()),
            _ => Err(Error::new(CredentialUnavailable {
                path: "environment".to_owned(),
                field: full,
                reason: "variable unset or empty".to_owned(),
            })),
        }
    }
}

impl Default for EnvProvider {
    fn default() -> EnvProvider {
        EnvProvider::new()
    }
}

impl CredentialProvider for EnvProvider {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn orchestrator_credentials(&self) -> Result<OrchestratorCredentials> {
        let token = self.var("ORCHESTRATOR_TOKEN")?;
        let address = self.var("ORCHESTRATOR_ADDR")?;
        let address = Url::parse(&address)
            .with_context(|| format!("can't parse orchestrator address {:?}", address))?;
        Ok(OrchestratorCredentials { token, address })
    }

    fn dashboard_credentials(&self) -> Result<DashboardCredentials> {
        Ok(DashboardCredentials {
            username: self.var("DASHBOARD_USERNAME")?,
            password: self.var("DASHBOARD_PASSWORD")?,
            auth: self.var("DASHBOARD_AUTH")?,
        })
    }
}

/// Build the default provider chain: the secret store when `VAULT_ADDR` is
/// configured, then environment variables.
pub fn default_providers() -> Vec<Box<dyn CredentialProvider>> {
    let mut providers: Vec<Box<dyn CredentialProvider>> = vec![];
    if env::var_os("VAULT_ADDR").is_some() {
        match SecretStore::from_env() {
            Ok(store) => providers.push(Box::new(VaultProvider::new(store))),
            Err(err) => warn!("secret store misconfigured, skipping: {}", err),
        }
    }
    providers.push(Box::new(EnvProvider::new()));
    providers
}

/// Try each provider in order and return the first complete set of
/// credentials.
pub fn resolve(providers: &[Box<dyn CredentialProvider>]) -> Result<ResolvedCredentials> {
    let mut last_err = None;
    for provider in providers {
        match resolve_one(provider.as_ref()) {
            Ok(resolved) => {
                debug!("credentials resolved via {}", provider.name());
                return Ok(resolved);
            }
            Err(err) => {
                warn!("credential provider {} failed: {}", provider.name(), err);
                last_err = Some(err);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| format_err!("no credential providers configured")))
}

fn resolve_one(provider: &dyn CredentialProvider) -> Result<ResolvedCredentials> {
    let orchestrator = provider.orchestrator_credentials()?;
    let dashboard = provider.dashboard_credentials()?;
    Ok(ResolvedCredentials {
        orchestrator,
        dashboard,
        provider: provider.name(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kv_body(fields: serde_json::Value) -> String {
        json!({ "data": { "data": fields, "metadata": { "version": 1 } } }).to_string()
    }

    fn orchestrator_mock(server: &mut mockito::Server, fields: serde_json::Value) -> mockito::Mock {
        server
            .mock("GET", "/v1/secret/data/deploy/orchestrator")
            .match_header("x-vault-token", "root")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(kv_body(fields))
            .create()
    }

    #[test]
    fn fetch_field_returns_values_unchanged_modulo_whitespace() {
        let mut server = mockito::Server::new();
        let _m = orchestrator_mock(
            &mut server,
            json!({ "token": "  abc123\n", "address": "https://orchestrator.example" }),
        );
        let store = SecretStore::new(&server.url(), "root").unwrap();
        assert_eq!(
            store.fetch_field("deploy/orchestrator", "token").unwrap(),
            "abc123"
        );
        assert_eq!(
            store.fetch_field("deploy/orchestrator", "address").unwrap(),
            "https://orchestrator.example"
        );
    }

    #[test]
    fn missing_field_is_credential_unavailable() {
        let mut server = mockito::Server::new();
        let _m = orchestrator_mock(&mut server, json!({ "token": "abc123" }));
        let store = SecretStore::new(&server.url(), "root").unwrap();
        let err = store
            .fetch_field("deploy/orchestrator", "address")
            .unwrap_err();
        let unavailable = err
            .downcast_ref::<CredentialUnavailable>()
            .expect("expected CredentialUnavailable");
        assert_eq!(unavailable.field, "address");
        assert_eq!(unavailable.reason, "field is missing");
    }

    #[test]
    fn empty_field_is_credential_unavailable() {
        let mut server = mockito::Server::new();
        let _m = orchestrator_mock(&mut server, json!({ "token": "   " }));
        let store = SecretStore::new(&server.url(), "root").unwrap();
        let err = store
            .fetch_field("deploy/orchestrator", "token")
            .unwrap_err();
        assert!(err.downcast_ref::<CredentialUnavailable>().is_some());
    }

    #[test]
    fn store_error_is_credential_unavailable() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/v1/secret/data/deploy/orchestrator")
            .with_status(403)
            .with_body(r#"{"errors":["permission denied"]}"#)
            .create();
        let store = SecretStore::new(&server.url(), "root").unwrap();
        let err = store
            .fetch_field("deploy/orchestrator", "token")
            .unwrap_err();
        let unavailable = err
            .downcast_ref::<CredentialUnavailable>()
            .expect("expected CredentialUnavailable");
        assert!(unavailable.reason.contains("403"));
    }

    struct StaticProvider {
        name: &'static str,
    }

    impl CredentialProvider for StaticProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        fn orchestrator_credentials(&self) -> Result<OrchestratorCredentials> {
            Ok(OrchestratorCredentials {
                token: "abc123".to_owned(),
                address: Url::parse("https://orchestrator.example").unwrap(),
            })
        }

        fn dashboard_credentials(&self) -> Result<DashboardCredentials> {
            Ok(DashboardCredentials {
                username: "admin".to_owned(),
                password: "hunter2".to_owned(),
                auth: "admin:$apr1$abcdef".to_owned(),
            })
        }
    }

    struct BrokenProvider;

    impl CredentialProvider for BrokenProvider {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn orchestrator_credentials(&self) -> Result<OrchestratorCredentials> {
            Err(Error::new(CredentialUnavailable {
                path: "deploy/orchestrator".to_owned(),
                field: "token".to_owned(),
                reason: "field is empty".to_owned(),
            }))
        }

        fn dashboard_credentials(&self) -> Result<DashboardCredentials> {
            unreachable!("dashboard lookup should never run for a broken provider")
        }
    }

    struct UnreachableProvider;

    impl CredentialProvider for UnreachableProvider {
        fn name(&self) -> &'static str {
            "unreachable"
        }

        fn orchestrator_credentials(&self) -> Result<OrchestratorCredentials> {
            panic!("later providers must not be consulted after a success")
        }

        fn dashboard_credentials(&self) -> Result<DashboardCredentials> {
            panic!("later providers must not be consulted after a success")
        }
    }

    #[test]
    fn resolve_uses_the_first_successful_provider() {
        let providers: Vec<Box<dyn CredentialProvider>> = vec![
            Box::new(BrokenProvider),
            Box::new(StaticProvider { name: "second" }),
            Box::new(UnreachableProvider),
        ];
        let resolved = resolve(&providers).unwrap();
        assert_eq!(resolved.provider, "second");
        assert_eq!(resolved.orchestrator.token, "abc123");
    }

    #[test]
    fn resolve_surfaces_the_last_failure_when_all_providers_fail() {
        let providers: Vec<Box<dyn CredentialProvider>> = vec![Box::new(BrokenProvider)];
        let err = resolve(&providers).unwrap_err();
        assert!(err.downcast_ref::<CredentialUnavailable>().is_some());
    }

    #[test]
    fn env_provider_reads_a_complete_set() {
        env::set_var("GW_TEST_A_ORCHESTRATOR_TOKEN", "abc123");
        env::set_var("GW_TEST_A_ORCHESTRATOR_ADDR", "https://orchestrator.example");
        env::set_var("GW_TEST_A_DASHBOARD_USERNAME", "admin");
        env::set_var("GW_TEST_A_DASHBOARD_PASSWORD", "hunter2");
        env::set_var("GW_TEST_A_DASHBOARD_AUTH", "admin:$apr1$abcdef");
        let provider = EnvProvider::with_prefix("GW_TEST_A_");
        let resolved = resolve_one(&provider).unwrap();
        assert_eq!(resolved.orchestrator.token, "abc123");
        assert_eq!(resolved.dashboard.username, "admin");
    }

    #[test]
    fn env_provider_fails_on_an_unset_variable() {
        env::set_var("GW_TEST_B_ORCHESTRATOR_TOKEN", "abc123");
        // ORCHESTRATOR_ADDR deliberately unset.
        let provider = EnvProvider::with_prefix("GW_TEST_B_");
        let err = provider.orchestrator_credentials().unwrap_err();
        let unavailable = err
            .downcast_ref::<CredentialUnavailable>()
            .expect("expected CredentialUnavailable");
        assert_eq!(unavailable.field, "GW_TEST_B_ORCHESTRATOR_ADDR");
    }
}
