//! IYUU coordination API client.
//! Fetches the list of recommended (partner) sites and binds a user's account
//! on a partner site to their IYUU token.
//! The passkey never leaves this machine: only its SHA-1 hex digest is sent.
//! Requires an IYUU token (config.json `token` or `IYUU_TOKEN`).

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha1::{Digest, Sha1};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::site::SiteLookup;

const MAX_TOKEN_LEN: usize = 60;
const SUCCESS_RET: i64 = 200;
const FALLBACK_RET: i64 = 400;
const FALLBACK_MSG: &str = "IYUU server did not respond, please retry later";

// *************** Request/Response Types ***************

/// What the user submits on the bind form.
#[derive(Clone, Debug, Default)]
pub struct BindRequest {
    /// Numeric user id on the partner site, as typed
    pub id: String,
    pub site: String,
    pub passkey: String,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
struct BindQuery {
    token: String,
    id: u64,
    site: String,
    /// SHA-1 hex of the passkey
    passkey: String,
    sid: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendSite {
    pub site: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Error)]
pub enum BindError {
    #[error("malformed IYUU_TOKEN")]
    InvalidToken,
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("site not found: {0}")]
    SiteNotFound(String),
    #[error("bind failed, cannot reach the IYUU API; check the local network or retry later")]
    Unreachable,
    #[error("bind failed, code: {code} msg: {msg}")]
    Rejected { code: i64, msg: String },
}

// *************** Public API ***************

/// `IYUU<digits>T<39-41 alphanumerics>`, at most 60 characters.
pub fn check_token(token: &str) -> bool {
    if token.len() > MAX_TOKEN_LEN {
        return false;
    }
    let Some(rest) = token.strip_prefix("IYUU") else {
        return false;
    };
    let Some((uid, secret)) = rest.split_once('T') else {
        return false;
    };
    !uid.is_empty()
        && uid.bytes().all(|b| b.is_ascii_digit())
        && (39..=41).contains(&secret.len())
        && secret.bytes().all(|b| b.is_ascii_alphanumeric())
}

pub fn sha1_hex(input: &str) -> String {
    hex::encode(Sha1::digest(input.as_bytes()))
}

pub struct IyuuClient {
    client: Client,
    token: String,
    recommend_url: String,
    bind_url: String,
}

impl IyuuClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let token = config
            .token
            .clone()
            .context("IYUU token not configured (set IYUU_TOKEN or `token` in config.json)")?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            token,
            recommend_url: config.recommend_sites_url(),
            bind_url: config.bind_url(),
        })
    }

    pub async fn recommend_sites(&self) -> Result<Vec<RecommendSite>> {
        if !check_token(&self.token) {
            anyhow::bail!(BindError::InvalidToken);
        }
        let body = self
            .client
            .get(&self.recommend_url)
            .send()
            .await
            .context("Failed to request recommended sites")?
            .text()
            .await
            .context("Failed to read recommended sites response")?;

        let recommend = recommend_list(&body)?;
        if recommend.is_empty() {
            anyhow::bail!("IYUU server did not respond");
        }
        debug!(count = recommend.len(), "fetched recommended sites");
        Ok(recommend)
    }

    pub async fn bind(&self, request: &BindRequest, sites: &impl SiteLookup) -> Result<(), BindError> {
        let query = build_bind_query(&self.token, request, sites)?;
        info!(site = %query.site, sid = query.sid, "binding site account");

        let response = self.client.get(&self.bind_url).query(&query).send().await;
        let body = match response {
            Ok(response) => response.text().await.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "bind request failed");
                String::new()
            }
        };
        interpret_bind_response(&body)
    }
}

// *************** Internal Functions ***************

fn build_bind_query(token: &str, request: &BindRequest, sites: &impl SiteLookup) -> Result<BindQuery, BindError> {
    if token.is_empty() {
        return Err(BindError::Missing("token"));
    }
    if token.len() > MAX_TOKEN_LEN {
        return Err(BindError::Invalid {
            field: "token",
            reason: format!("longer than {MAX_TOKEN_LEN} characters"),
        });
    }
    let id = request.id.trim();
    if id.is_empty() {
        return Err(BindError::Missing("id"));
    }
    let not_a_number = || BindError::Invalid {
        field: "id",
        reason: format!("'{id}' is not a number"),
    };
    if !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(not_a_number());
    }
    let id = id.parse::<u64>().map_err(|_| not_a_number())?;
    let site = request.site.trim();
    if site.is_empty() {
        return Err(BindError::Missing("site"));
    }
    if request.passkey.is_empty() {
        return Err(BindError::Missing("passkey"));
    }
    let sid = sites
        .unique_site(site)
        .map(|record| record.sid)
        .ok_or_else(|| BindError::SiteNotFound(site.to_string()))?;

    Ok(BindQuery {
        token: token.to_string(),
        id,
        site: site.to_string(),
        passkey: sha1_hex(&request.passkey),
        sid,
    })
}

/// `None` when the body is empty, not JSON, or an empty JSON value.
/// Fields are read loosely: the API is not consistent about their types.
fn parse_response(body: &str) -> Option<Value> {
    let value: Value = serde_json::from_str(body.trim()).ok()?;
    truthy(&value).then_some(value)
}

/// Loose truthiness: `0`, `"0"`, `""`, `false`, `null` and empty containers are false.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// `ret` as a number, also when sent as a numeric string.
fn ret_code(response: &Value) -> Option<i64> {
    match response.get("ret")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn recommend_list(body: &str) -> Result<Vec<RecommendSite>> {
    let Some(list) = parse_response(body)
        .and_then(|mut response| response.pointer_mut("/data/recommend").map(Value::take))
        .filter(truthy)
    else {
        return Ok(Vec::new());
    };
    serde_json::from_value(list).context("Malformed recommended sites list")
}

/// Maps the raw bind response onto success or a user-facing error.
/// The message falls back from `msg` to `data.errmsg` to a fixed text.
fn interpret_bind_response(body: &str) -> Result<(), BindError> {
    let response = parse_response(body).ok_or(BindError::Unreachable)?;
    let code = ret_code(&response);
    let success = response.pointer("/data/success").is_some_and(truthy);
    if code == Some(SUCCESS_RET) && success {
        return Ok(());
    }

    let msg = response
        .get("msg")
        .and_then(message_text)
        .or_else(|| response.pointer("/data/errmsg").and_then(message_text))
        .unwrap_or_else(|| FALLBACK_MSG.to_string());
    Err(BindError::Rejected {
        code: code.unwrap_or(FALLBACK_RET),
        msg,
    })
}

// *************** Tests ***************

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::tests::site;
    use crate::site::SiteStore;

    const TOKEN: &str = "IYUU12345T0123456789abcdef0123456789abcdef01234567";

    fn store() -> SiteStore {
        SiteStore::from_sites(vec![site(7, "hdsky", false)]).unwrap()
    }

    fn request(id: &str, site: &str, passkey: &str) -> BindRequest {
        BindRequest {
            id: id.to_string(),
            site: site.to_string(),
            passkey: passkey.to_string(),
        }
    }

    #[test]
    fn test_check_token() {
        assert!(check_token(TOKEN));
        assert!(!check_token("IYUUT0123456789abcdef0123456789abcdef0123"));
        assert!(!check_token("IYUU1Tshort"));
        assert!(!check_token("XYUU1T0123456789abcdef0123456789abcdef0123"));
        // Well-formed apart from the overall length (65 characters).
        let long_uid = format!("IYUU{}T0123456789abcdef0123456789abcdef01234567", "1".repeat(20));
        assert_eq!(long_uid.len(), 65);
        assert!(!check_token(&long_uid));
    }

    #[test]
    fn test_sha1_hex() {
        assert_eq!(sha1_hex("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_bind_query_hashes_passkey_and_adds_sid() {
        let query = build_bind_query(TOKEN, &request(" 42 ", "hdsky", "abc"), &store()).unwrap();
        assert_eq!(
            query,
            BindQuery {
                token: TOKEN.to_string(),
                id: 42,
                site: "hdsky".to_string(),
                passkey: "a9993e364706816aba3e25717850c26c9cd0d89d".to_string(),
                sid: 107,
            }
        );
    }

    #[test]
    fn test_bind_query_validation() {
        let store = store();
        assert!(matches!(
            build_bind_query(TOKEN, &request("", "hdsky", "p"), &store),
            Err(BindError::Missing("id"))
        ));
        assert!(matches!(
            build_bind_query(TOKEN, &request("abc", "hdsky", "p"), &store),
            Err(BindError::Invalid { field: "id", .. })
        ));
        for malformed in ["+5", "-5", "5 5"] {
            assert!(matches!(
                build_bind_query(TOKEN, &request(malformed, "hdsky", "p"), &store),
                Err(BindError::Invalid { field: "id", .. })
            ));
        }
        assert!(matches!(
            build_bind_query(TOKEN, &request("1", "", "p"), &store),
            Err(BindError::Missing("site"))
        ));
        assert!(matches!(
            build_bind_query(TOKEN, &request("1", "hdsky", ""), &store),
            Err(BindError::Missing("passkey"))
        ));
        assert!(matches!(
            build_bind_query(TOKEN, &request("1", "ttg", "p"), &store),
            Err(BindError::SiteNotFound(ref s)) if s == "ttg"
        ));
        assert!(matches!(
            build_bind_query(&"x".repeat(61), &request("1", "hdsky", "p"), &store),
            Err(BindError::Invalid { field: "token", .. })
        ));
    }

    #[test]
    fn test_bind_response_success() {
        let body = r#"{"ret": 200, "data": {"success": true}, "msg": "ok"}"#;
        assert!(interpret_bind_response(body).is_ok());
    }

    #[test]
    fn test_bind_response_empty_body_is_unreachable() {
        assert!(matches!(interpret_bind_response(""), Err(BindError::Unreachable)));
        assert!(matches!(interpret_bind_response("<html>"), Err(BindError::Unreachable)));
        assert!(matches!(interpret_bind_response("null"), Err(BindError::Unreachable)));
        assert!(matches!(interpret_bind_response("{}"), Err(BindError::Unreachable)));
    }

    #[test]
    fn test_bind_response_loose_field_types() {
        assert!(interpret_bind_response(r#"{"ret": "200", "data": {"success": 1}}"#).is_ok());
        assert!(interpret_bind_response(r#"{"ret": 200, "data": {"success": "1"}}"#).is_ok());

        let err = interpret_bind_response(r#"{"ret": "403", "msg": "token expired"}"#).unwrap_err();
        assert_eq!(err.to_string(), "bind failed, code: 403 msg: token expired");

        let err = interpret_bind_response(r#"{"ret": 200, "data": {"success": 0}, "msg": 1001}"#).unwrap_err();
        assert_eq!(err.to_string(), "bind failed, code: 200 msg: 1001");

        let err = interpret_bind_response(r#"{"ret": "abc", "data": {"success": "0", "errmsg": "denied"}}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "bind failed, code: 400 msg: denied");
    }

    #[test]
    fn test_bind_response_message_fallbacks() {
        let err = interpret_bind_response(r#"{"ret": 403, "msg": "token expired"}"#).unwrap_err();
        assert_eq!(err.to_string(), "bind failed, code: 403 msg: token expired");

        let err = interpret_bind_response(r#"{"ret": 200, "data": {"success": false, "errmsg": "passkey mismatch"}}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "bind failed, code: 200 msg: passkey mismatch");

        let err = interpret_bind_response(r#"{"data": {}}"#).unwrap_err();
        assert_eq!(err.to_string(), format!("bind failed, code: 400 msg: {FALLBACK_MSG}"));
    }

    #[test]
    fn test_recommend_sites_parse() {
        let body = r#"{"ret": 200, "data": {"recommend": [{"site": "hdsky", "bind_check": "uid"}]}}"#;
        let recommend = recommend_list(body).unwrap();
        assert_eq!(recommend[0].site, "hdsky");
        assert_eq!(recommend[0].extra["bind_check"], "uid");

        assert!(recommend_list("").unwrap().is_empty());
        assert!(recommend_list(r#"{"ret": 200, "data": {"recommend": null}}"#).unwrap().is_empty());
        assert!(recommend_list(r#"{"ret": 200, "data": {"recommend": [{"name": 1}]}}"#).is_err());
    }

    #[tokio::test]
    #[ignore = "requires IYUU_TOKEN and network access"]
    async fn test_real_recommend_sites() {
        // Run with: IYUU_TOKEN=IYUU... cargo test test_real_recommend_sites -- --ignored
        let config = AppConfig::default().with_overrides(|key| std::env::var(key).ok());
        let client = IyuuClient::new(&config).unwrap();
        let result = client.recommend_sites().await;
        println!("Result: {:?}", result);
        assert!(result.is_ok());
    }
}
