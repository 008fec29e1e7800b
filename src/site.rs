//! Site module.
//! Site profiles as stored by the admin backend, loaded from a JSON export
//! (`sites.json`, an array of records). The form engine only reads them.
//! Also formats the site drop-down used by the admin pages.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: u64,
    /// Unique identifier, e.g. `m-team`
    pub site: String,
    pub sid: u64,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub cookie_required: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub options: Option<Value>,
}

impl Site {
    /// A site counts as configured once it has non-empty `options`.
    pub fn is_configured(&self) -> bool {
        match &self.options {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Object(map)) => !map.is_empty(),
            Some(_) => true,
        }
    }
}

/// Read access to stored site profiles.
pub trait SiteLookup {
    fn unique_site(&self, site: &str) -> Option<&Site>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read site store {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse site store {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("duplicate site identifier '{0}'")]
    Duplicate(String),
}

#[derive(Clone, Debug, Default)]
pub struct SiteStore {
    sites: Vec<Site>,
}

impl SiteStore {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let raw = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let sites: Vec<Site> = serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), count = sites.len(), "loaded site store");
        Self::from_sites(sites)
    }

    pub fn from_sites(sites: Vec<Site>) -> Result<Self, StoreError> {
        let mut seen = HashSet::new();
        for site in &sites {
            if !seen.insert(site.site.as_str()) {
                return Err(StoreError::Duplicate(site.site.clone()));
            }
        }
        Ok(Self { sites })
    }

    pub fn all(&self) -> &[Site] {
        &self.sites
    }
}

impl SiteLookup for SiteStore {
    fn unique_site(&self, site: &str) -> Option<&Site> {
        self.sites.iter().find(|record| record.site == site)
    }
}

// *************** Select list ***************

/// Which column a drop-down option carries as its value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectValue {
    Id,
    Sid,
    #[default]
    Site,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal value parameter '{0}', expected id, sid or site")]
pub struct IllegalSelectValue(pub String);

impl FromStr for SelectValue {
    type Err = IllegalSelectValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(SelectValue::Id),
            "sid" => Ok(SelectValue::Sid),
            "site" => Ok(SelectValue::Site),
            other => Err(IllegalSelectValue(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SelectOption {
    pub name: String,
    pub value: Value,
}

/// Builds drop-down options. Unless `simple`, names are tagged with
/// ` | unconfigured` and ` | disabled`.
pub fn format_select(sites: &[Site], value: SelectValue, simple: bool) -> Vec<SelectOption> {
    sites
        .iter()
        .map(|site| {
            let mut name = format!("{}{}", site.nickname.as_deref().unwrap_or(""), site.site);
            if !simple {
                if !site.is_configured() {
                    name.push_str(" | unconfigured");
                }
                if site.disabled {
                    name.push_str(" | disabled");
                }
            }
            let value = match value {
                SelectValue::Id => Value::from(site.id),
                SelectValue::Sid => Value::from(site.sid),
                SelectValue::Site => Value::from(site.site.clone()),
            };
            SelectOption { name, value }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    pub(crate) fn site(id: u64, name: &str, cookie_required: bool) -> Site {
        Site {
            id,
            site: name.to_string(),
            sid: id + 100,
            nickname: None,
            cookie_required,
            disabled: false,
            options: None,
        }
    }

    #[test]
    fn test_load_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"id": 1, "site": "m-team", "sid": 9, "nickname": "馒头", "options": {{"passkey": "x"}}}},
                {{"id": 2, "site": "zhuque", "sid": 44, "cookie_required": true, "disabled": true}}
            ]"#
        )
        .unwrap();

        let store = SiteStore::load(file.path()).unwrap();
        assert_eq!(store.all().len(), 2);

        let zhuque = store.unique_site("zhuque").unwrap();
        assert!(zhuque.cookie_required && zhuque.disabled);
        assert!(!zhuque.is_configured());
        assert_eq!(store.unique_site("m-team").unwrap().nickname.as_deref(), Some("馒头"));
        assert!(store.unique_site("hdsky").is_none());
    }

    #[test]
    fn test_load_reports_missing_file_and_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("sites.json");
        assert!(matches!(SiteStore::load(&missing), Err(StoreError::Io { .. })));

        fs::write(&missing, "{ not json").unwrap();
        assert!(matches!(SiteStore::load(&missing), Err(StoreError::Parse { .. })));
    }

    #[test]
    fn test_duplicate_identifiers_rejected() {
        let result = SiteStore::from_sites(vec![site(1, "ttg", false), site(2, "ttg", true)]);
        assert!(matches!(result, Err(StoreError::Duplicate(ref s)) if s == "ttg"));
    }

    #[test]
    fn test_is_configured() {
        let mut record = site(1, "ttg", false);
        assert!(!record.is_configured());
        record.options = Some(json!({}));
        assert!(!record.is_configured());
        record.options = Some(json!({ "passkey": "p" }));
        assert!(record.is_configured());
    }

    #[test]
    fn test_format_select_tags_and_values() {
        let mut configured = site(1, "hdsky", false);
        configured.nickname = Some("天空".to_string());
        configured.options = Some(json!({ "passkey": "p" }));
        let mut disabled = site(2, "ttg", false);
        disabled.disabled = true;

        let sites = vec![configured, disabled];
        let options = format_select(&sites, SelectValue::Sid, false);
        assert_eq!(options[0].name, "天空hdsky");
        assert_eq!(options[0].value, json!(101));
        assert_eq!(options[1].name, "ttg | unconfigured | disabled");

        let simple = format_select(&sites, SelectValue::Site, true);
        assert_eq!(simple[1].name, "ttg");
        assert_eq!(simple[1].value, json!("ttg"));
    }

    #[test]
    fn test_select_value_parsing() {
        assert_eq!("id".parse::<SelectValue>(), Ok(SelectValue::Id));
        assert_eq!(SelectValue::default(), SelectValue::Site);
        let err = "nickname".parse::<SelectValue>().unwrap_err();
        assert!(err.to_string().contains("illegal value parameter"));
    }
}
