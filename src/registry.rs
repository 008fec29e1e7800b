//! Registry module.
//! Static table from site identifier to the ordered capabilities its form needs.
//! Onboarding a tracker means adding its identifier to an entry (or a new entry);
//! the engine itself never changes. Identifiers missing from the table get the
//! bare base generator.
//! The cookie requirement comes from the stored site record, not from the table,
//! and is always applied first.

use thiserror::Error;
use tracing::debug;

use crate::capability::Capability;
use crate::generator::{compose, Generator};
use crate::site::{Site, SiteLookup};

use Capability::*;

/// One group of sites sharing an identical capability chain.
#[derive(Debug)]
pub struct SiteEntry {
    pub sites: &'static [&'static str],
    pub capabilities: &'static [Capability],
}

pub static REGISTRY: &[SiteEntry] = &[
    SiteEntry {
        sites: &[
            "1ptba", "52pt", "beitai", "btschool", "byr", "carpt", "cyanbug", "dajiao", "discfan",
            "dmhy", "dragonhd", "eastgame", "haidan", "hares", "hd4fans", "hdarea", "hdatmos",
            "hdbd", "hdmayi", "hdpt", "hdroute", "hdtime", "hdvideo", "hdzone", "hhanclub",
            "hitpt", "hudbt", "joyhd", "nanyangpt", "nicept", "opencd", "oshen", "pandapt",
            "pt0ffcc", "pt2xfree", "ptchina", "ptlsp", "ptsbao", "pttime", "redleaves", "rousi",
            "shadowflow", "sharkpt", "skyeysnow", "soulvoice", "ssd", "tjupt", "torrentccf",
            "ubits", "upxin", "wintersakura", "qhstudio", "ptvicomo", "qingwapt", "keepfrds",
        ],
        capabilities: &[NexusPhp, UrlJoin],
    },
    SiteEntry {
        sites: &["ttg"],
        capabilities: &[NexusPhp, Limit, RssUrl],
    },
    SiteEntry {
        sites: &["pter", "pt", "hdsky"],
        capabilities: &[NexusPhp, Limit],
    },
    SiteEntry {
        sites: &["hdpost", "monikadesign"],
        capabilities: &[NexusPhp, Rsskey, RssUrl],
    },
    SiteEntry {
        sites: &["dicmusic", "greatposterwall"],
        capabilities: &[DicMusic, Limit],
    },
    SiteEntry {
        sites: &["m-team"],
        capabilities: &[NexusPhp, XApiKey, Limit, UrlJoin, RssUrl],
    },
    SiteEntry {
        sites: &["hdcity"],
        capabilities: &[NexusPhp, CuHashByHdcity],
    },
    SiteEntry {
        sites: &["audiences"],
        capabilities: &[NexusPhp, Uid, Rsskey, Limit],
    },
    SiteEntry {
        sites: &["hdhome", "pthome"],
        capabilities: &[NexusPhp, Uid, Limit, RssUrl],
    },
    SiteEntry {
        sites: &["zhuque"],
        capabilities: &[Zhuque, Uid, Limit],
    },
    SiteEntry {
        sites: &["ourbits", "chdbits", "piggo", "zmpt", "agsvpt", "hdfans"],
        capabilities: &[NexusPhp, Uid, Limit, UrlJoin],
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error("site not found: {0}")]
    SiteNotFound(String),
}

/// Capabilities the table assigns to `site`; empty for unmapped identifiers.
pub fn resolve(site: &str) -> &'static [Capability] {
    REGISTRY
        .iter()
        .find(|entry| entry.sites.contains(&site))
        .map(|entry| entry.capabilities)
        .unwrap_or(&[])
}

/// Full chain for a stored site: cookie prefix (when flagged) then the table entry.
pub fn chain_for(record: &Site) -> Vec<Capability> {
    let mut chain = Vec::new();
    if record.cookie_required {
        chain.push(CookieRequired);
    }
    chain.extend_from_slice(resolve(&record.site));
    chain
}

pub fn lookup<'a>(store: &'a impl SiteLookup, site: &str) -> Result<&'a Site, GenerateError> {
    store
        .unique_site(site)
        .ok_or_else(|| GenerateError::SiteNotFound(site.to_string()))
}

/// Builds the composed generator for `site`.
/// Fails before any composition when the store has no record for it.
pub fn generate(store: &impl SiteLookup, site: &str) -> Result<Generator, GenerateError> {
    let record = lookup(store, site)?;

    let chain = chain_for(record);
    debug!(
        site,
        cookie_required = record.cookie_required,
        chain = ?chain,
        "composing site form"
    );
    Ok(compose(Generator::new(), &chain))
}
