//! Capability module.
//! A capability is a named bundle of configuration fields a tracker site needs
//! (cookie, passkey, rate limit, RSS url, ...). Capabilities are stateless and
//! applied, never owned: `apply` layers the fields on top of a generator and
//! hands the generator back.
//! The protocol families (`NexusPhp`, `DicMusic`, `Zhuque`) are mutually
//! exclusive in the registry; each one brings its own credential fields.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::field::FieldDescriptor;
use crate::generator::Generator;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Downloading torrents needs the site cookie
    CookieRequired,
    /// Common NexusPHP tracker software: passkey + site url
    NexusPhp,
    /// Gazelle-style music trackers: authkey + torrent_pass
    DicMusic,
    /// Zhuque's own tracker software: torrent key
    Zhuque,
    Limit,
    UrlJoin,
    RssUrl,
    Rsskey,
    Uid,
    /// M-Team style `x-api-key` header
    XApiKey,
    /// hdcity's `cuhash` download parameter
    CuHashByHdcity,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown capability '{0}'")]
pub struct UnknownCapability(pub String);

impl Capability {
    pub const ALL: [Capability; 11] = [
        Capability::CookieRequired,
        Capability::NexusPhp,
        Capability::DicMusic,
        Capability::Zhuque,
        Capability::Limit,
        Capability::UrlJoin,
        Capability::RssUrl,
        Capability::Rsskey,
        Capability::Uid,
        Capability::XApiKey,
        Capability::CuHashByHdcity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Capability::CookieRequired => "cookie_required",
            Capability::NexusPhp => "nexus_php",
            Capability::DicMusic => "dic_music",
            Capability::Zhuque => "zhuque",
            Capability::Limit => "limit",
            Capability::UrlJoin => "url_join",
            Capability::RssUrl => "rss_url",
            Capability::Rsskey => "rsskey",
            Capability::Uid => "uid",
            Capability::XApiKey => "x_api_key",
            Capability::CuHashByHdcity => "cuhash_by_hdcity",
        }
    }

    /// Field descriptors this capability contributes, in render order.
    pub fn fields(self) -> Vec<FieldDescriptor> {
        match self {
            Capability::CookieRequired => vec![
                FieldDescriptor::text("cookie", "Cookie")
                    .required()
                    .with_help("Cookie copied from a logged-in browser session"),
            ],
            Capability::NexusPhp => vec![
                FieldDescriptor::password("options[passkey]", "Passkey")
                    .required()
                    .with_help("Passkey from the site's control panel"),
                FieldDescriptor::url("base_url", "Site URL").with_help("https://"),
            ],
            Capability::DicMusic => vec![
                FieldDescriptor::password("options[authkey]", "Authkey").required(),
                FieldDescriptor::password("options[torrent_pass]", "Torrent pass").required(),
                FieldDescriptor::url("base_url", "Site URL").with_help("https://"),
            ],
            Capability::Zhuque => vec![
                FieldDescriptor::password("options[torrent_key]", "Torrent key")
                    .required()
                    .with_help("Torrent key from the site's settings page"),
                FieldDescriptor::url("base_url", "Site URL").with_help("https://"),
            ],
            Capability::Limit => vec![
                FieldDescriptor::number("options[limit][count]", "Downloads per run", 1, 100)
                    .with_default("20")
                    .with_help("1-100"),
                FieldDescriptor::number("options[limit][sleep]", "Pause between downloads", 0, 60)
                    .with_default("5")
                    .with_help("Seconds, 0-60"),
            ],
            Capability::UrlJoin => vec![
                FieldDescriptor::url_list("options[url_join]", "Download URL parameters")
                    .with_help("Extra query parameters appended to the download link"),
            ],
            Capability::RssUrl => vec![
                FieldDescriptor::url("options[rss_url]", "RSS URL")
                    .with_help("Full RSS feed URL generated by the site"),
            ],
            Capability::Rsskey => vec![
                FieldDescriptor::password("options[rsskey]", "RSS key")
                    .with_help("RSS key, distinct from the passkey"),
            ],
            Capability::Uid => vec![
                FieldDescriptor::number("options[uid]", "User ID", 1, i64::MAX).required(),
            ],
            Capability::XApiKey => vec![
                FieldDescriptor::password("options[x_api_key]", "x-api-key")
                    .required()
                    .with_help("API key sent in the x-api-key header"),
            ],
            Capability::CuHashByHdcity => vec![
                FieldDescriptor::text("options[cuhash]", "cuhash")
                    .required()
                    .with_help("cuhash value from any download link"),
            ],
        }
    }

    pub const PROTOCOL_FAMILIES: [Capability; 3] =
        [Capability::NexusPhp, Capability::DicMusic, Capability::Zhuque];

    pub fn is_protocol_family(self) -> bool {
        Self::PROTOCOL_FAMILIES.contains(&self)
    }

    /// Layers this capability's fields over `generator`.
    /// A protocol family replaces any family applied before it: keys only the
    /// other families define are dropped first.
    pub fn apply(self, mut generator: Generator) -> Generator {
        let own = self.fields();
        if self.is_protocol_family() {
            for family in Self::PROTOCOL_FAMILIES.into_iter().filter(|f| *f != self) {
                for field in family.fields() {
                    if !own.iter().any(|mine| mine.key == field.key) {
                        generator.remove_field(field.key);
                    }
                }
            }
        }
        for field in own {
            generator.add_field(field);
        }
        generator
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Capability::ALL
            .into_iter()
            .find(|capability| capability.name().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownCapability(s.to_string()))
    }
}
