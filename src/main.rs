mod capability;
mod config;
mod field;
mod generator;
mod iyuu;
mod payload;
mod registry;
mod site;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::{Map, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::capability::Capability;
use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};
use crate::generator::{compose, Generator};
use crate::iyuu::{BindRequest, IyuuClient};
use crate::site::{format_select, SelectValue, SiteStore};

fn site_arg() -> Arg {
    Arg::new("site")
        .long("site")
        .value_name("SITE")
        .help("Site identifier (e.g., m-team, hdsky, zhuque)")
        .required(true)
}

fn cli() -> Command {
    Command::new("tracker-forms")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Per-site configuration forms for private trackers")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Path to config.json")
                .default_value(DEFAULT_CONFIG_PATH)
                .global(true),
        )
        .arg(
            Arg::new("sites")
                .long("sites")
                .value_name("PATH")
                .help("Site store (JSON array), overrides `sites_path` from the config")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("FILTER")
                .help("Tracing filter, e.g. info or tracker_forms=debug")
                .default_value("warn")
                .global(true),
        )
        .subcommand(
            Command::new("render")
                .about("Render the configuration form (markup + script) for a site")
                .arg(site_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print {\"html\", \"js\"} as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("resolve")
                .about("Show the capability chain a site resolves to")
                .arg(site_arg()),
        )
        .subcommand(
            Command::new("preview")
                .about("Render a form from an explicit capability list")
                .arg(
                    Arg::new("with")
                        .long("with")
                        .value_name("CAPABILITIES")
                        .help("Comma-separated capabilities, applied in order (e.g., nexus_php,limit)")
                        .value_delimiter(',')
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Validate a configuration payload (JSON object) against a site's form")
                .arg(site_arg())
                .arg(
                    Arg::new("payload")
                        .long("payload")
                        .value_name("PATH")
                        .help("JSON object keyed by form field name")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("defaults")
                .about("Print the default configuration payload for a site")
                .arg(site_arg()),
        )
        .subcommand(
            Command::new("list")
                .about("List sites as drop-down options")
                .arg(
                    Arg::new("value")
                        .long("value")
                        .value_name("COLUMN")
                        .help("Column used as option value")
                        .default_value("site")
                        .value_parser(["id", "sid", "site"]),
                )
                .arg(
                    Arg::new("simple")
                        .long("simple")
                        .help("Omit the unconfigured/disabled tags")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("init")
                .about("Write a default config.json")
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help("Overwrite an existing file")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("recommend").about("Fetch IYUU partner sites"))
        .subcommand(
            Command::new("bind")
                .about("Bind a partner-site account to the IYUU token")
                .arg(site_arg())
                .arg(
                    Arg::new("id")
                        .long("id")
                        .value_name("UID")
                        .help("Numeric user id on the site")
                        .required(true),
                )
                .arg(
                    Arg::new("passkey")
                        .long("passkey")
                        .value_name("PASSKEY")
                        .help("Site passkey; prompted for when omitted"),
                ),
        )
}

fn arg<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing --{name}"))
}

fn load_store(matches: &ArgMatches, config: &AppConfig) -> Result<SiteStore> {
    let path = matches
        .get_one::<String>("sites")
        .map(PathBuf::from)
        .unwrap_or_else(|| config.sites_path.clone());
    SiteStore::load(&path).with_context(|| format!("Failed to load sites from {}", path.display()))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

fn read_payload(path: &Path) -> Result<Map<String, Value>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload: {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse payload: {}", path.display()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("Payload must be a JSON object: {}", path.display()),
    }
}

fn print_form(generator: &Generator, as_json: bool) -> Result<()> {
    let form = generator.render();
    if as_json {
        return print_json(&form);
    }
    println!("{}", form.html);
    if !form.js.is_empty() {
        println!("<script>\n{}</script>", form.js);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    // Global args are propagated down to the subcommand
    let globals = matches.subcommand().map_or(&matches, |(_, sub)| sub);

    // RUST_LOG wins over --log-level
    let level = arg(globals, "log-level")?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config_path = PathBuf::from(arg(globals, "config")?);
    if let Some(("init", sub)) = matches.subcommand() {
        if config_path.exists() && !sub.get_flag("force") {
            anyhow::bail!("{} already exists, pass --force to overwrite", config_path.display());
        }
        AppConfig::default().save(&config_path)?;
        println!("Wrote {}", config_path.display());
        return Ok(());
    }
    let config = AppConfig::load(&config_path)?;

    match matches.subcommand() {
        Some(("render", sub)) => {
            let store = load_store(globals, &config)?;
            let generator = registry::generate(&store, arg(sub, "site")?)?;
            print_form(&generator, sub.get_flag("json"))?;
        }
        Some(("resolve", sub)) => {
            let store = load_store(globals, &config)?;
            let site = arg(sub, "site")?;
            let record = registry::lookup(&store, site)?;
            let chain = registry::chain_for(record);
            if chain.is_empty() {
                println!("{site}: (base generator)");
            } else {
                let names: Vec<&str> = chain.iter().map(|c| c.name()).collect();
                println!("{site}: {}", names.join(" -> "));
            }
            let generator = compose(Generator::new(), &chain);
            let keys: Vec<&str> = generator.fields().keys().collect();
            println!("fields: {}", keys.join(", "));
        }
        Some(("preview", sub)) => {
            let capabilities = sub
                .get_many::<String>("with")
                .context("missing --with")?
                .map(|name| name.parse::<Capability>())
                .collect::<Result<Vec<_>, _>>()?;
            print_form(&compose(Generator::new(), &capabilities), false)?;
        }
        Some(("check", sub)) => {
            let store = load_store(globals, &config)?;
            let site = arg(sub, "site")?;
            let generator = registry::generate(&store, site)?;
            let payload = read_payload(Path::new(arg(sub, "payload")?))?;
            match generator.validate(&payload) {
                Ok(()) => println!("{site}: payload is valid"),
                Err(violations) => {
                    for violation in &violations {
                        println!("{violation}");
                    }
                    anyhow::bail!("{site}: {} invalid field(s)", violations.len());
                }
            }
        }
        Some(("defaults", sub)) => {
            let store = load_store(globals, &config)?;
            let generator = registry::generate(&store, arg(sub, "site")?)?;
            print_json(&generator.default_payload())?;
        }
        Some(("list", sub)) => {
            let store = load_store(globals, &config)?;
            let value: SelectValue = arg(sub, "value")?.parse()?;
            print_json(&format_select(store.all(), value, sub.get_flag("simple")))?;
        }
        Some(("recommend", _)) => {
            let client = IyuuClient::new(&config)?;
            print_json(&client.recommend_sites().await?)?;
        }
        Some(("bind", sub)) => {
            let store = load_store(globals, &config)?;
            let passkey = match sub.get_one::<String>("passkey") {
                Some(passkey) => passkey.clone(),
                None => dialoguer::Password::new()
                    .with_prompt("Passkey")
                    .interact()
                    .context("Failed to read passkey")?,
            };
            let request = BindRequest {
                id: arg(sub, "id")?.to_string(),
                site: arg(sub, "site")?.to_string(),
                passkey,
            };
            let client = IyuuClient::new(&config)?;
            client.bind(&request, &store).await?;
            info!(site = %request.site, "bind succeeded");
            println!("Bind succeeded");
        }
        _ => unreachable!("subcommand_required is set"),
    }

    Ok(())
}
