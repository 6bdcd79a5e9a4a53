use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use extkit_core::{
    config::ScaffoldConfig,
    document::is_valid_name,
    registry::{LicenseRepository, UpgradeList},
    ExtensionDescriptor, InitContext, VersionBound,
};
use regex::Regex;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

const MANIFEST_FILE: &str = "info.xml";

#[derive(Parser, Debug)]
#[command(name = "extkit", author, version, about = "Extension manifest scaffolding")]
struct Cli {
    /// Sets the log level (error, warn, info, debug, trace).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// TOML file with scaffold defaults.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a fresh info.xml for a new extension.
    Init(InitArgs),
    /// Print the working fields of an existing manifest as JSON.
    Show {
        #[arg(value_name = "FILE", default_value = MANIFEST_FILE)]
        manifest: PathBuf,
    },
    /// Print the lowest or highest compatible host version.
    Compat {
        #[arg(value_name = "FILE", default_value = MANIFEST_FILE)]
        manifest: PathBuf,
        #[arg(long, default_value = "MIN", value_parser = parse_bound)]
        mode: VersionBound,
    },
    /// Print the civix-format, guessing it for older manifests.
    Format {
        #[arg(value_name = "FILE", default_value = MANIFEST_FILE)]
        manifest: PathBuf,
    },
    /// Print the code-generation namespace; fails when it is not declared.
    Namespace {
        #[arg(value_name = "FILE", default_value = MANIFEST_FILE)]
        manifest: PathBuf,
    },
    /// Interact with scaffold config files.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args, Debug)]
struct InitArgs {
    /// Fully qualified extension key, e.g. org.example.myext.
    #[arg(value_name = "KEY")]
    key: String,
    #[arg(long = "type", value_name = "TYPE")]
    ext_type: Option<String>,
    /// Main file short name; defaults to the last segment of the key.
    #[arg(long, value_name = "NAME")]
    file: Option<String>,
    #[arg(long)]
    license: Option<String>,
    #[arg(long)]
    author: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long, value_name = "VERSION")]
    compat_min: Option<String>,
    #[arg(long)]
    namespace: Option<String>,
    /// Pins the civix-format instead of using the newest known one.
    #[arg(long, value_name = "VERSION")]
    format: Option<String>,
    #[arg(long, value_name = "NAME")]
    angular_module: Option<String>,
    /// Extra typeInfo entry; may be repeated.
    #[arg(long = "type-info", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    type_info: Vec<(String, String)>,
    /// Directory to write info.xml into.
    #[arg(long, value_name = "DIR", default_value = ".")]
    dir: PathBuf,
    /// Overwrite an existing info.xml.
    #[arg(long)]
    force: bool,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Validates the provided configuration file.
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Prints the bundled example configuration.
    Example,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;
    debug!(version = extkit_core::version(), "starting extkit");
    match cli.command {
        Commands::Init(args) => handle_init(args, cli.config.as_deref()),
        Commands::Show { manifest } => handle_show(&manifest),
        Commands::Compat { manifest, mode } => handle_compat(&manifest, mode),
        Commands::Format { manifest } => handle_format(&manifest),
        Commands::Namespace { manifest } => handle_namespace(&manifest),
        Commands::Config { command } => handle_config(command),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
    Ok(())
}

fn handle_init(args: InitArgs, config: Option<&Path>) -> Result<()> {
    let cfg = match config {
        Some(path) => load_config(path)?,
        None => ScaffoldConfig::default(),
    };
    cfg.validate()?;

    let target = args.dir.join(MANIFEST_FILE);
    if target.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite",
            target.display()
        );
    }

    let main_file = match args.file {
        Some(file) => file,
        None => default_main_file(&args.key)?,
    };
    let mut ctx = InitContext::new(args.key, args.ext_type.unwrap_or_default(), main_file);
    ctx.license = args.license;
    ctx.author = args.author;
    ctx.email = args.email;
    ctx.compatibility_ver_min = args.compat_min;
    ctx.namespace = args.namespace;
    ctx.civix_format = args.format;
    ctx.angular_module_name = args.angular_module;
    if !args.type_info.is_empty() {
        ctx.type_info = Some(args.type_info.into_iter().collect::<BTreeMap<_, _>>());
    }
    cfg.apply_defaults(&mut ctx);

    let descriptor =
        ExtensionDescriptor::initialize(&ctx, &LicenseRepository::new(), &UpgradeList::new())?;
    fs::create_dir_all(&args.dir)
        .with_context(|| format!("failed to create {}", args.dir.display()))?;
    descriptor
        .save(&target)
        .with_context(|| format!("failed to write {}", target.display()))?;
    info!(key = descriptor.key(), path = %target.display(), "wrote manifest");
    println!("created {}", target.display());
    Ok(())
}

fn handle_show(path: &Path) -> Result<()> {
    let descriptor = load_manifest(path)?;
    let json = serde_json::to_string_pretty(&descriptor.context())?;
    println!("{json}");
    Ok(())
}

fn handle_compat(path: &Path, mode: VersionBound) -> Result<()> {
    let descriptor = load_manifest(path)?;
    match descriptor.compatibility_version(mode) {
        Some(ver) => println!("{ver}"),
        None => debug!(%mode, "no <ver> entries declared"),
    }
    Ok(())
}

fn handle_format(path: &Path) -> Result<()> {
    let descriptor = load_manifest(path)?;
    println!("{}", descriptor.detect_format());
    Ok(())
}

fn handle_namespace(path: &Path) -> Result<()> {
    let descriptor = load_manifest(path)?;
    println!("{}", descriptor.namespace()?);
    Ok(())
}

fn handle_config(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Validate { file } => {
            let cfg = load_config(&file)?;
            cfg.validate()?;
            println!("configuration OK: {}", file.display());
        }
        ConfigCommands::Example => {
            println!("{}", include_str!("../../../config/extkit.example.toml"));
        }
    }
    Ok(())
}

fn load_manifest(path: &Path) -> Result<ExtensionDescriptor> {
    ExtensionDescriptor::load(path)
        .with_context(|| format!("failed to load manifest {}", path.display()))
}

fn load_config(path: &Path) -> Result<ScaffoldConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let expanded = interpolate_env(&raw)?;
    let cfg = toml::from_str::<ScaffoldConfig>(&expanded)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(cfg)
}

fn interpolate_env(input: &str) -> Result<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let regex = RE.get_or_init(|| Regex::new(r"\$\{([A-Z0-9_]+)(?::([^}]+))?\}").unwrap());
    let result = regex.replace_all(input, |caps: &regex::Captures| {
        let key = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(key).unwrap_or_else(|_| default.to_string())
    });
    Ok(result.into_owned())
}

fn default_main_file(key: &str) -> Result<String> {
    match key.rsplit('.').next().filter(|segment| !segment.is_empty()) {
        Some(segment) => Ok(segment.to_string()),
        None => bail!("cannot derive a main file name from key `{key}`; pass --file"),
    }
}

fn parse_bound(value: &str) -> Result<VersionBound, String> {
    value.parse().map_err(|err: extkit_core::DescriptorError| err.to_string())
}

fn parse_key_value(value: &str) -> Result<(String, String), String> {
    let Some((key, val)) = value.split_once('=') else {
        return Err(format!("expected KEY=VALUE, got `{value}`"));
    };
    let key = key.trim();
    if !is_valid_name(key) {
        return Err(format!("typeInfo key `{key}` is not a valid XML element name"));
    }
    Ok((key.to_string(), val.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_file_defaults_to_last_key_segment() {
        assert_eq!(default_main_file("org.example.myext").unwrap(), "myext");
        assert_eq!(default_main_file("myext").unwrap(), "myext");
        assert!(default_main_file("org.example.").is_err());
    }

    #[test]
    fn type_info_pairs_require_a_key() {
        assert_eq!(
            parse_key_value("weight=10").unwrap(),
            ("weight".to_string(), "10".to_string())
        );
        assert_eq!(
            parse_key_value("url=a=b").unwrap(),
            ("url".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("=10").is_err());
        assert!(parse_key_value("report url=a").is_err());
        assert!(parse_key_value("1st=a").is_err());
        assert!(Cli::try_parse_from(["extkit", "init", "org.example.x", "--type-info", "a b=c"]).is_err());
        assert!(parse_key_value("weight").is_err());
    }

    #[test]
    fn env_interpolation_uses_default_when_unset() {
        let out = interpolate_env("author = \"${EXTKIT_TEST_SURELY_UNSET:Jane}\"").unwrap();
        assert_eq!(out, "author = \"Jane\"");
    }

    #[test]
    fn bundled_example_config_is_valid() {
        let raw = include_str!("../../../config/extkit.example.toml");
        let cfg: ScaffoldConfig = toml::from_str(&interpolate_env(raw).unwrap()).unwrap();
        cfg.validate().unwrap();
    }

    #[test]
    fn cli_parses_compat_mode() {
        let cli = Cli::try_parse_from(["extkit", "compat", "--mode", "max"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Compat { mode: VersionBound::Max, .. }
        ));
        assert!(Cli::try_parse_from(["extkit", "compat", "--mode", "median"]).is_err());
    }
}
