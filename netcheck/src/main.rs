//! Netcheck CLI Application
//!
//! A command-line network debugging tool: probe a remote TCP port, list the
//! sockets listening on this host, or look up a domain over RDAP and WHOIS.
//! This CLI application is a thin layer over the netcheck-lib library.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{ArgGroup, CommandFactory, Parser};
use netcheck_lib::{
    load_config, local_listeners, parse_duration_string, probe, DomainResolver, LookupMethod,
    NetCheckConfig,
};
use std::path::PathBuf;
use std::process;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for netcheck
#[derive(Parser, Debug)]
#[command(name = "netcheck")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check remote ports, list local listeners, and look up domains")]
#[command(
    long_about = "Network debugging tool.\n\nProbe a remote TCP port, list the sockets listening on this host, or look up a domain's registration data over RDAP with WHOIS fallback."
)]
#[command(styles = STYLES)]
#[command(group(ArgGroup::new("mode").args(["remote", "local", "domain"])))]
pub struct Args {
    /// Check if a remote TCP port is open
    #[arg(short = 'r', long = "remote", value_name = "HOST:PORT", help_heading = "Mode")]
    pub remote: Option<String>,

    /// List local listening ports
    #[arg(short = 'l', long = "local", help_heading = "Mode")]
    pub local: bool,

    /// Look up domain registration data
    #[arg(short = 'd', long = "domain", value_name = "DOMAIN", help_heading = "Mode")]
    pub domain: Option<String>,

    /// Use RDAP only
    #[arg(
        long = "rdap",
        requires = "domain",
        conflicts_with = "whois",
        help_heading = "Domain Lookup"
    )]
    pub rdap: bool,

    /// Use WHOIS only
    #[arg(long = "whois", requires = "domain", help_heading = "Domain Lookup")]
    pub whois: bool,

    /// Network timeout (e.g. 5s, 1m; default: 3s)
    #[arg(short = 't', long = "timeout", value_name = "DURATION", help_heading = "Network")]
    pub timeout: Option<String>,

    /// Output results in JSON format
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,

    /// Show debug logging
    #[arg(long = "debug", help_heading = "Configuration")]
    pub debug: bool,
}

/// The operation requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Remote(String),
    Local,
    Domain(String),
}

impl Mode {
    fn from_args(args: &Args) -> Option<Self> {
        if let Some(address) = &args.remote {
            Some(Mode::Remote(address.clone()))
        } else if args.local {
            Some(Mode::Local)
        } else {
            args.domain.clone().map(Mode::Domain)
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&args);

    let Some(mode) = Mode::from_args(&args) else {
        ui::print_usage();
        let _ = Args::command().print_help();
        return;
    };

    info!(
        "Netcheck CLI v{} starting (netcheck-lib v{})",
        env!("CARGO_PKG_VERSION"),
        netcheck_lib::VERSION
    );

    if let Err(e) = run(mode, &args).await {
        ui::print_error(&*e);
        process::exit(1);
    }
}

/// Install the stderr log subscriber.
///
/// `--debug` and `--verbose` win over `RUST_LOG`; without either, `RUST_LOG`
/// applies and falls back to warnings only.
fn init_logging(args: &Args) {
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else if args.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run(mode: Mode, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(args)?;
    debug!(?config, "Effective configuration");

    match mode {
        Mode::Remote(address) => {
            // A classified result is success whatever the port state.
            let result = probe(&address, config.timeout).await;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                ui::print_port_check_result(&result);
            }
        }
        Mode::Local => {
            let listeners = local_listeners(&config).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&listeners)?);
            } else {
                ui::print_listening_ports(&listeners);
            }
        }
        Mode::Domain(domain) => {
            let resolver = DomainResolver::from_config(&config)?;
            let lookup = resolver.lookup(&domain).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&lookup)?);
            } else {
                ui::print_domain_lookup(&lookup)?;
            }
        }
    }

    Ok(())
}

/// Build the effective configuration: defaults, config files, `NETCHECK_*`
/// environment variables, then CLI arguments (highest precedence).
fn build_config(args: &Args) -> Result<NetCheckConfig, Box<dyn std::error::Error>> {
    let config = load_config(args.config.as_deref())?;
    apply_cli_args_to_config(config, args)
}

fn apply_cli_args_to_config(
    mut config: NetCheckConfig,
    args: &Args,
) -> Result<NetCheckConfig, Box<dyn std::error::Error>> {
    if let Some(timeout_str) = &args.timeout {
        config.timeout = match parse_duration_string(timeout_str) {
            Some(timeout) if !timeout.is_zero() => timeout,
            _ => {
                return Err(format!(
                    "Invalid timeout '{}'. Use format like '5s', '30s', '2m'",
                    timeout_str
                )
                .into())
            }
        };
    }

    if args.rdap {
        config.lookup_method = LookupMethod::Rdap;
    } else if args.whois {
        config.lookup_method = LookupMethod::Whois;
    }

    Ok(config)
}
