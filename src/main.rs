#![forbid(unsafe_code)]
#![cfg_attr(not(debug_assertions), deny(warnings))]
#![warn(clippy::all, rust_2018_idioms)]
#[macro_use]
extern crate log;

use cashmere::config::Config;
use cashmere::Proxy;
use clap::Parser;
use std::env;
use std::error::Error;
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

/// Logo to be printed when cashmere is run
const LOGO: &str = r"
                  _
   ___ __ _ ___ | |__  _ __ ___   ___ _ __ ___
  / __/ _` / __|| '_ \| '_ ` _ \ / _ \ '__/ _ \
 | (_| (_| \__ \| | | | | | | | |  __/ | |  __/
  \___\__,_|___/|_| |_|_| |_| |_|\___|_|  \___|

 A SOCKS4/SOCKS4a/SOCKS5 proxy server written in Rust
";

#[derive(Parser, Debug)]
#[clap(version)]
struct Opt {
    /// Path to the TOML configuration file
    config: PathBuf,

    /// Write logs to this file instead of stderr
    #[clap(long)]
    logfile: Option<PathBuf>,

    /// Log verbosity level. -vv for more verbosity.
    /// Environment variable `RUST_LOG` overrides this setting!
    #[clap(short, parse(from_occurrences))]
    verbosity: u8,

    /// Do not output any logs (even errors!). Overrides `RUST_LOG`
    #[clap(short)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    println!("{}", LOGO);

    let opt = Opt::parse();

    // Setup logging
    let log_env = env::var("RUST_LOG");
    if log_env.is_err() {
        let level = match opt.verbosity {
            1 => "cashmere=DEBUG",
            2 => "cashmere=TRACE",
            _ => "cashmere=INFO",
        };
        env::set_var("RUST_LOG", level);
    }

    if !opt.quiet {
        match &opt.logfile {
            Some(path) => {
                let logfile = File::create(path).unwrap_or_else(|e| {
                    eprintln!("Can't open logfile {:?}: {}", path, e);
                    std::process::exit(1);
                });
                let mut builder = pretty_env_logger::formatted_timed_builder();
                if let Ok(filters) = env::var("RUST_LOG") {
                    builder.parse_filters(&filters);
                }
                builder
                    .target(pretty_env_logger::env_logger::Target::Pipe(Box::new(
                        logfile,
                    )))
                    .init();
            }
            None => pretty_env_logger::init_timed(),
        }
    }

    if log_env.is_ok() && (opt.verbosity != 0) {
        warn!(
            "Log level is overriden by environmental variable to `{}`",
            // It's safe to unwrap() because we checked for is_ok() before
            log_env.unwrap().as_str()
        );
    }

    let config = Config::from_path(&opt.config).unwrap_or_else(|e| {
        error!("Invalid configuration {:?}: {}", &opt.config, e);
        std::process::exit(1);
    });

    let proxy = Proxy::from_config(&config).unwrap_or_else(|e| {
        error!("Invalid configuration {:?}: {}", &opt.config, e);
        std::process::exit(1);
    });

    ctrlc::set_handler(move || {
        println!("received Ctrl+C!");
        std::process::exit(0);
    })
    .expect("Error setting Ctrl-C handler");

    let timeout = config.transport.timeout.map(Duration::from_secs);
    proxy
        .serve(&config.transport.host, config.transport.port, timeout)
        .await?;

    Ok(())
}
