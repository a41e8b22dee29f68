use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{config::Config, telemetry::TelemetryConfig};

#[derive(Parser, Debug)]
#[command(version, about = "Redirects short paths according to a YAML rule file")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile the rules and serve redirects over HTTP.
    Serve(ServeArgs),
    /// Compile the rules and print them in evaluation order.
    Check(RulesArgs),
}

#[derive(Args, Debug)]
pub struct RulesArgs {
    /// Rule file.
    #[arg(short, long, default_value = "redirects.yml")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub rules: RulesArgs,

    #[arg(short, long, default_value = "127.0.0.1:4221")]
    pub addr: String,

    /// Page sent with 404 responses. A built-in page is used when omitted.
    #[arg(long)]
    pub not_found: Option<PathBuf>,

    /// Enables event delivery when set.
    #[arg(long)]
    pub telemetry_key: Option<String>,

    #[arg(long)]
    pub telemetry_endpoint: Option<String>,
}

impl ServeArgs {
    pub fn to_config(&self) -> Config {
        let mut telemetry = TelemetryConfig::with_api_key(self.telemetry_key.clone());
        if let Some(endpoint) = &self.telemetry_endpoint {
            telemetry.endpoint = endpoint.clone();
        }
        Config {
            rules_path: self.rules.config.clone(),
            not_found_path: self.not_found.clone(),
            telemetry,
        }
    }
}
