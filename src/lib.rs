use cli::{Cli, Command, RulesArgs, ServeArgs};
use config::Config;
use redirect::RedirectEngine;
use redirect_handler::RedirectService;
use server::Server;
use tracing::info;

pub mod cli;
pub mod config;
mod headers;
mod multi_map;
pub mod redirect;
mod redirect_handler;
mod request;
mod response_writer;
mod server;
mod status_code_registry;
mod stream_reader;
pub mod telemetry;
#[cfg(test)]
mod test_utils;

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => serve(&args),
        Command::Check(args) => {
            for line in check(&args)? {
                println!("{}", line);
            }
            Ok(())
        }
    }
}

fn serve(args: &ServeArgs) -> anyhow::Result<()> {
    let config = args.to_config();
    let engine = config.load_engine()?;
    let telemetry = config.telemetry.build()?;

    let server = Server::new(&args.addr)?;
    info!("listening on {}", server.local_addr()?);
    server.run(RedirectService::new(engine, telemetry));
    Ok(())
}

/// One line per rule, in evaluation order.
fn check(args: &RulesArgs) -> anyhow::Result<Vec<String>> {
    let engine = Config::new(&args.config).load_engine()?;
    Ok(describe(&engine))
}

fn describe(engine: &RedirectEngine) -> Vec<String> {
    engine
        .rules()
        .iter()
        .map(|rule| {
            let source = rule.source();
            let mut line = format!("{} -> {} ({})", rule.from(), source.to, rule.status());
            if !source.query.is_empty() {
                let query = source
                    .query
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join("&");
                line = format!("{} [{}]", line, query);
            }
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::cli::RulesArgs;

    use super::check;

    #[test]
    fn test_check_example_rules() {
        let args = RulesArgs {
            config: PathBuf::from("assets/redirects.example.yml"),
        };
        let lines = check(&args).unwrap();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "/me -> https://github.com/ThewBear (308)");
        assert_eq!(
            lines[2],
            "/google -> https://google.com/search?q=:q (307) [action=search&q=:q]"
        );
    }
}
