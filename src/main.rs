use clap::{value_parser, Arg, ArgMatches, Command};
use std::env;
use std::process;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mcp_doctools::mcp::server::McpServer;
use mcp_doctools::mcp::types::CallToolParams;
use mcp_doctools::utils::fetch::{FetchConfig, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MAX_BODY_BYTES};

const TIMEOUT_ENV: &str = "DOCTOOLS_FETCH_TIMEOUT_SECS";
const MAX_BYTES_ENV: &str = "DOCTOOLS_MAX_PDF_BYTES";

fn cli() -> Command {
    Command::new("mcp-doctools")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A Model Context Protocol server with PDF reading and text analysis tools")
        .long_about(
            "This MCP server provides the following tools:\n\
            - pdf_reader: Download a PDF from a URL and extract its text page by page\n\
            - text_analyzer: Count words, characters and sentences, average word length \
            and most common words\n\n\
            Without a subcommand the server speaks JSON-RPC on stdin/stdout.",
        )
        .arg(
            Arg::new("fetch-timeout-secs")
                .long("fetch-timeout-secs")
                .value_name("SECS")
                .help("Timeout for downloading a PDF, in seconds (env: DOCTOOLS_FETCH_TIMEOUT_SECS)")
                .value_parser(value_parser!(u64).range(1..))
                .global(true),
        )
        .arg(
            Arg::new("max-pdf-bytes")
                .long("max-pdf-bytes")
                .value_name("BYTES")
                .help("Largest PDF body accepted, in bytes (env: DOCTOOLS_MAX_PDF_BYTES)")
                .value_parser(value_parser!(u64).range(1..))
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .help("Only log errors")
                .action(clap::ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(Command::new("serve").about("Run the MCP server on stdio (default)"))
        .subcommand(
            Command::new("read-pdf")
                .about("Download a PDF and print its text")
                .arg(
                    Arg::new("url")
                        .long("url")
                        .value_name("URL")
                        .help("The full URL of the PDF")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("analyze")
                .about("Print statistics for a text")
                .arg(
                    Arg::new("type")
                        .long("type")
                        .value_name("ANALYSIS")
                        .help("word_count, char_count, sentence_count, avg_word_length, most_common_words or all")
                        .default_value("all"),
                )
                .arg(
                    Arg::new("text")
                        .long("text")
                        .value_name("TEXT")
                        .help("Text to analyze")
                        .required(true),
                ),
        )
}

/// Reads a positive integer from the environment, ignoring unset values.
fn env_u64(name: &str) -> anyhow::Result<Option<u64>> {
    match env::var(name) {
        Ok(raw) => {
            let value: u64 = raw
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("{} must be a positive integer: {}", name, e))?;
            if value == 0 {
                anyhow::bail!("{} must be greater than zero", name);
            }
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}

/// Command line first, then environment, then built-in defaults.
fn fetch_config_from(matches: &ArgMatches) -> anyhow::Result<FetchConfig> {
    let timeout_secs = match matches.get_one::<u64>("fetch-timeout-secs") {
        Some(secs) => *secs,
        None => env_u64(TIMEOUT_ENV)?.unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
    };
    let max_bytes = match matches.get_one::<u64>("max-pdf-bytes") {
        Some(bytes) => *bytes,
        None => env_u64(MAX_BYTES_ENV)?.unwrap_or(DEFAULT_MAX_BODY_BYTES),
    };

    Ok(FetchConfig::new(Duration::from_secs(timeout_secs)).with_max_body_bytes(max_bytes))
}

fn init_tracing(quiet: bool) {
    // stderr only: stdout is reserved for JSON-RPC and tool output
    let default_level = if quiet { "error" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs a single tool call and prints its text. Returns the exit code.
async fn run_once(server: &McpServer, params: CallToolParams) -> i32 {
    let result = server.execute_tool(params).await;
    println!("{}", result.text());
    if result.is_error == Some(true) {
        1
    } else {
        0
    }
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();

    init_tracing(matches.get_flag("quiet"));

    let fetch_config = match fetch_config_from(&matches) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(2);
        }
    };
    info!(
        timeout_secs = fetch_config.timeout.as_secs(),
        max_pdf_bytes = fetch_config.max_body_bytes,
        "Fetch configuration resolved"
    );

    let mut server = McpServer::new(fetch_config);

    let code = match matches.subcommand() {
        Some(("read-pdf", sub)) => {
            let url = sub.get_one::<String>("url").cloned().unwrap_or_default();
            run_once(
                &server,
                CallToolParams {
                    name: "pdf_reader".to_string(),
                    arguments: Some(serde_json::json!({ "url": url })),
                },
            )
            .await
        }
        Some(("analyze", sub)) => {
            let text = sub.get_one::<String>("text").cloned().unwrap_or_default();
            let analysis_type = sub
                .get_one::<String>("type")
                .cloned()
                .unwrap_or_else(|| "all".to_string());
            run_once(
                &server,
                CallToolParams {
                    name: "text_analyzer".to_string(),
                    arguments: Some(serde_json::json!({
                        "text": text,
                        "analysis_type": analysis_type
                    })),
                },
            )
            .await
        }
        _ => {
            info!("Starting MCP server...");
            match server.start().await {
                Ok(()) => 0,
                Err(e) => {
                    error!("Failed to start server: {}", e);
                    1
                }
            }
        }
    };

    process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let matches = cli()
            .try_get_matches_from([
                "mcp-doctools",
                "--fetch-timeout-secs",
                "7",
                "--max-pdf-bytes",
                "1024",
                "serve",
            ])
            .expect("valid args");
        let config = fetch_config_from(&matches).expect("config");
        assert_eq!(config.timeout, Duration::from_secs(7));
        assert_eq!(config.max_body_bytes, 1024);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(cli()
            .try_get_matches_from(["mcp-doctools", "--fetch-timeout-secs", "0"])
            .is_err());
    }

    #[test]
    fn analyze_subcommand_defaults_to_all() {
        let matches = cli()
            .try_get_matches_from(["mcp-doctools", "analyze", "--text", "hi"])
            .expect("valid args");
        let (name, sub) = matches.subcommand().expect("subcommand");
        assert_eq!(name, "analyze");
        assert_eq!(sub.get_one::<String>("type").map(String::as_str), Some("all"));
    }
}
