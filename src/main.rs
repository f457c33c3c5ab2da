// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Vesta storage maintenance CLI.
//!
//! ## CLI Subcommands
//!
//! - `vesta-cli list [prefix]` - List stored keys
//! - `vesta-cli versions <name>` - Stored versions of a model
//! - `vesta-cli check <version> <range>` - Test a version against a range
//! - `vesta-cli delete <name> <version>` - Remove stored bytes
//! - `vesta-cli config show|defaults|validate`

use std::process::ExitCode;
use std::sync::Arc;

use vesta::cli::{self, config_cmd, EXIT_USER_ERROR};
use vesta::config::{self as vesta_config, EnvConfig};
use vesta::models::{ModelStore, Registry};
use vesta::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    let mut args: Vec<String> = std::env::args().collect();

    let config = match take_config_arg(&mut args) {
        Ok(Some(path)) => match vesta_config::load_file(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(EXIT_USER_ERROR as u8);
            }
        },
        Ok(None) => vesta_config::load(),
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return ExitCode::from(EXIT_USER_ERROR as u8);
        }
    };

    if let Err(e) = telemetry::init_logging(&config.log_config()) {
        eprintln!("Warning: logging disabled: {}", e);
    }
    telemetry::init_metrics();

    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");
    let code = match command {
        "list" => {
            let prefix = args.get(2).map(|s| s.as_str()).unwrap_or("");
            with_store(&config, |store| async move { cli::run_list(&store, prefix).await }).await
        }
        "versions" => match args.get(2) {
            Some(name) => {
                with_store(&config, |store| async move { cli::run_versions(&store, name).await })
                    .await
            }
            None => usage_error("versions"),
        },
        "check" => match (args.get(2), args.get(3)) {
            (Some(version), Some(range)) => cli::run_check(version, range),
            _ => usage_error("check"),
        },
        "delete" => match (args.get(2), args.get(3)) {
            (Some(name), Some(version)) => {
                with_store(&config, |store| async move {
                    cli::run_delete(&store, name, version).await
                })
                .await
            }
            _ => usage_error("delete"),
        },
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    let json = args.get(3).map(|s| s.as_str()) == Some("--json");
                    config_cmd::run_show(&config, json)
                }
                "defaults" => {
                    config_cmd::run_defaults();
                    cli::EXIT_OK
                }
                "validate" => config_cmd::run_validate(&config),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    usage_error("config")
                }
            }
        }
        "help" | "--help" | "-h" => {
            print_usage();
            cli::EXIT_OK
        }
        "version" | "--version" | "-V" => {
            println!("vesta-cli {}", env!("CARGO_PKG_VERSION"));
            cli::EXIT_OK
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            EXIT_USER_ERROR
        }
    };

    ExitCode::from(code as u8)
}

/// Remove `--config PATH` from `args`, returning the path if present.
fn take_config_arg(args: &mut Vec<String>) -> Result<Option<String>, String> {
    let Some(pos) = args.iter().position(|a| a == "--config") else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        return Err("--config requires a path".to_string());
    }
    let path = args.remove(pos + 1);
    args.remove(pos);
    Ok(Some(path))
}

async fn with_store<F, Fut>(config: &EnvConfig, run: F) -> i32
where
    F: FnOnce(ModelStore) -> Fut,
    Fut: std::future::Future<Output = i32>,
{
    match config.storage.build().await {
        Ok(backend) => run(ModelStore::new(Arc::new(Registry::new()), backend)).await,
        Err(e) => cli::storage_exit_code(&e),
    }
}

fn usage_error(command: &str) -> i32 {
    eprintln!("Missing arguments for '{}'.", command);
    print_usage();
    EXIT_USER_ERROR
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "vesta-cli - model storage maintenance v{}

USAGE:
    vesta-cli [--config PATH] <COMMAND> [ARGS]

COMMANDS:
    list [prefix]             List stored keys
    versions <name>           List stored versions of a model
    check <version> <range>   Exit 0 if version satisfies range
    delete <name> <version>   Delete the stored bytes of one version
    config show [--json]      Show effective configuration
    config defaults           Show default configuration
    config validate           Validate configuration
    version                   Show version information
    help                      Show this help message

EXIT CODES:
    0  success
    1  usage error, malformed input or missing key
    3  storage unavailable

ENVIRONMENT:
    VESTA_ROOT, VESTA_BACKEND, VESTA_NETWORK_TIMEOUT_MS,
    VESTA_OBJECT_URL, VESTA_OBJECT_ENDPOINT, VESTA_OBJECT_TOKEN,
    VESTA_OBJECT_TIMEOUT_MS, VESTA_RELOAD_INTERVAL_SECS, VESTA_LITE_PREFIX,
    VESTA_LITE_SECRET, VESTA_LOG_FORMAT, VESTA_LOG_LEVEL",
        version
    );
}
