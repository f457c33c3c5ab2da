// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.
//!
//! These commands read configuration directly from environment variables
//! (or the file named by `--config`) without touching storage.

use crate::cli::{EXIT_OK, EXIT_USER_ERROR};
use crate::config::{EffectiveConfig, EnvConfig};

/// Print effective config as key-value pairs to stdout, or JSON if `json`.
pub fn run_show(cfg: &EnvConfig, json: bool) -> i32 {
    let eff = cfg.effective_config();
    if json {
        match serde_json::to_string_pretty(&eff) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                return EXIT_USER_ERROR;
            }
        }
    } else {
        print_config(&eff);
    }
    EXIT_OK
}

/// Print default config values (no env overrides) to stdout.
pub fn run_defaults() {
    print_config(&EnvConfig::default().effective_config());
}

/// Validate configuration for misconfigurations that `load()` cannot
/// catch on its own.
///
/// Returns 0 if valid, 1 otherwise.
pub fn run_validate(cfg: &EnvConfig) -> i32 {
    match cfg.validate() {
        Ok(()) => {
            println!("Configuration is valid.");
            EXIT_OK
        }
        Err(e) => {
            eprintln!("WARNING: {}", e);
            EXIT_USER_ERROR
        }
    }
}

fn print_config(cfg: &EffectiveConfig) {
    println!("VESTA_ROOT={}", cfg.root);
    println!("VESTA_BACKEND={}", cfg.backend);
    println!("VESTA_NETWORK_TIMEOUT_MS={}", cfg.network_timeout_ms);
    println!("VESTA_OBJECT_URL={}", cfg.object_url);
    println!("VESTA_OBJECT_ENDPOINT={}", cfg.object_endpoint);
    println!("VESTA_OBJECT_TOKEN={}", if cfg.object_token_set { "<set>" } else { "" });
    println!("VESTA_OBJECT_TIMEOUT_MS={}", cfg.object_timeout_ms);
    println!("VESTA_RELOAD_INTERVAL_SECS={}", cfg.reload_interval_secs);
    println!("VESTA_LITE_PREFIX={}", cfg.lite_prefix);
    println!("VESTA_LITE_SECRET={}", if cfg.lite_secret_set { "<set>" } else { "" });
    println!("VESTA_LOG_FORMAT={}", cfg.log_format);
    println!("VESTA_LOG_LEVEL={}", cfg.log_level);
}
