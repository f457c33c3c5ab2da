// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Storage CLI subcommands: list, versions, check, delete.

use crate::cli::{storage_exit_code, EXIT_OK, EXIT_USER_ERROR};
use crate::models::{satisfies, ModelStore, SemVer, StoreError, VersionRange};

/// Run `list [prefix]`, printing one stored key per line.
pub async fn run_list(store: &ModelStore, prefix: &str) -> i32 {
    match store.backend().list(prefix).await {
        Ok(keys) => {
            if keys.is_empty() {
                println!("No stored objects under '{}'.", prefix);
            }
            for key in keys {
                println!("{}", key);
            }
            EXIT_OK
        }
        Err(e) => storage_exit_code(&e),
    }
}

/// Run `versions <name>`, printing stored versions ascending.
pub async fn run_versions(store: &ModelStore, name: &str) -> i32 {
    match store.stored_versions(name).await {
        Ok(versions) => {
            if versions.is_empty() {
                println!("No stored versions of '{}'.", name);
            }
            for v in versions {
                println!("{}", v);
            }
            EXIT_OK
        }
        Err(e) => store_exit_code(&e),
    }
}

/// Run `check <version> <range>`. Exit code 0 if the version satisfies
/// the range, 1 if it does not or either argument is malformed.
pub fn run_check(version: &str, range: &str) -> i32 {
    let version = match SemVer::parse(version) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_USER_ERROR;
        }
    };
    let range = match VersionRange::parse(range) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_USER_ERROR;
        }
    };

    if satisfies(&version, &range) {
        println!("{} satisfies {}", version, range);
        EXIT_OK
    } else {
        println!("{} does not satisfy {}", version, range);
        EXIT_USER_ERROR
    }
}

/// Run `delete <name> <version>`.
pub async fn run_delete(store: &ModelStore, name: &str, version: &str) -> i32 {
    let version = match SemVer::parse(version) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_USER_ERROR;
        }
    };
    match store.delete(name, &version).await {
        Ok(()) => {
            println!("Deleted {}/{}", name, version);
            EXIT_OK
        }
        Err(e) => store_exit_code(&e),
    }
}

fn store_exit_code(err: &StoreError) -> i32 {
    match err {
        StoreError::Storage(e) => storage_exit_code(e),
        other => {
            eprintln!("Error: {}", other);
            EXIT_USER_ERROR
        }
    }
}
