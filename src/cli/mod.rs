// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommands for inspecting and maintaining model storage.
//!
//! ## Usage
//!
//! ```bash
//! vesta-cli list [prefix]          # List stored keys
//! vesta-cli versions <name>        # Stored versions of a model
//! vesta-cli check <version> <range>
//! vesta-cli delete <name> <version>
//! vesta-cli config show|defaults|validate
//! ```
//!
//! Every command returns a process exit code: 0 on success, 1 on a user
//! error, 3 when storage is unreachable.

pub mod config_cmd;
pub mod store_cmd;

pub use store_cmd::{run_check, run_delete, run_list, run_versions};

use crate::storage::StorageError;

pub const EXIT_OK: i32 = 0;
pub const EXIT_USER_ERROR: i32 = 1;
pub const EXIT_UNAVAILABLE: i32 = 3;

/// Map a storage failure to an exit code, reporting it on stderr.
pub fn storage_exit_code(err: &StorageError) -> i32 {
    eprintln!("Error: {}", err);
    if err.is_retryable() {
        eprintln!("Is the storage backend reachable? Check VESTA_BACKEND and VESTA_ROOT.");
        EXIT_UNAVAILABLE
    } else {
        EXIT_USER_ERROR
    }
}
