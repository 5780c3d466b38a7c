// SPDX-License-Identifier: MIT

//! gcluster-cli: client-side library shared by the `gcluster-master`,
//! `gcluster-apply`, and `gcluster-steer` binaries (spec §4.6, §6).

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod apply_file;
pub mod exit_error;
pub mod steer_client;

pub use apply_file::{load_apply_file, ApplyFileError};
pub use exit_error::ExitError;
pub use steer_client::{ClientError, SteerClient};
