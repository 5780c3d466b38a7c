// SPDX-License-Identifier: MIT

//! gcluster-wire: control-socket envelope types and newline-delimited JSON
//! framing.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

mod codec;
mod message;

pub use codec::{decode, encode, read_line, read_message, write_message, ProtocolError, MAX_LINE_BYTES};
pub use message::{
    ApplyRequest, ApplyResponse, Message, ShutdownNotice, SteerEditPrompt, SteerInject,
    SteerState, SteerSubscribe,
};
