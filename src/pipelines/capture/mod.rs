// SPDX-License-Identifier: GPL-3.0-only

//! Live capture: encoder command construction, the preview fan-out and the
//! session supervisor

pub mod channel;
pub mod command;
pub mod session;

pub use command::{Invocation, build_capture_args, preview_args};
pub use session::{CaptureSummary, Session, SessionPlan, SessionState, run_session};
