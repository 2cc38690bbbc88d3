// SPDX-License-Identifier: GPL-3.0-only

//! Capture and post-processing pipelines
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ V4L2 + ALSA  │ ──▶ │  Capture Session  │ ──▶ │  <base>.ts   │
//! │   devices    │     │  - Encoder        │     │  + preview   │
//! │              │     │  - Preview fan-out│     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//!
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │  <base>.ts   │ ──▶ │  Post-processing  │ ──▶ │  <base>.mkv  │
//! │              │     │  - Remux          │     │              │
//! │              │     │  - Optional trim  │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! - [`capture`]: live capture with preview
//! - [`post`]: remux into the final container and trimming

pub mod capture;
pub mod post;
