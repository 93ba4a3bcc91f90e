//! Slack Integration - Socket Mode bot interface
//!
//! This crate provides the Slack interface for grantbot:
//! - **Socket Mode** (`socket`) - WebSocket connection to Slack (no public URL needed)
//! - **Events** (`events`) - Channel messages, button clicks, modal submissions
//! - **Application Flow** (`flow`) - The apply / upload-proof / submit state machine
//! - **Block Kit** (`blocks`) - Rich message and modal builders
//! - **Web API** (`client`) - Outbound calls (messages, reactions, views)
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Enable Socket Mode and subscribe to `message.channels`
//! 3. Set env vars: `GRANTBOT_SLACK_BOT_TOKEN`, `GRANTBOT_SIGNING_SECRET`,
//!    `GRANTBOT_GRANTS_CHANNEL`
//!
//! # Architecture
//!
//! ```text
//! Slack Events → EventDispatcher → ApplicationFlow → Web API
//!                                        ↕
//!                                 Signed state token
//! ```
//!
//! Every interaction step carries the full application state inside a signed
//! token (button value, modal `private_metadata`, upload-form query string),
//! so no state lives in this process between events.

pub mod blocks;
pub mod client;
pub mod events;
pub mod flow;
pub mod socket;
