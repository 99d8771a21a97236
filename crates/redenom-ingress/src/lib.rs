//! # redenom-ingress
//!
//! **Transport-facing edge of the market core.**
//!
//! Every participant message arrives as `{kind, payload, senderConnectionId}`.
//! Ingress turns it into a typed [`Action`], binds connections to
//! participants through [`Identity`], routes the action to the engine of
//! the simulation's mechanism and wraps the outcome into a
//! [`Response`](redenom_types::Response).
//!
//! ## Flow
//!
//! ```text
//! Envelope -> Action -> mechanism check -> engine -> Response {status, message, data}
//! ```

pub mod action;
pub mod dispatcher;
pub mod identity;

pub use action::{Action, Envelope};
pub use dispatcher::Dispatcher;
pub use identity::Identity;
