//! The DAP wire layer: framing, envelopes and the full-duplex client.

pub mod client;
pub mod codec;
pub mod protocol;

pub use client::{ClientNotification, DapClient, EventWaiter, Subscription};
pub use codec::{FrameDecoder, encode};
