//! Channel registry for Latchkey.
//!
//! Maps each user to the channels they currently have open (one per
//! browser tab, say) and delivers messages to all of them.
//!
//! # Ownership
//!
//! ```text
//! connection task ──owns──→ socket + Outbox
//!        │
//!        └─registers─→ ConnectionRegistry ──holds──→ ChannelHandle (mpsc::Sender)
//!                                 ↑
//! application code ──send_to_user─┘
//! ```
//!
//! The registry never touches a socket. A [`ChannelHandle`] is the sending
//! half of a bounded queue; the connection task drains it and does the
//! actual writes. Delivery is therefore a non-blocking `try_send`, and a
//! slow peer can only fill its own queue. Closing a handle is signalled
//! outside that queue, so a full queue never hides it.

mod config;
mod error;
mod handle;
mod registry;

pub use config::{DeliveryPolicy, RegistryConfig};
pub use error::RegistryError;
pub use handle::{ChannelHandle, Outbound, Outbox};
pub use registry::ConnectionRegistry;
