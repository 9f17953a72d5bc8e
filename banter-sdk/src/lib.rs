//! Client SDK for the banter chat protocol.
//!
//! The SDK owns the single persistent WebSocket connection to one chat
//! server and everything that rides on it: the typed JSON message taxonomy,
//! the login handshake and bearer-token lifecycle, and the listener-based
//! dispatch that decouples the network layer from the UI layer.
//!
//! ## Wiring
//!
//! Consumers build an [`bus::EventBus`], a [`transport::Transport`] on top
//! of it, and a [`session::Session`] that installs its listeners on the bus.
//! All listeners are registered before the receive loop starts; the UI
//! collaborator is attached later, once the terminal is set up.
//!
//! ## Reconnection
//!
//! Connection loss is never fatal: the session's disconnect listener waits a
//! fixed five seconds, redials until the server answers, and logs in again
//! for a fresh token. A malformed frame on an established connection is the
//! one fatal error — the stream contract is broken and the receive loop
//! returns, which callers treat as unrecoverable.

pub mod bus;
pub mod clock;
pub mod error;
pub mod handoff;
pub mod message;
pub mod session;
pub mod transport;

pub use bus::EventBus;
pub use clock::{Clock, SystemClock};
pub use error::{ProtoError, SessionError, TransportError};
pub use handoff::Handoff;
pub use message::{Envelope, MsgType, Status};
pub use session::{ChatUi, LinkState, NicknamePrompt, Session};
pub use transport::{RETRY_DELAY, ServerLink, Transport};
