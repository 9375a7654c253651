//! Line Protocol
//!
//! Shared by both peers: the link client frames commands and decodes replies,
//! the device runtime decodes commands and frames replies.
//!
//! ## Modules
//!
//! - [`codec`] - Newline framing and incremental reassembly
//! - [`messages`] - Typed commands, responses, and rejection reasons

pub mod codec;
pub mod messages;

pub use codec::{decode, encode, CodecError, LineDecoder, LINE_TERMINATOR, MAX_LINE_LEN};
pub use messages::{Command, DeviceResponse, Field, ProtocolError, Response};
