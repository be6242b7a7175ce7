//! Transport Module
//!
//! Framing and the Unix socket listener. The HTTP transport lives in
//! [`crate::api`].

pub mod frame;
pub mod socket;

pub use frame::{read_frame, write_frame, MAX_FRAME_LEN};
pub use socket::SocketServer;
