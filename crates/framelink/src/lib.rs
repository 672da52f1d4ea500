//! Paced frame chunking and adaptive decoding for one-way optical links.
//!
//! framelink turns an outgoing byte or record stream into a paced sequence
//! of frame-sized units, and turns captured frames back into the stream,
//! keeping link-quality statistics along the way. The visual codec itself
//! sits outside this crate.
//!
//! # Crate Structure
//!
//! - [`runloop`]: suspendable, self-pacing control loops
//! - [`token`]: delimiter-bounded token reading over files and pipes
//! - [`schema`]: JSON Schema registry for message payloads
//! - [`transport`]: unit sender/receiver contracts and the segment transport
//! - [`chunk`]: binary and message chunkers (Stream and Lake modes)
//! - [`decode`]: adaptive threshold search and the link-quality tracker

/// Re-export loop types.
pub mod runloop {
    pub use framelink_loop::*;
}

/// Re-export token reader types.
pub mod token {
    pub use framelink_token::*;
}

/// Re-export schema registry types.
pub mod schema {
    pub use framelink_schema::*;
}

/// Re-export transport types.
pub mod transport {
    pub use framelink_transport::*;
}

/// Re-export chunker types.
pub mod chunk {
    pub use framelink_chunk::*;
}

/// Re-export decoder types.
pub mod decode {
    pub use framelink_decode::*;
}
