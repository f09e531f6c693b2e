//! NLIP message protocol: envelope type and wire codec.

pub mod codec;
pub mod envelope;

pub use codec::{decode, encode, DecodeError};
pub use envelope::{Envelope, Format};
