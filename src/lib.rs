#[macro_use]
extern crate serde;

mod arith;
mod audit;
mod authn;
mod election;
mod elgamal;
mod encoding;
mod error;
mod mix;
mod nizk;
mod serde_hex;
mod tally;
mod util;
mod vote;

pub use arith::*;
pub use audit::*;
pub use authn::*;
pub use election::*;
pub use elgamal::*;
pub use encoding::*;
pub use error::*;
pub use mix::*;
pub use nizk::*;
pub use serde_hex::*;
pub use tally::*;
pub use util::*;
pub use vote::*;

#[cfg(test)]
mod tests;
