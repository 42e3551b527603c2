mod client;
mod key;
mod token;

pub use client::*;
pub use key::*;
pub use token::*;
