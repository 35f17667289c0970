mod identity;
mod profile;

pub use identity::Identity;
pub use profile::{Placeholder, Profile, decode, encode, PLACEHOLDER_VALUE};
