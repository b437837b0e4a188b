//! Image generation providers.

#[cfg(feature = "clipdrop")]
mod clipdrop;
#[cfg(feature = "stability")]
mod stability;

#[cfg(feature = "clipdrop")]
pub use clipdrop::{ClipdropProvider, ClipdropProviderBuilder};

#[cfg(feature = "stability")]
pub use stability::{StabilityProvider, StabilityProviderBuilder};
