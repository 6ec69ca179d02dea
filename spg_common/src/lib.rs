mod money;

pub mod helpers;
mod secret;

pub use money::{Cents, CentsConversionError, CURRENCY_CODE, CURRENCY_CODE_LOWER};
pub use secret::Secret;
