mod helpers;
mod money;

pub mod op;
mod secret;

pub use helpers::{parse_boolean_flag, parse_env_flag, parse_env_seconds};
pub use money::{
    currency_exponent,
    from_minor_units,
    to_minor_units,
    MinorUnits,
    MoneyConversionError,
    DEFAULT_CURRENCY_CODE,
};
pub use secret::Secret;
