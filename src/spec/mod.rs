//! Spec layer: the ability document schema + parser + validator.
//!
//! This module is intentionally separate from graph synthesis and asset
//! mutation. It owns:
//! - the pure schema model (AbilitySpec and friends)
//! - the JSON parser (structural checks, strict mode, duplicate ids)
//! - the semantic validator (registry resolution, cycles, shapes)

pub mod model;
pub mod parse;
pub mod validate;

pub use model::{AbilitySpec, EffectKind, EffectSpec, Magnitude, Scalar, TagSets};
pub use parse::{ParseError, parse};
pub use validate::{ValidationError, validate};
