//! Content validation.
//!
//! Validators decide whether a submission's content is acceptable. The
//! processor only sees the [`ContentValidator`] trait, so rule sets can be
//! swapped without touching the state machine.

mod rules;
mod traits;

pub use rules::ContentRules;
pub use traits::{ContentValidator, ValidationError};
