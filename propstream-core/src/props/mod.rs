//! Property Model
//!
//! Incoming component properties are dynamic: any key may carry plain data,
//! a stream, or a sink. This module turns a raw [`Props`] bag into a
//! [`PropertySet`] of classified records and diffs two such sets.
//!
//! Classification happens once per record per pass, in [`classify`]; the
//! rest of the crate only looks at the resulting [`Classification`].

mod classify;
mod diff;
mod record;
mod value;

pub use classify::{classify, resolve, Classification, Resolved};
pub use diff::{diff, Delta, Keys, Pass};
pub use record::{PropertyRecord, PropertySet};
pub use value::{PropObject, PropValue, Props};
