//! # System Module
//!
//! Wizard stage definitions and the progress readout.
//!
//! Stage ordering is pure data; the transitions themselves live in
//! [`crate::wizard`].

mod stage;

pub use stage::*;
