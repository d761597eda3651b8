//! Domain models for response evaluation.
//!
//! - `Response`: recorded or predicted answer and its string codec
//! - `Item`: stimulus handed to a model
//! - `TrainingRecord` / `ResultRow`: records flowing in and out of models
//! - `EvalError`: error taxonomy

pub mod error;
pub mod item;
pub mod record;
pub mod response;

pub use error::{DecodeError, EvalError, Result};
pub use item::Item;
pub use record::{Demographics, Optionals, ResultRow, TrainingRecord};
pub use response::{Response, MULTIPLE_CHOICE};
