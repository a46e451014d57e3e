//! Controller flows wiring validation, authorization and persistence.

mod outcome;
mod users;

pub use outcome::{ControllerError, ControllerOutcome};
pub use users::{StoreUserRequest, UpdateUserRequest, UserController};
