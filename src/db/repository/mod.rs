//! Plain record reads/writes for the screening schema.
//!
//! No business logic lives here — session status transitions belong to
//! `pipeline::state`, batch selection to `pipeline::selector`.

pub mod article;
pub mod file;
pub mod session;
pub mod settings;

pub use article::*;
pub use file::*;
pub use session::*;
pub use settings::*;
