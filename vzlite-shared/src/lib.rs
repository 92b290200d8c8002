//! Boundary types shared by the vzlite bridge and the native runtime glue.
//!
//! Everything in this crate is safe to pass across the foreign-function
//! boundary or to surface to consumers unchanged:
//! - [`Handle`]: opaque integer token naming a registered value
//! - [`VzError`] / [`VzResult`]: the error taxonomy of every public operation
//! - [`ForeignError`]: typed form of the runtime's native error object

pub mod errors;
pub mod handle;

pub use errors::{ForeignError, HandleError, VzError, VzResult};
pub use handle::Handle;
