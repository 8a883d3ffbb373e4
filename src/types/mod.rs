//! Shared primitive types.

mod invoker;
pub use invoker::*;

mod job;
pub use job::*;

mod receipt;
pub use receipt::*;

mod transaction;
pub use transaction::*;
