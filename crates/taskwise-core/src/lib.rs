pub mod activity;
pub mod attachment;
pub mod comment;
pub mod error;
pub mod humanize;
pub mod journal;
pub mod resource;
pub mod statistics;
pub mod task;
pub mod user;

mod serde_ext;

pub use error::{ResourceError, ValidationError};
pub use resource::ResourceContext;
pub use task::{Priority, Task, TaskStatus};
pub use user::{Role, User};
