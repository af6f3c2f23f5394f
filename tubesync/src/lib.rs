//! Client-side state synchronization for a video platform's REST backend.
//!
//! Remote entities (comments and their replies, tweets, subscription edges,
//! playlists) are fetched through a [`remote::RemoteStore`], kept in a
//! session-scoped [`cache::EntityCache`] and served to a presentation layer
//! by per-screen controllers that apply user mutations optimistically and
//! reconcile or roll them back once the backend answers.

pub mod cache;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod model;
pub mod remote;
pub mod session;

pub use cache::{CacheKey, EntityCache, SharedCache};
pub use config::ClientConfig;
pub use context::{AppContext, ContextError};
pub use controller::{ListStatus, ListView};
pub use error::{ControllerError, MutationKind, RemoteError};
pub use remote::{Page, RemoteStore};
pub use session::{Session, SessionAction, SessionHandle};
