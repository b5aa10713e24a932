pub mod conflicts;
pub mod errors;
pub mod models;
pub mod protocol;
pub mod state;

pub use conflicts::*;
pub use errors::*;
pub use models::*;
pub use protocol::*;
pub use state::*;

pub type SyncResult<T> = Result<T, ClientError>;
