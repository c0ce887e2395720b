pub mod admission;
pub mod audit;
pub mod dispatch;
pub mod memory;
pub mod provisioning;
pub mod requests;

mod store;

pub use store::{RepositoryError, UserId};

use crate::error::AppError;

/// Run a synchronous workflow call on tokio's blocking pool. Row locks wait on a condvar and
/// the side-effect adapters do blocking I/O.
pub(crate) async fn run_blocking<T, E>(
    call: impl FnOnce() -> Result<T, E> + Send + 'static,
) -> Result<T, AppError>
where
    T: Send + 'static,
    E: Into<AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(call).await?.map_err(Into::into)
}
