pub(crate) mod fs;

use std::time::Duration;

use crate::error::StoreError;

/// Retry a store operation once with a short backoff.
/// Input and data errors never reach this; only store I/O does.
pub(crate) fn retry_once<T>(
    mut op: impl FnMut() -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    match op() {
        Ok(value) => Ok(value),
        Err(first) => {
            std::thread::sleep(Duration::from_millis(100));
            op().map_err(|_second| first)
        }
    }
}
