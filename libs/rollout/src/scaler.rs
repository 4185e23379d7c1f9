//! Unit scaling with a minimum floor.
//!
//! An environment may still receive traffic while a swap is in flight, so
//! scale-down never goes below [`MIN_UNITS`].

use tracing::{info, warn};

use crate::client::PlatformClient;
use crate::transport::Transport;

/// Units left running after a scale-down.
pub const MIN_UNITS: usize = 1;

/// Units to add to go from `current` to `target`, if any.
pub fn scale_up_delta(current: usize, target: usize) -> Option<usize> {
    target.checked_sub(current).filter(|delta| *delta > 0)
}

/// Units to remove from `current` to reach the floor.
pub fn scale_down_delta(current: usize) -> usize {
    current.saturating_sub(MIN_UNITS)
}

/// Turns unit targets into platform scaling calls.
pub struct UnitScaler<'a, T> {
    client: &'a PlatformClient<T>,
}

impl<'a, T: Transport> UnitScaler<'a, T> {
    pub fn new(client: &'a PlatformClient<T>) -> Self {
        Self { client }
    }

    /// Grow `app` to `target` units with a single scale-up request.
    ///
    /// Fails without touching the platform when `app` already runs `target`
    /// units or more.
    pub async fn add_units(&self, app: &str, target: usize) -> bool {
        let current = match self.client.total_units(app).await {
            Ok(current) => current,
            Err(e) => {
                warn!(app = %app, error = %e, "could not read unit count");
                return false;
            }
        };

        let Some(delta) = scale_up_delta(current, target) else {
            warn!(app = %app, current, target, "nothing to add, refusing to scale");
            return false;
        };

        info!(app = %app, current, target, units = delta, "adding units");
        self.client.add_units(app, delta).await
    }

    /// Shrink `app` down to [`MIN_UNITS`] with a single scale-down request.
    ///
    /// The request is sent even when there is nothing to remove.
    pub async fn remove_units(&self, app: &str) -> bool {
        let current = match self.client.total_units(app).await {
            Ok(current) => current,
            Err(e) => {
                warn!(app = %app, error = %e, "could not read unit count");
                return false;
            }
        };

        let delta = scale_down_delta(current);
        info!(app = %app, current, units = delta, "removing units");
        self.client.remove_units(app, delta).await
    }
}
