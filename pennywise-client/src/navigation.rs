/// Forced navigation channel
///
/// The core never renders anything; when it must move the user somewhere
/// (login after a `401`, settings after a payment return without a session
/// id) it publishes the target here and the shell follows.
///
/// Each redirect is a new event even if the route repeats, so subscribers
/// see every forced navigation.

use pennywise_shared::auth::gate::Route;
use tokio::sync::watch;

/// A forced navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redirect {
    /// Target route
    pub route: Route,

    /// Monotonic sequence number, starting at 1
    pub seq: u64,
}

/// Publisher of forced navigations
#[derive(Debug)]
pub struct Navigator {
    tx: watch::Sender<Option<Redirect>>,
}

impl Navigator {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Navigator { tx }
    }

    /// Publishes a forced navigation
    pub fn redirect(&self, route: Route) {
        self.tx.send_modify(|last| {
            let seq = last.map_or(1, |r| r.seq + 1);
            *last = Some(Redirect { route, seq });
        });
        tracing::debug!(route = %route, "Forced navigation");
    }

    /// Most recent forced navigation
    pub fn last(&self) -> Option<Redirect> {
        *self.tx.borrow()
    }

    /// Subscribes to forced navigations
    pub fn subscribe(&self) -> watch::Receiver<Option<Redirect>> {
        self.tx.subscribe()
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}
