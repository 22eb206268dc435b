use tokio::sync::watch;

/// Moves the presentation's active view to a slide position.
pub trait Navigator: Send + Sync {
    fn go_to(&self, index: usize);
}

/// Publishes the active slide index for whatever renders the deck.
#[derive(Debug)]
pub struct WatchNavigator {
    current: watch::Sender<Option<usize>>,
}

impl Default for WatchNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchNavigator {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self { current }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<usize>> {
        self.current.subscribe()
    }

    pub fn current(&self) -> Option<usize> {
        *self.current.borrow()
    }
}

impl Navigator for WatchNavigator {
    fn go_to(&self, index: usize) {
        tracing::info!(index, "navigating to slide");
        self.current.send_replace(Some(index));
    }
}
