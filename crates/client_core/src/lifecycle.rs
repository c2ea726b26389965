use tokio::sync::watch;

/// Owner side of a mounted screen's lifetime. Ending it (explicitly or by
/// dropping) flips every [`LifecycleToken`] handed out to "not alive".
#[derive(Debug)]
pub struct ScreenLifecycle {
    alive: watch::Sender<bool>,
}

impl ScreenLifecycle {
    pub fn new() -> Self {
        let (alive, _) = watch::channel(true);
        Self { alive }
    }

    pub fn token(&self) -> LifecycleToken {
        LifecycleToken {
            alive: self.alive.subscribe(),
        }
    }

    pub fn end(&self) {
        self.alive.send_replace(false);
    }

    pub fn is_alive(&self) -> bool {
        *self.alive.borrow()
    }
}

impl Default for ScreenLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ScreenLifecycle {
    fn drop(&mut self) {
        self.alive.send_replace(false);
    }
}

/// Checked before every state commit that follows a suspension point.
#[derive(Debug, Clone)]
pub struct LifecycleToken {
    alive: watch::Receiver<bool>,
}

impl LifecycleToken {
    pub fn is_alive(&self) -> bool {
        *self.alive.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_observe_end_of_lifecycle() {
        let lifecycle = ScreenLifecycle::new();
        let token = lifecycle.token();
        let cloned = token.clone();
        assert!(token.is_alive());

        lifecycle.end();
        assert!(!token.is_alive());
        assert!(!cloned.is_alive());
    }

    #[test]
    fn dropping_the_lifecycle_detaches_tokens() {
        let lifecycle = ScreenLifecycle::new();
        let token = lifecycle.token();
        drop(lifecycle);
        assert!(!token.is_alive());
    }
}
