use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use async_trait::async_trait;
use shared::domain::ScreenRole;
use tokio::sync::RwLock;
use tracing::debug;

/// Capability a mounted screen exposes so siblings can ask it to reload
/// from its first page.
#[async_trait]
pub trait RefreshTarget: Send + Sync {
    async fn refresh_from_start(&self);
}

/// Session-scoped directory from screen role to the currently mounted
/// instance of that role. Entries are weak: the directory never keeps a
/// screen alive, and a stale entry is a silent no-op.
#[derive(Default)]
pub struct SiblingNotifier {
    targets: RwLock<HashMap<ScreenRole, Weak<dyn RefreshTarget>>>,
}

impl SiblingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replaces any earlier registration for `role`.
    pub async fn register<T>(&self, role: ScreenRole, target: &Arc<T>)
    where
        T: RefreshTarget + 'static,
    {
        let weak: Weak<T> = Arc::downgrade(target);
        let weak: Weak<dyn RefreshTarget> = weak;
        self.targets.write().await.insert(role, weak);
        debug!(?role, "registered refresh target");
    }

    pub async fn unregister(&self, role: ScreenRole) {
        self.targets.write().await.remove(&role);
    }

    /// Removes the entry for `role` only if it still points at `target`.
    pub async fn unregister_instance<T>(&self, role: ScreenRole, target: &Arc<T>)
    where
        T: RefreshTarget + 'static,
    {
        let mut targets = self.targets.write().await;
        let registered = targets
            .get(&role)
            .is_some_and(|weak| weak.as_ptr() as *const () == Arc::as_ptr(target) as *const ());
        if registered {
            targets.remove(&role);
        }
    }

    pub async fn is_mounted(&self, role: ScreenRole) -> bool {
        self.targets
            .read()
            .await
            .get(&role)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Asks the screen registered for `role` to refresh. Returns whether a
    /// live screen was reached.
    pub async fn notify(&self, role: ScreenRole) -> bool {
        let target = {
            let targets = self.targets.read().await;
            targets.get(&role).and_then(Weak::upgrade)
        };

        match target {
            Some(target) => {
                debug!(?role, "notifying sibling screen");
                target.refresh_from_start().await;
                true
            }
            None => {
                debug!(?role, "no mounted sibling screen to notify");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingTarget {
        refreshes: AtomicUsize,
    }

    #[async_trait]
    impl RefreshTarget for CountingTarget {
        async fn refresh_from_start(&self) {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn notify_without_registration_is_a_no_op() {
        let notifier = SiblingNotifier::new();
        assert!(!notifier.notify(ScreenRole::OrdersList).await);
        assert!(!notifier.is_mounted(ScreenRole::OrdersList).await);
    }

    #[tokio::test]
    async fn notify_reaches_registered_screen() {
        let notifier = SiblingNotifier::new();
        let target = Arc::new(CountingTarget::default());
        notifier.register(ScreenRole::OrdersList, &target).await;

        assert!(notifier.notify(ScreenRole::OrdersList).await);
        assert!(!notifier.notify(ScreenRole::ProductsList).await);
        assert_eq!(target.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn later_registration_overwrites_earlier_one() {
        let notifier = SiblingNotifier::new();
        let first = Arc::new(CountingTarget::default());
        let second = Arc::new(CountingTarget::default());
        notifier.register(ScreenRole::ProductsList, &first).await;
        notifier.register(ScreenRole::ProductsList, &second).await;

        notifier.notify(ScreenRole::ProductsList).await;
        assert_eq!(first.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(second.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropped_screen_is_not_kept_alive() {
        let notifier = SiblingNotifier::new();
        let target = Arc::new(CountingTarget::default());
        notifier.register(ScreenRole::OrdersList, &target).await;
        drop(target);

        assert!(!notifier.is_mounted(ScreenRole::OrdersList).await);
        assert!(!notifier.notify(ScreenRole::OrdersList).await);
    }

    #[tokio::test]
    async fn unregister_removes_entry() {
        let notifier = SiblingNotifier::new();
        let target = Arc::new(CountingTarget::default());
        notifier.register(ScreenRole::ReviewsList, &target).await;
        notifier.unregister(ScreenRole::ReviewsList).await;

        assert!(!notifier.notify(ScreenRole::ReviewsList).await);
        assert_eq!(target.refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unregister_instance_keeps_newer_registration() {
        let notifier = SiblingNotifier::new();
        let old = Arc::new(CountingTarget::default());
        let new = Arc::new(CountingTarget::default());
        notifier.register(ScreenRole::OrdersList, &old).await;
        notifier.register(ScreenRole::OrdersList, &new).await;

        notifier.unregister_instance(ScreenRole::OrdersList, &old).await;
        assert!(notifier.notify(ScreenRole::OrdersList).await);
        assert_eq!(new.refreshes.load(Ordering::SeqCst), 1);

        notifier.unregister_instance(ScreenRole::OrdersList, &new).await;
        assert!(!notifier.notify(ScreenRole::OrdersList).await);
    }
}
