use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::error::{RegistryError, Result};

/// Smallest expiration the registry refuses to schedule. `add_item` rejects
/// durations at or below this value instead of clamping them.
pub const MIN_EXPIRE_IN: Duration = Duration::from_nanos(1);

/// Capacity of the expiration conduit. Kept at 1 so a firing timer hands its
/// key off almost directly to a consumer; with no consumer draining, firing
/// tasks queue up blocked in `send` while the entry map stays fully usable.
const EXPIRED_CAPACITY: usize = 1;

/// A scheduled expiration for one key. Exactly one of these exists per live
/// key; rearming a key replaces its handle and aborts the old task.
struct TimerHandle {
    /// Arming epoch, unique per `add_item` call. A firing task may only
    /// delete the entry whose epoch matches its own.
    epoch: u64,
    task: JoinHandle<()>,
}

struct Shared<K> {
    entries: RwLock<HashMap<K, TimerHandle>>,
    next_epoch: AtomicU64,
    /// Absent when the registry was constructed in silent mode.
    expired_tx: Option<mpsc::Sender<K>>,
}

/// Read end of the expiration conduit.
///
/// Cloning yields another consumer on the same conduit; each expired key is
/// delivered to exactly one of them.
pub struct Expired<K> {
    rx: Arc<Mutex<mpsc::Receiver<K>>>,
}

impl<K> Clone for Expired<K> {
    fn clone(&self) -> Self {
        Expired { rx: Arc::clone(&self.rx) }
    }
}

impl<K> Expired<K> {
    /// Waits for the next expired key. Returns `None` once every registry
    /// handle has been dropped and all outstanding timers have resolved.
    pub async fn recv(&self) -> Option<K> {
        self.rx.lock().await.recv().await
    }
}

/// A concurrent time-to-live registry.
///
/// Each key carries its own expiration deadline, armed by [`add_item`] and
/// rearmed in place by calling [`add_item`] again for the same key. When a
/// deadline passes the key is removed from the registry and, if delivery was
/// enabled at construction, published on the [`Expired`] conduit.
///
/// The registry is a cheap cloneable handle over shared state; clones operate
/// on the same key set. Arming a key spawns a timer task, so every mutating
/// call must happen inside a Tokio runtime.
///
/// The `Default` instance models a registry that skipped construction: every
/// operation on it fails with [`RegistryError::NotInstantiated`].
///
/// [`add_item`]: TtlRegistry::add_item
pub struct TtlRegistry<K> {
    shared: Option<Arc<Shared<K>>>,
    expired_rx: Option<Expired<K>>,
}

impl<K> Clone for TtlRegistry<K> {
    fn clone(&self) -> Self {
        TtlRegistry {
            shared: self.shared.clone(),
            expired_rx: self.expired_rx.clone(),
        }
    }
}

impl<K> Default for TtlRegistry<K> {
    /// A deliberately unusable instance, mirroring a zero-initialized
    /// registry. Construct with [`TtlRegistry::new`] instead.
    fn default() -> Self {
        TtlRegistry { shared: None, expired_rx: None }
    }
}

impl<K> TtlRegistry<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    /// Creates an empty registry. With `deliver_expired` set, expired keys
    /// are published on the conduit returned by [`expired`]; otherwise the
    /// registry runs silent and keys simply vanish on expiration.
    ///
    /// [`expired`]: TtlRegistry::expired
    pub fn new(deliver_expired: bool) -> Self {
        let (expired_tx, expired_rx) = if deliver_expired {
            let (tx, rx) = mpsc::channel(EXPIRED_CAPACITY);
            (Some(tx), Some(Expired { rx: Arc::new(Mutex::new(rx)) }))
        } else {
            (None, None)
        };

        TtlRegistry {
            shared: Some(Arc::new(Shared {
                entries: RwLock::new(HashMap::new()),
                next_epoch: AtomicU64::new(0),
                expired_tx,
            })),
            expired_rx,
        }
    }

    fn shared(&self) -> Result<&Arc<Shared<K>>> {
        self.shared.as_ref().ok_or(RegistryError::NotInstantiated)
    }

    /// Registers `key` to expire after `expire_in`, or rearms its deadline if
    /// it is already registered. The previous deadline is discarded, not
    /// extended.
    ///
    /// Fails with [`RegistryError::ExpireTooShort`] for durations at or below
    /// [`MIN_EXPIRE_IN`] without touching the registry.
    pub fn add_item(&self, key: K, expire_in: Duration) -> Result<()> {
        let shared = self.shared()?;

        if expire_in <= MIN_EXPIRE_IN {
            return Err(RegistryError::ExpireTooShort(expire_in));
        }

        // The lock spans spawn and insert so the new task, however short its
        // deadline, cannot observe the map before its own handle is in it.
        let mut entries = shared.entries.write();
        let epoch = shared.next_epoch.fetch_add(1, Ordering::Relaxed);
        let task = spawn_timer(Arc::downgrade(shared), key.clone(), epoch, expire_in);
        if let Some(previous) = entries.insert(key, TimerHandle { epoch, task }) {
            log::debug!("rearming existing entry, new deadline in {:?}", expire_in);
            previous.task.abort();
        }

        Ok(())
    }

    /// Returns whether `key` is currently registered and unexpired.
    pub fn check_item(&self, key: &K) -> Result<bool> {
        Ok(self.shared()?.entries.read().contains_key(key))
    }

    /// Returns a point-in-time snapshot of all live keys, in no particular
    /// order. The snapshot is a copy; later mutation does not affect it.
    pub fn get_items(&self) -> Result<Vec<K>> {
        Ok(self.shared()?.entries.read().keys().cloned().collect())
    }

    /// Cancels `key`'s pending expiration and removes it from the registry.
    /// Returns whether the key was present. A cancelled key never reaches
    /// the expiration conduit; if its timer already fired, the notification
    /// stands and this returns `false`.
    pub fn remove_item(&self, key: &K) -> Result<bool> {
        let shared = self.shared()?;
        match shared.entries.write().remove(key) {
            Some(handle) => {
                handle.task.abort();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns a read handle on the expiration conduit.
    ///
    /// Fails with [`RegistryError::DeliveryDisabled`] if the registry was
    /// constructed with `deliver_expired = false`, and with
    /// [`RegistryError::NotInstantiated`] on a defaulted instance.
    pub fn expired(&self) -> Result<Expired<K>> {
        self.shared()?;
        self.expired_rx.clone().ok_or(RegistryError::DeliveryDisabled)
    }
}

/// One timer task per live key: sleep out the deadline, then remove the entry
/// and publish the key. Holds only a weak reference so abandoned registries
/// let outstanding timers wake and exit harmlessly.
fn spawn_timer<K>(shared: Weak<Shared<K>>, key: K, epoch: u64, expire_in: Duration) -> JoinHandle<()>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(expire_in).await;

        let Some(shared) = shared.upgrade() else {
            return;
        };

        {
            let mut entries = shared.entries.write();
            match entries.get(&key) {
                // Only the handle that is actually firing may delete the
                // entry; a rearm between scheduling and firing replaced it.
                Some(handle) if handle.epoch == epoch => {
                    entries.remove(&key);
                }
                _ => return,
            }
        }

        // Publish after the guard is released. A slow consumer blocks this
        // task alone, never lookups or other keys' firings.
        if let Some(tx) = &shared.expired_tx {
            if tx.send(key).await.is_err() {
                log::warn!("dropping expired key, conduit closed");
            }
        }
    })
}
