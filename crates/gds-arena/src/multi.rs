//! Multi-array containers and their attachment count.
//!
//! A [`MultiArray`] owns a [`Store`] and an ordered set of named top-level
//! packets. Its lifetime is governed by an attachment count: every
//! [`Attachment`] (and every [`ArrayView`], which holds one) adds one, and
//! dropping it subtracts one. When the count returns to zero the whole tree
//! is deallocated, after which the container only reports its (empty)
//! store statistics.
//!
//! A fresh container starts at zero attachments and is not yet released;
//! release only happens on a transition from one to zero.
//!
//! The last detach may happen while the container's lock is held, for
//! example when an [`Attachment`] is dropped inside
//! [`MultiArray::with_store`]. The release is then left pending and carried
//! out by whoever holds the lock, right after they unlock.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use indexmap::IndexMap;

use gds_core::{contract_violation, ElementKind, PacketDescriptor, Value};

use crate::config::StoreConfig;
use crate::engine::{allocate, deallocate};
use crate::error::{AllocError, NamedValueError, ViewError};
use crate::handle::BlockId;
use crate::named;
use crate::store::{Store, StoreStats};
use crate::view::ArrayView;

/// Attachment count value marking a released container.
const RELEASED: usize = usize::MAX;

/// One named top-level packet.
#[derive(Clone, Debug)]
pub(crate) struct TopLevel {
    pub(crate) descriptor: Arc<PacketDescriptor>,
    pub(crate) block: BlockId,
}

/// The mutable state behind a container's lock.
pub(crate) struct ContainerData {
    pub(crate) store: Store,
    pub(crate) packets: IndexMap<String, TopLevel>,
}

impl ContainerData {
    pub(crate) fn roots(&self) -> Vec<(&PacketDescriptor, BlockId)> {
        self.packets
            .values()
            .map(|p| (p.descriptor.as_ref(), p.block))
            .collect()
    }
}

/// Locked container state. Unlocks first, then finishes any release
/// that was deferred while the lock was held.
pub(crate) struct DataGuard<'a> {
    // Field order matters: the guard must drop before the finisher runs.
    data: MutexGuard<'a, ContainerData>,
    _finish: FinishRelease<'a>,
}

impl Deref for DataGuard<'_> {
    type Target = ContainerData;

    fn deref(&self) -> &ContainerData {
        &self.data
    }
}

impl DerefMut for DataGuard<'_> {
    fn deref_mut(&mut self) -> &mut ContainerData {
        &mut self.data
    }
}

struct FinishRelease<'a>(&'a Inner);

impl Drop for FinishRelease<'_> {
    fn drop(&mut self) {
        self.0.finish_release();
    }
}

struct Inner {
    attachments: AtomicUsize,
    release_pending: AtomicBool,
    data: Mutex<ContainerData>,
}

impl Inner {
    fn new(data: ContainerData) -> Self {
        Self {
            attachments: AtomicUsize::new(0),
            release_pending: AtomicBool::new(false),
            data: Mutex::new(data),
        }
    }

    fn lock(&self) -> DataGuard<'_> {
        DataGuard {
            data: self.data.lock().unwrap_or_else(PoisonError::into_inner),
            _finish: FinishRelease(self),
        }
    }

    fn attach(&self) {
        let mut current = self.attachments.load(Ordering::Acquire);
        loop {
            if current == RELEASED {
                contract_violation("attach", "container has already been released");
            }
            match self.attachments.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    fn detach(&self) {
        let mut current = self.attachments.load(Ordering::Acquire);
        loop {
            debug_assert!(current != 0 && current != RELEASED);
            let next = if current == 1 { RELEASED } else { current - 1 };
            match self.attachments.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    if next == RELEASED {
                        self.release_pending.store(true, Ordering::SeqCst);
                        self.finish_release();
                    }
                    return;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Carry out a pending release if the lock is free. If it is held (by
    /// this thread or another), the holder's [`DataGuard`] calls back here
    /// once it has unlocked.
    fn finish_release(&self) {
        if !self.release_pending.load(Ordering::SeqCst) {
            return;
        }
        let mut data = match self.data.try_lock() {
            Ok(data) => data,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                tracing::trace!("container locked, release deferred to the holder");
                return;
            }
        };
        if self.release_pending.swap(false, Ordering::SeqCst) {
            Self::release(&mut data);
        }
    }

    fn release(data: &mut ContainerData) {
        let ContainerData { store, packets } = data;
        for (_, top) in packets.drain(..) {
            deallocate(store, &top.descriptor, top.block);
        }
        tracing::debug!(
            live_blocks = store.live_blocks(),
            blocks_freed = store.stats().blocks_freed,
            "container released"
        );
    }
}

/// A shared container of named top-level packets.
///
/// Cloning a `MultiArray` clones the handle, not the data, and does not
/// touch the attachment count.
///
/// # Examples
///
/// ```
/// use gds_arena::{MultiArray, StoreConfig};
/// use gds_core::{AtomicKind, PacketDescriptor};
///
/// let header = PacketDescriptor::builder()
///     .atomic("exposure", AtomicKind::Double)
///     .vstring("object")
///     .build()
///     .unwrap();
/// let container =
///     MultiArray::allocate(StoreConfig::default(), vec![("header".into(), header)], true, true)
///         .unwrap();
///
/// let a = container.attach();
/// let b = container.attach();
/// assert_eq!(container.attachment_count(), 2);
/// drop(a);
/// assert!(!container.is_released());
/// b.detach();
/// assert!(container.is_released());
/// assert_eq!(container.stats().live_blocks, 0);
/// ```
#[derive(Clone)]
pub struct MultiArray {
    inner: Arc<Inner>,
}

// Compile-time assertion: containers cross threads.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<MultiArray>();
    assert::<Attachment>();
};

impl MultiArray {
    /// Wrap a store and packets already allocated in it.
    pub fn new(store: Store, packets: Vec<(String, PacketDescriptor, BlockId)>) -> Self {
        let packets = packets
            .into_iter()
            .map(|(name, descriptor, block)| {
                let top = TopLevel {
                    descriptor: Arc::new(descriptor),
                    block,
                };
                (name, top)
            })
            .collect();
        Self {
            inner: Arc::new(Inner::new(ContainerData { store, packets })),
        }
    }

    /// Build a container by allocating each named packet in a fresh store.
    ///
    /// If any packet fails, the packets already built are deallocated and
    /// the error is returned.
    pub fn allocate(
        config: StoreConfig,
        packets: Vec<(String, PacketDescriptor)>,
        clear: bool,
        allocate_inner_arrays: bool,
    ) -> Result<Self, AllocError> {
        let mut store = Store::new(config);
        let mut built = Vec::with_capacity(packets.len());
        for (name, descriptor) in packets {
            match allocate(&mut store, &descriptor, clear, allocate_inner_arrays) {
                Ok(block) => built.push((name, descriptor, block)),
                Err(e) => {
                    for (_, descriptor, block) in built.iter().rev() {
                        deallocate(&mut store, descriptor, *block);
                    }
                    return Err(e);
                }
            }
        }
        tracing::debug!(
            packets = built.len(),
            live_blocks = store.live_blocks(),
            "container allocated"
        );
        Ok(Self::new(store, built))
    }

    /// Allocate another top-level packet, replacing (and deallocating) any
    /// packet already registered under `name`.
    pub fn add_packet(
        &self,
        name: impl Into<String>,
        descriptor: PacketDescriptor,
        clear: bool,
        allocate_inner_arrays: bool,
    ) -> Result<(), AllocError> {
        if self.is_released() {
            contract_violation("add_packet", "container has already been released");
        }
        let mut data = self.inner.lock();
        let ContainerData { store, packets } = &mut *data;
        let block = allocate(store, &descriptor, clear, allocate_inner_arrays)?;
        let top = TopLevel {
            descriptor: Arc::new(descriptor),
            block,
        };
        if let Some(old) = packets.insert(name.into(), top) {
            deallocate(store, &old.descriptor, old.block);
        }
        Ok(())
    }

    /// Add one attachment.
    ///
    /// # Panics
    ///
    /// Raises a [`ContractViolation`](gds_core::ContractViolation) if the
    /// container has already been released.
    pub fn attach(&self) -> Attachment {
        self.inner.attach();
        Attachment {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Current number of attachments (zero once released).
    pub fn attachment_count(&self) -> usize {
        match self.inner.attachments.load(Ordering::Acquire) {
            RELEASED => 0,
            n => n,
        }
    }

    /// Whether the tree has been deallocated.
    pub fn is_released(&self) -> bool {
        self.inner.attachments.load(Ordering::Acquire) == RELEASED
    }

    /// Whether two handles refer to the same container.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Names of the top-level packets, in insertion order.
    pub fn packet_names(&self) -> Vec<String> {
        self.inner.lock().packets.keys().cloned().collect()
    }

    /// Descriptor of the named top-level packet.
    pub fn packet_descriptor(&self, name: &str) -> Option<Arc<PacketDescriptor>> {
        self.inner
            .lock()
            .packets
            .get(name)
            .map(|p| Arc::clone(&p.descriptor))
    }

    /// Block holding the named top-level packet.
    pub fn packet_block(&self, name: &str) -> Option<BlockId> {
        self.inner.lock().packets.get(name).map(|p| p.block)
    }

    /// Store allocation counters.
    pub fn stats(&self) -> StoreStats {
        self.inner.lock().store.stats()
    }

    /// Run `f` with exclusive access to the backing store.
    ///
    /// Dropping the last attachment inside `f` is allowed; the container is
    /// released as soon as `f` returns.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut Store) -> R) -> R {
        f(&mut self.inner.lock().store)
    }

    /// A view of the array element `element` of top-level packet `packet`.
    ///
    /// The view holds its own attachment.
    pub fn array_view(&self, packet: &str, element: &str) -> Result<ArrayView, ViewError> {
        let unknown = || ViewError::UnknownArray {
            packet: packet.to_string(),
            element: element.to_string(),
        };
        let (array, data) = {
            let guard = self.inner.lock();
            let top = guard.packets.get(packet).ok_or_else(unknown)?;
            let el = top.descriptor.element(element).ok_or_else(unknown)?;
            let ElementKind::Array(array) = el.kind() else {
                return Err(unknown());
            };
            let data = guard.store.read_handle(top.block, el.offset());
            (Arc::clone(array), data)
        };
        if data.is_null() {
            return Err(ViewError::NotAllocated {
                element: element.to_string(),
            });
        }
        Ok(ArrayView::new(self.attach(), element.to_string(), array, data))
    }

    /// Read the uniquely named atomic element anywhere in the container.
    pub fn get_named_value(&self, name: &str) -> Result<Value, NamedValueError> {
        let data = self.inner.lock();
        named::get_value_in(&data.store, &data.roots(), name)
    }

    /// Write the uniquely named atomic element anywhere in the container.
    pub fn put_named_value(&self, name: &str, value: Value) -> Result<(), NamedValueError> {
        let mut data = self.inner.lock();
        let ContainerData { store, packets } = &mut *data;
        let roots: Vec<_> = packets
            .values()
            .map(|p| (p.descriptor.as_ref(), p.block))
            .collect();
        named::put_value_in(store, &roots, name, value)
    }

    /// Read the uniquely named string element anywhere in the container.
    pub fn get_named_string(&self, name: &str) -> Result<String, NamedValueError> {
        let data = self.inner.lock();
        named::get_string_in(&data.store, &data.roots(), name)
    }

    /// Write the uniquely named string element anywhere in the container.
    pub fn put_named_string(&self, name: &str, value: &str) -> Result<(), NamedValueError> {
        let mut data = self.inner.lock();
        let ContainerData { store, packets } = &mut *data;
        let roots: Vec<_> = packets
            .values()
            .map(|p| (p.descriptor.as_ref(), p.block))
            .collect();
        named::put_string_in(store, &roots, name, value)
    }

    pub(crate) fn lock(&self) -> DataGuard<'_> {
        self.inner.lock()
    }
}

impl fmt::Debug for MultiArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiArray")
            .field("attachments", &self.attachment_count())
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}

/// One unit of the attachment count.
///
/// Dropping the guard (or calling [`detach`](Self::detach)) gives the unit
/// back; the last one out deallocates the container. Cloning attaches again.
pub struct Attachment {
    inner: Arc<Inner>,
}

impl Attachment {
    /// The container this attachment keeps alive.
    pub fn container(&self) -> MultiArray {
        MultiArray {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Give the attachment back.
    pub fn detach(self) {
        drop(self);
    }
}

impl Clone for Attachment {
    fn clone(&self) -> Self {
        self.inner.attach();
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.inner.detach();
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("count", &self.container().attachment_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gds_core::{ArrayDescriptor, AtomicKind, ContractViolation};
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn container() -> MultiArray {
        let cells = ArrayDescriptor::from_shape(
            &["y", "x"],
            &[2, 2],
            PacketDescriptor::builder()
                .atomic("v", AtomicKind::Float)
                .vstring("note")
                .build()
                .unwrap(),
        )
        .unwrap();
        let packet = PacketDescriptor::builder()
            .atomic("n", AtomicKind::Int)
            .array("grid", cells)
            .build()
            .unwrap();
        MultiArray::allocate(StoreConfig::default(), vec![("main".into(), packet)], true, true)
            .unwrap()
    }

    #[test]
    fn fresh_container_is_not_released() {
        let c = container();
        assert_eq!(c.attachment_count(), 0);
        assert!(!c.is_released());
        assert_eq!(c.stats().live_blocks, 2);
    }

    #[test]
    fn last_detach_frees_everything() {
        let c = container();
        let a = c.attach();
        let b = a.clone();
        assert_eq!(c.attachment_count(), 2);
        a.detach();
        assert!(!c.is_released());
        assert_eq!(c.stats().live_blocks, 2);
        drop(b);
        assert!(c.is_released());
        assert_eq!(c.stats().live_blocks, 0);
        assert!(c.packet_names().is_empty());
    }

    #[test]
    fn attaching_a_released_container_is_a_contract_violation() {
        let c = container();
        c.attach().detach();
        let result = catch_unwind(AssertUnwindSafe(|| c.attach()));
        let payload = result.unwrap_err();
        let violation = payload.downcast_ref::<ContractViolation>().unwrap();
        assert_eq!(violation.operation, "attach");
    }

    #[test]
    fn failed_build_unwinds_earlier_packets() {
        let p = PacketDescriptor::builder()
            .fstring("a", 4)
            .fstring("b", 4)
            .build()
            .unwrap();
        let err = MultiArray::allocate(
            StoreConfig::new().with_max_blocks(4),
            vec![("one".into(), p.clone()), ("two".into(), p)],
            true,
            true,
        )
        .unwrap_err();
        assert!(matches!(err, AllocError::CapacityExceeded { .. }));
    }

    #[test]
    fn add_packet_replaces_by_name() {
        let c = container();
        let before = c.stats().live_blocks;
        let extra = PacketDescriptor::single("s", ElementKind::FString { max_len: 3 });
        c.add_packet("extra", extra.clone(), true, true).unwrap();
        assert_eq!(c.stats().live_blocks, before + 2);
        c.add_packet("extra", extra, true, true).unwrap();
        assert_eq!(c.stats().live_blocks, before + 2);
        assert_eq!(c.packet_names(), vec!["main".to_string(), "extra".to_string()]);
    }

    #[test]
    fn views_hold_attachments() {
        let c = container();
        let root = c.attach();
        let view = c.array_view("main", "grid").unwrap();
        assert_eq!(c.attachment_count(), 2);
        drop(root);
        assert!(!c.is_released());
        drop(view);
        assert!(c.is_released());
    }

    #[test]
    fn last_detach_inside_with_store_is_deferred() {
        let c = container();
        let a = c.attach();
        let live = c.with_store(move |store| {
            drop(a);
            store.live_blocks()
        });
        assert_eq!(live, 2);
        assert!(c.is_released());
        assert_eq!(c.stats().live_blocks, 0);
        assert!(c.packet_names().is_empty());
    }

    #[test]
    fn last_detach_while_another_thread_holds_the_lock() {
        let c = container();
        let a = c.attach();
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let (go_tx, go_rx) = std::sync::mpsc::channel::<()>();
        let holder = {
            let c = c.clone();
            std::thread::spawn(move || {
                c.with_store(|_| {
                    locked_tx.send(()).unwrap();
                    go_rx.recv().unwrap();
                })
            })
        };
        locked_rx.recv().unwrap();
        a.detach();
        assert!(c.is_released());
        go_tx.send(()).unwrap();
        holder.join().unwrap();
        assert_eq!(c.stats().live_blocks, 0);
    }

    #[test]
    fn unknown_views_are_rejected() {
        let c = container();
        assert!(matches!(
            c.array_view("main", "n"),
            Err(ViewError::UnknownArray { .. })
        ));
        assert!(matches!(
            c.array_view("other", "grid"),
            Err(ViewError::UnknownArray { .. })
        ));
        assert_eq!(c.attachment_count(), 0);
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn freed_iff_net_count_reaches_zero(ops in prop::collection::vec(any::<bool>(), 1..40)) {
                let c = container();
                let mut held: Vec<Attachment> = vec![c.attach()];
                for attach in ops {
                    if c.is_released() {
                        break;
                    }
                    if attach {
                        held.push(c.attach());
                    } else if let Some(a) = held.pop() {
                        a.detach();
                    }
                    prop_assert_eq!(c.attachment_count(), held.len());
                    prop_assert_eq!(c.is_released(), held.is_empty());
                    if held.is_empty() {
                        prop_assert_eq!(c.stats().live_blocks, 0);
                    } else {
                        prop_assert!(c.stats().live_blocks > 0);
                    }
                }
            }
        }
    }
}
