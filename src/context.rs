use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

/// Highest partition number handed out by [`RandomPartition`] (inclusive).
pub const MAX_PARTITION: u32 = 10;

/// Trait for generating unique order IDs.
/// Decouples the store from `Uuid::new_v4()` so tests can predict IDs.
pub trait IdProvider: Send + Sync {
    fn new_id(&self) -> String;
}

/// Trait for picking the `product` partition label of a new order.
pub trait PartitionPicker: Send + Sync {
    fn pick(&self) -> u32;
}

/// Providers the store draws generated values from.
#[derive(Clone)]
pub struct CaptureContext {
    pub id: Arc<dyn IdProvider>,
    pub partition: Arc<dyn PartitionPicker>,
}

impl CaptureContext {
    pub fn new_system() -> Self {
        Self {
            id: Arc::new(RandomIdProvider),
            partition: Arc::new(RandomPartition),
        }
    }

    pub fn new_deterministic(partition: u32) -> Self {
        Self {
            id: Arc::new(DeterministicIdProvider::new()),
            partition: Arc::new(FixedPartition(partition)),
        }
    }

    pub fn product_label(&self) -> String {
        format!("product-{}", self.partition.pick())
    }
}

// --- Live Implementations ---

pub struct RandomIdProvider;

impl IdProvider for RandomIdProvider {
    fn new_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Uniform over `0..=MAX_PARTITION`. Uses the thread-local generator, so
/// concurrent callers are not correlated, but the value is still only a
/// sharding hint.
pub struct RandomPartition;

impl PartitionPicker for RandomPartition {
    fn pick(&self) -> u32 {
        rand::thread_rng().gen_range(0..=MAX_PARTITION)
    }
}

// --- Deterministic Implementations ---

pub struct DeterministicIdProvider {
    counter: Mutex<u64>,
}

impl DeterministicIdProvider {
    pub fn new() -> Self {
        Self {
            counter: Mutex::new(0),
        }
    }
}

impl Default for DeterministicIdProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdProvider for DeterministicIdProvider {
    fn new_id(&self) -> String {
        let mut num = self.counter.lock();
        *num += 1;
        format!("00000000-0000-0000-0000-{:012x}", *num)
    }
}

pub struct FixedPartition(pub u32);

impl PartitionPicker for FixedPartition {
    fn pick(&self) -> u32 {
        self.0
    }
}
