use crate::error::{Result, SlimLogError};

/// Default table capacity, a prime near the batch size to reduce clustering.
pub const DEDUP_CAPACITY: usize = 12_289;

/// Fixed-capacity set of composite (client, object) keys.
///
/// This is how the pipeline recognises the first time a client starts
/// downloading an object. Keys are `(ip_hash << 32) | key_hash` values built
/// with [`composite_key`]. The table uses open addressing with linear
/// probing over a flat array and is never resized: a slot holding `0` is
/// empty, so a zero key is remapped to `1` before it is stored.
///
/// The table is owned by a single pipeline run. It is not shared between
/// runs and is not safe for unsynchronised concurrent use, which is why
/// [`observe`](DedupTable::observe) takes `&mut self`.
///
/// # Examples
///
/// ```
/// # use s3slim::dedup_table::DedupTable;
/// let mut table = DedupTable::with_capacity(5).unwrap();
/// assert!(table.observe(1).unwrap());
/// assert!(!table.observe(1).unwrap());
/// assert!(table.observe(6).unwrap()); // collides with 1, lands in slot 2
/// assert_eq!(table.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct DedupTable {
    slots: Box<[u64]>,
    count: usize,
}

impl DedupTable {
    /// Allocates a table with [`DEDUP_CAPACITY`] slots.
    pub fn new() -> Self {
        Self {
            slots: vec![0; DEDUP_CAPACITY].into_boxed_slice(),
            count: 0,
        }
    }

    /// Allocates a table with `capacity` slots.
    ///
    /// Returns [`SlimLogError::InvalidCapacity`] for a zero capacity.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(SlimLogError::InvalidCapacity {
                what: "dedup table capacity",
            });
        }
        Ok(Self {
            slots: vec![0; capacity].into_boxed_slice(),
            count: 0,
        })
    }

    /// Records `key` and reports whether this is its first appearance.
    ///
    /// Probing starts at `key % capacity` and walks forward one slot at a
    /// time, wrapping at the end of the array:
    ///
    /// 1. An empty slot is claimed and `Ok(true)` is returned
    /// 2. A slot holding the same key returns `Ok(false)`
    /// 3. Any other key moves the probe to the next slot
    ///
    /// Coming back to the start slot means every slot holds some other key.
    /// That is a sizing problem of the caller and is reported as
    /// [`SlimLogError::DedupTableFull`].
    pub fn observe(&mut self, key: u64) -> Result<bool> {
        let key = if key == 0 { 1 } else { key };
        let capacity = self.slots.len();
        let start = (key % capacity as u64) as usize;
        let mut index = start;

        loop {
            let slot = &mut self.slots[index];
            if *slot == 0 {
                *slot = key;
                self.count += 1;
                return Ok(true);
            }
            if *slot == key {
                return Ok(false);
            }

            index = (index + 1) % capacity;
            if index == start {
                return Err(SlimLogError::DedupTableFull { capacity });
            }
        }
    }

    /// Whether `key` has been observed, without claiming a slot.
    pub fn contains(&self, key: u64) -> bool {
        let key = if key == 0 { 1 } else { key };
        let capacity = self.slots.len();
        let start = (key % capacity as u64) as usize;
        let mut index = start;

        loop {
            match self.slots[index] {
                0 => return false,
                stored if stored == key => return true,
                _ => {}
            }
            index = (index + 1) % capacity;
            if index == start {
                return false;
            }
        }
    }

    /// Number of distinct keys stored.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Raw view of the slot array, `0` meaning empty.
    pub fn slots(&self) -> &[u64] {
        &self.slots
    }
}

impl Default for DedupTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Combines a client fingerprint and an object fingerprint into one key.
///
/// The result is never zero.
pub fn composite_key(ip_hash: u32, key_hash: u32) -> u64 {
    let key = ((ip_hash as u64) << 32) | key_hash as u64;
    if key == 0 {
        1
    } else {
        key
    }
}
