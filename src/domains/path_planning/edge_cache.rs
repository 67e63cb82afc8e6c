use ordered_float::OrderedFloat;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use super::grid::Grid;

/// Fixed-capacity memo table: values live in an arena, a map points keys at slots, and a
/// full table overwrites its oldest slot.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    capacity: usize,
    slots: Vec<(K, V)>,
    index: HashMap<K, usize>,
    next: usize,
    hits: u64,
    misses: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> BoundedCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Vec::with_capacity(capacity.min(1024)),
            index: HashMap::new(),
            next: 0,
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        match self.index.get(key) {
            Some(&slot) => {
                self.hits += 1;
                Some(self.slots[slot].1.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        if let Some(&slot) = self.index.get(&key) {
            self.slots[slot].1 = value;
            return;
        }
        if self.slots.len() < self.capacity {
            self.index.insert(key.clone(), self.slots.len());
            self.slots.push((key, value));
            return;
        }
        let slot = self.next;
        self.next = (self.next + 1) % self.capacity;
        let (old_key, _) = std::mem::replace(&mut self.slots[slot], (key.clone(), value));
        self.index.remove(&old_key);
        self.index.insert(key, slot);
    }

    pub fn get_or_insert_with(&mut self, key: K, make: impl FnOnce() -> V) -> V {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = make();
        self.insert(key, value.clone());
        value
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// (hits, misses)
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

/// Relative geometry of a maneuver: grid resolution, displacement and both headings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ManeuverKey {
    pixel_size: OrderedFloat<f64>,
    num_layers: usize,
    dx: OrderedFloat<f64>,
    dy: OrderedFloat<f64>,
    yaw: OrderedFloat<f64>,
    yaw_end: OrderedFloat<f64>,
}

impl ManeuverKey {
    pub fn new(grid: &Grid, dx: f64, dy: f64, yaw: f64, yaw_end: f64) -> Self {
        Self {
            pixel_size: OrderedFloat(grid.pixel_size),
            num_layers: grid.num_layers,
            dx: discretize(dx),
            dy: discretize(dy),
            yaw: discretize(yaw),
            yaw_end: discretize(yaw_end),
        }
    }
}

fn discretize(value: f64) -> OrderedFloat<f64> {
    OrderedFloat((value * 1e6).round() / 1e6)
}

/// Samples (dx, dy, heading) of a maneuver relative to its start position.
pub type ManeuverSamples = Arc<Vec<(f64, f64, f64)>>;
