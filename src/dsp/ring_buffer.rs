//! # Ring Buffer Store
//!
//! Fixed-capacity sample storage for one audio channel. The engine keeps
//! its own heads and does all the wraparound arithmetic; this type only
//! offers indexed `get`/`set` and knows its capacity.
//!
//! ## Why a separate store?
//!
//! A classic delay line bundles storage and a single write position. Our
//! engine needs two heads that move at *different* speeds (the read head
//! can speed up or slow down while it re-tracks a new delay time), so the
//! heads live in the engine and the store stays a dumb tape:
//!
//! ```text
//!            read head (fractional, variable speed)
//!                 │
//!                 ▼
//! ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┐
//! │   │   │   │ r │   │   │   │ w │   │   │   capacity = max_delay × sample_rate
//! └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┘
//!                             ▲
//!                             │
//!            write head (integer, exactly 1 step per sample)
//! ```

/// A pre-allocated, single-channel circular sample store.
///
/// Capacity only changes in [`prepare()`](Self::prepare), never while
/// audio is flowing. A capacity of zero means "not prepared yet"; the
/// engine checks [`is_empty()`](Self::is_empty) and refuses to process.
#[derive(Debug, Default)]
pub struct RingBuffer {
    samples: Vec<f32>,
}

impl RingBuffer {
    /// Create a store holding `capacity` samples of silence.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
        }
    }

    /// Resize to `capacity` samples and zero all content.
    ///
    /// This is the only operation that changes capacity. It allocates, so
    /// it must only be called from set-up code.
    pub fn prepare(&mut self, capacity: usize) {
        self.samples.clear();
        self.samples.resize(capacity, 0.0);
    }

    /// Number of samples the store holds.
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// `true` until the store has been prepared with a non-zero capacity.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Read the sample at `index`.
    ///
    /// The caller normalizes `index` into `0..capacity`.
    #[inline]
    pub fn get(&self, index: usize) -> f32 {
        self.samples[index]
    }

    /// Store `sample` at `index`.
    ///
    /// The caller normalizes `index` into `0..capacity`.
    #[inline]
    pub fn set(&mut self, index: usize, sample: f32) {
        self.samples[index] = sample;
    }

    /// Zero the content without touching capacity.
    pub fn clear(&mut self) {
        self.samples.fill(0.0);
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
