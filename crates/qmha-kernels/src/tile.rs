//! Tile-register configuration for the 8-bit tile-matmul extension.
//!
//! A `TileConfig` is the 64-byte palette-1 descriptor the hardware loads
//! with `ldtilecfg`. The attention kernel builds one 16×16×64 configuration
//! at construction time; every worker thread loads it lazily before its
//! first tile operation and releases it at the end of the call.

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Number of architectural tile registers.
pub const NUM_TILES: usize = 8;

/// Logical tile shape a micro-kernel is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileParam {
    pub m_tile: usize,
    pub n_tile: usize,
    pub k_tile: usize,
    pub is_bf16: bool,
    /// Elements packed into one 32-bit lane of a B tile (4 for int8).
    pub k_pack: usize,
}

impl TileParam {
    pub const fn new(
        m_tile: usize,
        n_tile: usize,
        k_tile: usize,
        is_bf16: bool,
        k_pack: usize,
    ) -> Self {
        Self { m_tile, n_tile, k_tile, is_bf16, k_pack }
    }

    /// Full 16×16×64 int8 tiles.
    pub const fn full_int8() -> Self {
        Self::new(16, 16, 64, false, 4)
    }

    fn src_elem_size(&self) -> usize {
        if self.is_bf16 {
            2
        } else {
            1
        }
    }
}

/// Palette-1 tile configuration, laid out as the hardware expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, align(64))]
pub struct TileConfig {
    pub palette_id: u8,
    pub start_row: u8,
    reserved: [u8; 14],
    pub colsb: [u16; 16],
    pub rows: [u8; 16],
}

impl TileConfig {
    /// Tiles 0-3 hold i32 accumulators, 4-5 the A operand, 6-7 the B operand.
    pub fn from_param(param: &TileParam) -> Self {
        let src = param.src_elem_size();
        let mut cfg = TileConfig {
            palette_id: 1,
            start_row: 0,
            reserved: [0; 14],
            colsb: [0; 16],
            rows: [0; 16],
        };
        for t in 0..4 {
            cfg.rows[t] = param.m_tile as u8;
            cfg.colsb[t] = (param.n_tile * 4) as u16;
        }
        for t in 4..6 {
            cfg.rows[t] = param.m_tile as u8;
            cfg.colsb[t] = (param.k_tile * src) as u16;
        }
        for t in 6..NUM_TILES {
            cfg.rows[t] = (param.k_tile / param.k_pack) as u8;
            cfg.colsb[t] = (param.n_tile * param.k_pack * src) as u16;
        }
        cfg
    }

    /// Whether every configured tile fits the 16-row × 64-byte register file.
    pub fn is_valid(&self) -> bool {
        self.palette_id == 1
            && (0..NUM_TILES).all(|t| self.rows[t] > 0 && self.rows[t] <= 16)
            && (0..NUM_TILES).all(|t| self.colsb[t] > 0 && self.colsb[t] <= 64)
    }
}

/// The two auxiliary micro-ops around tile usage: load a configuration
/// into the calling thread's tile registers, and release them.
pub trait TileRegisters: Send + Sync {
    fn configure(&self, cfg: &TileConfig);
    fn release(&self);
}

thread_local! {
    static EMULATED_TILES: Cell<Option<TileConfig>> = const { Cell::new(None) };
}

/// Tile configuration currently loaded on this thread by
/// [`EmulatedTileRegisters`], if any.
pub fn emulated_config() -> Option<TileConfig> {
    EMULATED_TILES.with(|t| t.get())
}

/// Software tile registers backing the portable micro-kernels.
///
/// Register state is thread-local exactly like the hardware's, so kernels
/// can check they run on a configured thread. Counters are shared between
/// clones for observing the lazy per-thread lifecycle.
#[derive(Debug, Clone, Default)]
pub struct EmulatedTileRegisters {
    configured: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl EmulatedTileRegisters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `configure` calls so far.
    pub fn configure_count(&self) -> usize {
        self.configured.load(Ordering::Relaxed)
    }

    /// Number of `release` calls that found a loaded configuration.
    pub fn release_count(&self) -> usize {
        self.released.load(Ordering::Relaxed)
    }
}

impl TileRegisters for EmulatedTileRegisters {
    fn configure(&self, cfg: &TileConfig) {
        debug_assert!(cfg.is_valid(), "invalid tile configuration {cfg:?}");
        EMULATED_TILES.with(|t| t.set(Some(*cfg)));
        self.configured.fetch_add(1, Ordering::Relaxed);
    }

    fn release(&self) {
        if EMULATED_TILES.with(|t| t.take()).is_some() {
            self.released.fetch_add(1, Ordering::Relaxed);
        }
    }
}
