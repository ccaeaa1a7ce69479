//! Per-worker execution state.
//!
//! Each pool thread owns a slice of the softmax scratch region and tracks
//! whether it has loaded the tile configuration during the current call.
//! Sessions live for one `execute` call.

use parking_lot::Mutex;
use qmha_kernels::{TileConfig, TileRegisters};
use rayon::ThreadPool;

pub struct WorkerSession<'w> {
    scratch: &'w mut [u8],
    tiles_ready: bool,
}

impl<'w> WorkerSession<'w> {
    /// Load `cfg` into this thread's tile registers unless already done.
    pub fn ensure_tiles(&mut self, regs: &dyn TileRegisters, cfg: &TileConfig) {
        if !self.tiles_ready {
            regs.configure(cfg);
            self.tiles_ready = true;
        }
    }

    pub fn scratch(&mut self) -> &mut [u8] {
        &mut *self.scratch
    }
}

/// One session per pool thread, indexed by rayon's worker index.
///
/// Only the owning worker ever locks its slot, so the mutexes are
/// uncontended.
pub struct WorkerSessions<'w> {
    slots: Vec<Mutex<WorkerSession<'w>>>,
}

impl<'w> WorkerSessions<'w> {
    /// Carve `workers` scratch slices of `per_worker` bytes from `region`.
    pub fn new(region: &'w mut [u8], per_worker: usize, workers: usize) -> Self {
        let mut slots = Vec::with_capacity(workers);
        let mut rest = region;
        for _ in 0..workers {
            let (scratch, tail) = rest.split_at_mut(per_worker);
            slots.push(Mutex::new(WorkerSession { scratch, tiles_ready: false }));
            rest = tail;
        }
        Self { slots }
    }

    /// Run `f` on the calling worker's session.
    pub fn with_current<R>(&self, f: impl FnOnce(&mut WorkerSession<'w>) -> R) -> R {
        let idx = rayon::current_thread_index().unwrap_or(0) % self.slots.len();
        let mut session = self.slots[idx].lock();
        f(&mut session)
    }

    /// Release tile registers on every worker of `pool` that configured
    /// them. Returns how many were released.
    pub fn release_all(&self, pool: &ThreadPool, regs: &dyn TileRegisters) -> usize {
        pool.broadcast(|ctx| {
            let mut session = self.slots[ctx.index() % self.slots.len()].lock();
            if session.tiles_ready {
                regs.release();
                session.tiles_ready = false;
                1
            } else {
                0
            }
        })
        .into_iter()
        .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qmha_kernels::{EmulatedTileRegisters, TileParam};
    use rayon::prelude::*;

    fn tiles_configured(sessions: &WorkerSessions<'_>) -> usize {
        sessions.slots.iter().filter(|s| s.lock().tiles_ready).count()
    }

    #[test]
    fn test_scratch_slices_disjoint() {
        let mut region = vec![0u8; 40];
        let sessions = WorkerSessions::new(&mut region, 10, 3);
        assert_eq!(sessions.slots.len(), 3);
        for (i, slot) in sessions.slots.iter().enumerate() {
            slot.lock().scratch().fill(i as u8 + 1);
        }
        drop(sessions);
        assert_eq!(&region[..10], &[1; 10]);
        assert_eq!(&region[20..30], &[3; 10]);
        assert_eq!(&region[30..], &[0; 10]);
    }

    #[test]
    fn test_configure_once_then_release() {
        let regs = EmulatedTileRegisters::new();
        let cfg = TileConfig::from_param(&TileParam::full_int8());
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let mut region = vec![0u8; 32];
        let sessions = WorkerSessions::new(&mut region, 16, pool.current_num_threads());

        pool.install(|| {
            (0..64).into_par_iter().for_each(|_| {
                sessions.with_current(|s| s.ensure_tiles(&regs, &cfg));
            });
        });
        let configured = regs.configure_count();
        assert!((1..=2).contains(&configured));
        assert_eq!(tiles_configured(&sessions), configured);

        assert_eq!(sessions.release_all(&pool, &regs), configured);
        assert_eq!(regs.release_count(), configured);
        assert_eq!(tiles_configured(&sessions), 0);
    }
}
