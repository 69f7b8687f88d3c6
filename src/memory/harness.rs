use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use super::allocator::{Allocator, BlockKind};
use crate::error::AllocError;

/// When the harness refuses an allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailPolicy {
    Never,
    /// Refuse the next request for this kind of block, then go back to `Never`.
    Next(BlockKind),
    /// Refuse the n-th request from now (1 is the very next), then go back to `Never`.
    Countdown(usize),
    /// Refuse each request with this probability, in percent.
    Percent(u8),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KindStats {
    pub live_blocks: usize,
    pub live_bytes: usize,
    pub double_frees: usize,
}

/// Snapshot of the harness counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocStats {
    pub acquired: usize,
    pub released: usize,
    pub refused: usize,
    pub kinds: [KindStats; 3],
}

impl AllocStats {
    pub fn kind(&self, kind: BlockKind) -> &KindStats {
        &self.kinds[kind.index()]
    }

    pub fn live_blocks(&self) -> usize {
        self.kinds.iter().map(|k| k.live_blocks).sum()
    }

    pub fn live_bytes(&self) -> usize {
        self.kinds.iter().map(|k| k.live_bytes).sum()
    }
}

struct HarnessState {
    policy: FailPolicy,
    rng: StdRng,
    stats: AllocStats,
}

/// Instrumented allocator: counts every block a queue acquires and releases,
/// detects leaks and double frees, and refuses allocations on demand.
pub struct Harness {
    state: Mutex<HarnessState>,
}

impl Harness {
    pub fn new() -> Harness {
        Harness::with_seed(0)
    }

    pub fn with_seed(seed: u64) -> Harness {
        Harness {
            state: Mutex::new(HarnessState {
                policy: FailPolicy::Never,
                rng: StdRng::seed_from_u64(seed),
                stats: AllocStats::default(),
            }),
        }
    }

    pub fn set_policy(&self, policy: FailPolicy) {
        self.state.lock().policy = policy;
    }

    pub fn policy(&self) -> FailPolicy {
        self.state.lock().policy
    }

    pub fn reseed(&self, seed: u64) {
        self.state.lock().rng = StdRng::seed_from_u64(seed);
    }

    pub fn stats(&self) -> AllocStats {
        self.state.lock().stats
    }

    /// Fails if any block is still outstanding or was released twice.
    pub fn check_leaks(&self) -> Result<(), AllocError> {
        let stats = self.stats();
        for kind in BlockKind::ALL {
            let k = stats.kind(kind);
            if k.double_frees > 0 {
                return Err(AllocError::DoubleFree { kind });
            }
            if k.live_blocks > 0 {
                warn!(%kind, blocks = k.live_blocks, bytes = k.live_bytes, "leaked blocks");
                return Err(AllocError::Leaked {
                    kind,
                    blocks: k.live_blocks,
                    bytes: k.live_bytes,
                });
            }
        }
        Ok(())
    }
}

impl Default for Harness {
    fn default() -> Self {
        Harness::new()
    }
}

impl HarnessState {
    fn should_refuse(&mut self, kind: BlockKind) -> bool {
        match self.policy {
            FailPolicy::Never => false,
            FailPolicy::Next(target) => {
                if target == kind {
                    self.policy = FailPolicy::Never;
                    true
                } else {
                    false
                }
            }
            FailPolicy::Countdown(n) => {
                if n <= 1 {
                    self.policy = FailPolicy::Never;
                    true
                } else {
                    self.policy = FailPolicy::Countdown(n - 1);
                    false
                }
            }
            FailPolicy::Percent(p) => self.rng.gen_range(0..100u8) < p,
        }
    }
}

impl Allocator for Harness {
    fn acquire(&self, kind: BlockKind, size: usize) -> Result<(), AllocError> {
        let mut state = self.state.lock();
        if state.should_refuse(kind) {
            state.stats.refused += 1;
            warn!(%kind, size, "allocation refused");
            return Err(AllocError::Refused { kind });
        }
        state.stats.acquired += 1;
        let k = &mut state.stats.kinds[kind.index()];
        k.live_blocks += 1;
        k.live_bytes += size;
        Ok(())
    }

    fn release(&self, kind: BlockKind, size: usize) {
        let mut state = self.state.lock();
        let k = &mut state.stats.kinds[kind.index()];
        if k.live_blocks == 0 {
            k.double_frees += 1;
            warn!(%kind, size, "release without matching allocation");
            return;
        }
        k.live_blocks -= 1;
        k.live_bytes = k.live_bytes.saturating_sub(size);
        state.stats.released += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_live_blocks() {
        let harness = Harness::new();
        harness.acquire(BlockKind::Node, 16).unwrap();
        harness.acquire(BlockKind::Payload, 4).unwrap();
        let stats = harness.stats();
        assert_eq!(stats.live_blocks(), 2);
        assert_eq!(stats.live_bytes(), 20);
        assert!(matches!(
            harness.check_leaks(),
            Err(AllocError::Leaked { .. })
        ));

        harness.release(BlockKind::Payload, 4);
        harness.release(BlockKind::Node, 16);
        assert_eq!(harness.stats().live_blocks(), 0);
        assert!(harness.check_leaks().is_ok());
    }

    #[test]
    fn detects_double_free() {
        let harness = Harness::new();
        harness.acquire(BlockKind::Node, 16).unwrap();
        harness.release(BlockKind::Node, 16);
        harness.release(BlockKind::Node, 16);
        assert_eq!(
            harness.check_leaks(),
            Err(AllocError::DoubleFree {
                kind: BlockKind::Node
            })
        );
    }

    #[test]
    fn next_policy_is_one_shot_and_kind_specific() {
        let harness = Harness::new();
        harness.set_policy(FailPolicy::Next(BlockKind::Payload));
        assert!(harness.acquire(BlockKind::Node, 16).is_ok());
        assert_eq!(
            harness.acquire(BlockKind::Payload, 2),
            Err(AllocError::Refused {
                kind: BlockKind::Payload
            })
        );
        assert_eq!(harness.policy(), FailPolicy::Never);
        assert!(harness.acquire(BlockKind::Payload, 2).is_ok());
        assert_eq!(harness.stats().refused, 1);
    }

    #[test]
    fn countdown_refuses_nth_request() {
        let harness = Harness::new();
        harness.set_policy(FailPolicy::Countdown(3));
        assert!(harness.acquire(BlockKind::Node, 1).is_ok());
        assert!(harness.acquire(BlockKind::Node, 1).is_ok());
        assert!(harness.acquire(BlockKind::Node, 1).is_err());
        assert!(harness.acquire(BlockKind::Node, 1).is_ok());
    }

    #[test]
    fn percent_extremes() {
        let harness = Harness::with_seed(7);
        harness.set_policy(FailPolicy::Percent(0));
        for _ in 0..100 {
            assert!(harness.acquire(BlockKind::Node, 1).is_ok());
        }
        harness.set_policy(FailPolicy::Percent(100));
        for _ in 0..100 {
            assert!(harness.acquire(BlockKind::Node, 1).is_err());
        }
    }

    #[test]
    fn percent_is_reproducible_for_a_seed() {
        let run = |seed| {
            let harness = Harness::with_seed(seed);
            harness.set_policy(FailPolicy::Percent(50));
            (0..64)
                .map(|_| harness.acquire(BlockKind::Payload, 1).is_ok())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
    }
}
