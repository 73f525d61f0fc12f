//! Per-CPU "in transaction" guard (spec §5: one controller mutex, no
//! concurrent mutation of the same range). Mirrors `percpu.rs`'s
//! pattern of keying per-CPU state off `MPIDR_EL1.Aff0`, generalized to
//! a host build with no SMP concept (a single flag).

use core::sync::atomic::{AtomicBool, Ordering};

#[cfg(target_arch = "aarch64")]
const MAX_CPUS: usize = 8;

#[cfg(target_arch = "aarch64")]
static IN_TRANSACTION: [AtomicBool; MAX_CPUS] = [
    AtomicBool::new(false),
    AtomicBool::new(false),
    AtomicBool::new(false),
    AtomicBool::new(false),
    AtomicBool::new(false),
    AtomicBool::new(false),
    AtomicBool::new(false),
    AtomicBool::new(false),
];

#[cfg(not(target_arch = "aarch64"))]
static IN_TRANSACTION: AtomicBool = AtomicBool::new(false);

#[cfg(target_arch = "aarch64")]
fn current_cpu_id() -> usize {
    let mpidr: u64;
    unsafe { core::arch::asm!("mrs {0}, mpidr_el1", out(reg) mpidr, options(nostack, nomem)) };
    (mpidr & 0xff) as usize % MAX_CPUS
}

/// Marks the calling CPU as mid-mutation for the lifetime of one
/// map/unmap/prealloc call. Panics on reentrancy: a controller method
/// invoking another on the same stack would mean a modifier is calling
/// back into the controller, which is a bug, not a legitimate nested
/// operation (spec.md §5 assumes the caller serializes access and
/// disables preemption around a single call).
pub struct TransactionGuard {
    #[cfg(target_arch = "aarch64")]
    cpu: usize,
}

impl TransactionGuard {
    pub fn begin() -> Self {
        #[cfg(target_arch = "aarch64")]
        {
            let cpu = current_cpu_id();
            let was_set = IN_TRANSACTION[cpu].swap(true, Ordering::Acquire);
            assert!(!was_set, "reentrant translation-table mutation on cpu {}", cpu);
            Self { cpu }
        }
        #[cfg(not(target_arch = "aarch64"))]
        {
            let was_set = IN_TRANSACTION.swap(true, Ordering::Acquire);
            assert!(!was_set, "reentrant translation-table mutation");
            Self {}
        }
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        #[cfg(target_arch = "aarch64")]
        IN_TRANSACTION[self.cpu].store(false, Ordering::Release);
        #[cfg(not(target_arch = "aarch64"))]
        IN_TRANSACTION.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_drop_allows_reacquire() {
        {
            let _g = TransactionGuard::begin();
        }
        let _g2 = TransactionGuard::begin();
    }

    #[test]
    #[should_panic(expected = "reentrant")]
    fn reentrant_begin_panics() {
        let _outer = TransactionGuard::begin();
        let _inner = TransactionGuard::begin();
    }
}
