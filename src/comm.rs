//! Thin façade over the collective operations the pipeline needs: reduce
//! and all-reduce over bounding boxes and small integer arrays.
//!
//! All collectives are blocking and must be invoked the same number of
//! times, in the same order, by every participating rank for a given call.
//! A violated invariant causes divergence or a hang, not a recoverable
//! error — this is a precondition, not something checked at runtime.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

use bytes::Bytes;
use dashmap::DashMap;
use num_traits::Zero;
use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};

use crate::geometry::BoundingBox;

/// Reduction operator for scalar/array collectives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReduceOp {
    /// Elementwise maximum.
    Max,
    /// Elementwise sum.
    Sum,
}

/// Blocking collective interface (minimal by design).
pub trait Communicator: Send + Sync {
    /// This process's rank in `0..size()`.
    fn rank(&self) -> usize;
    /// Number of participating processes.
    fn size(&self) -> usize;
    /// All-reduce an array of `u32` elementwise. Every rank passes the
    /// same length and receives the combined result.
    fn all_reduce_u32(&self, values: &[u32], op: ReduceOp) -> Vec<u32>;
    /// All-reduce a bounding box by max-extent union. Inverted local boxes
    /// contribute nothing.
    fn all_reduce_bounds(&self, local: &BoundingBox) -> BoundingBox;
    /// Reduce a bounding box to `root`. Returns `Some` on the root rank
    /// only. Still a collective: every rank must call it.
    fn reduce_bounds(&self, local: &BoundingBox, root: usize) -> Option<BoundingBox>;
}

fn combine_u32(op: ReduceOp, a: &mut [u32], b: &[u32]) {
    debug_assert_eq!(a.len(), b.len());
    for (x, &y) in a.iter_mut().zip(b) {
        *x = match op {
            ReduceOp::Max => (*x).max(y),
            ReduceOp::Sum => x.wrapping_add(y),
        };
    }
}

/// Compile-time no-op comm for pure serial execution and unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn all_reduce_u32(&self, values: &[u32], _op: ReduceOp) -> Vec<u32> {
        values.to_vec()
    }
    fn all_reduce_bounds(&self, local: &BoundingBox) -> BoundingBox {
        *local
    }
    fn reduce_bounds(&self, local: &BoundingBox, _root: usize) -> Option<BoundingBox> {
        Some(*local)
    }
}

// --- ThreadComm: in-process multi-rank worlds for tests ---

static WORLDS: Lazy<DashMap<u64, Arc<World>>> = Lazy::new(DashMap::new);
static NEXT_WORLD: AtomicU64 = AtomicU64::new(1);

struct Round {
    slots: Vec<Option<Bytes>>,
    result: Option<Bytes>,
    arrived: usize,
    leaving: usize,
}

struct World {
    size: usize,
    state: Mutex<Round>,
    cv: Condvar,
}

/// One rank of an in-process world. Every rank runs on its own thread and
/// the collectives rendezvous through shared state, which makes multi-rank
/// synchronization behavior testable without MPI.
#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    world_id: u64,
    world: Arc<World>,
}

impl ThreadComm {
    /// Create a world of `size` ranks, returning one handle per rank.
    pub fn world(size: usize) -> Vec<ThreadComm> {
        let world = Arc::new(World {
            size,
            state: Mutex::new(Round {
                slots: vec![None; size],
                result: None,
                arrived: 0,
                leaving: 0,
            }),
            cv: Condvar::new(),
        });
        let id = NEXT_WORLD.fetch_add(1, Relaxed);
        WORLDS.insert(id, world.clone());
        (0..size)
            .map(|rank| ThreadComm { rank, world_id: id, world: world.clone() })
            .collect()
    }

    /// Attach to an existing world by id (the id of any sibling handle).
    pub fn attach(world_id: u64, rank: usize) -> Option<ThreadComm> {
        let world = WORLDS.get(&world_id)?.clone();
        Some(ThreadComm { rank, world_id, world })
    }

    /// World id, shareable across threads for [`ThreadComm::attach`].
    pub fn world_id(&self) -> u64 {
        self.world_id
    }

    fn collective(&self, payload: Bytes, combine: impl Fn(&[Bytes]) -> Bytes) -> Bytes {
        let mut g = self.world.state.lock();
        // Let the previous round drain completely first.
        while g.leaving > 0 {
            self.world.cv.wait(&mut g);
        }
        g.slots[self.rank] = Some(payload);
        g.arrived += 1;
        if g.arrived == self.world.size {
            let inputs: Vec<Bytes> = g.slots.iter_mut().map(|s| s.take().unwrap()).collect();
            g.result = Some(combine(&inputs));
            g.arrived = 0;
            g.leaving = self.world.size;
            self.world.cv.notify_all();
        } else {
            while g.result.is_none() {
                self.world.cv.wait(&mut g);
            }
        }
        let out = g.result.clone().unwrap();
        g.leaving -= 1;
        if g.leaving == 0 {
            g.result = None;
            self.world.cv.notify_all();
        }
        out
    }
}

fn encode_u32(values: &[u32]) -> Bytes {
    let mut buf = Vec::with_capacity(values.len() * 4);
    for v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    Bytes::from(buf)
}

fn decode_u32(bytes: &Bytes) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn encode_bounds(b: &BoundingBox) -> Bytes {
    let mut buf = Vec::with_capacity(48);
    for v in b.min.iter().chain(b.max.iter()) {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    Bytes::from(buf)
}

fn decode_bounds(bytes: &Bytes) -> BoundingBox {
    let mut vals = [f64::zero(); 6];
    for (i, c) in bytes.chunks_exact(8).take(6).enumerate() {
        vals[i] = f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]);
    }
    BoundingBox {
        min: [vals[0], vals[1], vals[2]],
        max: [vals[3], vals[4], vals[5]],
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.world.size
    }
    fn all_reduce_u32(&self, values: &[u32], op: ReduceOp) -> Vec<u32> {
        let out = self.collective(encode_u32(values), |inputs| {
            let mut acc = decode_u32(&inputs[0]);
            for input in &inputs[1..] {
                combine_u32(op, &mut acc, &decode_u32(input));
            }
            encode_u32(&acc)
        });
        decode_u32(&out)
    }
    fn all_reduce_bounds(&self, local: &BoundingBox) -> BoundingBox {
        let out = self.collective(encode_bounds(local), |inputs| {
            let mut acc = BoundingBox::default();
            for input in inputs {
                acc.union(&decode_bounds(input));
            }
            encode_bounds(&acc)
        });
        decode_bounds(&out)
    }
    fn reduce_bounds(&self, local: &BoundingBox, root: usize) -> Option<BoundingBox> {
        let reduced = self.all_reduce_bounds(local);
        (self.rank == root).then_some(reduced)
    }
}

impl Drop for ThreadComm {
    fn drop(&mut self) {
        // Last two references are this handle and the registry entry.
        if Arc::strong_count(&self.world) == 2 {
            WORLDS.remove(&self.world_id);
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::collective::SystemOperation;
    use mpi::environment::Universe;
    use mpi::traits::*;

    /// MPI-backed communicator over the world communicator.
    pub struct MpiComm {
        universe: Universe,
    }

    impl MpiComm {
        /// Initialize MPI and wrap the world communicator. Returns `None`
        /// when MPI was already initialized.
        pub fn new() -> Option<Self> {
            mpi::initialize().map(|universe| Self { universe })
        }
    }

    impl Communicator for MpiComm {
        fn rank(&self) -> usize {
            self.universe.world().rank() as usize
        }
        fn size(&self) -> usize {
            self.universe.world().size() as usize
        }
        fn all_reduce_u32(&self, values: &[u32], op: ReduceOp) -> Vec<u32> {
            let mut out = vec![0u32; values.len()];
            let world = self.universe.world();
            match op {
                ReduceOp::Max => {
                    world.all_reduce_into(values, &mut out[..], SystemOperation::max())
                }
                ReduceOp::Sum => {
                    world.all_reduce_into(values, &mut out[..], SystemOperation::sum())
                }
            }
            out
        }
        fn all_reduce_bounds(&self, local: &BoundingBox) -> BoundingBox {
            // Negate the mins so a single max reduction unions the boxes.
            let send = [
                -local.min[0], -local.min[1], -local.min[2],
                local.max[0], local.max[1], local.max[2],
            ];
            let mut recv = [f64::NEG_INFINITY; 6];
            self.universe
                .world()
                .all_reduce_into(&send[..], &mut recv[..], SystemOperation::max());
            BoundingBox {
                min: [-recv[0], -recv[1], -recv[2]],
                max: [recv[3], recv[4], recv[5]],
            }
        }
        fn reduce_bounds(&self, local: &BoundingBox, root: usize) -> Option<BoundingBox> {
            let reduced = self.all_reduce_bounds(local);
            (self.rank() == root).then_some(reduced)
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nocomm_is_identity() {
        let c = NoComm;
        assert_eq!(c.all_reduce_u32(&[3, 1], ReduceOp::Max), vec![3, 1]);
        let b = BoundingBox::from_bounds([0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
        assert_eq!(c.all_reduce_bounds(&b), b);
    }

    #[test]
    fn thread_world_all_reduce_max() {
        let comms = ThreadComm::world(3);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| {
                std::thread::spawn(move || {
                    let mine = [c.rank() as u32, 10 - c.rank() as u32];
                    c.all_reduce_u32(&mine, ReduceOp::Max)
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), vec![2, 10]);
        }
    }

    #[test]
    fn thread_world_bounds_union() {
        let comms = ThreadComm::world(2);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| {
                std::thread::spawn(move || {
                    let local = if c.rank() == 0 {
                        BoundingBox::from_bounds([0.0, 1.0, 0.0, 1.0, 0.0, 1.0])
                    } else {
                        BoundingBox::from_bounds([-1.0, 0.5, 0.0, 2.0, 0.0, 1.0])
                    };
                    c.all_reduce_bounds(&local)
                })
            })
            .collect();
        for h in handles {
            let got = h.join().unwrap();
            assert_eq!(got.as_bounds(), [-1.0, 1.0, 0.0, 2.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn consecutive_collectives_do_not_interleave() {
        let comms = ThreadComm::world(2);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| {
                std::thread::spawn(move || {
                    let mut sums = Vec::new();
                    for round in 0..10u32 {
                        let v = c.all_reduce_u32(&[round + c.rank() as u32], ReduceOp::Sum);
                        sums.push(v[0]);
                    }
                    sums
                })
            })
            .collect();
        for h in handles {
            let sums = h.join().unwrap();
            let expect: Vec<u32> = (0..10).map(|r| 2 * r + 1).collect();
            assert_eq!(sums, expect);
        }
    }
}
