//! Parallel-for jobs with explicit dependencies, on a dedicated rayon pool.
//!
//! A job owns its output buffer while it runs and publishes it through a
//! [`JobHandle`]. A dependent job is chained onto its dependency as a
//! continuation: the dependency's worker starts it once its own output is
//! published, so no pool thread ever blocks on another job. The dependent
//! reads the dependency's output and drops it when done, so scratch data never
//! outlives the job that consumes it.

use crate::error::{LatticeError, Result};
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Items handed to a worker at a time.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Fork-join worker pool.
pub struct JobSystem {
    pool: rayon::ThreadPool,
}

type Continuation<T> = Box<dyn FnOnce(Option<T>) + Send>;

/// Where a job's result goes. `None` marks a failed job.
enum Slot<T> {
    Running,
    Chained(Continuation<T>),
    Finished(Option<T>),
    Taken,
}

struct Completion<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> Completion<T> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(Slot::Running),
            ready: Condvar::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands `result` to the chained continuation, or stores it for `wait`.
    fn publish(&self, result: Option<T>) {
        let mut slot = self.lock();
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Chained(next) => {
                drop(slot);
                next(result);
            }
            _ => {
                *slot = Slot::Finished(result);
                drop(slot);
                self.ready.notify_all();
            }
        }
    }
}

/// Completion handle for a scheduled job. [`JobHandle::wait`] blocks until the
/// job's output is published.
#[must_use = "a job's result is only visible after wait()"]
pub struct JobHandle<T> {
    name: &'static str,
    completion: Arc<Completion<T>>,
}

impl JobSystem {
    /// Starts a pool with `threads` workers (`None` = one per logical CPU).
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("lattice-worker-{i}"));
        if let Some(n) = threads {
            builder = builder.num_threads(n.max(1));
        }
        let pool = builder.build()?;
        log::debug!("job system started with {} workers", pool.current_num_threads());
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `kernel(i, slots)` for every item `i`, where `slots` is the
    /// `stride`-long window `output[i*stride .. (i+1)*stride]`. Items are
    /// handed out `batch` at a time.
    pub fn schedule<T, F>(
        &self,
        name: &'static str,
        output: Vec<T>,
        stride: usize,
        batch: usize,
        kernel: F,
    ) -> JobHandle<Vec<T>>
    where
        T: Send + 'static,
        F: Fn(usize, &mut [T]) + Send + Sync + 'static,
    {
        let completion = Completion::new();
        let handle = JobHandle { name, completion: Arc::clone(&completion) };
        self.pool.spawn(move || {
            let result = guarded(name, move || {
                let mut output = output;
                run_parallel_for(&mut output, stride, batch, &kernel);
                output
            });
            completion.publish(result);
        });
        handle
    }

    /// Like [`JobSystem::schedule`], but the kernel starts only after
    /// `dependency` has fully completed, and reads its output. The dependency's
    /// output is dropped as soon as this job finishes. If the dependency
    /// failed, so does this job.
    pub fn schedule_after<D, T, F>(
        &self,
        name: &'static str,
        dependency: JobHandle<D>,
        output: Vec<T>,
        stride: usize,
        batch: usize,
        kernel: F,
    ) -> JobHandle<Vec<T>>
    where
        D: Send + Sync + 'static,
        T: Send + 'static,
        F: Fn(&D, usize, &mut [T]) + Send + Sync + 'static,
    {
        let completion = Completion::new();
        let handle = JobHandle { name, completion: Arc::clone(&completion) };
        let dependency_name = dependency.name;

        self.chain(dependency, move |input: Option<D>| {
            let result = match input {
                Some(input) => guarded(name, move || {
                    let mut output = output;
                    let per_item = |i: usize, slots: &mut [T]| kernel(&input, i, slots);
                    run_parallel_for(&mut output, stride, batch, &per_item);
                    drop(input);
                    output
                }),
                None => {
                    log::error!("job '{name}' skipped: dependency '{dependency_name}' failed");
                    None
                }
            };
            completion.publish(result);
        });
        handle
    }

    /// Runs `next` with the dependency's result once it is published: inline on
    /// the dependency's worker if it is still running, else as a new pool job.
    fn chain<D, F>(&self, dependency: JobHandle<D>, next: F)
    where
        D: Send + 'static,
        F: FnOnce(Option<D>) + Send + 'static,
    {
        let mut slot = dependency.completion.lock();
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Running => *slot = Slot::Chained(Box::new(next)),
            Slot::Finished(result) => {
                drop(slot);
                self.pool.spawn(move || next(result));
            }
            // A handle is consumed by `wait` or `chain`, so nothing else can take its result.
            Slot::Chained(_) | Slot::Taken => {
                drop(slot);
                self.pool.spawn(move || next(None));
            }
        }
    }
}

/// A panic escaping a rayon spawn aborts the process; report it as a failed job instead.
fn guarded<T>(name: &'static str, job: impl FnOnce() -> T) -> Option<T> {
    panic::catch_unwind(AssertUnwindSafe(job))
        .map_err(|_| log::error!("job '{name}' panicked"))
        .ok()
}

impl<T> JobHandle<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Blocks until the job completes and returns its output.
    ///
    /// Call from outside the pool: a worker parked here cannot run the jobs
    /// it is waiting for. Jobs inside the pool depend on each other through
    /// [`JobSystem::schedule_after`] instead.
    pub fn wait(self) -> Result<T> {
        let mut slot = self.completion.lock();
        loop {
            match std::mem::replace(&mut *slot, Slot::Taken) {
                Slot::Finished(Some(value)) => return Ok(value),
                Slot::Running => {
                    *slot = Slot::Running;
                    slot = self
                        .completion
                        .ready
                        .wait(slot)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Slot::Finished(None) | Slot::Chained(_) | Slot::Taken => {
                    return Err(LatticeError::JobFailed(self.name))
                }
            }
        }
    }
}

fn run_parallel_for<T, F>(output: &mut [T], stride: usize, batch: usize, kernel: &F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync,
{
    let stride = stride.max(1);
    let batch = batch.max(1);

    output
        .par_chunks_mut(batch * stride)
        .enumerate()
        .for_each(|(chunk_index, chunk)| {
            let first = chunk_index * batch;
            for (j, slots) in chunk.chunks_exact_mut(stride).enumerate() {
                kernel(first + j, slots);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_schedule_visits_every_item_once() {
        let jobs = JobSystem::new(Some(4)).unwrap();
        let out = jobs
            .schedule("squares", vec![0usize; 1000], 1, 7, |i, s| s[0] = i * i)
            .wait()
            .unwrap();

        assert!(out.iter().enumerate().all(|(i, &v)| v == i * i));
    }

    #[test]
    fn test_stride_gives_disjoint_windows() {
        let jobs = JobSystem::new(Some(3)).unwrap();
        let out = jobs
            .schedule("triples", vec![0usize; 300], 3, 16, |i, s| {
                assert_eq!(s.len(), 3);
                s.copy_from_slice(&[i, i, i]);
            })
            .wait()
            .unwrap();

        for (i, w) in out.chunks(3).enumerate() {
            assert_eq!(w, &[i, i, i]);
        }
    }

    #[test]
    fn test_dependency_is_complete_before_dependent_runs() {
        // One worker: the dependent job must not block the only thread forever.
        for threads in [1, 4] {
            let jobs = JobSystem::new(Some(threads)).unwrap();
            let first = jobs.schedule("first", vec![0u32; 4096], 1, 64, |i, s| s[0] = i as u32 + 1);
            let second = jobs.schedule_after("second", first, vec![0u32; 4096], 1, 64, |src, i, s| {
                // Read a far-away item of the dependency: it must already be written.
                let j = src.len() - 1 - i;
                s[0] = src[j];
            });

            let out = second.wait().unwrap();
            assert!(out.iter().enumerate().all(|(i, &v)| v == (4096 - i) as u32));
        }
    }

    #[test]
    fn test_chained_jobs_complete_under_contention() {
        // Tiny batches on many workers: workers idling inside the first job's
        // fork-join frames pick up whatever else is queued on the pool.
        let jobs = JobSystem::new(Some(8)).unwrap();
        for round in 0..200u32 {
            let first = jobs.schedule("first", vec![0u32; 20_000], 1, 1, move |i, s| {
                s[0] = i as u32 ^ round
            });
            let second = jobs.schedule_after("second", first, vec![0u32; 2_000], 1, 1, |src, i, s| {
                s[0] = src[i * 10]
            });
            let out = second.wait().unwrap();
            assert_eq!(out[1], 10 ^ round);
        }
    }

    #[test]
    fn test_dependency_finished_before_chaining() {
        let jobs = JobSystem::new(Some(2)).unwrap();
        let first = jobs.schedule("first", vec![0u32; 64], 1, 8, |i, s| s[0] = i as u32);
        // Give the dependency time to publish before the dependent is attached.
        while !matches!(*first.completion.lock(), Slot::Finished(_)) {
            std::thread::yield_now();
        }

        let out = jobs
            .schedule_after("second", first, vec![0u32; 64], 1, 8, |src, i, s| s[0] = src[i] * 2)
            .wait()
            .unwrap();
        assert!(out.iter().enumerate().all(|(i, &v)| v == 2 * i as u32));
    }

    #[test]
    fn test_dependency_output_is_dropped_after_use() {
        struct Tracked(Arc<AtomicUsize>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let jobs = JobSystem::new(Some(2)).unwrap();
        let scratch: Vec<Tracked> = (0..8).map(|_| Tracked(drops.clone())).collect();

        let dep = jobs.schedule("scratch", scratch, 1, 2, |_, _| {});
        let out = jobs
            .schedule_after("consume", dep, vec![0u8; 8], 1, 2, |_, _, s| s[0] = 1)
            .wait()
            .unwrap();

        assert_eq!(out, vec![1u8; 8]);
        assert_eq!(drops.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_panicking_kernel_reports_job_failed() {
        let jobs = JobSystem::new(Some(2)).unwrap();
        let bad = jobs.schedule("bad", vec![0u8; 128], 1, 8, |i, _| {
            if i == 77 {
                panic!("boom");
            }
        });
        let follow = jobs.schedule_after("follow", bad, vec![0u8; 4], 1, 1, |_, _, _| {});

        match follow.wait() {
            Err(LatticeError::JobFailed(name)) => assert_eq!(name, "follow"),
            other => panic!("expected JobFailed, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_empty_output_completes() {
        let jobs = JobSystem::new(None).unwrap();
        let out: Vec<u8> = jobs.schedule("empty", Vec::new(), 3, 64, |_, _| {}).wait().unwrap();
        assert!(out.is_empty());
    }
}
