use crate::graph::resource::PipelineStage;

/// Opaque handle to a timeline semaphore owned by the GPU submission interface. Semaphores are used for GPU-GPU sync.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Semaphore(pub u64);

/// Wait until a timeline semaphore reaches `value` before `stage` of the submission.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SemaphoreWait {
    pub semaphore: Semaphore,
    pub value: u64,
    pub stage: PipelineStage,
}

/// Set a timeline semaphore to `value` once the submission completes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SemaphoreSignal {
    pub semaphore: Semaphore,
    pub value: u64,
}
