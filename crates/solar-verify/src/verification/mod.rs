//! Asynchronous verification: the work queue fed at submission time, the
//! worker pool draining it, and the orchestrator that drives one pipeline
//! invocation per application and writes back the terminal state.

pub mod orchestrator;
pub mod pipeline;
pub mod queue;


pub use orchestrator::{OrchestrationError, VerificationOrchestrator};
pub use pipeline::{
    ApplicationSnapshot, PipelineError, PipelineOutput, PipelineVerdict, VerificationPipeline,
};
pub use queue::{
    QueuedScheduler, ScheduleError, VerificationRequest, VerificationScheduler,
    VerificationWorkerPool,
};
