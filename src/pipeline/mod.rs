pub mod affinity;
pub mod classifier;
pub mod router;
pub mod server;
pub mod signal;
pub mod stream;
pub mod worker;

pub use classifier::{select_top_label, Classification, Classifier, MeanColorClassifier, Prediction};
pub use router::{route, Route};
pub use server::{create_router, ServerState};
pub use signal::Signal;
pub use stream::{run_stream_session, PartSink, SessionEnd, SessionSummary};
pub use worker::{Cycle, CycleOutcome, FailedStage, InferenceWorker, Phase, WorkerStats};
