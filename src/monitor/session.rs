use std::future::Future;
use std::thread;
use std::time::Duration;

use log::trace;

/// Why a bounded query produced no answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFailure {
    /// The query was still running at the deadline and has been dropped
    TimedOut(Duration),
    /// The private runtime could not be started or its thread died
    Runtime(String),
}

impl std::fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionFailure::TimedOut(deadline) => write!(f, "no answer within {:?}", deadline),
            SessionFailure::Runtime(msg) => write!(f, "query runtime failed: {}", msg),
        }
    }
}

/// Drive `query` on a short-lived runtime of its own and give up after `deadline`
///
/// The caller is usually the host loop's own runtime thread, which cannot block on
/// a second runtime, so the session runs on a scoped helper thread. Dropping the
/// future at the deadline cancels whatever it was waiting on.
pub fn run_bounded<F, T>(deadline: Duration, query: F) -> Result<T, SessionFailure>
where
    F: Future<Output = T> + Send,
    T: Send,
{
    thread::scope(|scope| {
        let worker = thread::Builder::new()
            .name("ambient-query".to_string())
            .spawn_scoped(scope, move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| SessionFailure::Runtime(e.to_string()))?;
                runtime
                    .block_on(async { tokio::time::timeout(deadline, query).await })
                    .map_err(|_| SessionFailure::TimedOut(deadline))
            })
            .map_err(|e| SessionFailure::Runtime(e.to_string()))?;

        let result = worker
            .join()
            .map_err(|_| SessionFailure::Runtime("query thread panicked".to_string()))?;
        if let Err(SessionFailure::TimedOut(_)) = &result {
            trace!("Query abandoned after {:?}", deadline);
        }
        result
    })
}
