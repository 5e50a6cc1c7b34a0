use stagehand::cli::{internal_error, run, user_error};
use stagehand::error::WorkflowError;
use stagehand::repo::StaleStatement;

/// Failures of the machinery rather than of the request
fn is_internal(e: &anyhow::Error) -> bool {
    // A lost race is the user's to retry
    let stale = e.chain().any(|cause| match cause.downcast_ref::<WorkflowError>() {
        Some(WorkflowError::Save(inner)) => inner.is::<StaleStatement>(),
        _ => cause.is::<StaleStatement>(),
    });
    if stale {
        return false;
    }
    e.chain().any(|cause| {
        cause.is::<rusqlite::Error>()
            || cause.is::<std::io::Error>()
            || matches!(cause.downcast_ref::<WorkflowError>(), Some(WorkflowError::Save(_)))
    })
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = run() {
        if is_internal(&e) {
            // Alternate form carries the whole cause chain
            internal_error(&format!("{:#}", e));
        }
        user_error(&e.to_string());
    }
}
