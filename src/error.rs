use thiserror::Error;

#[derive(Error, Debug)]
pub enum CronmeshError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Error retrieving job {0} from store: {1}")]
    StoreRead(String, String),

    #[error("Error storing job {0} before dispatch: {1}")]
    StoreWrite(String, String),

    #[error("No scheduler entry for job: {0}")]
    SchedulerMissing(String),

    #[error("Invalid tag expression '{1}' for tag '{0}'")]
    BadTagExpression(String, String),

    #[error("Failed to send broadcast query: {0}")]
    Transport(String),

    #[error("Malformed run query payload: {0}")]
    BadPayload(String),

    #[error("Invalid schedule '{0}': {1}")]
    BadSchedule(String, String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CronmeshError>;
