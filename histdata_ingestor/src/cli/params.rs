use crate::{
    cli::commands::IngestArgs,
    models::request_params::{DownloadRequest, DownloadRequestError},
    requests::batch::RetryPolicy,
};

/// The monthly requests named by `args`, in chronological order.
pub fn download_requests(args: &IngestArgs) -> Result<Vec<DownloadRequest>, DownloadRequestError> {
    let first = DownloadRequest::new(&args.pair, args.year, args.month)?;
    Ok(first.months(args.months as usize))
}

/// `base` with the command-line overrides applied.
pub fn retry_policy(args: &IngestArgs, base: RetryPolicy) -> RetryPolicy {
    RetryPolicy {
        max_retries: args.max_retries.unwrap_or(base.max_retries),
        base_delay_ms: args.base_delay_ms.unwrap_or(base.base_delay_ms),
    }
}
