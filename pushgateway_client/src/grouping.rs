use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE};
use serde::Serialize;
use url::{PathSegmentsMut, Url};

use crate::errors::GatewayError;

/// The `{job, instance}` grouping key under which series are pushed.
///
/// A key without an instance addresses the job-only group, which on the
/// Pushgateway is a distinct group from every `{job, instance}` group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupKey {
    pub job: String,
    pub instance: Option<String>,
}

impl GroupKey {
    pub fn job(job: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            instance: None,
        }
    }

    pub fn with_instance(job: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            instance: Some(instance.into()),
        }
    }

    /// Builds `<base>/metrics/job/<job>[/instance/<instance>]`.
    pub fn url(&self, base: &Url) -> Result<Url, GatewayError> {
        let mut url = base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| GatewayError::CannotBeABase(base.to_string()))?;
            segments.pop_if_empty().push("metrics");
            push_label(&mut segments, "job", &self.job);
            if let Some(instance) = &self.instance {
                push_label(&mut segments, "instance", instance);
            }
        }
        Ok(url)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance {
            Some(instance) => write!(f, "job={} instance={}", self.job, instance),
            None => write!(f, "job={}", self.job),
        }
    }
}

// The gateway splits the path on '/', so such values (and the empty value)
// must go through its `<label>@base64/<value>` form.
fn push_label(segments: &mut PathSegmentsMut<'_>, name: &str, value: &str) {
    if value.is_empty() {
        segments.push(&format!("{name}@base64")).push("=");
    } else if value.contains('/') {
        segments
            .push(&format!("{name}@base64"))
            .push(&URL_SAFE.encode(value));
    } else {
        segments.push(name).push(value);
    }
}
