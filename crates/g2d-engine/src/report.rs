use tracing::error;

use crate::error::BlitError;
use crate::params::BlitParams;

/// Log a failed submission together with the whole request.
pub fn report_failure(err: &BlitError, params: &BlitParams) {
    let clip = match params.clip {
        Some(clip) => clip.to_string(),
        None => "none".to_owned(),
    };
    error!(
        error = %err,
        src = %params.src,
        dst = %params.dst,
        clip = %clip,
        flags = %params.flags,
        "blit failed"
    );
}
