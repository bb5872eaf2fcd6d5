use crate::chat::MessageBlock;
use crate::job::CorrelationId;

use super::state::JobStatus;

/// The only failure text a requester ever sees.
pub const GENERIC_FAILURE_NOTICE: &str = "Oh no! Something went wrong...";

/// One stored image of a delivered job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredImage {
    pub index: usize,
    pub url: String,
}

/// Placeholder text for a state.
///
/// A delivered job normally shows [`render_delivered`] instead.
pub fn render_progress(status: JobStatus) -> Vec<MessageBlock> {
    let text = match status {
        JobStatus::Queued => "_Queueing..._",
        JobStatus::Generating => "_Generating..._",
        JobStatus::Loading => "_Loading..._",
        JobStatus::Delivered => "_Delivered_",
        JobStatus::Errored => GENERIC_FAILURE_NOTICE,
    };
    vec![MessageBlock::markdown(text)]
}

/// Final content: one image block per artifact, in index order.
pub fn render_delivered(
    correlation_id: &CorrelationId,
    prompt: &str,
    images: &[DeliveredImage],
) -> Vec<MessageBlock> {
    let mut ordered: Vec<&DeliveredImage> = images.iter().collect();
    ordered.sort_by_key(|image| image.index);

    ordered
        .into_iter()
        .map(|image| MessageBlock::Image {
            url: image.url.clone(),
            alt_text: prompt.to_string(),
            title: prompt.to_string(),
            block_id: format!("{}_{}", correlation_id, image.index),
        })
        .collect()
}
