use crate::model::message::Message;
use crate::model::transcript::TranscriptEntry;

/// What the ReplyWorker hands to a generator: the history copied out of the
/// log plus the request it is answering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPrompt {
    pub history: Vec<TranscriptEntry>,
    pub request: TranscriptEntry,
}

/// Builds the prompt for `request` from a transcript copy.
///
/// The Recorder and the ReplyWorker receive the same human turn on
/// different channels, so the copy may already hold this request, and
/// when turns queue up, later ones too. The history is cut at the
/// request's last occurrence: the model sees neither the request twice
/// nor anything said after it.
pub fn compose(mut history: Vec<TranscriptEntry>, request: &Message) -> GenerationPrompt {
    let request = TranscriptEntry::from(request);
    if let Some(at) = history.iter().rposition(|entry| *entry == request) {
        history.truncate(at);
    }
    GenerationPrompt { history, request }
}
