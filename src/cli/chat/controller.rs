use tracing::debug;

use super::conversation_state::{ConversationState, Message};
use super::instructions::with_instructions;
use crate::gateway_client::CompletionGateway;

/// Shown in place of an answer whenever the completion call fails.
pub const ERROR_TEXT: &str = "Oops! There seems to be an error. Please try again.";

/// Longest draft the composer accepts, in characters.
pub const MAX_DRAFT_CHARS: usize = 512;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub draft_input: String,
    pub busy: bool,
}

/// How a call to [`ConversationController::converse`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Empty draft, or a request was already in flight.
    Rejected,
    Answered,
    Failed,
}

/// Owns the transcript and the session state; every mutation goes through here.
///
/// The composer writes into the draft with [`set_draft`](Self::set_draft).
/// A turn is split in two halves: [`submit`](Self::submit) turns the stored
/// draft into a user message and hands back the transcript to send, then
/// exactly one of [`on_gateway_success`](Self::on_gateway_success) or
/// [`on_gateway_failure`](Self::on_gateway_failure) closes it.
#[derive(Debug, Default)]
pub struct ConversationController {
    conversation_state: ConversationState,
    session: SessionState,
}

impl ConversationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation_state.get_messages()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn is_busy(&self) -> bool {
        self.session.busy
    }

    /// Replace the draft, cut to [`MAX_DRAFT_CHARS`]. Returns `true` when
    /// the text had to be cut.
    pub fn set_draft(&mut self, text: &str) -> bool {
        let kept = truncate_chars(text, MAX_DRAFT_CHARS);
        self.session.draft_input = kept.to_string();
        kept.len() < text.len()
    }

    pub fn clear_draft(&mut self) {
        self.session.draft_input.clear();
    }

    /// Start a turn from the stored draft. Returns the transcript to send to
    /// the gateway, or `None` when the draft is blank or a request is already
    /// outstanding.
    pub fn submit(&mut self) -> Option<Vec<Message>> {
        if self.session.busy {
            debug!("Ignoring submission while a request is in flight");
            return None;
        }
        if self.session.draft_input.trim().is_empty() {
            return None;
        }

        let draft_text = std::mem::take(&mut self.session.draft_input);
        self.conversation_state
            .add_user_message(&with_instructions(&draft_text));
        self.session.busy = true;

        Some(self.conversation_state.get_messages().to_vec())
    }

    pub fn on_gateway_success(&mut self, message: Message) {
        self.conversation_state.push(message);
        self.session.busy = false;
    }

    pub fn on_gateway_failure(&mut self) {
        self.conversation_state.add_assistant_message(ERROR_TEXT);
        self.session.busy = false;
        self.session.draft_input.clear();
    }

    /// Submit the stored draft and run one full turn against `gateway`.
    /// Gateway errors are absorbed into the transcript and never returned.
    pub async fn converse<G>(&mut self, gateway: &G) -> TurnOutcome
    where
        G: CompletionGateway + ?Sized,
    {
        let Some(messages) = self.submit() else {
            return TurnOutcome::Rejected;
        };

        match gateway.complete(&messages).await {
            Ok(message) => {
                self.on_gateway_success(message);
                TurnOutcome::Answered
            }
            Err(e) => {
                debug!("Completion request failed: {}", e);
                self.on_gateway_failure();
                TurnOutcome::Failed
            }
        }
    }

    /// Drop everything but the greeting. Refused while a request is in flight.
    pub fn reset(&mut self) -> bool {
        if self.session.busy {
            return false;
        }
        self.conversation_state = ConversationState::new();
        self.session = SessionState::default();
        true
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
