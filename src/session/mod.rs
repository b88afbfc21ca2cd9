//! Per-conversation selection state
//!
//! A [`Session`] walks `Idle -> AwaitingScope -> AwaitingFormat -> Processing -> Idle`.
//! [`Session::apply`] is total over (state, event): every event either moves the session to
//! a new state with all fields consistent, or leaves it untouched. It never performs I/O
//! itself; it returns the [`Action`]s the caller must carry out.

use crate::types::{
    ChoiceOption, ChoiceToken, CollectionRef, FormatChoice, InboundEvent, ItemRef,
    OutboundMessage, Scope, SessionId,
};
use tracing::{debug, info, warn};

/// Reply to `SessionStarted`
pub const GREETING_TEXT: &str =
    "Send me an animated sticker and I'll download the entire sticker set as a ZIP file.";
/// Prompt shown after an animated sticker arrives
pub const SCOPE_PROMPT_TEXT: &str = "Do you want to download just this sticker or the whole set?";
/// Prompt shown after the scope is chosen
pub const FORMAT_PROMPT_TEXT: &str = "Choose the format:";
/// Reply to a sticker that is not animated
pub const NOT_ANIMATED_TEXT: &str = "Please send an animated sticker.";
/// Reply to `SessionReset`
pub const STOPPED_TEXT: &str = "Current download stopped.";
/// Reply to items and buttons that arrive while a job is running
pub const STILL_WORKING_TEXT: &str =
    "Still working on your previous request. Send /stop to cancel it.";
/// Reply to "Whole set" for a sticker without a set
pub const NO_COLLECTION_TEXT: &str = "This sticker does not belong to a set.";

/// Where a session is in the selection flow
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing selected
    Idle,
    /// An animated sticker was received, waiting for the scope
    AwaitingScope,
    /// Scope chosen, waiting for the format
    AwaitingFormat,
    /// A job is running for this session
    Processing,
}

/// Everything a job needs from a completed selection
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobRequest {
    /// Conversation the job reports to
    pub session_id: SessionId,
    /// The sticker that started the selection
    pub item_ref: ItemRef,
    /// Set the sticker belongs to
    pub collection_ref: Option<CollectionRef>,
    /// Single sticker or whole set
    pub scope: Scope,
    /// Chosen output format
    pub format: FormatChoice,
}

/// Side effect requested by a transition
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Send a message to the user
    Reply(OutboundMessage),
    /// Start a job for the completed selection
    StartJob(JobRequest),
    /// Cancel the job currently running for this session
    CancelJob,
}

/// Selection state of one conversation
#[derive(Clone, Debug)]
pub struct Session {
    session_id: SessionId,
    state: SessionState,
    selected_item: Option<ItemRef>,
    collection_ref: Option<CollectionRef>,
    scope: Option<Scope>,
    format: Option<FormatChoice>,
}

impl Session {
    /// Create an idle session
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            state: SessionState::Idle,
            selected_item: None,
            collection_ref: None,
            scope: None,
            format: None,
        }
    }

    /// Conversation this session belongs to
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Sticker recorded by the last accepted item event
    pub fn selected_item(&self) -> Option<&ItemRef> {
        self.selected_item.as_ref()
    }

    /// Set recorded by the last accepted item event
    pub fn collection_ref(&self) -> Option<&CollectionRef> {
        self.collection_ref.as_ref()
    }

    /// Chosen scope, if any
    pub fn scope(&self) -> Option<Scope> {
        self.scope
    }

    /// Chosen format, if any
    pub fn format(&self) -> Option<FormatChoice> {
        self.format
    }

    /// Apply an inbound event and return the actions the caller must perform
    pub fn apply(&mut self, event: &InboundEvent) -> Vec<Action> {
        match event {
            InboundEvent::SessionStarted { .. } => {
                let mut actions = self.reset();
                actions.push(self.reply(GREETING_TEXT));
                actions
            }
            InboundEvent::SessionReset { .. } => {
                let mut actions = self.reset();
                actions.push(self.reply(STOPPED_TEXT));
                actions
            }
            InboundEvent::ItemReceived {
                item_ref,
                is_animated,
                collection_ref,
                ..
            } => self.on_item(item_ref, *is_animated, collection_ref.as_ref()),
            InboundEvent::ButtonSelected { token, .. } => self.on_button(token),
        }
    }

    /// Return to `Idle` once the running job has ended, successfully or not
    pub fn finish_job(&mut self) {
        if self.state == SessionState::Processing {
            debug!(session_id = %self.session_id, "job finished, session idle");
            self.clear();
        }
    }

    fn on_item(
        &mut self,
        item_ref: &ItemRef,
        is_animated: bool,
        collection_ref: Option<&CollectionRef>,
    ) -> Vec<Action> {
        if self.state == SessionState::Processing {
            return vec![self.reply(STILL_WORKING_TEXT)];
        }
        if !is_animated {
            debug!(session_id = %self.session_id, item = %item_ref, "rejected non-animated sticker");
            return vec![self.reply(NOT_ANIMATED_TEXT)];
        }

        // A new sticker always replaces whatever selection was in progress
        self.clear();
        self.selected_item = Some(item_ref.clone());
        self.collection_ref = collection_ref.cloned();
        self.state = SessionState::AwaitingScope;
        info!(
            session_id = %self.session_id,
            item = %item_ref,
            collection = ?self.collection_ref.as_ref().map(CollectionRef::as_str),
            "received animated sticker"
        );

        let mut options = vec![ChoiceOption::from(Scope::SingleItem)];
        if self.collection_ref.is_some() {
            options.push(ChoiceOption::from(Scope::WholeCollection));
        }
        vec![Action::Reply(OutboundMessage::ChoicePrompt {
            session_id: self.session_id,
            text: SCOPE_PROMPT_TEXT.to_string(),
            options,
        })]
    }

    fn on_button(&mut self, raw: &str) -> Vec<Action> {
        let token: ChoiceToken = match raw.parse() {
            Ok(token) => token,
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "ignoring button");
                return Vec::new();
            }
        };

        match (self.state, token) {
            (SessionState::Processing, _) => vec![self.reply(STILL_WORKING_TEXT)],
            (SessionState::AwaitingScope, ChoiceToken::Scope(Scope::WholeCollection))
                if self.collection_ref.is_none() =>
            {
                vec![self.reply(NO_COLLECTION_TEXT)]
            }
            (SessionState::AwaitingScope, ChoiceToken::Scope(scope)) => {
                self.scope = Some(scope);
                self.state = SessionState::AwaitingFormat;
                debug!(session_id = %self.session_id, ?scope, "scope selected");
                vec![Action::Reply(OutboundMessage::ChoicePrompt {
                    session_id: self.session_id,
                    text: FORMAT_PROMPT_TEXT.to_string(),
                    options: FormatChoice::ALL_CHOICES
                        .iter()
                        .copied()
                        .map(ChoiceOption::from)
                        .collect(),
                })]
            }
            (SessionState::AwaitingFormat, ChoiceToken::Format(format)) => {
                // Both fields were set on the way here; anything else leaves the session alone
                let (Some(item_ref), Some(scope)) = (self.selected_item.clone(), self.scope)
                else {
                    warn!(session_id = %self.session_id, "incomplete selection, ignoring format");
                    return Vec::new();
                };
                self.format = Some(format);
                self.state = SessionState::Processing;
                info!(session_id = %self.session_id, ?scope, %format, "selection complete");
                vec![Action::StartJob(JobRequest {
                    session_id: self.session_id,
                    item_ref,
                    collection_ref: self.collection_ref.clone(),
                    scope,
                    format,
                })]
            }
            (state, token) => {
                debug!(session_id = %self.session_id, ?state, %token, "button does not match state, ignoring");
                Vec::new()
            }
        }
    }

    fn reset(&mut self) -> Vec<Action> {
        let was_processing = self.state == SessionState::Processing;
        self.clear();
        if was_processing {
            info!(session_id = %self.session_id, "cancelling running job");
            vec![Action::CancelJob]
        } else {
            Vec::new()
        }
    }

    fn clear(&mut self) {
        self.state = SessionState::Idle;
        self.selected_item = None;
        self.collection_ref = None;
        self.scope = None;
        self.format = None;
    }

    fn reply(&self, text: &str) -> Action {
        Action::Reply(OutboundMessage::text(self.session_id, text))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const ID: SessionId = SessionId(42);

    fn item(animated: bool) -> InboundEvent {
        InboundEvent::ItemReceived {
            session_id: ID,
            item_ref: ItemRef::from("file-1"),
            is_animated: animated,
            collection_ref: Some(CollectionRef::from("HappyCats")),
        }
    }

    fn button(token: &str) -> InboundEvent {
        InboundEvent::ButtonSelected {
            session_id: ID,
            token: token.to_string(),
        }
    }

    fn reset() -> InboundEvent {
        InboundEvent::SessionReset { session_id: ID }
    }

    fn assert_cleared(session: &Session) {
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.selected_item().is_none());
        assert!(session.collection_ref().is_none());
        assert!(session.scope().is_none());
        assert!(session.format().is_none());
    }

    fn session_in(state: SessionState) -> Session {
        let mut session = Session::new(ID);
        if state == SessionState::Idle {
            return session;
        }
        session.apply(&item(true));
        if state == SessionState::AwaitingScope {
            return session;
        }
        session.apply(&button("scope:whole"));
        if state == SessionState::AwaitingFormat {
            return session;
        }
        session.apply(&button("format:gif"));
        assert_eq!(session.state(), SessionState::Processing);
        session
    }

    #[test]
    fn non_animated_item_keeps_idle() {
        let mut session = Session::new(ID);
        let actions = session.apply(&item(false));

        assert_cleared(&session);
        assert_eq!(
            actions,
            vec![Action::Reply(OutboundMessage::text(ID, NOT_ANIMATED_TEXT))]
        );
    }

    #[test]
    fn animated_item_prompts_for_scope() {
        let mut session = Session::new(ID);
        let actions = session.apply(&item(true));

        assert_eq!(session.state(), SessionState::AwaitingScope);
        assert_eq!(session.selected_item(), Some(&ItemRef::from("file-1")));
        assert_eq!(session.collection_ref(), Some(&CollectionRef::from("HappyCats")));
        match &actions[..] {
            [Action::Reply(OutboundMessage::ChoicePrompt { text, options, .. })] => {
                assert_eq!(text, SCOPE_PROMPT_TEXT);
                let tokens: Vec<String> = options.iter().map(|o| o.token.to_string()).collect();
                assert_eq!(tokens, vec!["scope:single", "scope:whole"]);
            }
            other => panic!("unexpected actions {other:?}"),
        }
    }

    #[test]
    fn full_selection_starts_job() {
        let mut session = session_in(SessionState::AwaitingScope);

        let actions = session.apply(&button("scope:single"));
        assert_eq!(session.state(), SessionState::AwaitingFormat);
        match &actions[..] {
            [Action::Reply(OutboundMessage::ChoicePrompt { options, .. })] => {
                let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
                assert_eq!(labels, vec!["PNG", "WEBP", "GIF", "LOTTIE", "Download All"]);
            }
            other => panic!("unexpected actions {other:?}"),
        }

        let actions = session.apply(&button("format:all"));
        assert_eq!(session.state(), SessionState::Processing);
        assert_eq!(
            actions,
            vec![Action::StartJob(JobRequest {
                session_id: ID,
                item_ref: ItemRef::from("file-1"),
                collection_ref: Some(CollectionRef::from("HappyCats")),
                scope: Scope::SingleItem,
                format: FormatChoice::All,
            })]
        );

        session.finish_job();
        assert_cleared(&session);
    }

    #[test]
    fn reset_from_any_state_clears_everything() {
        for state in [
            SessionState::Idle,
            SessionState::AwaitingScope,
            SessionState::AwaitingFormat,
            SessionState::Processing,
        ] {
            let mut session = session_in(state);
            let actions = session.apply(&reset());

            assert_cleared(&session);
            let expected_cancel = state == SessionState::Processing;
            assert_eq!(actions.contains(&Action::CancelJob), expected_cancel, "{state:?}");
            assert_eq!(
                actions.last(),
                Some(&Action::Reply(OutboundMessage::text(ID, STOPPED_TEXT)))
            );
        }
    }

    #[test]
    fn start_greets_and_clears() {
        let mut session = session_in(SessionState::AwaitingFormat);
        let actions = session.apply(&InboundEvent::SessionStarted { session_id: ID });

        assert_cleared(&session);
        assert_eq!(
            actions,
            vec![Action::Reply(OutboundMessage::text(ID, GREETING_TEXT))]
        );
    }

    #[test]
    fn mismatched_buttons_leave_fields_untouched() {
        let mut session = session_in(SessionState::AwaitingScope);
        assert!(session.apply(&button("format:png")).is_empty());
        assert_eq!(session.state(), SessionState::AwaitingScope);
        assert!(session.format().is_none());

        let mut session = session_in(SessionState::AwaitingFormat);
        assert!(session.apply(&button("scope:single")).is_empty());
        assert_eq!(session.scope(), Some(Scope::WholeCollection));

        let mut session = Session::new(ID);
        assert!(session.apply(&button("format:gif")).is_empty());
        assert_cleared(&session);
    }

    #[test]
    fn unknown_token_is_ignored() {
        let mut session = session_in(SessionState::AwaitingFormat);
        assert!(session.apply(&button("format_bmp")).is_empty());
        assert_eq!(session.state(), SessionState::AwaitingFormat);
    }

    #[test]
    fn new_item_replaces_selection_in_progress() {
        let mut session = session_in(SessionState::AwaitingFormat);
        session.apply(&InboundEvent::ItemReceived {
            session_id: ID,
            item_ref: ItemRef::from("file-2"),
            is_animated: true,
            collection_ref: None,
        });

        assert_eq!(session.state(), SessionState::AwaitingScope);
        assert_eq!(session.selected_item(), Some(&ItemRef::from("file-2")));
        assert!(session.collection_ref().is_none());
        assert!(session.scope().is_none());
    }

    #[test]
    fn whole_set_needs_a_collection() {
        let mut session = Session::new(ID);
        let actions = session.apply(&InboundEvent::ItemReceived {
            session_id: ID,
            item_ref: ItemRef::from("loose"),
            is_animated: true,
            collection_ref: None,
        });
        match &actions[..] {
            [Action::Reply(OutboundMessage::ChoicePrompt { options, .. })] => {
                assert_eq!(options.len(), 1);
            }
            other => panic!("unexpected actions {other:?}"),
        }

        let actions = session.apply(&button("scope:whole"));
        assert_eq!(
            actions,
            vec![Action::Reply(OutboundMessage::text(ID, NO_COLLECTION_TEXT))]
        );
        assert_eq!(session.state(), SessionState::AwaitingScope);
    }

    #[test]
    fn events_while_processing_do_not_disturb_the_job() {
        let mut session = session_in(SessionState::Processing);
        let still_working = vec![Action::Reply(OutboundMessage::text(ID, STILL_WORKING_TEXT))];

        assert_eq!(session.apply(&item(true)), still_working);
        assert_eq!(session.apply(&button("format:png")), still_working);
        assert_eq!(session.state(), SessionState::Processing);
        assert_eq!(session.format(), Some(FormatChoice::Gif));
    }

    #[test]
    fn finish_job_outside_processing_is_a_no_op() {
        let mut session = session_in(SessionState::AwaitingFormat);
        session.finish_job();
        assert_eq!(session.state(), SessionState::AwaitingFormat);
    }
}
