//! Deterministic draft selection.

use crate::pipeline::types::{ClassificationResult, ReplyRoute};

/// Pick the route for a classification.
///
/// | is_technical | request_meeting | route |
/// |---|---|---|
/// | true | true | `MeetingSuggestion` |
/// | true | false | `SimpleReply` |
/// | false | any | `NonTechnical` |
pub fn route(classification: &ClassificationResult) -> ReplyRoute {
    match (classification.is_technical, classification.request_meeting) {
        (true, true) => ReplyRoute::MeetingSuggestion,
        (true, false) => ReplyRoute::SimpleReply,
        (false, _) => ReplyRoute::NonTechnical,
    }
}

/// The draft text a route selects.
pub fn selected_draft(classification: &ClassificationResult, route: ReplyRoute) -> &str {
    match route {
        ReplyRoute::MeetingSuggestion => &classification.meeting_suggestion_draft,
        ReplyRoute::SimpleReply => &classification.simple_reply_draft,
        ReplyRoute::NonTechnical => &classification.non_technical_reply_draft,
    }
}
