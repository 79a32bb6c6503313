//! Read-time join of messages with author profiles.

use std::collections::{HashMap, HashSet};

use agora_shared::{Author, EnrichedMessage, Message, Profile, UserId};

/// Distinct authors of `messages`.
pub fn author_ids(messages: &[Message]) -> HashSet<UserId> {
    messages.iter().map(|m| m.author_id.clone()).collect()
}

/// Attach each message's profile, keeping message order. Authors missing from
/// `profiles` get [`Author::Unknown`].
pub fn enrich(messages: Vec<Message>, profiles: &HashMap<UserId, Profile>) -> Vec<EnrichedMessage> {
    messages
        .into_iter()
        .map(|message| {
            let author = profiles
                .get(&message.author_id)
                .cloned()
                .map_or(Author::Unknown, Author::Known);
            EnrichedMessage { message, author }
        })
        .collect()
}
