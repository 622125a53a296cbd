//! Role-alternation normalizer.
//!
//! Provider APIs want `user` first and strictly alternating roles. Stored
//! chats do not guarantee either: a chat opens with the character's
//! greeting, and deletes or rewinds can leave two turns of the same sender
//! next to each other.

use parley_core::{ProviderMessage, Role};

/// Synthetic opening turn used when the history starts with the character.
pub const BEGIN_CONVERSATION: &str =
    "Now begin the conversation based on the given instructions above.";

/// Turn a chronological history plus the latest user text into a sequence
/// that starts with `user` and never repeats a role.
pub fn normalize(history: Vec<ProviderMessage>, latest_user_message: &str) -> Vec<ProviderMessage> {
    let mut sequence = Vec::with_capacity(history.len() + 2);

    if history.first().map(|m| m.role) == Some(Role::Assistant) {
        sequence.push(ProviderMessage::user(BEGIN_CONVERSATION));
    }
    sequence.extend(history);
    sequence.push(ProviderMessage::user(latest_user_message));

    merge_consecutive(sequence)
}

/// Collapse runs of the same role into one message, contents joined by a
/// newline. A single forward pass; applying it twice changes nothing.
pub fn merge_consecutive(messages: Vec<ProviderMessage>) -> Vec<ProviderMessage> {
    let mut merged: Vec<ProviderMessage> = Vec::with_capacity(messages.len());
    for message in messages {
        match merged.last_mut() {
            Some(last) if last.role == message.role => {
                last.content.push('\n');
                last.content.push_str(&message.content);
            }
            _ => merged.push(message),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(messages: &[ProviderMessage]) -> Vec<Role> {
        messages.iter().map(|m| m.role).collect()
    }

    #[test]
    fn greeting_first_gets_synthetic_opener() {
        let out = normalize(vec![ProviderMessage::assistant("Hi")], "Hello");
        assert_eq!(
            out,
            vec![
                ProviderMessage::user(BEGIN_CONVERSATION),
                ProviderMessage::assistant("Hi"),
                ProviderMessage::user("Hello"),
            ]
        );
    }

    #[test]
    fn consecutive_users_are_merged() {
        let history = vec![
            ProviderMessage::user("a"),
            ProviderMessage::user("b"),
            ProviderMessage::assistant("c"),
        ];
        let out = normalize(history, "d");
        assert_eq!(
            out,
            vec![
                ProviderMessage::user("a\nb"),
                ProviderMessage::assistant("c"),
                ProviderMessage::user("d"),
            ]
        );
    }

    #[test]
    fn empty_history_is_just_latest() {
        assert_eq!(normalize(vec![], "x"), vec![ProviderMessage::user("x")]);
    }

    #[test]
    fn latest_merges_into_trailing_user() {
        let history = vec![ProviderMessage::assistant("hi"), ProviderMessage::user("one")];
        let out = normalize(history, "two");
        assert_eq!(out.last().unwrap().content, "one\ntwo");
        assert_eq!(roles(&out), vec![Role::User, Role::Assistant, Role::User]);
    }

    #[test]
    fn assistant_runs_merge_in_order() {
        let messages = vec![
            ProviderMessage::user("u"),
            ProviderMessage::assistant("1"),
            ProviderMessage::assistant("2"),
            ProviderMessage::assistant("3"),
        ];
        let out = merge_consecutive(messages);
        assert_eq!(out[1].content, "1\n2\n3");
    }

    #[test]
    fn merge_is_idempotent() {
        let out = normalize(
            vec![
                ProviderMessage::assistant("a"),
                ProviderMessage::assistant("b"),
                ProviderMessage::user("c"),
            ],
            "d",
        );
        assert_eq!(merge_consecutive(out.clone()), out);
    }
}
