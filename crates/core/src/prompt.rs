//! Prompt composition for dialogue turns.
//!
//! Generated prompts blend a philosopher's positions with an author's
//! literary voice, and deliberately never name either persona so the
//! model speaks in character instead of about the character.

use crate::catalog::{PersonaCatalog, PhilosopherProfile};
use crate::conversation::{SpeakerConfig, Turn};

/// Upper bound on how much of the previous turn is quoted back to the
/// model when composing a response.
const PREVIOUS_CONTENT_LIMIT: usize = 500;

/// Composes the prompt for the given speaker's next turn.
///
/// The first turn of a conversation (no prior history) introduces the
/// topic; every later turn responds to the most recent turn in
/// `history`.
pub fn compose(
    catalog: &PersonaCatalog,
    speaker: &SpeakerConfig<'_>,
    topic: &str,
    history: &[Turn],
) -> String {
    let philosopher = catalog.philosopher(speaker.philosopher);
    let author = catalog.author(speaker.author);

    let beliefs = &philosopher.beliefs;
    let key_concepts = join_concepts(philosopher);
    let style = &author.characteristics;
    let voice = &author.voice;

    match history.last() {
        Some(last) => {
            let previous = truncate_chars(&last.content, PREVIOUS_CONTENT_LIMIT);
            format!(
                "Adopt the philosophical stance defined by these ideas: {beliefs}, \
                 focusing on concepts such as {key_concepts}. Respond to the following \
                 statement in one to three sentences, using a narrative style \
                 characterized by {style} with a {voice} voice. Avoid naming any \
                 philosopher or author and do not reference the author's personal \
                 beliefs or values. Directly answer the previous point and pose a \
                 related question or segue to keep the dialogue flowing.\n\n\
                 Previous message: \"{previous}\"\n\
                 Topic: \"{topic}\""
            )
        }
        None => {
            format!(
                "Assume a philosophical stance defined by these ideas: {beliefs}, \
                 focusing on concepts such as {key_concepts}. Use a narrative style \
                 described as {style} with a {voice} voice to introduce your \
                 perspective on the topic \"{topic}\" in one to three sentences. \
                 Avoid naming any philosopher or author and do not reference the \
                 author's personal beliefs or values. Pose a thoughtful question to \
                 invite your dialogue partner to respond."
            )
        }
    }
}

fn join_concepts(profile: &PhilosopherProfile) -> String {
    profile.key_concepts.join(", ")
}

/// Truncates to at most `limit` characters, never splitting a code
/// point.
fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
