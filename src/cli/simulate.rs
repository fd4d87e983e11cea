//! Offline replay of scripted messages through the scoring model.

use symposium::domain::{Author, Message, MessageStatus, Participant};
use symposium::scheduler::{SchedulerSettings, SchedulerState};

const CONVERSATION: &str = "simulation";

/// Scores after one scripted message
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationStep {
    pub author: Author,
    pub content: String,
    pub logits: Vec<f64>,
    pub probabilities: Vec<f64>,
}

/// Split "alpha: text" into a participant-authored message when `alpha`
/// is a known participant id; anything else is spoken by the user.
pub fn parse_scripted(line: &str, participants: &[Participant]) -> (Author, String) {
    if let Some((prefix, rest)) = line.split_once(':') {
        let prefix = prefix.trim();
        if participants.iter().any(|p| p.id == prefix) {
            return (Author::Participant(prefix.to_string()), rest.trim().to_string());
        }
    }
    (Author::User, line.to_string())
}

/// Replay `lines` and return the state before the first message followed by
/// one step per message.
pub fn simulate(settings: SchedulerSettings, participants: Vec<Participant>, lines: &[String]) -> Vec<SimulationStep> {
    let ids: Vec<String> = participants.iter().map(|p| p.id.clone()).collect();
    let mut state = SchedulerState::new(settings, participants);

    let mut steps = vec![SimulationStep {
        author: Author::System,
        content: String::new(),
        logits: state.logits(CONVERSATION, &ids),
        probabilities: state.probabilities(CONVERSATION, &ids),
    }];

    for line in lines {
        let (author, content) = parse_scripted(line, state.participants());
        let message = Message::new(CONVERSATION, author.clone(), content.clone(), MessageStatus::Complete);
        state.record_message(&message);
        steps.push(SimulationStep {
            author,
            content,
            logits: state.logits(CONVERSATION, &ids),
            probabilities: state.probabilities(CONVERSATION, &ids),
        });
    }
    steps
}
