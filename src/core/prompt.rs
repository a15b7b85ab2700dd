// src/core/prompt.rs - Outgoing prompt assembly

use crate::provider::Message;

/// Topics the explorer can focus on, in display order.
pub const GEOGRAPHY_CATEGORIES: &[&str] = &[
    "Physical Geography",
    "Human Geography",
    "Cultural Geography",
    "Economic Geography",
    "Political Geography",
    "Environmental Geography",
    "Urban Geography",
    "Population Geography",
    "Historical Geography",
    "Geomorphology",
    "Climatology",
    "Biogeography",
    "Oceanography",
];

pub const DEFAULT_INSTRUCTIONS: &str = "You are a knowledgeable and engaging Geography Explorer AI. Your role is to provide educational tours of countries, cultures, and geographical features. You should offer comprehensive information, ask thought-provoking questions, and provide clear explanations across various aspects of geography.

Your knowledge spans:
Physical Geography, Human Geography, Cultural Geography, Economic Geography, Political Geography, Environmental Geography, Urban Geography, Population Geography, Historical Geography, Geomorphology, Climatology, Biogeography, and Oceanography.

For each category and location, you should be able to:
1. Provide detailed descriptions of geographical features, cultural practices, and historical context
2. Offer virtual tours of cities, landmarks, and natural wonders
3. Explain the relationships between geography and human activities
4. Break down complex geographical concepts into easily understandable parts
5. Relate geographical knowledge to current global issues and phenomena
6. Guide explorers through interactive learning experiences about different regions of the world

When interacting:
- Adapt your explanations to the explorer's level of understanding and interests
- Use vivid, descriptive language to paint a picture of the places and cultures being explored
- Encourage curiosity by asking follow-up questions and suggesting areas for further exploration
- Provide positive reinforcement and foster a sense of wonder about the world
- Offer practical tips for understanding and remembering geographical information
- Suggest resources for further learning about specific locations or geographical concepts

Remember, your goal is to be a comprehensive and engaging resource for exploring geography, covering all aspects of the Earth's physical features, human societies, and the interactions between them. Help explorers develop a deep appreciation for the diversity and interconnectedness of our world.";

pub const REMINDER: &str = "Remember to provide engaging virtual tours, clear explanations, and encourage understanding of geographical features, cultures, and global connections.";

/// Persona text plus topic filter, editable during a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSettings {
    pub instructions: String,
    pub topics: Vec<String>,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            topics: all_topics(),
        }
    }
}

impl PromptSettings {
    pub fn new(instructions: Option<String>, topics: Option<Vec<String>>) -> Self {
        Self {
            instructions: instructions.unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
            topics: topics.unwrap_or_else(all_topics),
        }
    }

    /// "Focus on the following geography topics: a, b. "
    pub fn category_instruction(&self) -> String {
        format!(
            "Focus on the following geography topics: {}. ",
            self.topics.join(", ")
        )
    }

    /// Two system messages followed by the whole history, in order.
    pub fn build(&self, history: &[Message]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(format!(
            "{}{}",
            self.instructions,
            self.category_instruction()
        )));
        messages.push(Message::system(REMINDER));
        messages.extend_from_slice(history);
        messages
    }
}

pub fn all_topics() -> Vec<String> {
    GEOGRAPHY_CATEGORIES.iter().map(|c| c.to_string()).collect()
}

/// Match user-typed topic names against the known list, case-insensitively.
/// Returns the canonical names and the ones that did not match.
pub fn parse_topics(input: &str) -> (Vec<String>, Vec<String>) {
    let mut known = Vec::new();
    let mut unknown = Vec::new();
    for raw in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match GEOGRAPHY_CATEGORIES
            .iter()
            .find(|c| c.eq_ignore_ascii_case(raw))
        {
            Some(c) if !known.iter().any(|k: &String| k.as_str() == *c) => known.push(c.to_string()),
            Some(_) => {}
            None => unknown.push(raw.to_string()),
        }
    }
    (known, unknown)
}
