//! Conversation records and the JSONL reader.
//!
//! Each input line holds one dialogue: an id plus an ordered list of
//! exchanges, where every exchange carries a user and/or assistant utterance.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use crate::error::DialogError;

/// Speaker role within a dialogue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Name used in file names and console output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a dialogue.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Exchange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant: Option<String>,
}

/// A multi-turn dialogue read from the input corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub data: Vec<Exchange>,
}

impl Conversation {
    /// Utterances spoken by `role`, in dialogue order.
    pub fn turns(&self, role: Role) -> Vec<String> {
        self.data
            .iter()
            .filter_map(|exchange| match role {
                Role::User => exchange.user.clone(),
                Role::Assistant => exchange.assistant.clone(),
            })
            .collect()
    }
}

/// A line of the input file that could not be turned into a conversation.
#[derive(Debug)]
pub struct InvalidRecord {
    /// 1-based line number.
    pub line: usize,
    pub error: serde_json::Error,
}

/// Streaming reader over a JSONL conversation file.
///
/// Blank lines are skipped. Lines that fail to parse are yielded as
/// `Err(InvalidRecord)` so the caller can report them and move on; only
/// I/O failures stop iteration.
pub struct ConversationReader<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl ConversationReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DialogError> {
        let file = File::open(path.as_ref())?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> ConversationReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for ConversationReader<R> {
    type Item = Result<Result<Conversation, InvalidRecord>, DialogError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let parsed = serde_json::from_str::<Conversation>(trimmed).map_err(|error| {
                InvalidRecord {
                    line: self.line_no,
                    error,
                }
            });
            return Some(Ok(parsed));
        }
    }
}
