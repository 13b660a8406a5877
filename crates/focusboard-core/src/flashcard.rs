use std::collections::BTreeMap;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::datetime::Clock;
use crate::error::{ValidationError, require};
use crate::hooks::{Change, Hooks};
use crate::store::{FLASHCARDS_KEY, Store};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub id: Uuid,
    pub subject: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct CardDraft {
    pub subject: String,
    pub question: String,
    pub answer: String,
}

impl CardDraft {
    pub fn new(
        subject: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Card counts per subject; `subjects` keeps first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubjectGroups {
    pub subjects: Vec<String>,
    pub counts: BTreeMap<String, usize>,
}

/// Owns the flashcard deck and the study cursor.
pub struct FlashcardManager {
    store: Rc<Store>,
    clock: Rc<dyn Clock>,
    cards: Vec<Flashcard>,
    cursor: usize,
    hooks: Hooks,
}

impl FlashcardManager {
    #[instrument(skip_all)]
    pub fn load(store: Rc<Store>, clock: Rc<dyn Clock>) -> Self {
        let cards: Vec<Flashcard> = store.get_records(FLASHCARDS_KEY).unwrap_or_default();
        info!(count = cards.len(), "loaded flashcards");
        Self {
            store,
            clock,
            cards,
            cursor: 0,
            hooks: Hooks::new(),
        }
    }

    pub fn cards(&self) -> &[Flashcard] {
        &self.cards
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&Flashcard> {
        self.cards.get(self.cursor)
    }

    #[instrument(skip(self, draft))]
    pub fn add(&mut self, draft: CardDraft) -> Result<Flashcard, ValidationError> {
        let card = Flashcard {
            id: Uuid::now_v7(),
            subject: require("subject", &draft.subject)?,
            question: require("question", &draft.question)?,
            answer: require("answer", &draft.answer)?,
            review_count: 0,
            last_reviewed_at: None,
        };
        info!(id = %card.id, subject = %card.subject, "added flashcard");
        self.cards.push(card.clone());
        self.persist();
        Ok(card)
    }

    /// Counts a review of the card at `index` and moves the cursor to the
    /// card after it.
    #[instrument(skip(self))]
    pub fn mark_reviewed(&mut self, index: usize) -> Option<&Flashcard> {
        let len = self.cards.len();
        if index >= len {
            debug!(len, "review of missing card ignored");
            return None;
        }

        let now = self.clock.now();
        let card = &mut self.cards[index];
        card.review_count = card.review_count.saturating_add(1);
        card.last_reviewed_at = Some(now);
        info!(id = %card.id, reviews = card.review_count, "reviewed flashcard");

        self.cursor = (index + 1) % len;
        self.persist();
        self.cards.get(index)
    }

    pub fn next(&mut self) -> Option<&Flashcard> {
        if self.cards.is_empty() {
            return None;
        }
        self.cursor = (self.cursor + 1) % self.cards.len();
        self.hooks.emit(Change::Flashcards);
        self.current()
    }

    pub fn previous(&mut self) -> Option<&Flashcard> {
        if self.cards.is_empty() {
            return None;
        }
        let len = self.cards.len();
        self.cursor = (self.cursor + len - 1) % len;
        self.hooks.emit(Change::Flashcards);
        self.current()
    }

    pub fn group_by_subject(&self) -> SubjectGroups {
        let mut groups = SubjectGroups::default();
        for card in &self.cards {
            let count = groups.counts.entry(card.subject.clone()).or_insert(0);
            if *count == 0 {
                groups.subjects.push(card.subject.clone());
            }
            *count += 1;
        }
        groups
    }

    pub fn cards_for_subject(&self, subject: &str) -> Vec<&Flashcard> {
        self.cards
            .iter()
            .filter(|card| card.subject == subject)
            .collect()
    }

    /// Points the cursor at the subject's first card in the full deck.
    #[instrument(skip(self))]
    pub fn study_subject(&mut self, subject: &str) -> Vec<&Flashcard> {
        match self.cards.iter().position(|card| card.subject == subject) {
            Some(idx) => {
                self.cursor = idx;
                self.hooks.emit(Change::Flashcards);
            }
            None => debug!("no cards for subject"),
        }
        self.cards_for_subject(subject)
    }

    fn persist(&mut self) {
        self.store.set(FLASHCARDS_KEY, &self.cards);
        self.hooks.emit(Change::Flashcards);
    }
}
