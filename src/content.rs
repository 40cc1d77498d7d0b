// src/content.rs

//! Read-only course documents. A day's `concept` may be written as a single
//! object or as a list; both are normalised to `Vec<Concept>` at load time.

use crate::constants::{ARENA_TARGET, DEFAULT_PRACTICE_TARGET};
use crate::error::{MasteryError, MasteryResult};
use crate::generators::GeneratorKind;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub heading: String,
    pub body: String,
    #[serde(default)]
    pub example: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ConceptField {
    Single(Concept),
    Multiple(Vec<Concept>),
}

impl From<ConceptField> for Vec<Concept> {
    fn from(field: ConceptField) -> Self {
        match field {
            ConceptField::Single(c) => vec![c],
            ConceptField::Multiple(cs) => cs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryCard {
    pub id: String,
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryTable {
    pub title: String,
    pub cards: Vec<MemoryCard>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: String,
    pub title: String,
    pub generator: GeneratorKind,
    #[serde(default = "default_practice_target")]
    pub target: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaSpec {
    pub generators: Vec<GeneratorKind>,
    #[serde(default = "default_arena_target")]
    pub target: u32,
}

fn default_practice_target() -> u32 {
    DEFAULT_PRACTICE_TARGET
}

fn default_arena_target() -> u32 {
    ARENA_TARGET
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayContent {
    pub day: u32,
    pub title: String,
    pub concepts: Vec<Concept>,
    pub memorize: Vec<MemoryTable>,
    pub tasks: Vec<TaskSpec>,
    pub arena: ArenaSpec,
}

impl DayContent {
    pub fn task(&self, task_id: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn card(&self, card_id: &str) -> Option<&MemoryCard> {
        self.memorize
            .iter()
            .flat_map(|t| t.cards.iter())
            .find(|c| c.id == card_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Course {
    pub id: String,
    pub title: String,
    pub days: Vec<DayContent>,
}

// Raw document shapes
#[derive(Deserialize)]
struct RawCourse {
    id: String,
    title: String,
    days: Vec<RawDay>,
}

#[derive(Deserialize)]
struct RawDay {
    day: u32,
    title: String,
    concept: Option<ConceptField>,
    #[serde(default)]
    memorize: Vec<MemoryTable>,
    #[serde(default)]
    tasks: Vec<TaskSpec>,
    arena: ArenaSpec,
}

impl Course {
    /// The course shipped with the app.
    pub fn bundled() -> MasteryResult<Self> {
        Self::from_json(include_str!("data/speed_maths.json"))
    }

    pub fn from_json(data: &str) -> MasteryResult<Self> {
        let raw: RawCourse = serde_json::from_str(data)?;
        let course = Course {
            id: raw.id,
            title: raw.title,
            days: raw
                .days
                .into_iter()
                .map(|d| DayContent {
                    day: d.day,
                    title: d.title,
                    concepts: d.concept.map(Vec::from).unwrap_or_default(),
                    memorize: d.memorize,
                    tasks: d.tasks,
                    arena: d.arena,
                })
                .collect(),
        };
        course.validate()?;
        info!(
            "Loaded course '{}' ({} days)",
            course.id,
            course.days.len()
        );
        Ok(course)
    }

    fn validate(&self) -> MasteryResult<()> {
        if self.days.is_empty() {
            return Err(MasteryError::Content(format!(
                "course '{}' has no days",
                self.id
            )));
        }

        let mut task_ids = HashSet::new();
        for (idx, day) in self.days.iter().enumerate() {
            let expected = idx as u32 + 1;
            if day.day != expected {
                return Err(MasteryError::Content(format!(
                    "day {} found where day {} was expected",
                    day.day, expected
                )));
            }
            for task in &day.tasks {
                if !task_ids.insert(task.id.as_str()) {
                    return Err(MasteryError::Content(format!(
                        "duplicate task id '{}'",
                        task.id
                    )));
                }
                if task.target == 0 {
                    return Err(MasteryError::Content(format!(
                        "task '{}' has a zero target",
                        task.id
                    )));
                }
                check_generator(&task.generator, &task.id)?;
            }
            if day.arena.generators.is_empty() || day.arena.target == 0 {
                return Err(MasteryError::Content(format!(
                    "day {} has an empty arena",
                    day.day
                )));
            }
            for g in &day.arena.generators {
                check_generator(g, &format!("day {} arena", day.day))?;
            }
            let mut card_ids = HashSet::new();
            for card in day.memorize.iter().flat_map(|t| t.cards.iter()) {
                if !card_ids.insert(card.id.as_str()) {
                    return Err(MasteryError::Content(format!(
                        "day {} repeats card '{}'",
                        day.day, card.id
                    )));
                }
            }
        }
        debug!("[Content] '{}' passed validation", self.id);
        Ok(())
    }

    pub fn day(&self, day: u32) -> Option<&DayContent> {
        day.checked_sub(1).and_then(|i| self.days.get(i as usize))
    }

    pub fn day_or_err(&self, day: u32) -> MasteryResult<&DayContent> {
        self.day(day).ok_or_else(|| {
            MasteryError::NotFound(format!("day {} of course '{}'", day, self.id))
        })
    }

    pub fn total_days(&self) -> u32 {
        self.days.len() as u32
    }

    /// Every distinct generator the course uses, in first-seen order.
    pub fn generator_catalogue(&self) -> Vec<GeneratorKind> {
        let mut seen = Vec::new();
        for day in &self.days {
            let kinds = day
                .tasks
                .iter()
                .map(|t| t.generator)
                .chain(day.arena.generators.iter().copied());
            for kind in kinds {
                if !seen.contains(&kind) {
                    seen.push(kind);
                }
            }
        }
        seen
    }
}

fn check_generator(kind: &GeneratorKind, owner: &str) -> MasteryResult<()> {
    if let GeneratorKind::Tables { min, max } = kind {
        if *min < 1 || min > max {
            return Err(MasteryError::Content(format!(
                "{} uses invalid table range {}..={}",
                owner, min, max
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_DAYS: &str = r#"{
        "id": "mini",
        "title": "Mini",
        "days": [
            {
                "day": 1,
                "title": "One",
                "concept": {"heading": "H", "body": "B"},
                "tasks": [{"id": "a", "title": "A", "generator": {"kind": "two_digit_add"}}],
                "arena": {"generators": [{"kind": "two_digit_add"}]}
            },
            {
                "day": 2,
                "title": "Two",
                "concept": [{"heading": "H1", "body": "B1"}, {"heading": "H2", "body": "B2", "example": "E"}],
                "memorize": [{"title": "T", "cards": [{"id": "c1", "front": "2 × 2", "back": "4"}]}],
                "tasks": [{"id": "b", "title": "B", "generator": {"kind": "tables", "min": 2, "max": 5}, "target": 5}],
                "arena": {"generators": [{"kind": "tables", "min": 2, "max": 5}], "target": 8}
            }
        ]
    }"#;

    #[test]
    fn concept_shapes_are_normalised() {
        let course = Course::from_json(TWO_DAYS).unwrap();
        assert_eq!(course.days[0].concepts.len(), 1);
        assert_eq!(course.days[1].concepts.len(), 2);
        assert_eq!(course.days[1].concepts[1].example.as_deref(), Some("E"));
    }

    #[test]
    fn defaults_fill_targets() {
        let course = Course::from_json(TWO_DAYS).unwrap();
        assert_eq!(course.days[0].tasks[0].target, DEFAULT_PRACTICE_TARGET);
        assert_eq!(course.days[0].arena.target, ARENA_TARGET);
        assert_eq!(course.days[1].arena.target, 8);
    }

    #[test]
    fn lookups() {
        let course = Course::from_json(TWO_DAYS).unwrap();
        assert!(course.day(0).is_none());
        assert!(course.day(3).is_none());
        assert_eq!(course.day(2).unwrap().title, "Two");
        assert!(course.day(2).unwrap().task("b").is_some());
        assert_eq!(course.day(2).unwrap().card("c1").unwrap().back, "4");
        assert!(matches!(course.day_or_err(9), Err(MasteryError::NotFound(_))));
        assert_eq!(course.generator_catalogue().len(), 2);
    }

    #[test]
    fn rejects_gaps_and_duplicates() {
        let gap = TWO_DAYS.replace("\"day\": 2", "\"day\": 3");
        assert!(matches!(
            Course::from_json(&gap),
            Err(MasteryError::Content(_))
        ));
        let dup = TWO_DAYS.replace("\"id\": \"b\"", "\"id\": \"a\"");
        assert!(matches!(
            Course::from_json(&dup),
            Err(MasteryError::Content(_))
        ));
        let bad_table = TWO_DAYS.replace("\"min\": 2, \"max\": 5}, \"target\": 5", "\"min\": 6, \"max\": 5}, \"target\": 5");
        assert!(Course::from_json(&bad_table).is_err());
    }

    #[test]
    fn bundled_course_is_thirty_days() {
        let course = Course::bundled().unwrap();
        assert_eq!(course.id, "speed-maths");
        assert_eq!(course.total_days(), 30);
        assert!(course.days.iter().all(|d| !d.tasks.is_empty()));
        assert!(course.days.iter().all(|d| !d.concepts.is_empty()));
    }
}
