// src/generators.rs

//! Arithmetic question generators.
//!
//! Every generator draws from an injected random source and returns a
//! `Question` whose `answer` is the exact result of its operands. None of
//! them can fail.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Add,
    Sub,
    Mul,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "−",
            Operator::Mul => "×",
        }
    }

    pub fn apply(&self, left: i64, right: i64) -> i64 {
        match self {
            Operator::Add => left + right,
            Operator::Sub => left - right,
            Operator::Mul => left * right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub left: i64,
    pub right: i64,
    pub operator: Operator,
    pub answer: i64,
}

impl Question {
    pub fn new(left: i64, right: i64, operator: Operator) -> Self {
        Question {
            left,
            right,
            operator,
            answer: operator.apply(left, right),
        }
    }

    /// Number of characters the learner must type before the answer is checked.
    pub fn answer_len(&self) -> usize {
        self.answer.to_string().len()
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.operator.symbol(), self.right)
    }
}

/// The fixed catalogue of skill bands a course can draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeneratorKind {
    SingleDigitAdd,
    TwoDigitAdd,
    ThreeDigitAdd,
    AddWithCarry,
    SubNoBorrow,
    SubWithBorrow,
    TwoDigitSub,
    SingleDigitMultiply,
    Tables { min: i64, max: i64 },
    #[serde(rename = "multiply_by_11")]
    MultiplyBy11,
    SquareTwoDigit,
}

impl GeneratorKind {
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Question {
        match *self {
            GeneratorKind::SingleDigitAdd => single_digit_add(rng),
            GeneratorKind::TwoDigitAdd => two_digit_add(rng),
            GeneratorKind::ThreeDigitAdd => three_digit_add(rng),
            GeneratorKind::AddWithCarry => add_with_carry(rng),
            GeneratorKind::SubNoBorrow => sub_no_borrow(rng),
            GeneratorKind::SubWithBorrow => sub_with_borrow(rng),
            GeneratorKind::TwoDigitSub => two_digit_sub(rng),
            GeneratorKind::SingleDigitMultiply => single_digit_multiply(rng),
            GeneratorKind::Tables { min, max } => tables(rng, min, max),
            GeneratorKind::MultiplyBy11 => multiply_by_11(rng),
            GeneratorKind::SquareTwoDigit => square_two_digit(rng),
        }
    }

    /// Inclusive ranges of (left, right) operands this generator produces.
    pub fn operand_range(&self) -> ((i64, i64), (i64, i64)) {
        match *self {
            GeneratorKind::SingleDigitAdd => ((1, 9), (1, 9)),
            GeneratorKind::TwoDigitAdd => ((10, 99), (10, 99)),
            GeneratorKind::ThreeDigitAdd => ((100, 999), (100, 999)),
            GeneratorKind::AddWithCarry => ((10, 99), (10, 99)),
            GeneratorKind::SubNoBorrow => ((10, 99), (0, 99)),
            GeneratorKind::SubWithBorrow => ((20, 99), (10, 89)),
            GeneratorKind::TwoDigitSub => ((10, 99), (10, 99)),
            GeneratorKind::SingleDigitMultiply => ((2, 9), (2, 9)),
            GeneratorKind::Tables { min, max } => ((min, max), (1, 10)),
            GeneratorKind::MultiplyBy11 => ((10, 99), (11, 11)),
            GeneratorKind::SquareTwoDigit => ((11, 99), (11, 99)),
        }
    }

    pub fn label(&self) -> String {
        match *self {
            GeneratorKind::SingleDigitAdd => "Single-digit addition".to_string(),
            GeneratorKind::TwoDigitAdd => "Two-digit addition".to_string(),
            GeneratorKind::ThreeDigitAdd => "Three-digit addition".to_string(),
            GeneratorKind::AddWithCarry => "Addition with carry".to_string(),
            GeneratorKind::SubNoBorrow => "Subtraction without borrow".to_string(),
            GeneratorKind::SubWithBorrow => "Subtraction with borrow".to_string(),
            GeneratorKind::TwoDigitSub => "Two-digit subtraction".to_string(),
            GeneratorKind::SingleDigitMultiply => "Single-digit multiplication".to_string(),
            GeneratorKind::Tables { min, max } => format!("Tables {}–{}", min, max),
            GeneratorKind::MultiplyBy11 => "Multiply by 11".to_string(),
            GeneratorKind::SquareTwoDigit => "Two-digit squares".to_string(),
        }
    }
}

pub fn single_digit_add<R: Rng + ?Sized>(rng: &mut R) -> Question {
    Question::new(rng.gen_range(1..=9), rng.gen_range(1..=9), Operator::Add)
}

pub fn two_digit_add<R: Rng + ?Sized>(rng: &mut R) -> Question {
    Question::new(rng.gen_range(10..=99), rng.gen_range(10..=99), Operator::Add)
}

pub fn three_digit_add<R: Rng + ?Sized>(rng: &mut R) -> Question {
    Question::new(
        rng.gen_range(100..=999),
        rng.gen_range(100..=999),
        Operator::Add,
    )
}

/// Two-digit addition whose units column always carries.
pub fn add_with_carry<R: Rng + ?Sized>(rng: &mut R) -> Question {
    let a_units: i64 = rng.gen_range(1..=9);
    let b_units: i64 = rng.gen_range((10 - a_units)..=9);
    let a = rng.gen_range(1..=9) * 10 + a_units;
    let b = rng.gen_range(1..=9) * 10 + b_units;
    Question::new(a, b, Operator::Add)
}

/// Every subtrahend digit is at most the matching minuend digit.
pub fn sub_no_borrow<R: Rng + ?Sized>(rng: &mut R) -> Question {
    let tens: i64 = rng.gen_range(1..=9);
    let units: i64 = rng.gen_range(0..=9);
    let b_tens = rng.gen_range(0..=tens);
    let b_units = rng.gen_range(0..=units);
    Question::new(tens * 10 + units, b_tens * 10 + b_units, Operator::Sub)
}

/// The subtrahend's units digit is forced above the minuend's, so the
/// units column always borrows while the result stays positive.
pub fn sub_with_borrow<R: Rng + ?Sized>(rng: &mut R) -> Question {
    let tens: i64 = rng.gen_range(2..=9);
    let units: i64 = rng.gen_range(0..=8);
    let b_units = rng.gen_range((units + 1)..=9);
    let b_tens = rng.gen_range(1..tens);
    Question::new(tens * 10 + units, b_tens * 10 + b_units, Operator::Sub)
}

pub fn two_digit_sub<R: Rng + ?Sized>(rng: &mut R) -> Question {
    let a: i64 = rng.gen_range(10..=99);
    let b: i64 = rng.gen_range(10..=99);
    let (left, right) = if a >= b { (a, b) } else { (b, a) };
    Question::new(left, right, Operator::Sub)
}

pub fn single_digit_multiply<R: Rng + ?Sized>(rng: &mut R) -> Question {
    Question::new(rng.gen_range(2..=9), rng.gen_range(2..=9), Operator::Mul)
}

/// Picks a table in `[min_table, max_table]` and a multiplier in `[1, 10]`.
pub fn tables<R: Rng + ?Sized>(rng: &mut R, min_table: i64, max_table: i64) -> Question {
    let (lo, hi) = if min_table <= max_table {
        (min_table, max_table)
    } else {
        (max_table, min_table)
    };
    Question::new(rng.gen_range(lo..=hi), rng.gen_range(1..=10), Operator::Mul)
}

pub fn multiply_by_11<R: Rng + ?Sized>(rng: &mut R) -> Question {
    Question::new(rng.gen_range(10..=99), 11, Operator::Mul)
}

pub fn square_two_digit<R: Rng + ?Sized>(rng: &mut R) -> Question {
    let n = rng.gen_range(11..=99);
    Question::new(n, n, Operator::Mul)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const TRIALS: usize = 1000;

    fn all_kinds() -> Vec<GeneratorKind> {
        vec![
            GeneratorKind::SingleDigitAdd,
            GeneratorKind::TwoDigitAdd,
            GeneratorKind::ThreeDigitAdd,
            GeneratorKind::AddWithCarry,
            GeneratorKind::SubNoBorrow,
            GeneratorKind::SubWithBorrow,
            GeneratorKind::TwoDigitSub,
            GeneratorKind::SingleDigitMultiply,
            GeneratorKind::Tables { min: 2, max: 5 },
            GeneratorKind::Tables { min: 12, max: 19 },
            GeneratorKind::MultiplyBy11,
            GeneratorKind::SquareTwoDigit,
        ]
    }

    #[test]
    fn two_digit_add_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..TRIALS {
            let q = two_digit_add(&mut rng);
            assert!((10..=99).contains(&q.left));
            assert!((10..=99).contains(&q.right));
            assert_eq!(q.answer, q.left + q.right);
            assert_eq!(q.operator, Operator::Add);
        }
    }

    #[test]
    fn every_generator_is_correct_and_bounded() {
        let mut rng = StdRng::seed_from_u64(42);
        for kind in all_kinds() {
            let ((l_lo, l_hi), (r_lo, r_hi)) = kind.operand_range();
            for _ in 0..TRIALS {
                let q = kind.generate(&mut rng);
                assert_eq!(q.answer, q.operator.apply(q.left, q.right), "{:?}", kind);
                assert!(
                    (l_lo..=l_hi).contains(&q.left),
                    "{:?} left {} out of range",
                    kind,
                    q.left
                );
                assert!(
                    (r_lo..=r_hi).contains(&q.right),
                    "{:?} right {} out of range",
                    kind,
                    q.right
                );
            }
        }
    }

    #[test]
    fn sub_with_borrow_always_borrows() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..TRIALS {
            let q = sub_with_borrow(&mut rng);
            assert!(q.right % 10 > q.left % 10);
            assert!(q.answer > 0);
        }
    }

    #[test]
    fn sub_no_borrow_never_borrows() {
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..TRIALS {
            let q = sub_no_borrow(&mut rng);
            assert!(q.right % 10 <= q.left % 10);
            assert!(q.right / 10 <= q.left / 10);
            assert!(q.answer >= 0);
        }
    }

    #[test]
    fn add_with_carry_always_carries() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..TRIALS {
            let q = add_with_carry(&mut rng);
            assert!(q.left % 10 + q.right % 10 >= 10);
        }
    }

    #[test]
    fn tables_accepts_reversed_bounds() {
        let mut rng = StdRng::seed_from_u64(6);
        for _ in 0..100 {
            let q = tables(&mut rng, 9, 6);
            assert!((6..=9).contains(&q.left));
            assert!((1..=10).contains(&q.right));
        }
    }

    #[test]
    fn generator_kind_reads_tagged_json() {
        let kinds: Vec<GeneratorKind> = serde_json::from_str(
            r#"[{"kind":"two_digit_add"},{"kind":"tables","min":2,"max":5}]"#,
        )
        .unwrap();
        assert_eq!(
            kinds,
            vec![
                GeneratorKind::TwoDigitAdd,
                GeneratorKind::Tables { min: 2, max: 5 }
            ]
        );
    }

    #[test]
    fn every_kind_keeps_its_wire_name() {
        let expected = [
            "single_digit_add",
            "two_digit_add",
            "three_digit_add",
            "add_with_carry",
            "sub_no_borrow",
            "sub_with_borrow",
            "two_digit_sub",
            "single_digit_multiply",
            "tables",
            "tables",
            "multiply_by_11",
            "square_two_digit",
        ];
        for (kind, name) in all_kinds().into_iter().zip(expected) {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json["kind"], name, "{:?}", kind);
            let back: GeneratorKind = serde_json::from_value(json).unwrap();
            assert_eq!(back, kind);
        }
    }

    #[test]
    fn bundled_course_generators_all_parse() {
        let raw: serde_json::Value =
            serde_json::from_str(include_str!("data/speed_maths.json")).unwrap();
        let mut seen = 0;
        for day in raw["days"].as_array().unwrap() {
            let task_kinds = day["tasks"].as_array().unwrap().iter().map(|t| &t["generator"]);
            let arena_kinds = day["arena"]["generators"].as_array().unwrap().iter();
            for value in task_kinds.chain(arena_kinds) {
                serde_json::from_value::<GeneratorKind>(value.clone())
                    .unwrap_or_else(|e| panic!("day {}: {} ({})", day["day"], value, e));
                seen += 1;
            }
        }
        assert!(seen > 0);
    }

    #[test]
    fn question_display() {
        assert_eq!(Question::new(12, 7, Operator::Sub).to_string(), "12 − 7");
        assert_eq!(Question::new(12, 7, Operator::Mul).answer_len(), 2);
    }
}
