//! Type-dispatched answer evaluation. One correctness check per question
//! type; the marking scheme is applied uniformly afterwards.

use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::models::question::{QuestionSnapshot, QuestionType};

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub is_correct: bool,
    pub awarded: Decimal,
    pub max_score: Decimal,
}

/// Score a candidate answer against a frozen question copy.
///
/// A malformed answer key (a choice key missing from the option list, an
/// unparsable boolean or numeric key) is an `EvaluationFailed`: the snapshot
/// is corrupt, the caller keeps the cursor unmoved and the client may retry
/// once content is repaired. A malformed *candidate* answer is simply
/// incorrect.
pub fn evaluate(
    question: &QuestionSnapshot,
    user_answer: &str,
    negative_marking: bool,
    negative_marking_ratio: Decimal,
) -> Result<Evaluation> {
    let is_correct = match question.question_type {
        QuestionType::MultipleChoice => check_multiple_choice(question, user_answer)?,
        QuestionType::TrueFalse => check_true_false(question, user_answer)?,
        QuestionType::FillBlank => check_fill_blank(question, user_answer),
        QuestionType::Numeric => check_numeric(question, user_answer)?,
    };

    let max_score = Decimal::from(question.max_score.max(1));
    let awarded = award(is_correct, max_score, negative_marking, negative_marking_ratio);

    Ok(Evaluation {
        is_correct,
        awarded,
        max_score,
    })
}

/// Marking scheme: `+m` when correct, `0` when incorrect, `−(m × r)` when
/// incorrect under negative marking.
pub fn award(is_correct: bool, max_score: Decimal, negative_marking: bool, ratio: Decimal) -> Decimal {
    if is_correct {
        max_score
    } else if negative_marking {
        -(max_score * ratio)
    } else {
        Decimal::ZERO
    }
}

fn check_multiple_choice(question: &QuestionSnapshot, user_answer: &str) -> Result<bool> {
    let options = question.options.as_deref().unwrap_or(&[]);
    if !options.iter().any(|o| o == &question.correct_answer) {
        return Err(Error::EvaluationFailed(format!(
            "Answer key for question {} is not among its options",
            question.id
        )));
    }
    Ok(user_answer.trim() == question.correct_answer)
}

fn check_true_false(question: &QuestionSnapshot, user_answer: &str) -> Result<bool> {
    let key = match question.correct_answer.trim().to_ascii_lowercase().as_str() {
        "true" => true,
        "false" => false,
        _ => {
            return Err(Error::EvaluationFailed(format!(
                "Answer key for question {} is not a boolean",
                question.id
            )))
        }
    };
    let given = match user_answer.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    };
    Ok(given == Some(key))
}

fn check_fill_blank(question: &QuestionSnapshot, user_answer: &str) -> bool {
    user_answer
        .trim()
        .eq_ignore_ascii_case(question.correct_answer.trim())
}

fn check_numeric(question: &QuestionSnapshot, user_answer: &str) -> Result<bool> {
    let key: f64 = question.correct_answer.trim().parse().map_err(|_| {
        Error::EvaluationFailed(format!(
            "Answer key for question {} is not numeric",
            question.id
        ))
    })?;
    let Ok(given) = user_answer.trim().parse::<f64>() else {
        return Ok(false);
    };
    let tolerance = question.numeric_tolerance.unwrap_or(1e-9);
    Ok((given - key).abs() <= tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn snapshot(question_type: QuestionType, correct: &str, options: Option<Vec<&str>>) -> QuestionSnapshot {
        QuestionSnapshot {
            id: Uuid::new_v4(),
            question_type,
            category: "quant".to_string(),
            subcategory: None,
            difficulty: 3,
            content: "q".to_string(),
            options: options.map(|o| o.into_iter().map(String::from).collect()),
            correct_answer: correct.to_string(),
            explanation: None,
            hints: None,
            max_score: 1,
            numeric_tolerance: None,
        }
    }

    fn ratio(r: &str) -> Decimal {
        r.parse().unwrap()
    }

    #[test]
    fn correct_answer_awards_full_marks() {
        let q = snapshot(QuestionType::MultipleChoice, "42", Some(vec!["41", "42", "43"]));
        let eval = evaluate(&q, "42", true, ratio("0.25")).unwrap();
        assert!(eval.is_correct);
        assert_eq!(eval.awarded, Decimal::from(1));
        assert_eq!(eval.max_score, Decimal::from(1));
    }

    #[test]
    fn incorrect_without_negative_marking_awards_zero() {
        let q = snapshot(QuestionType::MultipleChoice, "42", Some(vec!["41", "42"]));
        let eval = evaluate(&q, "41", false, Decimal::ZERO).unwrap();
        assert!(!eval.is_correct);
        assert_eq!(eval.awarded, Decimal::ZERO);
    }

    #[test]
    fn incorrect_with_negative_marking_deducts_exactly_ratio_times_max() {
        let mut q = snapshot(QuestionType::MultipleChoice, "42", Some(vec!["41", "42"]));
        q.max_score = 4;
        let eval = evaluate(&q, "41", true, ratio("0.25")).unwrap();
        assert_eq!(eval.awarded, ratio("-1"));
        assert_eq!(eval.max_score, Decimal::from(4));
    }

    #[test]
    fn choice_key_missing_from_options_is_evaluation_failure() {
        let q = snapshot(QuestionType::MultipleChoice, "42", Some(vec!["1", "2"]));
        let err = evaluate(&q, "1", false, Decimal::ZERO).unwrap_err();
        assert!(matches!(err, Error::EvaluationFailed(_)));
    }

    #[test]
    fn true_false_is_case_insensitive() {
        let q = snapshot(QuestionType::TrueFalse, "True", None);
        assert!(evaluate(&q, "TRUE", false, Decimal::ZERO).unwrap().is_correct);
        assert!(!evaluate(&q, "false", false, Decimal::ZERO).unwrap().is_correct);
        // Garbage candidate input is incorrect, not a failure.
        assert!(!evaluate(&q, "yes", false, Decimal::ZERO).unwrap().is_correct);
    }

    #[test]
    fn fill_blank_ignores_case_and_whitespace() {
        let q = snapshot(QuestionType::FillBlank, "Pythagoras", None);
        assert!(evaluate(&q, "  pythagoras ", false, Decimal::ZERO).unwrap().is_correct);
        assert!(!evaluate(&q, "euclid", false, Decimal::ZERO).unwrap().is_correct);
    }

    #[test]
    fn numeric_respects_tolerance() {
        let mut q = snapshot(QuestionType::Numeric, "3.14159", None);
        q.numeric_tolerance = Some(0.01);
        assert!(evaluate(&q, "3.14", false, Decimal::ZERO).unwrap().is_correct);
        assert!(!evaluate(&q, "3.2", false, Decimal::ZERO).unwrap().is_correct);
        assert!(!evaluate(&q, "not a number", false, Decimal::ZERO).unwrap().is_correct);
    }

    #[test]
    fn numeric_bad_key_is_evaluation_failure() {
        let q = snapshot(QuestionType::Numeric, "around three", None);
        let err = evaluate(&q, "3", false, Decimal::ZERO).unwrap_err();
        assert!(matches!(err, Error::EvaluationFailed(_)));
    }
}
