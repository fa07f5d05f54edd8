//! Property tests for assignment fan-out

mod common;

use common::{evaluator, form_with, question, subject};
use proptest::prelude::*;
use std::collections::HashSet;
use vantage_core::fanout::{
    evaluator_questions, generate_assignments, subject_questions,
};
use vantage_core::types::ParticipantType;

proptest! {
    /// S subjects with E_i evaluators each always produce S + sum(E_i)
    /// assignments.
    #[test]
    fn prop_assignment_count(evaluator_counts in prop::collection::vec(0usize..4, 1..6)) {
        let subjects = evaluator_counts
            .iter()
            .enumerate()
            .map(|(i, &count)| {
                let evaluators = (0..count)
                    .map(|p| evaluator(&format!("eval{}x{}", i, p), p as u32 + 1))
                    .collect();
                subject(&format!("subject{}", i), evaluators)
            })
            .collect();
        let form = form_with(subjects, vec![question("q1", true, &[1, 2, 3])]);

        let assignments = generate_assignments(&form, chrono::Utc::now());
        let expected = evaluator_counts.len() + evaluator_counts.iter().sum::<usize>();
        prop_assert_eq!(assignments.len(), expected);

        let subject_count = assignments
            .iter()
            .filter(|a| a.participant_type == ParticipantType::Subject)
            .count();
        prop_assert_eq!(subject_count, evaluator_counts.len());
    }

    /// Every generated token is unique within a form.
    #[test]
    fn prop_tokens_unique(evaluator_counts in prop::collection::vec(0usize..5, 1..8)) {
        let subjects = evaluator_counts
            .iter()
            .enumerate()
            .map(|(i, &count)| {
                let evaluators = (0..count)
                    .map(|p| evaluator(&format!("eval{}x{}", i, p), p as u32 + 1))
                    .collect();
                subject(&format!("subject{}", i), evaluators)
            })
            .collect();
        let form = form_with(subjects, vec![question("q1", true, &[1])]);

        let assignments = generate_assignments(&form, chrono::Utc::now());
        let tokens: HashSet<&str> = assignments.iter().map(|a| a.token.as_str()).collect();
        prop_assert_eq!(tokens.len(), assignments.len());
    }

    /// Assigned question sets are exactly the role-visible questions, in
    /// form order.
    #[test]
    fn prop_question_scoping(flags in prop::collection::vec(
        (any::<bool>(), prop::collection::vec(1u32..4, 0..3)),
        1..8,
    )) {
        let questions: Vec<_> = flags
            .iter()
            .enumerate()
            .map(|(i, (can_subject, positions))| {
                question(&format!("q{}", i), *can_subject, positions)
            })
            .collect();

        let expected_subject: Vec<String> = flags
            .iter()
            .enumerate()
            .filter(|(_, (can_subject, _))| *can_subject)
            .map(|(i, _)| format!("q{}", i))
            .collect();
        prop_assert_eq!(subject_questions(&questions), expected_subject);

        for position in 1u32..4 {
            let expected: Vec<String> = flags
                .iter()
                .enumerate()
                .filter(|(_, (_, positions))| positions.contains(&position))
                .map(|(i, _)| format!("q{}", i))
                .collect();
            prop_assert_eq!(evaluator_questions(&questions, position), expected);
        }
    }
}

/// The worked example from the platform docs: subject A with evaluators
/// B (position 1) and C (position 2), one question visible to the subject
/// and position 1.
#[test]
fn worked_example_three_assignments() {
    let form = form_with(
        vec![subject("A", vec![evaluator("B", 1), evaluator("C", 2)])],
        vec![question("q1", true, &[1])],
    );

    let assignments = generate_assignments(&form, chrono::Utc::now());
    assert_eq!(assignments.len(), 3);
    assert_eq!(assignments[0].assigned_questions, vec!["q1"]);
    assert_eq!(assignments[1].assigned_questions, vec!["q1"]);
    assert!(assignments[2].assigned_questions.is_empty());
}
