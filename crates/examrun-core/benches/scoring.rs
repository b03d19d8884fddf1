use criterion::{black_box, criterion_group, criterion_main, Criterion};

use examrun_core::model::{
    AnswerRecord, Difficulty, Ledger, OptionLabel, Question, QuestionOrigin,
};
use examrun_core::palette::classify;
use examrun_core::scoring::{aggregate_entries, score_session, AttemptStatus};
use uuid::Uuid;

fn make_questions(n: usize) -> Vec<Question> {
    (0..n)
        .map(|i| Question {
            id: format!("q{i}"),
            text: Some(format!("stem {i}")),
            image_url: None,
            options: Default::default(),
            correct: OptionLabel::ALL[i % 4],
            explanation: None,
            explanation_image_url: None,
            marks: 1 + (i % 4) as u32,
            subject: "Physics".into(),
            lesson: "Kinematics".into(),
            difficulty: Difficulty::Medium,
            origin: QuestionOrigin::Bank,
        })
        .collect()
}

fn make_answered_ledger(questions: &[Question]) -> Ledger {
    let mut ledger = Ledger::seed(questions);
    for (i, q) in questions.iter().enumerate() {
        if i % 3 != 0 {
            let entry = ledger.get_mut(&q.id).unwrap();
            entry.visited = true;
            entry.selected = Some(OptionLabel::ALL[i % 4]);
        }
    }
    ledger
}

fn bench_score_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("score_session");

    for n in [30usize, 90, 200] {
        let questions = make_questions(n);
        group.bench_function(format!("{n}_questions"), |b| {
            b.iter(|| {
                let mut ledger = make_answered_ledger(&questions);
                score_session(
                    Uuid::nil(),
                    black_box(&questions),
                    black_box(&mut ledger),
                    3600,
                    AttemptStatus::Completed,
                )
            })
        });
    }

    group.finish();
}

fn bench_aggregate_entries(c: &mut Criterion) {
    let questions = make_questions(200);
    let mut ledger = make_answered_ledger(&questions);
    let result = score_session(
        Uuid::nil(),
        &questions,
        &mut ledger,
        3600,
        AttemptStatus::Completed,
    );

    c.bench_function("aggregate_entries/200", |b| {
        b.iter(|| aggregate_entries(black_box(&result.entries)))
    });
}

fn bench_classify(c: &mut Criterion) {
    let record = AnswerRecord {
        question_id: "q0".into(),
        selected: Some(OptionLabel::A),
        correct: OptionLabel::A,
        marks: 1,
        is_correct: None,
        marked_for_review: true,
        visited: true,
        answer_checked: false,
        time_spent_secs: 42,
    };

    c.bench_function("classify", |b| {
        b.iter(|| classify(black_box(&record), black_box(false)))
    });
}

criterion_group!(benches, bench_score_session, bench_aggregate_entries, bench_classify);
criterion_main!(benches);
