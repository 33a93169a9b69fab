use geoquiz_engine::quiz::{Collection, QuizSession};
use geoquiz_engine::stats::compute_stats;

fn main() {
    let collection = Collection::from_path("quizzes/washington_peaks.json").expect("load quiz");
    let mut session = QuizSession::new();
    session.load(collection).expect("collection should apply");

    for guess in ["Mt. Rainier", "Tahoma", "Glacier Peak", "Everest"] {
        let result = session.submit(guess).expect("session is loaded");
        println!(
            "Guess {guess:?}: accepted={}, newly_correct={:?}, correct={}/{}",
            result.accepted,
            result.newly_correct,
            result.total_correct,
            session.collection().map(Collection::len).unwrap_or(0)
        );
    }

    let stats = compute_stats(
        session.collection().expect("loaded"),
        session.correct_set().expect("loaded"),
    );
    match stats.coverage_percent {
        Some(pct) => println!("Coverage: {pct}%"),
        None => println!("Coverage: -"),
    }
}
