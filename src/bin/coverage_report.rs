use geoquiz_engine::quiz::{Collection, QuizSession};
use geoquiz_engine::stats::{
    compute_stats, filter_entities, AttributeStats, AttributeView, DirectionStats, NominalStats,
    RankingStats, ThresholdPredicate,
};
use std::collections::HashMap;
use std::env;
use std::fs;

fn parse_args() -> Result<HashMap<String, Vec<String>>, String> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if !arg.starts_with("--") {
            return Err(format!("unexpected argument {arg}"));
        }
        let key = arg.trim_start_matches("--").to_string();
        let val = args
            .next()
            .ok_or_else(|| format!("missing value for --{}", key))?;
        map.entry(key).or_default().push(val);
    }
    Ok(map)
}

fn parse_min(raw: &str) -> Result<ThresholdPredicate, String> {
    let mut parts = raw.splitn(2, '=');
    let attr = parts.next().unwrap_or_default().trim();
    let value = parts.next().unwrap_or_default().trim();
    if attr.is_empty() || value.is_empty() {
        return Err(format!("invalid --min entry {raw}; expected attr=value"));
    }
    let minimum = value
        .parse::<f64>()
        .map_err(|_| format!("invalid --min value {value}"))?;
    Ok(ThresholdPredicate::new(attr, minimum))
}

fn fmt_percent(value: Option<i64>) -> String {
    match value {
        Some(v) => format!("{v}%"),
        None => "-".to_string(),
    }
}

fn print_direction(label: &str, direction: &DirectionStats) {
    println!(
        "    {label}: {} of {} at cutoff {}",
        direction.correct_at_cutoff,
        direction.total_at_cutoff,
        direction
            .cutoff
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    if !direction.leading_correct.is_empty() {
        let names: Vec<&str> = direction
            .leading_correct
            .iter()
            .map(|id| id.as_str())
            .collect();
        println!("      leading: {}", names.join(", "));
    }
}

fn print_ranking(ranking: &RankingStats) {
    println!("    ranked entities: {}", ranking.ranked);
    print_direction("top", &ranking.descending);
    print_direction("bottom", &ranking.ascending);
}

fn print_nominal(nominal: &NominalStats) {
    println!(
        "    {} of {} bins covered",
        nominal.covered_bins(),
        nominal.total_bins()
    );
    for (key, bin) in &nominal.bins {
        println!(
            "      {key}: {}/{} ({})",
            bin.correct,
            bin.total,
            fmt_percent(bin.percent())
        );
    }
}

fn print_attribute(attr: &AttributeStats) {
    println!("  {} [{:?}]", attr.name, attr.level);
    match &attr.view {
        AttributeView::Nominal(nominal) => print_nominal(nominal),
        AttributeView::Ranked(ranking) => print_ranking(ranking),
        AttributeView::RankedWeighted {
            ranking,
            share_percent,
        } => {
            println!("    weighted share: {}", fmt_percent(*share_percent));
            print_ranking(ranking);
        }
    }
}

fn main() -> Result<(), String> {
    let args = parse_args()?;
    let quiz_path = args
        .get("quiz")
        .and_then(|v| v.first())
        .ok_or_else(|| "--quiz is required".to_string())?;
    let guesses_path = args
        .get("guesses")
        .and_then(|v| v.first())
        .ok_or_else(|| "--guesses is required".to_string())?;

    let mut predicates = Vec::new();
    if let Some(items) = args.get("min") {
        for item in items {
            predicates.push(parse_min(item)?);
        }
    }

    let collection = Collection::from_path(quiz_path).map_err(|e| e.to_string())?;
    let items_label = collection.config().items_label.clone();

    let raw = fs::read_to_string(guesses_path)
        .map_err(|e| format!("failed reading guesses: {e}"))?;
    let guesses: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();
    let guess_count = guesses.len();

    let mut session = QuizSession::new();
    session.restore_guesses(guesses);
    session.load(collection).map_err(|e| e.to_string())?;

    let collection = session.collection().ok_or("no collection loaded")?;
    let correct = session.correct_set().ok_or("no collection loaded")?;
    let stats = compute_stats(collection, correct);

    println!("Guesses: {guess_count}");
    println!(
        "Correct: {} of {} {items_label} ({})",
        stats.correct_entities,
        stats.total_entities,
        fmt_percent(stats.coverage_percent)
    );
    for attr in &stats.attributes {
        print_attribute(attr);
    }

    if !predicates.is_empty() {
        let view = filter_entities(collection, correct, &predicates);
        let described: Vec<String> = predicates
            .iter()
            .map(|p| format!("{} >= {}", p.attribute, p.minimum))
            .collect();
        println!("Filtered ({}):", described.join(", "));
        println!(
            "  {} of {} {items_label} ({})",
            view.correct.len(),
            view.all.len(),
            fmt_percent(view.coverage_percent())
        );
    }

    Ok(())
}
