use kp_oracle::extractor::ArrayExtractor;
use kp_oracle::tips::{BatchPrediction, Prediction, Tip};
use proptest::prelude::*;

fn prediction(id: u64, analysis: &str) -> BatchPrediction {
    BatchPrediction {
        fixture_id: id,
        prediction: Prediction {
            safe_tip: Tip::new("Double Chance", "1X", 80),
            value_tip: Tip::new("Total Goals", "TO 2.5", 60),
            tips: vec![Tip::new("Match Result", "W1", 55)],
            analysis: analysis.to_string(),
            correct_scores: vec!["2-1".to_string(), "1-1".to_string()],
        },
    }
}

fn feed(chunks: &[&[u8]]) -> Vec<BatchPrediction> {
    let mut ex = ArrayExtractor::new();
    chunks.iter().flat_map(|c| ex.push(c)).collect()
}

#[test]
fn pretty_printed_array_split_per_byte() {
    let items = vec![prediction(11, "first"), prediction(12, "second {x}")];
    let text = serde_json::to_string_pretty(&items).expect("serialize");
    let bytes: Vec<&[u8]> = text.as_bytes().chunks(1).collect();
    assert_eq!(feed(&bytes), items);
}

#[test]
fn duplicate_ids_are_both_emitted() {
    let items = vec![prediction(5, "a"), prediction(5, "b"), prediction(6, "c")];
    let text = serde_json::to_string(&items).expect("serialize");
    let out = feed(&[text.as_bytes()]);
    let ids: Vec<u64> = out.iter().map(|p| p.fixture_id).collect();
    assert_eq!(ids, vec![5, 5, 6]);
    assert_eq!(out[1].prediction.analysis, "b");
}

#[test]
fn schema_incomplete_objects_are_dropped_silently() {
    // Permissive on purpose: a malformed element never aborts the rest of the array.
    let good = serde_json::to_string(&prediction(9, "ok")).expect("serialize");
    let text = format!(r#"[{{"fixtureId":8}}, {{"note":"hello"}}, {good}]"#);
    let mut ex = ArrayExtractor::new();
    let out = ex.push(text.as_bytes());
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].fixture_id, 9);
    assert_eq!(ex.dropped(), 2);
}

#[test]
fn legacy_field_names_are_accepted() {
    let text = r#"[{"fixtureId":3,"prediction":{"winResult":{"bet":"Match Result","value":"X","confidence":61.6},"totalGoals":{"bet":"Total Goals","value":"TU 3.5","confidence":140},"analysis":"old shape"}}]"#;
    let out = feed(&[text.as_bytes()]);
    assert_eq!(out.len(), 1);
    let p = &out[0].prediction;
    assert_eq!(p.safe_tip.value, "X");
    assert_eq!(p.safe_tip.confidence, 62);
    assert_eq!(p.value_tip.confidence, 100);
    assert!(p.tips.is_empty());
    assert!(p.correct_scores.is_empty());
}

#[test]
fn nothing_is_emitted_before_the_closing_brace() {
    let text = serde_json::to_string(&vec![prediction(21, "slow")]).expect("serialize");
    let last = text.rfind('}').expect("closing brace");
    let mut ex = ArrayExtractor::new();
    assert!(ex.push(&text.as_bytes()[..last]).is_empty());
    let out = ex.push(&text.as_bytes()[last..]);
    assert_eq!(out.len(), 1);
}

fn analysis_text() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("{".to_string()),
            Just("}".to_string()),
            Just("\"".to_string()),
            Just("\\".to_string()),
            Just("[".to_string()),
            Just("]".to_string()),
            Just("ü".to_string()),
            "[a-z ]{1,6}",
        ],
        0..12,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn chunking_does_not_change_emitted_sequence(
        entries in prop::collection::vec((1u64..500, analysis_text()), 1..6),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..24),
        pretty in any::<bool>(),
    ) {
        let items: Vec<BatchPrediction> = entries
            .iter()
            .map(|(id, text)| prediction(*id, text))
            .collect();
        let text = if pretty {
            serde_json::to_string_pretty(&items).expect("serialize")
        } else {
            serde_json::to_string(&items).expect("serialize")
        };
        let bytes = text.as_bytes();

        let whole = feed(&[bytes]);
        prop_assert_eq!(&whole, &items);

        let mut points: Vec<usize> = cuts.iter().map(|c| c.index(bytes.len() + 1)).collect();
        points.sort_unstable();
        points.dedup();
        let mut chunks = Vec::new();
        let mut prev = 0;
        for p in points {
            chunks.push(&bytes[prev..p]);
            prev = p;
        }
        chunks.push(&bytes[prev..]);

        prop_assert_eq!(feed(&chunks), whole);
    }
}
