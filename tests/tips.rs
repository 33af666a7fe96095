use kp_oracle::fixtures::ScoreLine;
use kp_oracle::tips::{
    Prediction, Tip, TipVerdict, is_result_or_goals_tip, is_uncheckable_market, validate_tip,
};

fn check(bet: &str, value: &str, score: Option<ScoreLine>) -> TipVerdict {
    validate_tip(&Tip::new(bet, value, 50), score)
}

#[test]
fn reference_grading_examples() {
    let two_one = Some(ScoreLine::new(2, 1));
    assert_eq!(check("Match Result", "W1", two_one), TipVerdict::Correct);
    assert_eq!(
        check("Total Goals", "TO 2.5", Some(ScoreLine::new(1, 1))),
        TipVerdict::Incorrect
    );
    assert_eq!(
        check("Asian Handicap", "H -1.0", two_one),
        TipVerdict::Incorrect
    );
    assert_eq!(
        check("Total Corners", "CO 9.5", Some(ScoreLine::new(1, 0))),
        TipVerdict::Uncheckable
    );
    assert_eq!(check("Match Result", "W1", None), TipVerdict::Unknown);
}

#[test]
fn grading_is_idempotent() {
    let tip = Tip::new("Total Goals", "TU 3.5", 70);
    let score = Some(ScoreLine::new(2, 1));
    let first = validate_tip(&tip, score);
    assert_eq!(first, TipVerdict::Correct);
    assert_eq!(validate_tip(&tip, score), first);
}

#[test]
fn codes_ignore_case_and_whitespace() {
    let score = Some(ScoreLine::new(0, 2));
    assert_eq!(check("Match Result", " w2 ", score), TipVerdict::Correct);
    assert_eq!(check("Double Chance", "2 x", score), TipVerdict::Correct);
    assert_eq!(check("Total Goals", "to1.5", score), TipVerdict::Correct);
}

#[test]
fn team_totals_and_handicaps() {
    let score = Some(ScoreLine::new(3, 1));
    assert_eq!(check("Team Total", "1TO 2.5", score), TipVerdict::Correct);
    assert_eq!(check("Team Total", "2TU 0.5", score), TipVerdict::Incorrect);
    assert_eq!(check("Asian Handicap", "H -1.5", score), TipVerdict::Correct);
    assert_eq!(check("Asian Handicap", "A +1.5", score), TipVerdict::Incorrect);
    assert_eq!(check("Asian Handicap", "A +2.5", score), TipVerdict::Correct);
    // Level after the adjustment counts as a miss.
    assert_eq!(check("Asian Handicap", "A +2", score), TipVerdict::Incorrect);
}

#[test]
fn half_time_full_time_needs_half_time_score() {
    let tip = Tip::new("HT/FT", "X/W1", 30);
    let with_ht = ScoreLine::new(2, 1).with_halftime(0, 0);
    assert_eq!(validate_tip(&tip, Some(with_ht)), TipVerdict::Correct);
    assert_eq!(
        validate_tip(&tip, Some(ScoreLine::new(2, 1))),
        TipVerdict::Unknown
    );
}

#[test]
fn exact_scores_and_btts() {
    let score = Some(ScoreLine::new(1, 0));
    assert_eq!(check("Correct Score", "1-0", score), TipVerdict::Correct);
    assert_eq!(check("Correct Score", "2-0", score), TipVerdict::Incorrect);
    assert_eq!(check("BTTS", "BTTS-NO", score), TipVerdict::Correct);
    assert_eq!(check("BTTS", "BTTS-YES", score), TipVerdict::Incorrect);
}

#[test]
fn unrecognised_codes_are_unknown() {
    let score = Some(ScoreLine::new(1, 0));
    assert_eq!(check("Mystery", "W3", score), TipVerdict::Unknown);
    assert_eq!(check("Mystery", "", score), TipVerdict::Unknown);
    assert_eq!(check("Total Goals", "TO abc", score), TipVerdict::Unknown);
}

#[test]
fn uncheckable_markets_win_over_missing_scores() {
    assert!(is_uncheckable_market("Total Bookings"));
    assert!(is_uncheckable_market("Shots on Target"));
    assert!(!is_uncheckable_market("Total Goals"));
    assert_eq!(check("Yellow Cards", "TO 3.5", None), TipVerdict::Uncheckable);
}

#[test]
fn result_and_goals_family() {
    assert!(is_result_or_goals_tip("W1"));
    assert!(is_result_or_goals_tip("12"));
    assert!(is_result_or_goals_tip("TU 2.5"));
    assert!(!is_result_or_goals_tip("H -1"));
    assert!(!is_result_or_goals_tip("2-1"));
}

#[test]
fn correct_score_list_matches_final_score() {
    let prediction = Prediction {
        correct_scores: vec!["2-1".to_string(), " 1 - 1 ".to_string(), "junk".to_string()],
        ..Prediction::default()
    };
    assert!(prediction.matches_correct_score(&ScoreLine::new(1, 1)));
    assert!(!prediction.matches_correct_score(&ScoreLine::new(0, 0)));
    assert_eq!(prediction.all_tips().count(), 2);
}
