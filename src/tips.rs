use serde::{Deserialize, Deserializer, Serialize};

use crate::fixtures::{Fixture, FixtureId, ScoreLine};

/// Bet categories whose outcome cannot be derived from goals alone.
const UNCHECKABLE_MARKETS: &[&str] = &[
    "corner", "card", "booking", "shot", "offside", "foul", "throw", "possession",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tip {
    #[serde(default)]
    pub bet: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, deserialize_with = "de_confidence")]
    pub confidence: u8,
}

impl Tip {
    pub fn new(bet: impl Into<String>, value: impl Into<String>, confidence: u8) -> Self {
        Self {
            bet: bet.into(),
            value: value.into(),
            confidence: confidence.min(100),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    #[serde(alias = "winResult")]
    pub safe_tip: Tip,
    #[serde(alias = "totalGoals")]
    pub value_tip: Tip,
    #[serde(default)]
    pub tips: Vec<Tip>,
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub correct_scores: Vec<String>,
}

impl Prediction {
    pub fn matches_correct_score(&self, score: &ScoreLine) -> bool {
        self.correct_scores
            .iter()
            .filter_map(|s| parse_exact_score(&normalize_code(s)))
            .any(|(h, a)| h == score.home && a == score.away)
    }

    /// Primary tips first, then the secondary list.
    pub fn all_tips(&self) -> impl Iterator<Item = &Tip> {
        [&self.safe_tip, &self.value_tip]
            .into_iter()
            .chain(self.tips.iter())
    }
}

/// Wire envelope of one element of the streamed array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPrediction {
    #[serde(rename = "fixtureId")]
    pub fixture_id: FixtureId,
    pub prediction: Prediction,
}

fn de_confidence<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    if !raw.is_finite() {
        return Ok(0);
    }
    Ok(raw.round().clamp(0.0, 100.0) as u8)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipVerdict {
    Correct,
    Incorrect,
    Unknown,
    Uncheckable,
}

impl TipVerdict {
    fn from_bool(hit: bool) -> Self {
        if hit {
            TipVerdict::Correct
        } else {
            TipVerdict::Incorrect
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            TipVerdict::Correct => "✓",
            TipVerdict::Incorrect => "✗",
            TipVerdict::Unknown => "?",
            TipVerdict::Uncheckable => "-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Home,
    Draw,
    Away,
}

impl MatchOutcome {
    fn of(home: u32, away: u32) -> Self {
        match home.cmp(&away) {
            std::cmp::Ordering::Greater => MatchOutcome::Home,
            std::cmp::Ordering::Equal => MatchOutcome::Draw,
            std::cmp::Ordering::Less => MatchOutcome::Away,
        }
    }

    fn parse(code: &str) -> Option<Self> {
        match code {
            "W1" => Some(MatchOutcome::Home),
            "X" => Some(MatchOutcome::Draw),
            "W2" => Some(MatchOutcome::Away),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TipCode {
    MatchResult(MatchOutcome),
    /// The two outcomes covered by `1X`, `12` or `2X`.
    DoubleChance(MatchOutcome, MatchOutcome),
    BothTeamsToScore(bool),
    TotalGoals { over: bool, line: f64 },
    TeamTotal { side: Side, over: bool, line: f64 },
    Handicap { side: Side, line: f64 },
    HalfTimeFullTime(MatchOutcome, MatchOutcome),
    ExactScore(u32, u32),
}

/// Uppercases and strips every whitespace character.
fn normalize_code(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

pub fn parse_tip_code(raw: &str) -> Option<TipCode> {
    let code = normalize_code(raw);
    if code.is_empty() {
        return None;
    }

    if let Some(outcome) = MatchOutcome::parse(&code) {
        return Some(TipCode::MatchResult(outcome));
    }
    match code.as_str() {
        "1X" => return Some(TipCode::DoubleChance(MatchOutcome::Home, MatchOutcome::Draw)),
        "12" => return Some(TipCode::DoubleChance(MatchOutcome::Home, MatchOutcome::Away)),
        "2X" => return Some(TipCode::DoubleChance(MatchOutcome::Away, MatchOutcome::Draw)),
        "BTTS" | "BTTS-YES" => return Some(TipCode::BothTeamsToScore(true)),
        "BTTS-NO" => return Some(TipCode::BothTeamsToScore(false)),
        _ => {}
    }

    if let Some((ht, ft)) = code.split_once('/') {
        let ht = MatchOutcome::parse(ht)?;
        let ft = MatchOutcome::parse(ft)?;
        return Some(TipCode::HalfTimeFullTime(ht, ft));
    }

    if let Some((over, line)) = parse_over_under(&code) {
        return Some(TipCode::TotalGoals { over, line });
    }

    let side = match code.as_bytes()[0] {
        b'1' | b'H' => Some(Side::Home),
        b'2' | b'A' => Some(Side::Away),
        _ => None,
    };
    if let Some(side) = side {
        let rest = &code[1..];
        if code.starts_with(['1', '2']) {
            if let Some((over, line)) = parse_over_under(rest) {
                return Some(TipCode::TeamTotal { side, over, line });
            }
        } else if let Some(line) = parse_line(rest) {
            return Some(TipCode::Handicap { side, line });
        }
    }

    parse_exact_score(&code).map(|(h, a)| TipCode::ExactScore(h, a))
}

/// `TO2.5` / `TU1.5` (already normalized).
fn parse_over_under(code: &str) -> Option<(bool, f64)> {
    let rest = code.strip_prefix('T')?;
    let over = match rest.as_bytes().first()? {
        b'O' => true,
        b'U' => false,
        _ => return None,
    };
    let line = parse_line(&rest[1..])?;
    (line >= 0.0).then_some((over, line))
}

fn parse_line(raw: &str) -> Option<f64> {
    let unsigned = raw.trim_start_matches(['+', '-']);
    if unsigned.is_empty() || !unsigned.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    if raw.len() - unsigned.len() > 1 {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_exact_score(code: &str) -> Option<(u32, u32)> {
    let (home, away) = code.split_once('-')?;
    if home.is_empty() || away.is_empty() {
        return None;
    }
    if !home.chars().all(|c| c.is_ascii_digit()) || !away.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((home.parse().ok()?, away.parse().ok()?))
}

pub fn is_uncheckable_market(bet: &str) -> bool {
    let lower = bet.to_ascii_lowercase();
    UNCHECKABLE_MARKETS.iter().any(|m| lower.contains(m))
}

/// Whether the code belongs to the result, double-chance or total-goals family.
pub fn is_result_or_goals_tip(value: &str) -> bool {
    matches!(
        parse_tip_code(value),
        Some(TipCode::MatchResult(_) | TipCode::DoubleChance(..) | TipCode::TotalGoals { .. })
    )
}

/// Grades a tip against a final score.
///
/// Markets that goals cannot settle are `Uncheckable` even before kickoff. A missing score or an
/// unrecognised code is `Unknown`. Handicap lines are applied to the backed side's goals and
/// must then strictly exceed the opponent: a push (level after adjustment) grades `Incorrect`.
/// Total-goal lines follow the same strict comparison, so `TO 2` on two goals is `Incorrect`.
pub fn validate_tip(tip: &Tip, score: Option<ScoreLine>) -> TipVerdict {
    if is_uncheckable_market(&tip.bet) {
        return TipVerdict::Uncheckable;
    }
    let Some(score) = score else {
        return TipVerdict::Unknown;
    };
    let Some(code) = parse_tip_code(&tip.value) else {
        return TipVerdict::Unknown;
    };

    let (home, away) = (score.home, score.away);
    let outcome = MatchOutcome::of(home, away);
    match code {
        TipCode::MatchResult(expected) => TipVerdict::from_bool(outcome == expected),
        TipCode::DoubleChance(a, b) => TipVerdict::from_bool(outcome == a || outcome == b),
        TipCode::BothTeamsToScore(yes) => TipVerdict::from_bool((home > 0 && away > 0) == yes),
        TipCode::TotalGoals { over, line } => over_under(f64::from(home + away), over, line),
        TipCode::TeamTotal { side, over, line } => {
            let goals = match side {
                Side::Home => home,
                Side::Away => away,
            };
            over_under(f64::from(goals), over, line)
        }
        TipCode::Handicap { side, line } => {
            let (backed, other) = match side {
                Side::Home => (home, away),
                Side::Away => (away, home),
            };
            TipVerdict::from_bool(f64::from(backed) + line > f64::from(other))
        }
        TipCode::HalfTimeFullTime(ht, ft) => match score.halftime {
            Some((h, a)) => TipVerdict::from_bool(MatchOutcome::of(h, a) == ht && outcome == ft),
            None => TipVerdict::Unknown,
        },
        TipCode::ExactScore(h, a) => TipVerdict::from_bool(h == home && a == away),
    }
}

/// Grades only finished fixtures; anything still scheduled or in play is `Unknown`.
pub fn validate_for_fixture(tip: &Tip, fixture: &Fixture) -> TipVerdict {
    if !fixture.is_finished() {
        if is_uncheckable_market(&tip.bet) {
            return TipVerdict::Uncheckable;
        }
        return TipVerdict::Unknown;
    }
    validate_tip(tip, fixture.final_score())
}

fn over_under(total: f64, over: bool, line: f64) -> TipVerdict {
    if over {
        TipVerdict::from_bool(total > line)
    } else {
        TipVerdict::from_bool(total < line)
    }
}
