pub mod config;
pub mod dictionary;
pub mod display;
mod error;
pub mod llm;
pub mod session;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub use dictionary::{AvoidanceKind, AvoidancePhrases, Category, DictionarySource, KeywordDictionary};
pub use error::Error;

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DetectedKeyword {
    pub word: String,
    pub category: Category,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub money_count: usize,
    pub emotion_count: usize,
    pub detected_keywords: Vec<DetectedKeyword>,
}

impl MatchResult {
    fn record(&mut self, word: &str, category: Category) {
        match category {
            Category::Money => self.money_count += 1,
            Category::Emotion => self.emotion_count += 1,
        }
        self.detected_keywords.push(DetectedKeyword {
            word: word.to_string(),
            category,
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Medium,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl From<Severity> for RiskLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Info => RiskLevel::Low,
            Severity::Medium => RiskLevel::Medium,
            Severity::Critical => RiskLevel::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Avoidance,
    EmotionMoneyCrossover,
    SmallProfitBait,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub rule: Rule,
    pub title: String,
    pub detection: String,
    pub interpretation: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Analysis {
    /// One finding per rule, in rule order.
    pub findings: [Finding; 3],
    pub overall_risk: RiskLevel,
    pub match_result: MatchResult,
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Count thresholds for the crossover and bait rules. All comparisons are
/// strict (`count > threshold`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub emotion_peak: usize,
    pub money_heavy: usize,
    pub money_present: usize,
    pub withdrawal_money: usize,
}

pub const DEFAULT_THRESHOLDS: Thresholds = Thresholds {
    emotion_peak: 5,
    money_heavy: 3,
    money_present: 0,
    withdrawal_money: 5,
};

impl Default for Thresholds {
    fn default() -> Self {
        DEFAULT_THRESHOLDS
    }
}

const CONTEXT_WINDOW_CHARS: usize = 60;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn context_around(text: &str, start: usize, end: usize, width: usize) -> String {
    let mid = (start + end) / 2;
    let half = width / 2;
    let ctx_start = snap_to_char_boundary(text, mid.saturating_sub(half), false);
    let ctx_end = snap_to_char_boundary(text, std::cmp::min(text.len(), mid + half), true);

    let snippet = text[ctx_start..ctx_end].replace('\n', " ");
    let prefix = if ctx_start > 0 { "..." } else { "" };
    let suffix = if ctx_end < text.len() { "..." } else { "" };
    format!("{prefix}{snippet}{suffix}")
}

/// Snap a byte offset to a valid char boundary, forward or backward.
fn snap_to_char_boundary(text: &str, pos: usize, forward: bool) -> usize {
    if pos >= text.len() {
        return text.len();
    }
    let mut p = pos;
    while !text.is_char_boundary(p) {
        if forward {
            p += 1;
        } else {
            p -= 1;
        }
    }
    p
}

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

/// Count every non-overlapping, case-insensitive occurrence of each
/// dictionary keyword. Entries are visited in dictionary order.
pub fn match_keywords(text: &str, dictionary: &KeywordDictionary) -> MatchResult {
    let mut result = MatchResult::default();
    for entry in dictionary.keywords() {
        for _ in entry.literal.re.find_iter(text) {
            result.record(entry.text(), entry.category);
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

fn rule_avoidance(text: &str, dictionary: &KeywordDictionary) -> Finding {
    let hits: Vec<String> = dictionary
        .avoidance()
        .iter()
        .flat_map(|(kind, list)| {
            list.first_matches(text).map(move |(phrase, m)| {
                let ctx = context_around(text, m.start(), m.end(), CONTEXT_WINDOW_CHARS);
                format!("{}：「{phrase}」（{ctx}）", kind.label())
            })
        })
        .collect();

    if hits.is_empty() {
        return Finding {
            rule: Rule::Avoidance,
            title: "迴避視訊／見面模式".to_string(),
            detection: "未偵測到迴避視訊、見面或聲稱人在國外的說詞。".to_string(),
            interpretation: "即使沒有迴避跡象，在透過視訊或實際見面確認身分之前，仍請保持基本警覺。"
                .to_string(),
            severity: Severity::Info,
        };
    }

    Finding {
        rule: Rule::Avoidance,
        title: "迴避視訊／見面模式".to_string(),
        detection: format!("偵測到迴避行為：{}", hits.join("、")),
        interpretation: "以各種理由拒絕視訊、見面，或聲稱身在國外，是假冒身分的典型手法。\
                         建議用對方的照片進行以圖搜圖（反向圖片搜尋）查證。"
            .to_string(),
        severity: Severity::Medium,
    }
}

fn rule_crossover(matches: &MatchResult, th: &Thresholds) -> Finding {
    let emotion = matches.emotion_count;
    let money = matches.money_count;
    let detection = format!("親密詞彙出現 {emotion} 次，金錢詞彙出現 {money} 次。");

    let (severity, interpretation) = if emotion > th.emotion_peak && money > th.money_heavy {
        (
            Severity::Critical,
            "致命交叉：親密感已達高峰，同時密集出現金錢話題，\
             這是殺豬盤從培養感情轉向收割的關鍵時刻。請立即停止任何匯款。",
        )
    } else if emotion > th.emotion_peak && money > th.money_present {
        (
            Severity::Medium,
            "早期訊號：在高度親密的對話中開始出現金錢話題，\
             請留意對方後續是否提出投資或借款要求。",
        )
    } else {
        (
            Severity::Info,
            "未明顯偵測到情感高峰與金錢話題的交叉。",
        )
    };

    Finding {
        rule: Rule::EmotionMoneyCrossover,
        title: "情感高峰與金錢交叉".to_string(),
        detection,
        interpretation: interpretation.to_string(),
        severity,
    }
}

fn rule_small_profit(text: &str, dictionary: &KeywordDictionary, matches: &MatchResult, th: &Thresholds) -> Finding {
    let bait: Vec<&str> = dictionary
        .small_profit()
        .first_matches(text)
        .map(|(phrase, _)| phrase)
        .collect();
    let withdrawal = dictionary.withdrawal().contains_any(text);

    // bait || (withdrawal && heavy money talk)
    if !bait.is_empty() || (withdrawal && matches.money_count > th.withdrawal_money) {
        let detection = if bait.is_empty() {
            format!(
                "提到出金／提領，且金錢詞彙出現 {} 次。",
                matches.money_count
            )
        } else {
            let quoted: Vec<String> = bait.iter().map(|p| format!("「{p}」")).collect();
            format!("偵測到小額獲利誘導話術：{}", quoted.join("、"))
        };
        return Finding {
            rule: Rule::SmallProfitBait,
            title: "小額獲利誘餌".to_string(),
            detection,
            interpretation: "先讓你小額獲利或順利出金以建立信任，\
                             是投資詐騙誘你投入大筆資金的慣用手法。"
                .to_string(),
            severity: Severity::Critical,
        };
    }

    Finding {
        rule: Rule::SmallProfitBait,
        title: "小額獲利誘餌".to_string(),
        detection: "未偵測到小額獲利誘導話術。".to_string(),
        interpretation: "若對方推薦投資平台，切勿因為小額出金成功就加碼投入。".to_string(),
        severity: Severity::Info,
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

pub fn overall_risk(findings: &[Finding]) -> RiskLevel {
    findings
        .iter()
        .map(|f| RiskLevel::from(f.severity))
        .max()
        .unwrap_or(RiskLevel::Low)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Scoring engine: a dictionary plus thresholds. Cheap to share across
/// threads; `analyze` takes `&self` and writes nothing.
#[derive(Debug, Clone)]
pub struct Analyzer {
    dictionary: KeywordDictionary,
    thresholds: Thresholds,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(KeywordDictionary::builtin().clone(), Thresholds::default())
    }
}

impl Analyzer {
    pub fn new(dictionary: KeywordDictionary, thresholds: Thresholds) -> Self {
        Self {
            dictionary,
            thresholds,
        }
    }

    pub fn analyze(&self, text: &str) -> Result<Analysis, Error> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput);
        }

        let match_result = match_keywords(text, &self.dictionary);
        let findings = [
            rule_avoidance(text, &self.dictionary),
            rule_crossover(&match_result, &self.thresholds),
            rule_small_profit(text, &self.dictionary, &match_result, &self.thresholds),
        ];
        let overall_risk = overall_risk(&findings);

        tracing::debug!(
            money = match_result.money_count,
            emotion = match_result.emotion_count,
            risk = ?overall_risk,
            "analysis complete"
        );

        Ok(Analysis {
            findings,
            overall_risk,
            match_result,
        })
    }
}

static DEFAULT_ANALYZER: Lazy<Analyzer> = Lazy::new(Analyzer::default);

/// Analyze `text` with the built-in dictionary and default thresholds.
pub fn analyze(text: &str) -> Result<Analysis, Error> {
    DEFAULT_ANALYZER.analyze(text)
}
