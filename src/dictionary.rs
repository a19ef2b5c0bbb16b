use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::Error;

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Money,
    Emotion,
}

/// Behaviour an avoidance phrase stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvoidanceKind {
    VideoCall,
    Meeting,
    Abroad,
}

impl AvoidanceKind {
    pub const ALL: [AvoidanceKind; 3] = [
        AvoidanceKind::VideoCall,
        AvoidanceKind::Meeting,
        AvoidanceKind::Abroad,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AvoidanceKind::VideoCall => "拒絕視訊",
            AvoidanceKind::Meeting => "拒絕見面",
            AvoidanceKind::Abroad => "聲稱人在國外",
        }
    }
}

// ---------------------------------------------------------------------------
// Built-in lists
// ---------------------------------------------------------------------------

const MONEY_WORDS: &[&str] = &[
    // Transfers
    "匯款",
    "轉帳",
    "借錢",
    "帳戶",
    "入金",
    "保證金",
    // Investment
    "投資",
    "獲利",
    "虛擬貨幣",
    "usdt",
    // Account trouble
    "凍結",
    "警示",
    // Urgency
    "手術",
    "車禍",
    "急用",
    // Amounts
    "10萬",
    "十萬",
];

const EMOTION_WORDS: &[&str] = &[
    "寶貝",
    "寶贝",
    "親愛的",
    "老公",
    "老婆",
    "緣分",
    "想你",
    "愛你",
    "baby",
    "honey",
    "darling",
];

const VIDEO_CALL_PHRASES: &[&str] = &["不方便視訊", "不能視訊", "鏡頭壞了", "can't video call"];

const MEETING_PHRASES: &[&str] = &["不方便見面", "沒辦法見面"];

const ABROAD_PHRASES: &[&str] = &["人在國外", "在海外工作", "駐外", "on an oil rig"];

const SMALL_PROFIT_PHRASES: &[&str] = &[
    "先小額試試",
    "小額試水",
    "先試一點",
    "小賺一筆",
    "穩賺不賠",
    "try a little first",
];

const WITHDRAWAL_PHRASES: &[&str] = &["出金", "提領", "提現", "withdraw"];

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Source (configuration input)
// ---------------------------------------------------------------------------

/// Raw word lists, as read from configuration. Missing fields fall back to
/// the built-in lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionarySource {
    pub money: Vec<String>,
    pub emotion: Vec<String>,
    pub avoidance_phrases: AvoidancePhrases,
    pub small_profit_phrases: Vec<String>,
    pub withdrawal_phrases: Vec<String>,
}

impl Default for DictionarySource {
    fn default() -> Self {
        Self {
            money: owned(MONEY_WORDS),
            emotion: owned(EMOTION_WORDS),
            avoidance_phrases: AvoidancePhrases::default(),
            small_profit_phrases: owned(SMALL_PROFIT_PHRASES),
            withdrawal_phrases: owned(WITHDRAWAL_PHRASES),
        }
    }
}

/// Avoidance phrases keyed by behaviour, e.g. `[dictionary.avoidance_phrases]`
/// with `video_call`, `meeting` and `abroad` arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvoidancePhrases {
    pub video_call: Vec<String>,
    pub meeting: Vec<String>,
    pub abroad: Vec<String>,
}

impl Default for AvoidancePhrases {
    fn default() -> Self {
        Self {
            video_call: owned(VIDEO_CALL_PHRASES),
            meeting: owned(MEETING_PHRASES),
            abroad: owned(ABROAD_PHRASES),
        }
    }
}

impl AvoidancePhrases {
    fn of(&self, kind: AvoidanceKind) -> &[String] {
        match kind {
            AvoidanceKind::VideoCall => &self.video_call,
            AvoidanceKind::Meeting => &self.meeting,
            AvoidanceKind::Abroad => &self.abroad,
        }
    }
}

// ---------------------------------------------------------------------------
// Compiled dictionary
// ---------------------------------------------------------------------------

/// A literal, case-insensitive pattern compiled once at construction.
#[derive(Debug, Clone)]
pub(crate) struct Literal {
    pub(crate) text: String,
    pub(crate) re: Regex,
}

impl Literal {
    fn compile(list: &str, raw: &str) -> Result<Self, Error> {
        let text = raw.trim().to_lowercase();
        if text.is_empty() {
            return Err(Error::InvalidDictionary(format!(
                "empty entry in '{list}'"
            )));
        }
        let re = Regex::new(&format!("(?i){}", regex::escape(&text)))
            .map_err(|e| Error::InvalidDictionary(format!("'{text}' in '{list}': {e}")))?;
        Ok(Self { text, re })
    }
}

#[derive(Debug, Clone)]
pub struct KeywordEntry {
    pub category: Category,
    pub(crate) literal: Literal,
}

impl KeywordEntry {
    pub fn text(&self) -> &str {
        &self.literal.text
    }
}

/// Ordered list of phrases for one phrase category.
#[derive(Debug, Clone)]
pub struct PhraseList {
    literals: Vec<Literal>,
}

impl PhraseList {
    fn compile(list: &str, raw: &[String]) -> Result<Self, Error> {
        let literals = raw
            .iter()
            .map(|p| Literal::compile(list, p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { literals })
    }

    /// True if any phrase occurs in `text`.
    pub fn contains_any(&self, text: &str) -> bool {
        self.literals.iter().any(|l| l.re.is_match(text))
    }

    /// First occurrence of each phrase present in `text`, in list order.
    pub(crate) fn first_matches<'a, 't: 'a>(
        &'a self,
        text: &'t str,
    ) -> impl Iterator<Item = (&'a str, regex::Match<'t>)> + 'a {
        self.literals
            .iter()
            .filter_map(move |l| l.re.find(text).map(|m| (l.text.as_str(), m)))
    }
}

/// Read-only keyword dictionary shared by every analysis.
#[derive(Debug, Clone)]
pub struct KeywordDictionary {
    keywords: Vec<KeywordEntry>,
    avoidance: Vec<(AvoidanceKind, PhraseList)>,
    small_profit: PhraseList,
    withdrawal: PhraseList,
}

static BUILTIN: Lazy<KeywordDictionary> = Lazy::new(|| {
    KeywordDictionary::from_source(&DictionarySource::default())
        .expect("built-in dictionary compiles")
});

impl KeywordDictionary {
    pub fn from_source(source: &DictionarySource) -> Result<Self, Error> {
        let mut keywords = Vec::with_capacity(source.money.len() + source.emotion.len());
        for (list, words, category) in [
            ("money", &source.money, Category::Money),
            ("emotion", &source.emotion, Category::Emotion),
        ] {
            for word in words {
                keywords.push(KeywordEntry {
                    category,
                    literal: Literal::compile(list, word)?,
                });
            }
        }

        let avoidance = AvoidanceKind::ALL
            .into_iter()
            .map(|kind| {
                PhraseList::compile("avoidance_phrases", source.avoidance_phrases.of(kind))
                    .map(|list| (kind, list))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            keywords,
            avoidance,
            small_profit: PhraseList::compile("small_profit_phrases", &source.small_profit_phrases)?,
            withdrawal: PhraseList::compile("withdrawal_phrases", &source.withdrawal_phrases)?,
        })
    }

    pub fn builtin() -> &'static KeywordDictionary {
        &BUILTIN
    }

    pub fn keywords(&self) -> &[KeywordEntry] {
        &self.keywords
    }

    /// Avoidance phrase lists, one per behaviour, in `AvoidanceKind::ALL` order.
    pub fn avoidance(&self) -> &[(AvoidanceKind, PhraseList)] {
        &self.avoidance
    }

    pub fn small_profit(&self) -> &PhraseList {
        &self.small_profit
    }

    pub fn withdrawal(&self) -> &PhraseList {
        &self.withdrawal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lists_compile() {
        let dict = KeywordDictionary::builtin();
        assert_eq!(
            dict.keywords().len(),
            MONEY_WORDS.len() + EMOTION_WORDS.len()
        );
        assert!(dict
            .keywords()
            .iter()
            .any(|k| k.text() == "投資" && k.category == Category::Money));
        assert!(dict.small_profit().contains_any("先小額試試"));
        let kinds: Vec<AvoidanceKind> = dict.avoidance().iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, AvoidanceKind::ALL.to_vec());
    }

    #[test]
    fn entries_are_lowercased() {
        let source = DictionarySource {
            money: vec!["  USDT ".into()],
            ..DictionarySource::default()
        };
        let dict = KeywordDictionary::from_source(&source).unwrap();
        assert_eq!(dict.keywords()[0].text(), "usdt");
    }

    #[test]
    fn rejects_empty_entry() {
        let source = DictionarySource {
            emotion: vec!["寶貝".into(), "   ".into()],
            ..DictionarySource::default()
        };
        let err = KeywordDictionary::from_source(&source).unwrap_err();
        assert!(matches!(err, Error::InvalidDictionary(_)));
        assert!(err.to_string().contains("emotion"));
    }

    #[test]
    fn phrase_match_ignores_case() {
        let dict = KeywordDictionary::builtin();
        assert!(dict.small_profit().contains_any("OK, I'll TRY A LITTLE FIRST"));
        assert!(!dict.small_profit().contains_any("nothing to see"));
    }

    #[test]
    fn avoidance_phrases_parse_by_kind() {
        let source: DictionarySource = toml::from_str(
            r#"
            [avoidance_phrases]
            abroad = ["在敘利亞維和"]
            "#,
        )
        .unwrap();
        assert_eq!(source.avoidance_phrases.abroad, vec!["在敘利亞維和".to_string()]);
        assert_eq!(source.avoidance_phrases.video_call, owned(VIDEO_CALL_PHRASES));

        let dict = KeywordDictionary::from_source(&source).unwrap();
        let (kind, list) = &dict.avoidance()[2];
        assert_eq!(*kind, AvoidanceKind::Abroad);
        assert!(list.contains_any("我在敘利亞維和"));
        assert!(!list.contains_any("人在國外"));
    }

    #[test]
    fn source_parses_partial_toml() {
        let source: DictionarySource = toml::from_str(r#"money = ["比特幣"]"#).unwrap();
        assert_eq!(source.money, vec!["比特幣".to_string()]);
        assert_eq!(source.emotion, owned(EMOTION_WORDS));
    }
}
