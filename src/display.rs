//! Presentation helpers. Nothing here feeds back into scoring.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::{Analysis, Category, DetectedKeyword, MatchResult, RiskLevel, Severity};

/// Copy of the detected keywords in random order, for the keyword cloud.
pub fn keyword_cloud<R: Rng + ?Sized>(result: &MatchResult, rng: &mut R) -> Vec<DetectedKeyword> {
    let mut cloud = result.detected_keywords.clone();
    cloud.shuffle(rng);
    cloud
}

impl RiskLevel {
    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "低風險",
            RiskLevel::Medium => "中風險",
            RiskLevel::High => "高風險",
        }
    }

    /// Threat score out of 100 shown next to the label.
    pub fn threat_score(self) -> u8 {
        match self {
            RiskLevel::Low => 20,
            RiskLevel::Medium => 60,
            RiskLevel::High => 95,
        }
    }

    pub fn recommended_actions(self) -> &'static [&'static str] {
        match self {
            RiskLevel::Low => &[
                "目前評估風險較低，但若對方開始涉及金錢話題或索取個資，請重新分析或提高警覺。",
            ],
            RiskLevel::Medium => &[
                "要求對方視訊或見面確認身分，並以圖搜圖查證照片。",
                "不要提供個人資料、帳戶或證件照片。",
            ],
            RiskLevel::High => &[
                "切勿向未曾實際見面的網友匯款。",
                "不要下載對方提供的投資 App 或連結。",
                "立即撥打 165 反詐騙專線諮詢。",
            ],
        }
    }
}

fn severity_marker(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "[資訊]",
        Severity::Medium => "[警告]",
        Severity::Critical => "[危險]",
    }
}

fn category_label(category: Category) -> &'static str {
    match category {
        Category::Money => "金錢",
        Category::Emotion => "情感",
    }
}

/// Plain-text report. `cloud` replaces the deterministic keyword order when given.
pub fn render_report(analysis: &Analysis, cloud: Option<&[DetectedKeyword]>) -> String {
    let risk = analysis.overall_risk;
    let m = &analysis.match_result;
    let mut lines = vec![
        format!("風險等級：{}（威脅評分 {}/100）", risk.label(), risk.threat_score()),
        format!("偵測異常數量：{} 項", anomaly_count(analysis)),
        format!("金錢詞彙 {} 次，情感詞彙 {} 次", m.money_count, m.emotion_count),
        String::new(),
    ];

    for finding in &analysis.findings {
        lines.push(format!("{} {}", severity_marker(finding.severity), finding.title));
        lines.push(format!("  偵測：{}", finding.detection));
        lines.push(format!("  解讀：{}", finding.interpretation));
    }

    let keywords = cloud.unwrap_or(m.detected_keywords.as_slice());
    if !keywords.is_empty() {
        let words: Vec<String> = keywords
            .iter()
            .map(|k| format!("{}({})", k.word, category_label(k.category)))
            .collect();
        lines.push(String::new());
        lines.push(format!("關鍵字：{}", words.join(" ")));
    }

    lines.push(String::new());
    lines.push("建議採取行動：".to_string());
    lines.extend(risk.recommended_actions().iter().map(|a| format!("  - {a}")));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Number of rules that raised something above `Info`.
pub fn anomaly_count(analysis: &Analysis) -> usize {
    analysis
        .findings
        .iter()
        .filter(|f| f.severity > Severity::Info)
        .count()
}

/// One-line summary for the interactive session.
pub fn summary_line(analysis: &Analysis) -> String {
    let flagged: Vec<String> = analysis
        .findings
        .iter()
        .filter(|f| f.severity > Severity::Info)
        .map(|f| format!("{}{}", severity_marker(f.severity), f.title))
        .collect();
    let detail = if flagged.is_empty() {
        "未發現明顯詐騙模式".to_string()
    } else {
        flagged.join(" ")
    };
    format!("風險等級：{}｜{}", analysis.overall_risk.label(), detail)
}
