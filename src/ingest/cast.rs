// Field casting - static table from post field to its parser
// Every non-key field has a fallback, so casting a present row never fails

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fmt;

use crate::core::{LegislatorId, PostId, TopicCode};
use crate::ingest::record::RawRecord;
use crate::models::post::{Post, ToxicityScores};

/// How a field's text is turned into a column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    /// Integer, 0 when absent or unparseable
    Counter,
    /// Unconstrained float, NULL when absent or unparseable
    Score,
    /// Float clamped to [0, 1], NULL when absent or unparseable
    UnitScore,
    /// Float kept exactly as parsed, NULL when absent or unparseable
    Toxicity,
    /// Calendar date, NULL when absent or unparseable
    Date,
    /// Verbatim text, NULL when blank
    Text,
}

/// The non-key fields of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostField {
    CreatedAt,
    Text,
    Attachment,
    RetweetCount,
    LikeCount,
    ReplyCount,
    QuoteCount,
    CountMisinfo,
    InteractionScore,
    OverperformingScore,
    CivilityScore,
    TopicProbability,
    ToxToxicity,
    ToxSevereToxicity,
    ToxObscene,
    ToxThreat,
    ToxInsult,
    ToxIdentityAttack,
}

impl PostField {
    pub const ALL: [PostField; 18] = [
        PostField::CreatedAt,
        PostField::Text,
        PostField::Attachment,
        PostField::RetweetCount,
        PostField::LikeCount,
        PostField::ReplyCount,
        PostField::QuoteCount,
        PostField::CountMisinfo,
        PostField::InteractionScore,
        PostField::OverperformingScore,
        PostField::CivilityScore,
        PostField::TopicProbability,
        PostField::ToxToxicity,
        PostField::ToxSevereToxicity,
        PostField::ToxObscene,
        PostField::ToxThreat,
        PostField::ToxInsult,
        PostField::ToxIdentityAttack,
    ];

    /// Input columns, in priority order. The first entry is the stored column name.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            PostField::CreatedAt => &["created_at", "created_date"],
            PostField::Text => &["text", "full_text", "hydrated_text"],
            PostField::Attachment => &["attachment"],
            PostField::RetweetCount => &["retweet_count"],
            PostField::LikeCount => &["like_count", "favorite_count"],
            PostField::ReplyCount => &["reply_count"],
            PostField::QuoteCount => &["quote_count"],
            PostField::CountMisinfo => &["count_misinfo"],
            PostField::InteractionScore => &["interaction_score"],
            PostField::OverperformingScore => &["overperforming_score"],
            PostField::CivilityScore => &["civility_score"],
            PostField::TopicProbability => &["topic_probability"],
            PostField::ToxToxicity => &["tox_toxicity", "toxicity_score"],
            PostField::ToxSevereToxicity => &["tox_severe_toxicity", "severe_toxicity_score"],
            PostField::ToxObscene => &["tox_obscene", "obscene_score"],
            PostField::ToxThreat => &["tox_threat", "threat_score"],
            PostField::ToxInsult => &["tox_insult", "insult_score"],
            PostField::ToxIdentityAttack => &["tox_identity_attack", "identity_attack_score"],
        }
    }

    pub fn kind(self) -> CastKind {
        match self {
            PostField::CreatedAt => CastKind::Date,
            PostField::Text | PostField::Attachment => CastKind::Text,
            PostField::RetweetCount
            | PostField::LikeCount
            | PostField::ReplyCount
            | PostField::QuoteCount
            | PostField::CountMisinfo => CastKind::Counter,
            PostField::InteractionScore | PostField::OverperformingScore => CastKind::Score,
            PostField::CivilityScore | PostField::TopicProbability => CastKind::UnitScore,
            PostField::ToxToxicity
            | PostField::ToxSevereToxicity
            | PostField::ToxObscene
            | PostField::ToxThreat
            | PostField::ToxInsult
            | PostField::ToxIdentityAttack => CastKind::Toxicity,
        }
    }
}

/// A cast column value.
#[derive(Debug, Clone, PartialEq)]
pub enum CastValue {
    Int(i32),
    Float(Option<f64>),
    Date(Option<NaiveDate>),
    Text(Option<String>),
}

impl CastValue {
    fn into_int(self) -> i32 {
        match self {
            CastValue::Int(v) => v,
            _ => 0,
        }
    }

    fn into_float(self) -> Option<f64> {
        match self {
            CastValue::Float(v) => v,
            _ => None,
        }
    }

    fn into_date(self) -> Option<NaiveDate> {
        match self {
            CastValue::Date(v) => v,
            _ => None,
        }
    }

    fn into_text(self) -> Option<String> {
        match self {
            CastValue::Text(v) => v,
            _ => None,
        }
    }
}

/// Integer with JS `parseInt` leniency: a leading signed digit run is used, the rest ignored.
pub fn parse_counter(raw: Option<&str>) -> i32 {
    let Some(text) = raw.map(str::trim) else {
        return 0;
    };
    if let Ok(value) = text.parse::<i32>() {
        return value;
    }

    let (sign, digits) = match text.as_bytes().first() {
        Some(b'-') => (-1i64, &text[1..]),
        Some(b'+') => (1i64, &text[1..]),
        _ => (1i64, text),
    };
    let run: &str = &digits[..digits.bytes().take_while(u8::is_ascii_digit).count()];
    if run.is_empty() {
        return 0;
    }
    run.parse::<i64>()
        .ok()
        .and_then(|v| i32::try_from(sign * v).ok())
        .unwrap_or(0)
}

/// Float or None. NaN counts as unparseable, and so does any infinity
/// not spelled `Infinity` (`inf`, `infinity`, `INF`). Overflowing literals
/// such as `1e999` stay infinite.
pub fn parse_score(raw: Option<&str>) -> Option<f64> {
    let text = raw.map(str::trim)?;
    let value = text.parse::<f64>().ok().filter(|value| !value.is_nan())?;
    if value.is_infinite() {
        let unsigned = text.trim_start_matches(['+', '-']);
        if unsigned.get(..3).is_some_and(|head| head.eq_ignore_ascii_case("inf")) && unsigned != "Infinity" {
            return None;
        }
    }
    Some(value)
}

pub fn parse_unit_score(raw: Option<&str>) -> Option<f64> {
    parse_score(raw).map(|value| value.clamp(0.0, 1.0))
}

/// Toxicity sub-scores are stored exactly as parsed, scientific notation included.
pub fn parse_toxicity(raw: Option<&str>) -> Option<f64> {
    parse_score(raw)
}

/// `YYYY-MM-DD`, or a timestamp reduced to its UTC date.
pub fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let text = raw.map(str::trim)?;
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(timestamp.with_timezone(&Utc).date_naive());
    }
    if let Ok(timestamp) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(timestamp.with_timezone(&Utc).date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|timestamp| timestamp.date())
}

pub fn parse_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::to_string)
}

pub fn cast(kind: CastKind, raw: Option<&str>) -> CastValue {
    match kind {
        CastKind::Counter => CastValue::Int(parse_counter(raw)),
        CastKind::Score => CastValue::Float(parse_score(raw)),
        CastKind::UnitScore => CastValue::Float(parse_unit_score(raw)),
        CastKind::Toxicity => CastValue::Float(parse_toxicity(raw)),
        CastKind::Date => CastValue::Date(parse_date(raw)),
        CastKind::Text => CastValue::Text(parse_text(raw)),
    }
}

/// Why a record could not become a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingKey {
    Id,
    Lid,
    Topic,
}

impl fmt::Display for MissingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingKey::Id => write!(f, "id"),
            MissingKey::Lid => write!(f, "lid"),
            MissingKey::Topic => write!(f, "topic"),
        }
    }
}

struct FieldCaster {
    field: PostField,
    columns: &'static [&'static str],
    kind: CastKind,
}

/// Cast table resolved once per pipeline and applied to every record.
pub struct CastTable {
    casters: Vec<FieldCaster>,
}

impl Default for CastTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CastTable {
    pub fn new() -> Self {
        let casters = PostField::ALL
            .iter()
            .map(|&field| FieldCaster {
                field,
                columns: field.columns(),
                kind: field.kind(),
            })
            .collect();
        Self { casters }
    }

    /// Validate the keys of `record` and cast every other field.
    pub fn build_post(&self, record: &RawRecord) -> Result<Post, MissingKey> {
        let id = record.get("id").and_then(PostId::parse).ok_or(MissingKey::Id)?;
        let lid = record
            .get("lid")
            .and_then(LegislatorId::parse)
            .ok_or(MissingKey::Lid)?;
        let topic = record
            .get("topic")
            .and_then(TopicCode::parse)
            .ok_or(MissingKey::Topic)?;

        let mut post = Post {
            id,
            lid,
            topic,
            created_at: None,
            text: None,
            attachment: None,
            retweet_count: 0,
            like_count: 0,
            reply_count: 0,
            quote_count: 0,
            count_misinfo: 0,
            interaction_score: None,
            overperforming_score: None,
            civility_score: None,
            topic_probability: None,
            toxicity: ToxicityScores::default(),
        };

        for caster in &self.casters {
            let value = cast(caster.kind, record.first_of(caster.columns));
            match caster.field {
                PostField::CreatedAt => post.created_at = value.into_date(),
                PostField::Text => post.text = value.into_text(),
                PostField::Attachment => post.attachment = value.into_text(),
                PostField::RetweetCount => post.retweet_count = value.into_int(),
                PostField::LikeCount => post.like_count = value.into_int(),
                PostField::ReplyCount => post.reply_count = value.into_int(),
                PostField::QuoteCount => post.quote_count = value.into_int(),
                PostField::CountMisinfo => post.count_misinfo = value.into_int(),
                PostField::InteractionScore => post.interaction_score = value.into_float(),
                PostField::OverperformingScore => post.overperforming_score = value.into_float(),
                PostField::CivilityScore => post.civility_score = value.into_float(),
                PostField::TopicProbability => post.topic_probability = value.into_float(),
                PostField::ToxToxicity => post.toxicity.toxicity = value.into_float(),
                PostField::ToxSevereToxicity => post.toxicity.severe_toxicity = value.into_float(),
                PostField::ToxObscene => post.toxicity.obscene = value.into_float(),
                PostField::ToxThreat => post.toxicity.threat = value.into_float(),
                PostField::ToxInsult => post.toxicity.insult = value.into_float(),
                PostField::ToxIdentityAttack => post.toxicity.identity_attack = value.into_float(),
            }
        }

        Ok(post)
    }
}
