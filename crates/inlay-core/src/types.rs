// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Instruction model: the request payload and the typed insertions the engine
// consumes.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{InlayError, Result};

/// Default font size for text insertions, in points.
pub const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Default font identifier (Helvetica).
pub const DEFAULT_FONT_NAME: &str = "helv";

/// A full processing request: one source document, one destination, and the
/// insertions to apply in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstructionSet {
    /// Local path or URL of the source PDF.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub pdf_path: String,
    /// Local destination path for the produced PDF.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub output_path: String,
    /// Insertions, applied in list order.
    #[serde(default)]
    pub insertions: Vec<InsertionRequest>,
}

/// `null` reads as an empty string, so it fails validation like a missing
/// field would.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl InstructionSet {
    /// Reject the request when either path is missing or blank.
    pub fn validate(&self) -> Result<()> {
        if self.pdf_path.trim().is_empty() {
            return Err(InlayError::MissingRequiredField("pdf_path"));
        }
        if self.output_path.trim().is_empty() {
            return Err(InlayError::MissingRequiredField("output_path"));
        }
        Ok(())
    }
}

/// Point in request coordinates: origin top-left, y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl From<[f32; 2]> for Position {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Position> for [f32; 2] {
    fn from(p: Position) -> Self {
        [p.x, p.y]
    }
}

/// Normalised RGB colour, each component in 0..=1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RgbColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl RgbColor {
    pub const BLACK: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    /// Build from a component list, clamping each component to 0..=1.
    pub fn from_components(components: &[f32]) -> Result<Self> {
        match components {
            [r, g, b] => Ok(Self {
                r: r.clamp(0.0, 1.0),
                g: g.clamp(0.0, 1.0),
                b: b.clamp(0.0, 1.0),
            }),
            other => Err(InlayError::InvalidInstruction(format!(
                "color needs 3 components, got {}",
                other.len()
            ))),
        }
    }
}

impl Default for RgbColor {
    fn default() -> Self {
        Self::BLACK
    }
}

/// Axis for an image flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlipAxis {
    /// Mirror left/right.
    Horizontal,
    /// Mirror top/bottom.
    Vertical,
    /// Both axes (a 180 degree turn).
    Both,
}

impl FlipAxis {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "horizontal" => Ok(Self::Horizontal),
            "vertical" => Ok(Self::Vertical),
            "both" => Ok(Self::Both),
            other => Err(InlayError::InvalidInstruction(format!(
                "unknown flip axis {other:?}"
            ))),
        }
    }
}

/// Which pages an insertion targets. Indices are 1-based as presented by
/// the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageSelector {
    #[default]
    All,
    First,
    Last,
    Single(i64),
    List(Vec<i64>),
}

/// Wire form of a page selector. Anything that is not a keyword, an integer,
/// or a list lands in `Other` and targets no pages.
#[derive(Deserialize)]
#[serde(untagged)]
enum PageSelectorWire {
    Keyword(String),
    Index(i64),
    List(Vec<serde_json::Value>),
    Other(IgnoredAny),
}

impl<'de> Deserialize<'de> for PageSelector {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match PageSelectorWire::deserialize(deserializer)? {
            PageSelectorWire::Keyword(keyword) => match keyword.as_str() {
                "all" => Self::All,
                "first" => Self::First,
                "last" => Self::Last,
                _ => Self::List(Vec::new()),
            },
            PageSelectorWire::Index(n) => Self::Single(n),
            // Non-integer entries are dropped rather than rejected.
            PageSelectorWire::List(values) => {
                Self::List(values.iter().filter_map(|v| v.as_i64()).collect())
            }
            PageSelectorWire::Other(_) => Self::List(Vec::new()),
        })
    }
}

impl Serialize for PageSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::All => serializer.serialize_str("all"),
            Self::First => serializer.serialize_str("first"),
            Self::Last => serializer.serialize_str("last"),
            Self::Single(n) => serializer.serialize_i64(*n),
            Self::List(list) => list.serialize(serializer),
        }
    }
}

/// One insertion exactly as received. Validated into an [`Insertion`] when
/// the engine reaches it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertionRequest {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub position: Position,
    #[serde(default)]
    pub pages: PageSelector,

    // -- Text --
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Vec<f32>>,

    // -- Image --
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_orientation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flip_type: Option<String>,
}

impl InsertionRequest {
    /// Minimal request of the given kind at `position`, targeting all pages.
    pub fn new(kind: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            kind: kind.into(),
            position: Position { x, y },
            pages: PageSelector::All,
            content: None,
            font_size: None,
            font_name: None,
            color: None,
            source: None,
            width: None,
            height: None,
            rotate: None,
            flip: None,
            correct_orientation: None,
            flip_type: None,
        }
    }

    /// Validate the request and apply defaults.
    pub fn to_insertion(&self) -> Result<Insertion> {
        let body = match self.kind.as_str() {
            "text" => InsertionBody::Text(self.text_fields()?),
            "image" => InsertionBody::Image(self.image_fields()?),
            other => return Err(InlayError::InvalidInsertionType(other.to_string())),
        };
        Ok(Insertion {
            position: self.position,
            pages: self.pages.clone(),
            body,
        })
    }

    fn text_fields(&self) -> Result<TextInsertion> {
        let font_size = self.font_size.unwrap_or(DEFAULT_FONT_SIZE);
        if !(font_size.is_finite() && font_size > 0.0) {
            return Err(InlayError::InvalidInstruction(format!(
                "font_size must be positive, got {font_size}"
            )));
        }
        let color = match &self.color {
            Some(components) => RgbColor::from_components(components)?,
            None => RgbColor::BLACK,
        };
        Ok(TextInsertion {
            content: self.content.clone().unwrap_or_default(),
            font_size,
            font_name: self
                .font_name
                .clone()
                .unwrap_or_else(|| DEFAULT_FONT_NAME.to_string()),
            color,
        })
    }

    fn image_fields(&self) -> Result<ImageInsertion> {
        let source = self
            .source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                InlayError::InvalidInstruction("source is required for image insertions".into())
            })?;
        let flip = self.flip.as_deref().map(FlipAxis::parse).transpose()?;
        let flip_type = match self.flip_type.as_deref() {
            Some(axis) => FlipAxis::parse(axis)?,
            None => FlipAxis::Horizontal,
        };
        Ok(ImageInsertion {
            source: source.to_string(),
            // Zero behaves like "not given".
            width: self.width.filter(|w| *w > 0),
            height: self.height.filter(|h| *h > 0),
            rotate: self.rotate.unwrap_or(0.0),
            flip,
            correct_orientation: self.correct_orientation.unwrap_or(true),
            flip_type,
        })
    }
}

/// A validated insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct Insertion {
    pub position: Position,
    pub pages: PageSelector,
    pub body: InsertionBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertionBody {
    Text(TextInsertion),
    Image(ImageInsertion),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextInsertion {
    /// May be empty, in which case nothing is drawn.
    pub content: String,
    pub font_size: f32,
    pub font_name: String,
    pub color: RgbColor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageInsertion {
    /// Local path or URL.
    pub source: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Clockwise degrees.
    pub rotate: f32,
    /// Explicit flip requested by the caller.
    pub flip: Option<FlipAxis>,
    /// When false, a compensating flip along `flip_type` is applied.
    pub correct_orientation: bool,
    pub flip_type: FlipAxis,
}
