use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use super::photo::Photo;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    #[default]
    Green,
    Red,
    Blue,
    Yellow,
    Black,
}

impl Color {
    pub const ALL: [Color; 5] = [Color::Green, Color::Red, Color::Blue, Color::Yellow, Color::Black];

    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Green => "green",
            Color::Red => "red",
            Color::Blue => "blue",
            Color::Yellow => "yellow",
            Color::Black => "black",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown color '{0}', expected one of green, red, blue, yellow, black")]
pub struct UnknownColor(pub String);

impl FromStr for Color {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Color::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or(UnknownColor(wanted))
    }
}

impl TryFrom<String> for Color {
    type Error = UnknownColor;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Marker {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub note: Option<String>,
    pub breed: Option<String>,
    pub object_id: Option<i64>,
    pub object_name: Option<String>,
    #[sqlx(try_from = "String")]
    pub color: Color,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub photos: Vec<Photo>,
}

/// Fields of a marker about to be inserted under a reserved id
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerDraft {
    pub lat: f64,
    pub lon: f64,
    pub note: Option<String>,
    pub breed: Option<String>,
    pub object_id: Option<i64>,
    pub color: Color,
}

/// Partial marker edit. `None` keeps the stored value; the nested options
/// distinguish "clear" from "keep".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerPatch {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub note: Option<Option<String>>,
    pub breed: Option<Option<String>>,
    pub object_id: Option<Option<i64>>,
    pub color: Option<Color>,
}

impl MarkerPatch {
    pub fn apply_to(&self, marker: &mut Marker) {
        if let Some(lat) = self.lat {
            marker.lat = lat;
        }
        if let Some(lon) = self.lon {
            marker.lon = lon;
        }
        if let Some(note) = &self.note {
            marker.note = note.clone();
        }
        if let Some(breed) = &self.breed {
            marker.breed = breed.clone();
        }
        if let Some(object_id) = self.object_id {
            marker.object_id = object_id;
        }
        if let Some(color) = self.color {
            marker.color = color;
        }
    }
}
