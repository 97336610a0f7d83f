use std::collections::HashMap;

use axum::extract::Multipart;

use crate::database::models::marker::UnknownColor;
use crate::database::models::{Color, MarkerDraft, MarkerPatch};
use crate::error::ApiError;
use crate::services::PhotoUpload;

const DELETE_FIELDS: [&str; 3] = ["delete_photo", "delete_photos", "delete_photo[]"];

/// A decoded `multipart/form-data` marker submission
#[derive(Debug, Default)]
pub struct MarkerForm {
    fields: HashMap<String, String>,
    pub photos: Vec<PhotoUpload>,
    pub delete_photo_ids: Vec<i64>,
}

impl MarkerForm {
    /// Drain the multipart stream. Parts with a filename are photos (empty
    /// ones skipped); everything else is a text field, last value wins.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = MarkerForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            if let Some(filename) = field.file_name().map(str::to_string) {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await?;
                if data.is_empty() {
                    continue;
                }
                form.photos.push(PhotoUpload {
                    filename,
                    content_type,
                    data,
                });
                continue;
            }

            let value = field.text().await?;
            if DELETE_FIELDS.contains(&name.as_str()) {
                form.delete_photo_ids.extend(photo_ids(&value)?);
            } else {
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    #[cfg(test)]
    pub fn from_fields(fields: &[(&str, &str)]) -> Self {
        MarkerForm {
            fields: fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            ..Default::default()
        }
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Fields for a new marker; coordinates are required
    pub fn draft(&self) -> Result<MarkerDraft, ApiError> {
        let lat = coordinate("lat", self.get("lat"), 90.0)?.ok_or_else(|| ApiError::invalid_field("lat", "is required"))?;
        let lon = coordinate("lon", self.get("lon"), 180.0)?.ok_or_else(|| ApiError::invalid_field("lon", "is required"))?;

        Ok(MarkerDraft {
            lat,
            lon,
            note: text(self.get("note")).flatten(),
            breed: text(self.get("breed")).flatten(),
            object_id: object_ref(self.get("object_id"))?.flatten(),
            color: color(self.get("color"))?.unwrap_or_default(),
        })
    }

    /// Fields present in the form; absent ones keep their stored values
    pub fn patch(&self) -> Result<MarkerPatch, ApiError> {
        Ok(MarkerPatch {
            lat: coordinate("lat", self.get("lat"), 90.0)?,
            lon: coordinate("lon", self.get("lon"), 180.0)?,
            note: text(self.get("note")),
            breed: text(self.get("breed")),
            object_id: object_ref(self.get("object_id"))?,
            color: color(self.get("color"))?,
        })
    }
}

/// Blank or absent is `None`; anything else must be a finite number within `±limit`
fn coordinate(name: &str, raw: Option<&str>, limit: f64) -> Result<Option<f64>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let value: f64 = raw
        .parse()
        .map_err(|_| ApiError::invalid_field(name, format!("'{raw}' is not a number")))?;
    if !value.is_finite() || value.abs() > limit {
        return Err(ApiError::invalid_field(name, format!("must be between -{limit} and {limit}")));
    }
    Ok(Some(value))
}

/// Absent: keep. Present: trimmed, and blank clears.
fn text(raw: Option<&str>) -> Option<Option<String>> {
    raw.map(|s| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    })
}

/// Absent: keep. `""`/`"null"`: detach. Otherwise a positive integer.
fn object_ref(raw: Option<&str>) -> Result<Option<Option<i64>>, ApiError> {
    let Some(raw) = raw.map(str::trim) else {
        return Ok(None);
    };
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
        return Ok(Some(None));
    }
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(Some(Some(id))),
        _ => Err(ApiError::invalid_field("object_id", format!("'{raw}' is not a valid object id"))),
    }
}

fn color(raw: Option<&str>) -> Result<Option<Color>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e: UnknownColor| ApiError::invalid_field("color", e.to_string())),
    }
}

fn photo_ids(raw: &str) -> Result<Vec<i64>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .ok()
                .filter(|id| *id > 0)
                .ok_or_else(|| ApiError::invalid_field("delete_photo", format!("'{s}' is not a valid photo id")))
        })
        .collect()
}
