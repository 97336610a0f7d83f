use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{
    Appointment, Marker, MarkerDraft, MarkerPatch, NewPhoto, Object, ObjectInput, Photo, User, UserInput,
};
use crate::database::query_builder::Statement;
use crate::database::store::{MarkerUpdate, PhotoLocation, Store, Visibility};

const USER_COLUMNS: &str = "id, telegram_username, full_name, phone, role, additional_info, created_at";
const OBJECT_COLUMNS: &str = "id, name, additional_info, created_at";
const PHOTO_COLUMNS: &str = "id, marker_id, filename, blob_path, url, created_at";
const MARKER_SELECT: &str = "SELECT m.id, m.lat, m.lon, m.note, m.breed, m.object_id, o.name AS object_name, \
     m.color, m.created_at \
     FROM markers m LEFT JOIN objects o ON o.id = m.object_id";
const MARKER_ORDER: &str = "ORDER BY m.created_at DESC, m.id DESC";

#[derive(FromRow)]
struct IdRow {
    id: i64,
}

#[derive(FromRow)]
struct PhotoLocationRow {
    #[sqlx(flatten)]
    photo: Photo,
    object_id: Option<i64>,
}

/// PostgreSQL implementation of [`Store`]
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            timeout: statement_timeout,
        }
    }

    async fn with_photos(&self, mut markers: Vec<Marker>) -> Result<Vec<Marker>, DatabaseError> {
        if markers.is_empty() {
            return Ok(markers);
        }

        let ids: Vec<i64> = markers.iter().map(|m| m.id).collect();
        let photos: Vec<Photo> = Statement::new(format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE marker_id = ANY($1) ORDER BY id"
        ))
        .bind(ids)
        .fetch_all(&self.pool, self.timeout)
        .await?;

        let mut by_marker: HashMap<i64, Vec<Photo>> = HashMap::new();
        for photo in photos {
            by_marker.entry(photo.marker_id).or_default().push(photo);
        }
        for marker in &mut markers {
            marker.photos = by_marker.remove(&marker.id).unwrap_or_default();
        }
        Ok(markers)
    }

    async fn reload_marker(&self, id: i64) -> Result<Marker, DatabaseError> {
        self.get_marker(id)
            .await?
            .ok_or(DatabaseError::Sqlx(sqlx::Error::RowNotFound))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool, self.timeout).await
    }

    async fn list_users(&self) -> Result<Vec<User>, DatabaseError> {
        Statement::new(format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .fetch_all(&self.pool, self.timeout)
            .await
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, DatabaseError> {
        Statement::new(format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool, self.timeout)
            .await
    }

    async fn find_user_by_username(&self, telegram_username: &str) -> Result<Option<User>, DatabaseError> {
        Statement::new(format!("SELECT {USER_COLUMNS} FROM users WHERE telegram_username = $1"))
            .bind(telegram_username)
            .fetch_optional(&self.pool, self.timeout)
            .await
    }

    async fn create_user(&self, input: &UserInput) -> Result<User, DatabaseError> {
        Statement::new(format!(
            "INSERT INTO users (telegram_username, full_name, phone, role, additional_info) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        ))
        .bind(&input.telegram_username)
        .bind(input.full_name.clone())
        .bind(input.phone.clone())
        .bind(input.role.as_str())
        .bind(input.additional_info.clone())
        .fetch_one(&self.pool, self.timeout)
        .await
    }

    async fn update_user(&self, id: i64, input: &UserInput) -> Result<Option<User>, DatabaseError> {
        Statement::new(format!(
            "UPDATE users SET telegram_username = $2, full_name = $3, phone = $4, role = $5, \
             additional_info = $6 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.telegram_username)
        .bind(input.full_name.clone())
        .bind(input.phone.clone())
        .bind(input.role.as_str())
        .bind(input.additional_info.clone())
        .fetch_optional(&self.pool, self.timeout)
        .await
    }

    async fn delete_user(&self, id: i64) -> Result<bool, DatabaseError> {
        let outcome = Statement::new("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool, self.timeout)
            .await?;
        Ok(outcome.rows_affected > 0)
    }

    async fn list_objects(&self, visibility: &Visibility) -> Result<Vec<Object>, DatabaseError> {
        let stmt = match visibility {
            Visibility::All => Statement::new(format!("SELECT {OBJECT_COLUMNS} FROM objects ORDER BY name")),
            Visibility::Objects(_) if visibility.is_nothing() => return Ok(Vec::new()),
            Visibility::Objects(ids) => Statement::new(format!(
                "SELECT {OBJECT_COLUMNS} FROM objects WHERE id = ANY($1) ORDER BY name"
            ))
            .bind(ids.clone()),
        };
        stmt.fetch_all(&self.pool, self.timeout).await
    }

    async fn get_object(&self, id: i64) -> Result<Option<Object>, DatabaseError> {
        Statement::new(format!("SELECT {OBJECT_COLUMNS} FROM objects WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool, self.timeout)
            .await
    }

    async fn create_object(&self, input: &ObjectInput, owner_id: Option<i64>) -> Result<Object, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let object: Object = Statement::new(format!(
            "INSERT INTO objects (name, additional_info) VALUES ($1, $2) RETURNING {OBJECT_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(input.additional_info.clone())
        .fetch_one(&mut *tx, self.timeout)
        .await?;

        if let Some(owner_id) = owner_id {
            Statement::new(
                "INSERT INTO appointments (user_id, object_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(owner_id)
            .bind(object.id)
            .execute(&mut *tx, self.timeout)
            .await?;
        }

        tx.commit().await?;
        Ok(object)
    }

    async fn update_object(&self, id: i64, input: &ObjectInput) -> Result<Option<Object>, DatabaseError> {
        Statement::new(format!(
            "UPDATE objects SET name = $2, additional_info = $3 WHERE id = $1 RETURNING {OBJECT_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.name)
        .bind(input.additional_info.clone())
        .fetch_optional(&self.pool, self.timeout)
        .await
    }

    async fn delete_object(&self, id: i64) -> Result<bool, DatabaseError> {
        let outcome = Statement::new("DELETE FROM objects WHERE id = $1")
            .bind(id)
            .execute(&self.pool, self.timeout)
            .await?;
        Ok(outcome.rows_affected > 0)
    }

    async fn appointed_object_ids(&self, user_id: i64) -> Result<Vec<i64>, DatabaseError> {
        let rows: Vec<IdRow> = Statement::new(
            "SELECT object_id AS id FROM appointments WHERE user_id = $1 ORDER BY object_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool, self.timeout)
        .await?;
        Ok(rows.into_iter().map(|r| r.id).collect())
    }

    async fn list_appointments(&self) -> Result<Vec<Appointment>, DatabaseError> {
        Statement::new("SELECT user_id, object_id FROM appointments ORDER BY user_id, object_id")
            .fetch_all(&self.pool, self.timeout)
            .await
    }

    async fn toggle_appointment(&self, appointment: Appointment) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let removed = Statement::new("DELETE FROM appointments WHERE user_id = $1 AND object_id = $2")
            .bind(appointment.user_id)
            .bind(appointment.object_id)
            .execute(&mut *tx, self.timeout)
            .await?;

        let assigned = if removed.rows_affected > 0 {
            false
        } else {
            Statement::new(
                "INSERT INTO appointments (user_id, object_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(appointment.user_id)
            .bind(appointment.object_id)
            .execute(&mut *tx, self.timeout)
            .await?;
            true
        };

        tx.commit().await?;
        Ok(assigned)
    }

    async fn reserve_marker_id(&self) -> Result<i64, DatabaseError> {
        let row: IdRow = Statement::new("SELECT nextval(pg_get_serial_sequence('markers', 'id')) AS id")
            .fetch_one(&self.pool, self.timeout)
            .await?;
        Ok(row.id)
    }

    async fn insert_marker(&self, id: i64, draft: &MarkerDraft, photos: &[NewPhoto]) -> Result<Marker, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        Statement::new(
            "INSERT INTO markers (id, lat, lon, note, breed, object_id, color) \
             VALUES ($1, $2, $3, $4, $5, $6::bigint, $7)",
        )
        .bind(id)
        .bind(draft.lat)
        .bind(draft.lon)
        .bind(draft.note.clone())
        .bind(draft.breed.clone())
        .bind(draft.object_id)
        .bind(draft.color.as_str())
        .execute(&mut *tx, self.timeout)
        .await?;

        for photo in photos {
            Statement::new("INSERT INTO photos (marker_id, filename, blob_path, url) VALUES ($1, $2, $3, $4)")
                .bind(id)
                .bind(&photo.filename)
                .bind(&photo.blob_path)
                .bind(&photo.url)
                .execute(&mut *tx, self.timeout)
                .await?;
        }

        tx.commit().await?;
        self.reload_marker(id).await
    }

    async fn list_markers(&self, visibility: &Visibility) -> Result<Vec<Marker>, DatabaseError> {
        let stmt = match visibility {
            Visibility::All => Statement::new(format!("{MARKER_SELECT} {MARKER_ORDER}")),
            Visibility::Objects(_) if visibility.is_nothing() => return Ok(Vec::new()),
            Visibility::Objects(ids) => {
                Statement::new(format!("{MARKER_SELECT} WHERE m.object_id = ANY($1) {MARKER_ORDER}"))
                    .bind(ids.clone())
            }
        };
        let markers = stmt.fetch_all(&self.pool, self.timeout).await?;
        self.with_photos(markers).await
    }

    async fn get_marker(&self, id: i64) -> Result<Option<Marker>, DatabaseError> {
        let marker: Option<Marker> = Statement::new(format!("{MARKER_SELECT} WHERE m.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool, self.timeout)
            .await?;

        match marker {
            Some(marker) => Ok(self.with_photos(vec![marker]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn update_marker(
        &self,
        id: i64,
        patch: &MarkerPatch,
        new_photos: &[NewPhoto],
        remove_photo_ids: &[i64],
    ) -> Result<Option<MarkerUpdate>, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<Marker> = Statement::new(format!("{MARKER_SELECT} WHERE m.id = $1 FOR UPDATE OF m"))
            .bind(id)
            .fetch_optional(&mut *tx, self.timeout)
            .await?;
        let Some(mut marker) = current else {
            return Ok(None);
        };
        patch.apply_to(&mut marker);

        Statement::new(
            "UPDATE markers SET lat = $2, lon = $3, note = $4, breed = $5, object_id = $6::bigint, color = $7 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(marker.lat)
        .bind(marker.lon)
        .bind(marker.note.clone())
        .bind(marker.breed.clone())
        .bind(marker.object_id)
        .bind(marker.color.as_str())
        .execute(&mut *tx, self.timeout)
        .await?;

        let removed_photos: Vec<Photo> = if remove_photo_ids.is_empty() {
            Vec::new()
        } else {
            Statement::new(format!(
                "DELETE FROM photos WHERE marker_id = $1 AND id = ANY($2) RETURNING {PHOTO_COLUMNS}"
            ))
            .bind(id)
            .bind(remove_photo_ids)
            .fetch_all(&mut *tx, self.timeout)
            .await?
        };

        for photo in new_photos {
            Statement::new("INSERT INTO photos (marker_id, filename, blob_path, url) VALUES ($1, $2, $3, $4)")
                .bind(id)
                .bind(&photo.filename)
                .bind(&photo.blob_path)
                .bind(&photo.url)
                .execute(&mut *tx, self.timeout)
                .await?;
        }

        tx.commit().await?;

        Ok(Some(MarkerUpdate {
            marker: self.reload_marker(id).await?,
            removed_photos,
        }))
    }

    async fn delete_marker(&self, id: i64) -> Result<Option<Vec<Photo>>, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let photos: Vec<Photo> = Statement::new(format!(
            "DELETE FROM photos WHERE marker_id = $1 RETURNING {PHOTO_COLUMNS}"
        ))
        .bind(id)
        .fetch_all(&mut *tx, self.timeout)
        .await?;

        let outcome = Statement::new("DELETE FROM markers WHERE id = $1")
            .bind(id)
            .execute(&mut *tx, self.timeout)
            .await?;

        if outcome.rows_affected == 0 {
            // Dropping the transaction rolls it back
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(photos))
    }

    async fn find_photo(&self, blob_path: &str) -> Result<Option<PhotoLocation>, DatabaseError> {
        let row: Option<PhotoLocationRow> = Statement::new(
            "SELECT p.id, p.marker_id, p.filename, p.blob_path, p.url, p.created_at, m.object_id \
             FROM photos p JOIN markers m ON m.id = p.marker_id WHERE p.blob_path = $1",
        )
        .bind(blob_path)
        .fetch_optional(&self.pool, self.timeout)
        .await?;

        Ok(row.map(|r| PhotoLocation {
            photo: r.photo,
            object_id: r.object_id,
        }))
    }
}
