use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

pub type Id = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Meme {
    pub id: Id,
    pub title: String,
    pub release_date: NaiveDate,
    pub runtime: i32,
    pub description: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload. Timestamps are never taken from the client.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewMeme {
    pub title: String,
    pub release_date: NaiveDate,
    pub runtime: i32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
}

/// Partial update payload; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateMeme {
    pub title: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub runtime: Option<i32>,
    pub description: Option<String>,
    /// Absent keeps the image, `null` clears it.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub image: Option<Option<String>>,
}

/// Maps a present field (including `null`) to `Some`, so `Option<Option<T>>`
/// can tell an explicit `null` from a missing key.
fn present<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(de).map(Some)
}

impl NewMeme {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must not be empty".into());
        }
        if self.runtime < 0 {
            return Err("runtime must not be negative".into());
        }
        Ok(())
    }
}

impl UpdateMeme {
    pub fn validate(&self) -> Result<(), String> {
        if matches!(self.title.as_deref(), Some(t) if t.trim().is_empty()) {
            return Err("title must not be empty".into());
        }
        if matches!(self.runtime, Some(r) if r < 0) {
            return Err("runtime must not be negative".into());
        }
        Ok(())
    }
}

impl Meme {
    /// Fetch-modify-write step: overlay the fields present in `upd` and
    /// bump `updated_at`.
    pub fn apply(&mut self, upd: UpdateMeme, now: DateTime<Utc>) {
        if let Some(title) = upd.title { self.title = title; }
        if let Some(date) = upd.release_date { self.release_date = date; }
        if let Some(runtime) = upd.runtime { self.runtime = runtime; }
        if let Some(description) = upd.description { self.description = description; }
        if let Some(image) = upd.image { self.image = image; }
        self.touch(now);
    }

    /// `updated_at` must strictly increase, even when two writes land in the
    /// same microsecond (Postgres timestamp resolution).
    pub fn touch(&mut self, now: DateTime<Utc>) {
        let floor = self.updated_at + Duration::microseconds(1);
        self.updated_at = if now > floor { now } else { floor };
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meme() -> Meme {
        let at = Utc::now();
        Meme {
            id: 7,
            title: "Distracted boyfriend".into(),
            release_date: NaiveDate::from_ymd_opt(2017, 8, 22).unwrap(),
            runtime: 3,
            description: "stock photo".into(),
            image: Some("boyfriend.jpg".into()),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn apply_only_overwrites_present_fields() {
        let before = meme();
        let mut after = before.clone();
        after.apply(UpdateMeme { title: Some("Renamed".into()), ..Default::default() }, Utc::now());

        assert_eq!(after.title, "Renamed");
        assert_eq!(after.release_date, before.release_date);
        assert_eq!(after.runtime, before.runtime);
        assert_eq!(after.description, before.description);
        assert_eq!(after.image, before.image);
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at > before.updated_at);
    }

    #[test]
    fn patch_image_absent_keeps_null_clears() {
        let keep: UpdateMeme = serde_json::from_str(r#"{"title": "x"}"#).unwrap();
        let clear: UpdateMeme = serde_json::from_str(r#"{"image": null}"#).unwrap();
        let set: UpdateMeme = serde_json::from_str(r#"{"image": "new.png"}"#).unwrap();
        assert_eq!(keep.image, None);
        assert_eq!(clear.image, Some(None));

        let mut m = meme();
        m.apply(keep, Utc::now());
        assert_eq!(m.image.as_deref(), Some("boyfriend.jpg"));
        m.apply(set, Utc::now());
        assert_eq!(m.image.as_deref(), Some("new.png"));
        m.apply(clear, Utc::now());
        assert_eq!(m.image, None);
    }

    #[test]
    fn touch_is_strictly_monotonic_for_stale_clock() {
        let mut m = meme();
        let prev = m.updated_at;
        m.touch(prev - Duration::seconds(5));
        assert!(m.updated_at > prev);
    }

    #[test]
    fn user_password_is_not_serialized() {
        let u = User {
            id: 1,
            email: "a@b.c".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            password: "$2b$04$secret".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let v = serde_json::to_value(&u).unwrap();
        assert!(v.get("password").is_none());
        assert_eq!(v["email"], "a@b.c");
    }

    #[test]
    fn validation_rejects_blank_title() {
        let bad = NewMeme {
            title: "  ".into(),
            release_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            runtime: 1,
            description: String::new(),
            image: None,
        };
        assert!(bad.validate().is_err());
        assert!(UpdateMeme { title: Some("".into()), ..Default::default() }.validate().is_err());
        assert!(UpdateMeme::default().validate().is_ok());
    }
}
