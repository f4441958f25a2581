use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use reqwest::{Response, StatusCode, multipart};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use nutrisnap_core::models::{FoodEntry, NewUser, User};

/// Identity of a cached read: endpoint path plus sorted query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    path: String,
    params: Vec<(String, String)>,
}

impl QueryKey {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.push((name.to_string(), value.into()));
        self.params.sort();
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn user(id: i64) -> Self {
        Self::new(format!("/api/users/{id}"))
    }

    fn food_entries_path(user_id: i64) -> String {
        format!("/api/users/{user_id}/food-entries")
    }
}

/// Responses fetched during this session, keyed by [`QueryKey`].
///
/// Mutations either prime a key with the server's answer ([`QueryCache::set`])
/// or drop every key for a path ([`QueryCache::invalidate`]) so the next read
/// goes back to the server.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<QueryKey, serde_json::Value>,
}

impl QueryCache {
    pub fn get<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let value = self.entries.get(key)?;
        serde_json::from_value(value.clone()).ok()
    }

    #[cfg(test)]
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn set<T: Serialize>(&mut self, key: QueryKey, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).context("failed to cache response")?;
        self.entries.insert(key, value);
        Ok(())
    }

    /// Drop every cached read of `path`, whatever its parameters. Returns how many were dropped.
    pub fn invalidate(&mut self, path: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.path != path);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fields of the entry form sent alongside the photo.
#[derive(Debug, Clone)]
pub struct FoodEntryForm {
    pub user_id: i64,
    pub food_name: String,
    pub quantity: i64,
    pub unit: String,
    pub calories: i64,
    pub protein: f64,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

fn image_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

/// Turn a non-2xx response into an error of the form `"<status>: <message>"`.
async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    let code = status.as_u16();
    if message.is_empty() {
        bail!("{code}: {}", status.canonical_reason().unwrap_or("request failed"));
    }
    bail!("{code}: {message}")
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    cache: QueryCache,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("nutrisnap/{}", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: QueryCache::default(),
        })
    }

    #[cfg(test)]
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Read through the cache. `Ok(None)` means the server answered 404.
    async fn query<T>(&mut self, key: QueryKey) -> Result<Option<T>>
    where
        T: DeserializeOwned + Serialize,
    {
        if let Some(hit) = self.cache.get(&key) {
            return Ok(Some(hit));
        }

        let resp = self
            .http
            .get(self.url(key.path()))
            .query(&key.params)
            .send()
            .await
            .with_context(|| format!("Failed to reach server at {}", self.base_url))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let value: T = check_status(resp)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", key.path()))?;
        self.cache.set(key, &value)?;
        Ok(Some(value))
    }

    pub async fn get_user(&mut self, id: i64) -> Result<Option<User>> {
        self.query(QueryKey::user(id)).await
    }

    /// Entries for `user_id`, limited to those logged since the start of `since` (UTC).
    pub async fn food_entries(
        &mut self,
        user_id: i64,
        since: Option<NaiveDate>,
    ) -> Result<Vec<FoodEntry>> {
        let mut key = QueryKey::new(QueryKey::food_entries_path(user_id));
        if let Some(date) = since {
            key = key.with_param("since", date.format("%Y-%m-%d").to_string());
        }
        let entries: Option<Vec<FoodEntry>> = self.query(key).await?;
        entries.context("Server does not know the food entries endpoint")
    }

    /// Create the profile, or replace it when `existing` is known.
    pub async fn save_profile(
        &mut self,
        existing: Option<&User>,
        profile: &NewUser,
    ) -> Result<User> {
        let request = match existing {
            Some(user) => self.http.put(self.url(&format!("/api/users/{}", user.id))),
            None => self.http.post(self.url("/api/users")),
        };
        let resp = request
            .json(profile)
            .send()
            .await
            .with_context(|| format!("Failed to reach server at {}", self.base_url))?;
        let user: User = check_status(resp)
            .await?
            .json()
            .await
            .context("Failed to parse saved profile")?;

        self.cache.set(QueryKey::user(user.id), &user)?;
        Ok(user)
    }

    pub async fn create_food_entry(
        &mut self,
        form: &FoodEntryForm,
        image: &Path,
    ) -> Result<FoodEntry> {
        let mime = image_mime(image)
            .with_context(|| format!("Not an image file: {}", image.display()))?;
        let bytes = tokio::fs::read(image)
            .await
            .with_context(|| format!("Failed to read image {}", image.display()))?;
        let file_name = image
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)
            .context("invalid image content type")?;
        let form_data = multipart::Form::new()
            .part("image", part)
            .text("userId", form.user_id.to_string())
            .text("foodName", form.food_name.clone())
            .text("quantity", form.quantity.to_string())
            .text("unit", form.unit.clone())
            .text("calories", form.calories.to_string())
            .text("protein", form.protein.to_string());

        let resp = self
            .http
            .post(self.url("/api/food-entries"))
            .multipart(form_data)
            .send()
            .await
            .with_context(|| format!("Failed to reach server at {}", self.base_url))?;
        let entry: FoodEntry = check_status(resp)
            .await?
            .json()
            .await
            .context("Failed to parse created food entry")?;

        let dropped = self
            .cache
            .invalidate(&QueryKey::food_entries_path(entry.user_id));
        tracing::debug!(dropped, cached = self.cache.len(), "invalidated food entry queries");
        Ok(entry)
    }
}
