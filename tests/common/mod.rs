//! Shared fakes for the identity and rendering services.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use portray::profile::{IdentityService, PortraitRenderer, PortraitView, ProfileRecord};
use portray::{PortrayError, Result};

/// In-memory identity service that counts its calls.
#[derive(Default)]
pub struct FakeIdentity {
    records: Mutex<HashMap<Uuid, ProfileRecord>>,
    delay: Duration,
    failing: AtomicBool,
    timing_out: AtomicBool,
    pub by_id_calls: AtomicUsize,
    pub by_name_calls: AtomicUsize,
}

impl FakeIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every response for `delay`, so concurrent callers overlap.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Register a player and return their id.
    pub fn add(&self, username: &str) -> Uuid {
        let id = Uuid::new_v4();
        let record = ProfileRecord::new(id, username, format!("skin-of-{username}"));
        self.records.lock().unwrap().insert(id, record);
        id
    }

    /// Make every call fail with a transient error until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every call time out until reset.
    pub fn set_timing_out(&self, timing_out: bool) {
        self.timing_out.store(timing_out, Ordering::SeqCst);
    }

    pub fn id_calls(&self) -> usize {
        self.by_id_calls.load(Ordering::SeqCst)
    }

    pub fn name_calls(&self) -> usize {
        self.by_name_calls.load(Ordering::SeqCst)
    }

    async fn respond(&self, record: Option<ProfileRecord>) -> Result<Option<ProfileRecord>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.timing_out.load(Ordering::SeqCst) {
            return Err(PortrayError::Timeout(Duration::from_secs(5)));
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortrayError::Api {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(record)
    }
}

#[async_trait]
impl IdentityService for FakeIdentity {
    async fn by_id(&self, id: Uuid) -> Result<Option<ProfileRecord>> {
        self.by_id_calls.fetch_add(1, Ordering::SeqCst);
        let record = self.records.lock().unwrap().get(&id).cloned();
        self.respond(record).await
    }

    async fn by_name(&self, name: &str) -> Result<Option<ProfileRecord>> {
        self.by_name_calls.fetch_add(1, Ordering::SeqCst);
        let record = self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|r| r.username.eq_ignore_ascii_case(name))
            .cloned();
        self.respond(record).await
    }
}

/// Renderer producing `"{skin}/{view}"` as image bytes.
#[derive(Default)]
pub struct FakeRenderer {
    delay: Duration,
    blank: Mutex<Vec<PortraitView>>,
    pub calls: AtomicUsize,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Render nothing for `view`.
    pub fn blank(&self, view: PortraitView) {
        self.blank.lock().unwrap().push(view);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn image(skin: &str, view: PortraitView) -> Bytes {
        Bytes::from(format!("{skin}/{view}"))
    }
}

#[async_trait]
impl PortraitRenderer for FakeRenderer {
    async fn render(&self, skin: &str, view: PortraitView) -> Result<Option<Bytes>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.blank.lock().unwrap().contains(&view) {
            return Ok(None);
        }
        Ok(Some(Self::image(skin, view)))
    }
}
