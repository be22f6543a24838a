//! Asset-side event types produced by the approval workflow.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a content asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Draft,
    Review,
    Approved,
    Rejected,
    Deployed,
    Failed,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Review => "review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Deployed => "deployed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of content carried by an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    BlogPost,
    SocialMedia,
    EmailCampaign,
    VideoScript,
    Infographic,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlogPost => "blog_post",
            Self::SocialMedia => "social_media",
            Self::EmailCampaign => "email_campaign",
            Self::VideoScript => "video_script",
            Self::Infographic => "infographic",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An advertising platform identifier.
///
/// Known platforms get their own variant; anything else is carried through as
/// `Other` so that events naming a platform nobody has registered still decode
/// and can be reported as unsupported.
///
/// Identity is the wire name: `Other("meta")` equals, hashes and orders
/// exactly like `Meta`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Platform {
    GoogleAds,
    Meta,
    Other(String),
}

impl Platform {
    pub fn as_str(&self) -> &str {
        match self {
            Self::GoogleAds => "google_ads",
            Self::Meta => "meta",
            Self::Other(name) => name,
        }
    }
}

impl PartialEq for Platform {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Platform {}

impl Hash for Platform {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl PartialOrd for Platform {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Platform {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl From<String> for Platform {
    fn from(value: String) -> Self {
        match value.as_str() {
            "google_ads" => Self::GoogleAds,
            "meta" => Self::Meta,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for Platform {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Platform> for String {
    fn from(value: Platform) -> Self {
        match value {
            Platform::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Targeting demographics attached to an asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Demographics {
    pub age_min: u32,
    pub age_max: u32,
    pub genders: Vec<String>,
    pub locations: Vec<String>,
    pub interests: Vec<String>,
    pub behaviors: Vec<String>,
}

/// Creative specifications attached to an asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreativeSpecs {
    pub image_url: String,
    pub video_url: String,
    pub headline: String,
    pub description: String,
    pub call_to_action: String,
    pub landing_url: String,
    pub dimensions: BTreeMap<String, String>,
}

/// Deployment metadata of an asset.
///
/// Only `platforms` is interpreted by the orchestrator; the rest is forwarded
/// untouched to the platform implementations. Unknown keys are preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub platforms: Vec<Platform>,
    pub target_audience: String,
    pub budget: f64,
    pub campaign_type: String,
    pub keywords: Vec<String>,
    pub demographics: Demographics,
    pub creative_specs: CreativeSpecs,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// An asset changed status.
///
/// Inbound with `status = approved` this is the deployment trigger; outbound it
/// carries the aggregate deployment outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetStatusChangedEvent {
    pub asset_id: Uuid,
    pub project_id: Uuid,
    pub strategy_id: Uuid,
    pub status: AssetStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_status: Option<AssetStatus>,
    pub content_type: ContentType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl AssetStatusChangedEvent {
    pub fn is_approved(&self) -> bool {
        self.status == AssetStatus::Approved
    }

    /// Copy of this event moved to `status`, with the current status kept as
    /// `prev_status`.
    pub fn transition_to(&self, status: AssetStatus) -> Self {
        Self {
            status,
            prev_status: Some(self.status),
            timestamp: Utc::now(),
            ..self.clone()
        }
    }
}
