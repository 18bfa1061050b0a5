use serde::{Deserialize, Serialize};

pub const DEFAULT_RESPONSE: &str = "Congratulations {member}, you graduated to {roles}!";

/// One tier of the role ladder.
///
/// `next_ids` keeps insertion order: the first child is the one followed by
/// depth resolution, and it wins ties during tail resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredRole {
    pub role_id: u64,
    #[serde(default)]
    pub next_ids: Vec<u64>,
    #[serde(default)]
    pub exclusive: bool,
}

impl RegisteredRole {
    pub fn new(role_id: u64, exclusive: bool) -> Self {
        Self {
            role_id,
            next_ids: Vec::new(),
            exclusive,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next_ids.is_empty()
    }
}

/// Per-guild graduation settings, shared with the role blocker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub head_id: Option<u64>,
    #[serde(default)]
    pub registry: Vec<RegisteredRole>,
    #[serde(default = "default_responses")]
    pub responses: Vec<String>,
}

fn default_responses() -> Vec<String> {
    vec![DEFAULT_RESPONSE.to_string()]
}

impl Default for GuildConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            head_id: None,
            registry: Vec::new(),
            responses: default_responses(),
        }
    }
}

/// Deepest exclusive node reachable from a starting node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tail {
    pub role_id: Option<u64>,
    pub depth: usize,
}

/// Roles to swap when promoting one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionPlan {
    pub revoke: u64,
    pub grant: Vec<u64>,
}

/// Exclusive roles a member must lose so only the deepest one remains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusivityPlan {
    pub keep: u64,
    pub revoke: Vec<u64>,
}

/// A member as seen by the promotion batch: id plus current role ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRoles {
    pub user_id: u64,
    pub role_ids: Vec<u64>,
}

/// Outcome of a promotion batch, returned to the Discord layer for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromotionReport {
    pub promoted: Vec<u64>,
    pub skipped: Vec<u64>,
    pub denied: Vec<u64>,
    pub failed: Vec<u64>,
}
