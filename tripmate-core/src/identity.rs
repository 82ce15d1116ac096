use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::CoreResult;

/// The signed-in member, used to stamp chat presence and typing notices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub member_id: i64,
    pub nickname: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current(&self) -> CoreResult<Identity>;
}

/// Identity fixed at startup (from configuration)
pub struct StaticIdentity {
    identity: Identity,
}

impl StaticIdentity {
    pub fn new(member_id: i64, nickname: impl Into<String>) -> Self {
        Self {
            identity: Identity {
                member_id,
                nickname: nickname.into(),
                email: None,
            },
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current(&self) -> CoreResult<Identity> {
        tracing::debug!("Resolved static identity for member {}", self.identity.member_id);
        Ok(self.identity.clone())
    }
}
