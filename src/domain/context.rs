//! Operation Context
//!
//! Identity and metadata of the acting operator, carried into every core
//! operation for authorization checks and audit logging. Authentication
//! itself happens upstream; the core only consumes its result.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationContext {
    /// Already-authenticated operator
    pub operator_id: Uuid,

    /// Role asserted by the authentication layer
    pub role: Role,

    /// Client IP, recorded on audit entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,

    /// Client user agent, recorded on audit entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl OperationContext {
    pub fn new(operator_id: Uuid, role: Role) -> Self {
        Self {
            operator_id,
            role,
            client_ip: None,
            user_agent: None,
        }
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}
