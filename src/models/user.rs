// src/models/user.rs

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Role carried in the token's `role` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::AuthError(format!("Unknown role '{}'", other))),
        }
    }
}

/// Who is asking. Decides what a review may reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requester {
    Student(i64),
    Teacher(i64),
    Admin(i64),
}

impl Requester {
    pub fn new(role: Role, user_id: i64) -> Self {
        match role {
            Role::Student => Requester::Student(user_id),
            Role::Teacher => Requester::Teacher(user_id),
            Role::Admin => Requester::Admin(user_id),
        }
    }

    /// Teachers and admins see everything, at any time.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Requester::Teacher(_) | Requester::Admin(_))
    }
}
