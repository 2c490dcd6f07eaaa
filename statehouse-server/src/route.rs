//! Route table for the Terraform HTTP backend protocol

use std::borrow::Cow;

use axum::http::Method;

/// URL shape a deployment serves
///
/// Each deployment serves exactly one layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RouteLayout {
    /// `/states/{project}`, `/states/{project}/lock`, `/states/{project}/lock/purge`
    States,
    /// `/{project}/v1`, `/{project}/v1/lock`, `/{project}/v1/lock/purge`
    Versioned,
}

/// A recognised request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    GetState { project: String },
    PostState { project: String },
    DeleteState { project: String },
    Lock { project: String },
    Unlock { project: String },
    InspectLock { project: String },
    PurgeLock { project: String },
}

/// Which resource below the project a path names
enum Target {
    State,
    Lock,
    Purge,
}

impl Route {
    /// Match a method and path against `layout`
    ///
    /// Returns `None` for anything the backend does not serve.
    pub fn parse(layout: RouteLayout, method: &Method, path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.strip_prefix('/')?.split('/').collect();

        let (project, target) = match (layout, segments.as_slice()) {
            (RouteLayout::States, ["states", project]) => (*project, Target::State),
            (RouteLayout::States, ["states", project, "lock"]) => (*project, Target::Lock),
            (RouteLayout::States, ["states", project, "lock", "purge"]) => {
                (*project, Target::Purge)
            }
            (RouteLayout::Versioned, [project, "v1"]) => (*project, Target::State),
            (RouteLayout::Versioned, [project, "v1", "lock"]) => (*project, Target::Lock),
            (RouteLayout::Versioned, [project, "v1", "lock", "purge"]) => {
                (*project, Target::Purge)
            }
            _ => return None,
        };

        let project = decode_segment(project);

        // LOCK/UNLOCK are Terraform's default lock_method/unlock_method
        let route = match (target, method.as_str()) {
            (Target::State, "GET") => Self::GetState { project },
            (Target::State, "POST") => Self::PostState { project },
            (Target::State, "DELETE") => Self::DeleteState { project },
            (Target::Lock, "PUT" | "LOCK") => Self::Lock { project },
            (Target::Lock, "DELETE" | "UNLOCK") => Self::Unlock { project },
            (Target::Lock, "GET") => Self::InspectLock { project },
            (Target::Purge, "PUT") => Self::PurgeLock { project },
            _ => return None,
        };

        Some(route)
    }

    pub fn project(&self) -> &str {
        match self {
            Self::GetState { project }
            | Self::PostState { project }
            | Self::DeleteState { project }
            | Self::Lock { project }
            | Self::Unlock { project }
            | Self::InspectLock { project }
            | Self::PurgeLock { project } => project,
        }
    }
}

/// Percent-decode a path segment, keeping it raw if it is not valid UTF-8
fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| segment.to_string())
}
