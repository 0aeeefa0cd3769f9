//! Webhook event type catalog.
//!
//! The set of event types is closed: endpoint subscriptions are validated
//! against it at create/update time, and dispatch only accepts catalog
//! members. `test.ping` is the synthetic event used by the endpoint test
//! operation.

/// Event types that can be delivered to webhook endpoints.
///
/// The wire form is the dotted identifier from [`Self::as_str`]; the enum
/// itself never crosses a serialization boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookEventType {
    ProjectCreated,
    ProjectUpdated,
    ProjectArchived,
    ProjectDeleted,
    MemberInvited,
    MemberJoined,
    MemberRoleChanged,
    MemberRemoved,
    OrgUpdated,
    TestPing,
}

impl WebhookEventType {
    /// The wire identifier for this event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectCreated => "project.created",
            Self::ProjectUpdated => "project.updated",
            Self::ProjectArchived => "project.archived",
            Self::ProjectDeleted => "project.deleted",
            Self::MemberInvited => "member.invited",
            Self::MemberJoined => "member.joined",
            Self::MemberRoleChanged => "member.role_changed",
            Self::MemberRemoved => "member.removed",
            Self::OrgUpdated => "org.updated",
            Self::TestPing => "test.ping",
        }
    }

    /// Parse a wire identifier. Returns None for unknown types.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "project.created" => Some(Self::ProjectCreated),
            "project.updated" => Some(Self::ProjectUpdated),
            "project.archived" => Some(Self::ProjectArchived),
            "project.deleted" => Some(Self::ProjectDeleted),
            "member.invited" => Some(Self::MemberInvited),
            "member.joined" => Some(Self::MemberJoined),
            "member.role_changed" => Some(Self::MemberRoleChanged),
            "member.removed" => Some(Self::MemberRemoved),
            "org.updated" => Some(Self::OrgUpdated),
            "test.ping" => Some(Self::TestPing),
            _ => None,
        }
    }

    /// Every catalog member.
    pub fn all() -> Vec<Self> {
        vec![
            Self::ProjectCreated,
            Self::ProjectUpdated,
            Self::ProjectArchived,
            Self::ProjectDeleted,
            Self::MemberInvited,
            Self::MemberJoined,
            Self::MemberRoleChanged,
            Self::MemberRemoved,
            Self::OrgUpdated,
            Self::TestPing,
        ]
    }

    /// Category grouping for the event-type listing endpoint.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ProjectCreated
            | Self::ProjectUpdated
            | Self::ProjectArchived
            | Self::ProjectDeleted => "project",
            Self::MemberInvited
            | Self::MemberJoined
            | Self::MemberRoleChanged
            | Self::MemberRemoved => "member",
            Self::OrgUpdated => "org",
            Self::TestPing => "system",
        }
    }

    /// Human-readable description for the event-type listing endpoint.
    pub fn description(&self) -> &'static str {
        match self {
            Self::ProjectCreated => "A project was created",
            Self::ProjectUpdated => "Project settings were changed",
            Self::ProjectArchived => "A project was archived",
            Self::ProjectDeleted => "A project was permanently deleted",
            Self::MemberInvited => "A member was invited to the organization",
            Self::MemberJoined => "An invited member accepted and joined",
            Self::MemberRoleChanged => "A member's role was changed",
            Self::MemberRemoved => "A member was removed from the organization",
            Self::OrgUpdated => "Organization settings were changed",
            Self::TestPing => "Synthetic event sent by the endpoint test operation",
        }
    }
}

impl std::fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_types_roundtrip_through_parse() {
        for et in WebhookEventType::all() {
            assert_eq!(WebhookEventType::parse(et.as_str()), Some(et));
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert_eq!(WebhookEventType::parse("user.created"), None);
        assert_eq!(WebhookEventType::parse(""), None);
        assert_eq!(WebhookEventType::parse("PROJECT.CREATED"), None);
    }

    #[test]
    fn test_display_matches_wire_identifier() {
        assert_eq!(
            WebhookEventType::MemberRoleChanged.to_string(),
            "member.role_changed"
        );
    }

    #[test]
    fn test_every_type_has_category_and_description() {
        for et in WebhookEventType::all() {
            assert!(!et.category().is_empty());
            assert!(!et.description().is_empty());
        }
    }
}
