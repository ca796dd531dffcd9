//! Forbidden and system object classification.
//!
//! Both predicates walk an ordered rule list: exact denylist first, then the
//! pattern rules in the order they are declared below. The tables are
//! versioned with [`RULESET_VERSION`]; changing an entry changes which objects
//! can ever surface, so bump the version and the tests together.
//!
//! A forbidden object is never surfaced, traversed or field-selected. A
//! system object is excluded from the catalog unless the caller opts in.

use lazy_static::lazy_static;
use regex::Regex;

/// Version of the rule tables below.
pub const RULESET_VERSION: &str = "3";

/// Suffix carried by custom object definitions.
pub const CUSTOM_SUFFIX: &str = "__c";

// ============================================================================
// Forbidden rules
// ============================================================================

/// Process, workflow, permission and audit infrastructure.
const FORBIDDEN_EXACT: &[&str] = &[
    "ProcessDefinition",
    "ProcessInstance",
    "ProcessInstanceHistory",
    "ProcessInstanceNode",
    "ProcessInstanceStep",
    "ProcessInstanceWorkitem",
    "ProcessNode",
    "FlowInterview",
    "FlowOrchestrationInstance",
    "FlowOrchestrationStageInstance",
    "FlowOrchestrationStepInstance",
    "FlowOrchestrationWorkItem",
    "FlowRecordRelation",
    "PermissionSet",
    "PermissionSetAssignment",
    "PermissionSetGroup",
    "PermissionSetLicense",
    "ObjectPermissions",
    "FieldPermissions",
    "SetupEntityAccess",
    "SetupAuditTrail",
    "LoginHistory",
    "WorkflowRule",
    "AssignmentRule",
    "EscalationRule",
    "AutoResponseRule",
    "ApprovalProcess",
];

lazy_static! {
    /// Ordered `(rule id, pattern)` pairs evaluated after the denylist.
    static ref FORBIDDEN_PATTERNS: Vec<(&'static str, Regex)> = vec![
        ("work-item-suffix", Regex::new(r"(?i)WorkItem$").unwrap()),
        ("workflow-prefix", Regex::new(r"^Workflow").unwrap()),
        ("rule-suffix", Regex::new(r"Rule$").unwrap()),
        ("process-suffix", Regex::new(r"Process$").unwrap()),
        ("alert-suffix", Regex::new(r"Alert$").unwrap()),
        ("assignment-suffix", Regex::new(r"Assignment$").unwrap()),
    ];
}

/// Id of the first forbidden rule matching `name`, if any.
///
/// Exact denylist hits report `"denylist"`.
pub fn forbidden_rule(name: &str) -> Option<&'static str> {
    if FORBIDDEN_EXACT.contains(&name) {
        return Some("denylist");
    }
    FORBIDDEN_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(name))
        .map(|(id, _)| *id)
}

/// True if the object must never be surfaced or traversed.
pub fn is_forbidden(name: &str) -> bool {
    forbidden_rule(name).is_some()
}

// ============================================================================
// System rules
// ============================================================================

const SYSTEM_EXACT: &[&str] = &[
    "User",
    "Group",
    "GroupMember",
    "Profile",
    "UserRole",
    "Organization",
    "RecordType",
    "BusinessHours",
    "Holiday",
    "EmailTemplate",
    "Folder",
    "Document",
    "StaticResource",
    "ApexClass",
    "ApexTrigger",
    "AsyncApexJob",
    "CronTrigger",
    "ContentVersion",
    "ContentDocument",
    "ContentDocumentLink",
    "Attachment",
    "Network",
    "Site",
    "Domain",
];

lazy_static! {
    static ref SYSTEM_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"Share$").unwrap(),
        Regex::new(r"History$").unwrap(),
        Regex::new(r"Feed$").unwrap(),
        Regex::new(r"ChangeEvent$").unwrap(),
        Regex::new(r"^Platform").unwrap(),
        Regex::new(r"^Setup").unwrap(),
        Regex::new(r"^Security").unwrap(),
        Regex::new(r"^Audit").unwrap(),
        Regex::new(r"__mdt$").unwrap(),
        Regex::new(r"__e$").unwrap(),
    ];

    /// Custom objects with administrative names are still system objects.
    static ref ADMIN_CUSTOM_SUFFIX: Regex =
        Regex::new(r"(?i)(System|Platform|Setup|Config|Settings|Admin)__c$").unwrap();
}

/// True if `name` is a custom object definition.
pub fn is_custom_name(name: &str) -> bool {
    name.ends_with(CUSTOM_SUFFIX)
}

/// True for platform objects that rarely answer a business question.
pub fn is_system_object(name: &str) -> bool {
    if is_custom_name(name) {
        return ADMIN_CUSTOM_SUFFIX.is_match(name);
    }
    if SYSTEM_EXACT.contains(&name) {
        return true;
    }
    SYSTEM_PATTERNS.iter().any(|re| re.is_match(name))
}
