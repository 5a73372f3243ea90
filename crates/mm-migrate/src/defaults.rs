//! The stock MADMall plan: users, circles, stories, businesses, resources.
//!
//! Source rows come from the legacy relational schema, where lists and
//! objects are stored as JSON text and flags as `0`/`1`.

use mm_core::EntityType;
use mm_core::keys::{self, DEFAULT_TENANT, METADATA_SK, PROFILE_SK, STORY_FEED_PK};
use mm_core::timestamps;
use serde_json::{Value, json};

use crate::mapping::{FieldMapping, MigrationMapping, SourceSpec};
use crate::plan::{MigrationPlan, RollbackPlan};
use crate::source::Row;

pub const PLAN_NAME: &str = "MADMall to DynamoDB Migration";
pub const PLAN_VERSION: &str = "1.0.0";

/// Every built-in mapping, in migration order.
#[must_use]
pub fn madmall_plan() -> MigrationPlan {
    MigrationPlan::new(PLAN_NAME, PLAN_VERSION)
        .describe("Move the relational MADMall tables into the single-table layout")
        .entity(users())
        .entity(circles())
        .entity(stories())
        .entity(businesses())
        .entity(resources())
        .rollback(RollbackPlan {
            enabled: true,
            backup_location: None,
        })
}

/// The built-in mapping for one entity type, if there is one.
#[must_use]
pub fn mapping_for(entity_type: EntityType) -> Option<MigrationMapping> {
    match entity_type {
        EntityType::User => Some(users()),
        EntityType::Circle => Some(circles()),
        EntityType::Story => Some(stories()),
        EntityType::Business => Some(businesses()),
        EntityType::Resource => Some(resources()),
        _ => None,
    }
}

#[must_use]
pub fn users() -> MigrationMapping {
    let mapping = MigrationMapping::new(EntityType::User, SourceSpec::Table("users".into()))
        .key("PK", keyed(|r| Some(keys::user_profile(&text(r, "id")?).pk)))
        .key("SK", FieldMapping::constant(PROFILE_SK))
        .key("GSI1PK", keyed(|r| Some(format!("EMAIL#{}", text(r, "email")?))))
        .key("GSI1SK", keyed(|r| Some(format!("USER#{}", text(r, "id")?))))
        .key("GSI4PK", tenant("USERS"))
        .key("GSI4SK", created_sort_key())
        .field("userId", FieldMapping::column("id"))
        .field("email", FieldMapping::column("email"))
        .field("profile.firstName", FieldMapping::column("firstName"))
        .field("profile.lastName", FieldMapping::column("lastName"))
        .field("profile.bio", FieldMapping::column("bio"))
        .field("profile.culturalBackground", json_list("culturalBackground"))
        .field("profile.communicationStyle", FieldMapping::column("communicationStyle"))
        .field("profile.diagnosisStage", FieldMapping::column("diagnosisStage"))
        .field("profile.supportNeeds", json_list("supportNeeds"))
        .field("profile.joinDate", iso("createdAt"))
        .field("profile.lastActive", iso("lastActive"))
        .field("preferences.profileVisibility", or_default("profileVisibility", "circles_only"))
        .field("preferences.showRealName", flag_on("showRealName"))
        .field("preferences.allowDirectMessages", flag_on("allowDirectMessages"))
        .field("preferences.shareHealthJourney", flag_on("shareHealthJourney"))
        .field("preferences.emailNotifications", flag_on("emailNotifications"))
        .field("preferences.pushNotifications", flag_on("pushNotifications"))
        .field("preferences.weeklyDigest", flag_on("weeklyDigest"))
        .field("preferences.circleNotifications", flag_on("circleNotifications"))
        .field("preferences.contentPreferences", json_list("contentPreferences"))
        .field("preferences.circleInterests", json_list("circleInterests"))
        .field("settings.theme", or_default("theme", "auto"))
        .field("settings.language", or_default("language", "en"))
        .field("settings.timezone", or_default("timezone", "UTC"))
        .field("primaryGoals", json_list("primaryGoals"))
        .field("isVerified", flag_off("isVerified"))
        .field("isActive", flag_on("isActive"));
    stamped(mapping)
}

#[must_use]
pub fn circles() -> MigrationMapping {
    let mapping = MigrationMapping::new(EntityType::Circle, SourceSpec::Table("circles".into()))
        .key("PK", keyed(|r| Some(keys::circle_metadata(&text(r, "id")?).pk)))
        .key("SK", FieldMapping::constant(METADATA_SK))
        .key("GSI1PK", keyed(|r| Some(format!("CIRCLE_TYPE#{}", text(r, "type")?))))
        .key("GSI1SK", created_sort_key())
        .key("GSI3PK", keyed(|r| Some(format!("CIRCLE_STATUS#{}", circle_status(r)))))
        .key("GSI3SK", updated_sort_key())
        .key("GSI4PK", tenant("CIRCLES"))
        .key("GSI4SK", created_sort_key())
        .field("circleId", FieldMapping::column("id"))
        .field("name", FieldMapping::column("name"))
        .field("description", FieldMapping::column("description"))
        .field("type", FieldMapping::column("type"))
        .field("privacyLevel", or_default("privacyLevel", "public"))
        .field("settings.isPrivate", flag_off("isPrivate"))
        .field("settings.requireApproval", flag_off("requireApproval"))
        .field("settings.maxMembers", FieldMapping::column("maxMembers"))
        .field("settings.culturalFocus", json_list("culturalFocus"))
        .field("settings.allowGuestPosts", flag_on("allowGuestPosts"))
        .field("settings.moderationLevel", or_default("moderationLevel", "moderate"))
        .field("settings.contentGuidelines", FieldMapping::column("contentGuidelines"))
        .field("moderators", json_list("moderators"))
        .field("tags", json_list("tags"))
        .field("coverImage", FieldMapping::column("coverImage"))
        .field("stats.memberCount", or_default("memberCount", 0))
        .field("stats.activeMembers", or_default("activeMembers", 0))
        .field("stats.postsThisWeek", or_default("postsThisWeek", 0))
        .field("stats.postsThisMonth", or_default("postsThisMonth", 0))
        .field("stats.engagementRate", or_default("engagementRate", 0))
        .field("stats.averageResponseTime", or_default("averageResponseTime", 0))
        .field("createdBy", FieldMapping::column("createdBy"))
        .field("isActive", flag_on("isActive"))
        .field("status", FieldMapping::transform(|r| Ok(json!(circle_status(r)))));
    stamped(mapping)
}

#[must_use]
pub fn stories() -> MigrationMapping {
    let mapping = MigrationMapping::new(EntityType::Story, SourceSpec::Table("stories".into()))
        .key("PK", keyed(|r| Some(keys::story(&text(r, "id")?).pk)))
        .key("SK", FieldMapping::constant(METADATA_SK))
        .key("GSI1PK", keyed(|r| Some(format!("AUTHOR#{}", text(r, "authorId")?))))
        .key("GSI1SK", created_sort_key())
        .key("GSI2PK", FieldMapping::constant(STORY_FEED_PK))
        .key("GSI2SK", created_sort_key())
        .key("GSI3PK", status_key("STORY_STATUS", "PUBLISHED"))
        .key("GSI3SK", created_sort_key())
        .field("storyId", FieldMapping::column("id"))
        .field("title", FieldMapping::column("title"))
        .field("content", FieldMapping::column("content"))
        .field("excerpt", FieldMapping::column("excerpt"))
        .field("author.id", FieldMapping::column("authorId"))
        .field("author.displayName", FieldMapping::column("authorDisplayName"))
        .field("author.avatar", FieldMapping::column("authorAvatar"))
        .field("author.isVerified", flag_off("authorIsVerified"))
        .field("type", or_default("type", "personal_experience"))
        .field("status", or_default("status", "published"))
        .field("themes", json_list("themes"))
        .field("tags", json_list("tags"))
        .field("circleId", FieldMapping::column("circleId"))
        .field("engagement.likes", or_default("likes", 0))
        .field("engagement.comments", or_default("comments", 0))
        .field("engagement.shares", or_default("shares", 0))
        .field("engagement.saves", or_default("saves", 0))
        .field("engagement.views", or_default("views", 0))
        .field("engagement.helpfulVotes", or_default("helpfulVotes", 0))
        .field("metadata.readTime", or_default("readTime", 5))
        .field("metadata.wordCount", or_default("wordCount", 0))
        .field("metadata.culturalElements", json_list("culturalElements"))
        .field("metadata.therapeuticValue", json_list("therapeuticValue"))
        .field("metadata.triggerWarnings", json_optional("triggerWarnings"))
        .field("metadata.ageAppropriate", flag_on("ageAppropriate"))
        .field("moderationStatus", or_default("moderationStatus", "approved"))
        .field("moderationNotes", FieldMapping::column("moderationNotes"))
        .field("featuredAt", iso("featuredAt"))
        .field("publishedAt", iso("publishedAt"));
    stamped(mapping)
}

#[must_use]
pub fn businesses() -> MigrationMapping {
    let source = SourceSpec::Table("businesses".into());
    let mapping = MigrationMapping::new(EntityType::Business, source)
        .key("PK", keyed(|r| Some(keys::business(&text(r, "id")?).pk)))
        .key("SK", FieldMapping::constant(METADATA_SK))
        .key(
            "GSI1PK",
            keyed(|r| {
                let category = text(r, "category").unwrap_or_else(|| "general".into());
                Some(format!("BUSINESS_CATEGORY#{category}"))
            }),
        )
        .key("GSI1SK", keyed(|r| Some(format!("NAME#{}", text(r, "name")?))))
        .key("GSI3PK", status_key("BUSINESS_STATUS", "ACTIVE"))
        .key("GSI3SK", updated_sort_key())
        .field("businessId", FieldMapping::column("id"))
        .field("profile.name", FieldMapping::column("name"))
        .field("profile.description", FieldMapping::column("description"))
        .field("profile.mission", FieldMapping::column("mission"))
        .field("profile.foundedYear", FieldMapping::column("foundedYear"))
        .field("profile.founderStory", FieldMapping::column("founderStory"))
        .field("profile.website", FieldMapping::column("website"))
        .field("profile.socialMedia", json_object("socialMedia"))
        .field("profile.contact.email", FieldMapping::column("email"))
        .field("profile.contact.phone", FieldMapping::column("phone"))
        .field("profile.logo", FieldMapping::column("logo"))
        .field("profile.coverImage", FieldMapping::column("coverImage"))
        .field("profile.gallery", json_list("gallery"))
        .field("type", or_default("type", "wellness_center"))
        .field("status", or_default("status", "active"))
        .field("certifications", json_list("certifications"))
        .field("specialties", json_list("specialties"))
        .field("servicesOffered", json_list("servicesOffered"))
        .field("targetAudience", json_list("targetAudience"))
        .field("culturalCompetencies", json_list("culturalCompetencies"))
        .field("metrics.rating", or_default("rating", 0))
        .field("metrics.reviewCount", or_default("reviewCount", 0))
        .field("metrics.trustScore", or_default("trustScore", 0))
        .field("metrics.responseRate", or_default("responseRate", 0))
        .field("metrics.averageResponseTime", or_default("averageResponseTime", 0))
        .field("metrics.repeatCustomerRate", or_default("repeatCustomerRate", 0))
        .field("ownerId", FieldMapping::column("ownerId"))
        .field("verifiedAt", iso("verifiedAt"))
        .field("featuredUntil", iso("featuredUntil"));
    stamped(mapping)
}

#[must_use]
pub fn resources() -> MigrationMapping {
    let mapping = MigrationMapping::new(EntityType::Resource, SourceSpec::Table("resources".into()))
        .key("PK", keyed(|r| Some(keys::resource(&text(r, "id")?).pk)))
        .key("SK", FieldMapping::constant(METADATA_SK))
        .key("GSI1PK", keyed(|r| Some(format!("RESOURCE_TYPE#{}", text(r, "type")?))))
        .key("GSI1SK", created_sort_key())
        .key("GSI2PK", keyed(|r| Some(format!("RESOURCE_CATEGORY#{}", text(r, "category")?))))
        .key("GSI2SK", keyed(|r| Some(format!("TITLE#{}", text(r, "title")?))))
        .key("GSI3PK", status_key("RESOURCE_STATUS", "PUBLISHED"))
        .key("GSI3SK", updated_sort_key())
        .key("GSI4PK", tenant("RESOURCES"))
        .key("GSI4SK", created_sort_key())
        .field("resourceId", FieldMapping::column("id"))
        .field("title", FieldMapping::column("title"))
        .field("description", FieldMapping::column("description"))
        .field("content", FieldMapping::column("content"))
        .field("summary", FieldMapping::column("summary"))
        .field("type", or_default("type", "article"))
        .field("category", FieldMapping::column("category"))
        .field("subcategories", json_list("subcategories"))
        .field("status", or_default("status", "published"))
        .field("author.id", FieldMapping::column("authorId"))
        .field("author.name", FieldMapping::column("authorName"))
        .field("author.credentials", json_list("authorCredentials"))
        .field("author.bio", FieldMapping::column("authorBio"))
        .field("author.avatar", FieldMapping::column("authorAvatar"))
        .field("author.isVerified", flag_off("authorIsVerified"))
        .field("author.specialties", json_list("authorSpecialties"))
        .field("metadata.readTime", or_default("readTime", 5))
        .field("metadata.difficulty", or_default("difficulty", "beginner"))
        .field("metadata.prerequisites", json_list("prerequisites"))
        .field("metadata.learningObjectives", json_list("learningObjectives"))
        .field("metadata.culturalConsiderations", json_list("culturalConsiderations"))
        .field("metadata.therapeuticValue", json_list("therapeuticValue"))
        .field("metadata.evidenceBased", flag_off("evidenceBased"))
        .field("engagement.views", or_default("views", 0))
        .field("engagement.likes", or_default("likes", 0))
        .field("engagement.saves", or_default("saves", 0))
        .field("engagement.shares", or_default("shares", 0))
        .field("engagement.helpfulVotes", or_default("helpfulVotes", 0))
        .field("engagement.averageRating", or_default("averageRating", 0))
        .field("engagement.ratingCount", or_default("ratingCount", 0))
        .field("tags", json_list("tags"))
        .field("relatedResources", json_list("relatedResources"))
        .field("externalUrl", FieldMapping::column("externalUrl"))
        .field("downloadUrl", FieldMapping::column("downloadUrl"))
        .field("thumbnailUrl", FieldMapping::column("thumbnailUrl"))
        .field("isPublic", flag_on("isPublic"))
        .field("isPremium", flag_off("isPremium"))
        .field("publishedAt", iso("publishedAt"));
    stamped(mapping)
}

/// `entityType`, `version: 1`, and normalized timestamps.
fn stamped(mapping: MigrationMapping) -> MigrationMapping {
    let entity_type = mapping.entity_type.as_str();
    mapping
        .field("entityType", FieldMapping::constant(entity_type))
        .field("version", FieldMapping::constant(1))
        .transformation("createdAt", |_, row| Ok(json!(timestamp_or_now(row, "createdAt"))))
        .transformation("updatedAt", |_, row| Ok(json!(timestamp_or_now(row, "updatedAt"))))
}

/// Non-empty text of a column; numbers are rendered.
fn text(row: &Row, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Truthiness of a relational value.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
        Some(_) => true,
    }
}

/// Only an explicit false (`false`, `0`, `"false"`) turns the flag off.
fn explicitly_false(value: Option<&Value>) -> bool {
    matches!(value, Some(v) if !v.is_null() && !truthy(Some(v)))
}

fn timestamp_or_now(row: &Row, column: &str) -> String {
    row.get(column)
        .and_then(timestamps::normalize)
        .unwrap_or_else(timestamps::now_iso)
}

fn circle_status(row: &Row) -> &'static str {
    if explicitly_false(row.get("isActive")) {
        "INACTIVE"
    } else {
        "ACTIVE"
    }
}

/// A key built from the row; `None` leaves the attribute unset.
fn keyed<F>(f: F) -> FieldMapping
where
    F: Fn(&Row) -> Option<String> + Send + Sync + 'static,
{
    FieldMapping::transform(move |row| Ok(f(row).map_or(Value::Null, Value::String)))
}

fn tenant(collection: &'static str) -> FieldMapping {
    keyed(move |row| {
        let tenant = text(row, "tenantId");
        Some(keys::tenant_partition(tenant.as_deref().or(Some(DEFAULT_TENANT)), collection))
    })
}

fn created_sort_key() -> FieldMapping {
    keyed(|row| Some(format!("CREATED#{}", timestamp_or_now(row, "createdAt"))))
}

fn updated_sort_key() -> FieldMapping {
    keyed(|row| Some(format!("UPDATED#{}", timestamp_or_now(row, "updatedAt"))))
}

fn status_key(prefix: &'static str, default: &'static str) -> FieldMapping {
    keyed(move |row| {
        let status = text(row, "status").map_or_else(|| default.to_string(), |s| s.to_uppercase());
        Some(format!("{prefix}#{status}"))
    })
}

fn flag_on(column: &'static str) -> FieldMapping {
    FieldMapping::transform(move |row| Ok(json!(!explicitly_false(row.get(column)))))
}

fn flag_off(column: &'static str) -> FieldMapping {
    FieldMapping::transform(move |row| Ok(json!(truthy(row.get(column)))))
}

/// The column when truthy, `default` otherwise.
fn or_default(column: &'static str, default: impl Into<Value>) -> FieldMapping {
    let default = default.into();
    FieldMapping::transform(move |row| {
        Ok(match row.get(column) {
            Some(v) if truthy(Some(v)) => v.clone(),
            _ => default.clone(),
        })
    })
}

fn iso(column: &'static str) -> FieldMapping {
    FieldMapping::transform(move |row| {
        Ok(row
            .get(column)
            .and_then(timestamps::normalize)
            .map_or(Value::Null, Value::String))
    })
}

/// Parse JSON text, passing through values that are already structured.
fn parse_json(row: &Row, column: &str) -> Result<Option<Value>, String> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => serde_json::from_str(s)
            .map(Some)
            .map_err(|e| format!("invalid JSON in {column}: {e}")),
        Some(other) => Ok(Some(other.clone())),
    }
}

fn json_list(column: &'static str) -> FieldMapping {
    FieldMapping::transform(move |row| Ok(parse_json(row, column)?.unwrap_or_else(|| json!([]))))
}

fn json_object(column: &'static str) -> FieldMapping {
    FieldMapping::transform(move |row| Ok(parse_json(row, column)?.unwrap_or_else(|| json!({}))))
}

fn json_optional(column: &'static str) -> FieldMapping {
    FieldMapping::transform(move |row| Ok(parse_json(row, column)?.unwrap_or(Value::Null)))
}
