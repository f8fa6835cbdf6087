use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    AVATAR_COOLDOWN_DAYS, CARBON_KG_PER_UNIT, MAX_NAME_LEN, MAX_NODE_ID_LEN, MAX_NOTICE_LEN,
    RANK_ECO_LEGEND, RANK_GREEN_GUARDIAN, RANK_NATURE_SCOUT,
};
use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Role / Gender / Theme
// ---------------------------------------------------------------------------

/// Account bucket. Every identity lives in exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    User,
    Employee,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::User, Role::Employee];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
            Role::Employee => "EMPLOYEE",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "USER" => Ok(Role::User),
            "EMPLOYEE" => Ok(Role::Employee),
            _ => Err(ValidationError::UnknownRole(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    #[default]
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
        }
    }
}

impl FromStr for Gender {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MALE" => Ok(Gender::Male),
            "FEMALE" => Ok(Gender::Female),
            _ => Err(ValidationError::UnknownGender(s.to_string())),
        }
    }
}

/// Display preference persisted with the profile; rendering is up to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "DARK",
            Theme::Light => "LIGHT",
        }
    }
}

impl FromStr for Theme {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DARK" => Ok(Theme::Dark),
            "LIGHT" => Ok(Theme::Light),
            _ => Err(ValidationError::UnknownTheme(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// NodeId
// ---------------------------------------------------------------------------

/// Account identity ("node"), e.g. `ID-101` or `MGR-01`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyNodeId);
        }
        let len = trimmed.chars().count();
        if len > MAX_NODE_ID_LEN {
            return Err(ValidationError::NodeIdTooLong {
                len,
                max: MAX_NODE_ID_LEN,
            });
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(ValidationError::InvalidNodeIdChar(bad));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for NodeId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl FromStr for NodeId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Trim and check a display name.
pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong {
            len,
            max: MAX_NAME_LEN,
        });
    }
    Ok(name.to_string())
}

pub fn validate_notice(notice: &str) -> Result<(), ValidationError> {
    let len = notice.chars().count();
    if len > MAX_NOTICE_LEN {
        return Err(ValidationError::NoticeTooLong {
            len,
            max: MAX_NOTICE_LEN,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Rank
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RankTier {
    EcoRookie,
    NatureScout,
    GreenGuardian,
    EcoLegend,
}

impl RankTier {
    pub fn for_points(points: u64) -> Self {
        if points >= RANK_ECO_LEGEND {
            RankTier::EcoLegend
        } else if points >= RANK_GREEN_GUARDIAN {
            RankTier::GreenGuardian
        } else if points >= RANK_NATURE_SCOUT {
            RankTier::NatureScout
        } else {
            RankTier::EcoRookie
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            RankTier::EcoRookie => "Eco Rookie",
            RankTier::NatureScout => "Nature Scout",
            RankTier::GreenGuardian => "Green Guardian",
            RankTier::EcoLegend => "Eco Legend",
        }
    }
}

/// Carbon offset in kilograms for a bottle count.
pub fn carbon_offset_kg(bottles: u64) -> f64 {
    // u64 -> f64 loses precision only far beyond any realistic count
    bottles as f64 * CARBON_KG_PER_UNIT
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Public profile embedded in every account record.
///
/// Field names follow the camelCase layout clients already consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: NodeId,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub gender: Gender,
    pub points: u64,
    pub bottles: u64,
    pub joined_at: DateTime<Utc>,
    /// Base64 image payload (optionally a `data:` URL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_image_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_banned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    #[serde(default)]
    pub theme: Theme,
}

impl Profile {
    /// A fresh profile with zeroed counters, joined now.
    pub fn new(id: NodeId, name: String, role: Role, gender: Gender) -> Self {
        Self {
            id,
            name,
            role,
            gender,
            points: 0,
            bottles: 0,
            joined_at: Utc::now(),
            profile_image: None,
            last_image_update: None,
            is_banned: false,
            notice: None,
            theme: Theme::default(),
        }
    }

    pub fn rank(&self) -> RankTier {
        RankTier::for_points(self.points)
    }

    pub fn carbon_offset_kg(&self) -> f64 {
        carbon_offset_kg(self.bottles)
    }

    /// Banned accounts lose access, admins excepted.
    pub fn is_locked_out(&self) -> bool {
        self.is_banned && self.role != Role::Admin
    }

    /// Earliest instant at which the avatar may change again, if locked.
    pub fn next_avatar_update(&self) -> Option<DateTime<Utc>> {
        self.last_image_update
            .map(|last| last + Duration::days(AVATAR_COOLDOWN_DAYS))
    }

    pub fn can_update_avatar(&self, now: DateTime<Utc>) -> bool {
        match self.next_avatar_update() {
            Some(next) => now >= next,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile::new(
            NodeId::new("ID-101").unwrap(),
            "Ada".into(),
            Role::User,
            Gender::Female,
        )
    }

    #[test]
    fn test_node_id_validation() {
        assert!(NodeId::new("MGR-01").is_ok());
        assert_eq!(NodeId::new("  ID-7 ").unwrap().as_str(), "ID-7");
        assert_eq!(NodeId::new("   "), Err(ValidationError::EmptyNodeId));
        assert_eq!(
            NodeId::new("a/b"),
            Err(ValidationError::InvalidNodeIdChar('/'))
        );
        assert!(matches!(
            NodeId::new("x".repeat(65)),
            Err(ValidationError::NodeIdTooLong { len: 65, .. })
        ));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("EMPLOYEE".parse::<Role>().unwrap(), Role::Employee);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_rank_thresholds() {
        assert_eq!(RankTier::for_points(0), RankTier::EcoRookie);
        assert_eq!(RankTier::for_points(249), RankTier::EcoRookie);
        assert_eq!(RankTier::for_points(250), RankTier::NatureScout);
        assert_eq!(RankTier::for_points(500), RankTier::GreenGuardian);
        assert_eq!(RankTier::for_points(1000), RankTier::EcoLegend);
        assert_eq!(RankTier::EcoLegend.title(), "Eco Legend");
    }

    #[test]
    fn test_profile_wire_format() {
        let mut p = profile();
        p.is_banned = true;
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["id"], "ID-101");
        assert_eq!(json["role"], "USER");
        assert_eq!(json["gender"], "FEMALE");
        assert_eq!(json["isBanned"], true);
        assert!(json.get("joinedAt").is_some());
        assert!(json.get("notice").is_none());

        let back: Profile = serde_json::from_value(json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn test_profile_rejects_bad_id_on_deserialize() {
        let raw = serde_json::json!({
            "id": "bad id",
            "name": "x",
            "role": "USER",
            "points": 0,
            "bottles": 0,
            "joinedAt": "2024-01-01T00:00:00Z"
        });
        assert!(serde_json::from_value::<Profile>(raw).is_err());
    }

    #[test]
    fn test_locked_out_spares_admins() {
        let mut p = profile();
        p.is_banned = true;
        assert!(p.is_locked_out());
        p.role = Role::Admin;
        assert!(!p.is_locked_out());
    }

    #[test]
    fn test_avatar_cooldown() {
        let mut p = profile();
        let now = Utc::now();
        assert!(p.can_update_avatar(now));

        p.last_image_update = Some(now - Duration::days(59));
        assert!(!p.can_update_avatar(now));

        p.last_image_update = Some(now - Duration::days(60));
        assert!(p.can_update_avatar(now));
    }

    #[test]
    fn test_carbon_offset() {
        let mut p = profile();
        p.bottles = 100;
        assert!((p.carbon_offset_kg() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_name_validation() {
        assert_eq!(validate_name("  Ada ").unwrap(), "Ada");
        assert_eq!(validate_name(""), Err(ValidationError::EmptyName));
        assert!(validate_name(&"n".repeat(65)).is_err());
    }
}
