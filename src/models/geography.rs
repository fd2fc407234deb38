//! Geographic hierarchy domain models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// 地理层级：Zone ⊃ Province ⊃ Department ⊃ Cluster ⊃ School
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoLevel {
    Zone,
    Province,
    Department,
    Cluster,
    School,
}

impl GeoLevel {
    /// Top-down order
    pub const ALL: [GeoLevel; 5] = [
        GeoLevel::Zone,
        GeoLevel::Province,
        GeoLevel::Department,
        GeoLevel::Cluster,
        GeoLevel::School,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GeoLevel::Zone => "zone",
            GeoLevel::Province => "province",
            GeoLevel::Department => "department",
            GeoLevel::Cluster => "cluster",
            GeoLevel::School => "school",
        }
    }

    /// 上一级；Zone 没有父级
    pub fn parent(&self) -> Option<GeoLevel> {
        match self {
            GeoLevel::Zone => None,
            GeoLevel::Province => Some(GeoLevel::Zone),
            GeoLevel::Department => Some(GeoLevel::Province),
            GeoLevel::Cluster => Some(GeoLevel::Department),
            GeoLevel::School => Some(GeoLevel::Cluster),
        }
    }

    /// 下一级；School 是叶子
    pub fn child(&self) -> Option<GeoLevel> {
        match self {
            GeoLevel::Zone => Some(GeoLevel::Province),
            GeoLevel::Province => Some(GeoLevel::Department),
            GeoLevel::Department => Some(GeoLevel::Cluster),
            GeoLevel::Cluster => Some(GeoLevel::School),
            GeoLevel::School => None,
        }
    }

    /// Zone = 0, School = 4
    pub fn depth(&self) -> usize {
        *self as usize
    }

    /// Conventional column name for the denormalised id of this level.
    pub fn id_column(&self) -> &'static str {
        match self {
            GeoLevel::Zone => "zone_id",
            GeoLevel::Province => "province_id",
            GeoLevel::Department => "department_id",
            GeoLevel::Cluster => "cluster_id",
            GeoLevel::School => "school_id",
        }
    }
}

impl fmt::Display for GeoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeoLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zone" | "zones" => Ok(GeoLevel::Zone),
            "province" | "provinces" => Ok(GeoLevel::Province),
            "department" | "departments" => Ok(GeoLevel::Department),
            "cluster" | "clusters" => Ok(GeoLevel::Cluster),
            "school" | "schools" => Ok(GeoLevel::School),
            _ => Err(AppError::BadRequest(format!("Unknown geographic level: {}", s))),
        }
    }
}

/// Geographic entity (reference data)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeographicEntity {
    pub id: String,
    pub name: String,
    pub localized_name: Option<String>,
    pub level: GeoLevel,
    pub parent_id: Option<String>,
}

impl GeographicEntity {
    pub fn new(level: GeoLevel, id: &str, name: &str, parent_id: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            localized_name: None,
            level,
            parent_id: parent_id.map(|p| p.to_string()),
        }
    }

    pub fn with_localized_name(mut self, localized: &str) -> Self {
        self.localized_name = Some(localized.to_string());
        self
    }
}

/// 行数据库记录（level 以文本存储）
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GeographicEntityRow {
    pub id: String,
    pub name: String,
    pub localized_name: Option<String>,
    pub level: String,
    pub parent_id: Option<String>,
}

impl TryFrom<GeographicEntityRow> for GeographicEntity {
    type Error = AppError;

    fn try_from(row: GeographicEntityRow) -> Result<Self, Self::Error> {
        let level = row.level.parse::<GeoLevel>().map_err(|_| {
            AppError::InvalidGeography(format!(
                "entity {} has unknown level '{}'",
                row.id, row.level
            ))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            localized_name: row.localized_name,
            level,
            parent_id: row.parent_id,
        })
    }
}

/// Denormalised ancestor ids stamped onto every located record at write time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationStamp {
    pub zone_id: Option<String>,
    pub province_id: Option<String>,
    pub department_id: Option<String>,
    pub cluster_id: Option<String>,
    pub school_id: Option<String>,
}

impl LocationStamp {
    pub fn get(&self, level: GeoLevel) -> Option<&str> {
        match level {
            GeoLevel::Zone => self.zone_id.as_deref(),
            GeoLevel::Province => self.province_id.as_deref(),
            GeoLevel::Department => self.department_id.as_deref(),
            GeoLevel::Cluster => self.cluster_id.as_deref(),
            GeoLevel::School => self.school_id.as_deref(),
        }
    }

    pub fn set(&mut self, level: GeoLevel, id: Option<String>) {
        match level {
            GeoLevel::Zone => self.zone_id = id,
            GeoLevel::Province => self.province_id = id,
            GeoLevel::Department => self.department_id = id,
            GeoLevel::Cluster => self.cluster_id = id,
            GeoLevel::School => self.school_id = id,
        }
    }

    /// Deepest populated level
    pub fn deepest(&self) -> Option<(GeoLevel, &str)> {
        GeoLevel::ALL
            .iter()
            .rev()
            .find_map(|level| self.get(*level).map(|id| (*level, id)))
    }
}
