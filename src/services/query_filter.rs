//! 查询过滤构建
//! 把访问策略翻译成批量查询的谓词，在数据访问层强制范围

use std::fmt;

use crate::{
    error::AppError,
    models::{
        actor::{Actor, UserRow},
        geography::GeoLevel,
        observation::Observation,
        role::Role,
    },
};

/// Static descriptor of where a resource keeps its location and owner columns.
///
/// Column names are `'static` so only descriptors compiled into the crate can
/// reach generated SQL.
#[derive(Debug, Clone, Copy)]
pub struct ResourceLocationColumns {
    pub resource: &'static str,
    pub zone: Option<&'static str>,
    pub province: Option<&'static str>,
    pub department: Option<&'static str>,
    pub cluster: Option<&'static str>,
    pub school: Option<&'static str>,
    /// Ownership columns for actors scoped by ownership
    pub owner: &'static [&'static str],
}

impl ResourceLocationColumns {
    pub fn column_for(&self, level: GeoLevel) -> Option<&'static str> {
        match level {
            GeoLevel::Zone => self.zone,
            GeoLevel::Province => self.province,
            GeoLevel::Department => self.department,
            GeoLevel::Cluster => self.cluster,
            GeoLevel::School => self.school,
        }
    }
}

pub const OBSERVATION_COLUMNS: ResourceLocationColumns = ResourceLocationColumns {
    resource: "observations",
    zone: Some("zone_id"),
    province: Some("province_id"),
    department: Some("department_id"),
    cluster: Some("cluster_id"),
    school: Some("school_id"),
    owner: &["observer_id", "teacher_id"],
};

pub const USER_COLUMNS: ResourceLocationColumns = ResourceLocationColumns {
    resource: "users",
    zone: Some("zone_id"),
    province: Some("province_id"),
    department: Some("department_id"),
    cluster: Some("cluster_id"),
    school: Some("school_id"),
    owner: &["id"],
};

/// Composable row predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// No restriction
    All,
    /// Matches no row
    Nothing,
    Eq { column: &'static str, value: String },
    /// Case-insensitive substring match on any of the columns
    Search { columns: Vec<&'static str>, term: String },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

/// Rendered SQL where-clause with positional parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFragment {
    pub clause: String,
    pub params: Vec<String>,
}

/// Row access used for in-memory evaluation
pub trait ScopedRecord {
    fn column(&self, name: &str) -> Option<&str>;
}

impl ScopedRecord for Observation {
    fn column(&self, name: &str) -> Option<&str> {
        match name {
            "observer_id" => Some(self.observer_id.as_str()),
            "teacher_id" => self.teacher_id.as_deref(),
            "status" => Some(self.status.as_str()),
            "title" => Some(self.title.as_str()),
            "notes" => self.notes.as_deref(),
            "zone_id" => self.zone_id.as_deref(),
            "province_id" => self.province_id.as_deref(),
            "department_id" => self.department_id.as_deref(),
            "cluster_id" => self.cluster_id.as_deref(),
            "school_id" => self.school_id.as_deref(),
            _ => None,
        }
    }
}

impl ScopedRecord for UserRow {
    fn column(&self, name: &str) -> Option<&str> {
        match name {
            "id" => Some(self.id.as_str()),
            "display_name" => Some(self.display_name.as_str()),
            "role" => Some(self.role.as_str()),
            "status" => Some(self.status.as_str()),
            "zone_id" => self.zone_id.as_deref(),
            "province_id" => self.province_id.as_deref(),
            "department_id" => self.department_id.as_deref(),
            "cluster_id" => self.cluster_id.as_deref(),
            "school_id" => self.school_id.as_deref(),
            _ => None,
        }
    }
}

impl Predicate {
    pub fn eq(column: &'static str, value: impl Into<String>) -> Self {
        Predicate::Eq {
            column,
            value: value.into(),
        }
    }

    pub fn search(columns: &[&'static str], term: impl Into<String>) -> Self {
        Predicate::Search {
            columns: columns.to_vec(),
            term: term.into(),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Predicate::All)
    }

    /// AND 组合；从不替换任何一方
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::All, p) | (p, Predicate::All) => p,
            (Predicate::Nothing, _) | (_, Predicate::Nothing) => Predicate::Nothing,
            (Predicate::And(mut a), Predicate::And(b)) => {
                a.extend(b);
                Predicate::And(a)
            }
            (Predicate::And(mut a), p) => {
                a.push(p);
                Predicate::And(a)
            }
            (p, Predicate::And(mut b)) => {
                b.insert(0, p);
                Predicate::And(b)
            }
            (a, b) => Predicate::And(vec![a, b]),
        }
    }

    pub fn or(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::All, _) | (_, Predicate::All) => Predicate::All,
            (Predicate::Nothing, p) | (p, Predicate::Nothing) => p,
            (Predicate::Or(mut a), Predicate::Or(b)) => {
                a.extend(b);
                Predicate::Or(a)
            }
            (Predicate::Or(mut a), p) => {
                a.push(p);
                Predicate::Or(a)
            }
            (a, b) => Predicate::Or(vec![a, b]),
        }
    }

    /// AND of all predicates; an empty list is unrestricted
    pub fn all_of(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        predicates.into_iter().fold(Predicate::All, Predicate::and)
    }

    /// 渲染为 SQL，占位符从 `$start` 开始编号
    pub fn to_sql(&self, start: usize) -> SqlFragment {
        let mut params = Vec::new();
        let clause = self.render(start, &mut params);
        SqlFragment { clause, params }
    }

    fn render(&self, start: usize, params: &mut Vec<String>) -> String {
        match self {
            Predicate::All => "TRUE".to_string(),
            Predicate::Nothing => "FALSE".to_string(),
            Predicate::Eq { column, value } => {
                params.push(value.clone());
                format!("{} = ${}", column, start + params.len() - 1)
            }
            Predicate::Search { columns, term } => {
                if columns.is_empty() {
                    return "FALSE".to_string();
                }
                params.push(format!("%{}%", escape_like(term)));
                let index = start + params.len() - 1;
                let parts: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{} ILIKE ${}", c, index))
                    .collect();
                format!("({})", parts.join(" OR "))
            }
            Predicate::And(items) => join(items, " AND ", "TRUE", start, params),
            Predicate::Or(items) => join(items, " OR ", "FALSE", start, params),
        }
    }

    /// 内存中求值（用于非 SQL 数据源和测试）
    pub fn matches<R: ScopedRecord + ?Sized>(&self, record: &R) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Nothing => false,
            Predicate::Eq { column, value } => record.column(column) == Some(value.as_str()),
            Predicate::Search { columns, term } => {
                let needle = term.to_lowercase();
                columns.iter().any(|c| {
                    record
                        .column(c)
                        .is_some_and(|v| v.to_lowercase().contains(&needle))
                })
            }
            Predicate::And(items) => items.iter().all(|p| p.matches(record)),
            Predicate::Or(items) => items.iter().any(|p| p.matches(record)),
        }
    }
}

fn join(items: &[Predicate], sep: &str, empty: &str, start: usize, params: &mut Vec<String>) -> String {
    if items.is_empty() {
        return empty.to_string();
    }
    let parts: Vec<String> = items
        .iter()
        .map(|item| item.render(start, params))
        .collect();
    format!("({})", parts.join(sep))
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::All => f.write_str("TRUE"),
            Predicate::Nothing => f.write_str("FALSE"),
            Predicate::Eq { column, value } => write!(f, "{} = '{}'", column, value),
            Predicate::Search { columns, term } => write!(f, "{} ~ '{}'", columns.join("|"), term),
            Predicate::And(items) | Predicate::Or(items) => {
                let sep = if matches!(self, Predicate::And(_)) { " AND " } else { " OR " };
                let parts: Vec<String> = items.iter().map(|p| p.to_string()).collect();
                write!(f, "({})", parts.join(sep))
            }
        }
    }
}

/// Builds the scope predicate for bulk list/aggregate queries.
///
/// Unlike `validate_containment` this is not transitive: it matches only the
/// actor's own level and relies on rows carrying their full, denormalised
/// ancestor id chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryFilterBuilder;

impl QueryFilterBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build_predicate(
        &self,
        actor: &Actor,
        columns: &ResourceLocationColumns,
    ) -> Result<Predicate, AppError> {
        let predicate = match actor.role {
            Role::Administrator => Predicate::All,
            Role::Teacher => {
                if columns.owner.is_empty() {
                    return Err(AppError::UnscopedResource {
                        resource: columns.resource.to_string(),
                        level: GeoLevel::School,
                    });
                }
                columns
                    .owner
                    .iter()
                    .map(|column| Predicate::eq(column, actor.id.clone()))
                    .fold(Predicate::Nothing, Predicate::or)
            }
            _ => match actor.scope_anchor() {
                Some((level, id)) => {
                    let column = columns.column_for(level).ok_or_else(|| AppError::UnscopedResource {
                        resource: columns.resource.to_string(),
                        level,
                    })?;
                    Predicate::eq(column, id)
                }
                None => {
                    tracing::warn!(
                        actor_id = %actor.id,
                        role = %actor.role,
                        resource = columns.resource,
                        "Actor has no scope anchor, list restricted to nothing"
                    );
                    Predicate::Nothing
                }
            },
        };

        tracing::debug!(
            actor_id = %actor.id,
            resource = columns.resource,
            predicate = %predicate,
            "Scope predicate built"
        );

        Ok(predicate)
    }

    /// 范围谓词与调用方过滤条件做 AND
    pub fn scoped(
        &self,
        actor: &Actor,
        columns: &ResourceLocationColumns,
        caller_filters: Predicate,
    ) -> Result<Predicate, AppError> {
        Ok(self.build_predicate(actor, columns)?.and(caller_filters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Row(HashMap<&'static str, String>);

    impl ScopedRecord for Row {
        fn column(&self, name: &str) -> Option<&str> {
            self.0.get(name).map(|v| v.as_str())
        }
    }

    fn row(pairs: &[(&'static str, &str)]) -> Row {
        Row(pairs.iter().map(|(k, v)| (*k, v.to_string())).collect())
    }

    fn department_actor() -> Actor {
        Actor::new("d1", Role::Department)
            .with_location(GeoLevel::Zone, "zone-001")
            .with_location(GeoLevel::Province, "province-001")
            .with_location(GeoLevel::Department, "department-001")
    }

    #[test]
    fn test_administrator_is_unrestricted() {
        let admin = Actor::new("root", Role::Administrator);
        let predicate = QueryFilterBuilder::new()
            .build_predicate(&admin, &OBSERVATION_COLUMNS)
            .unwrap();
        assert!(predicate.is_unrestricted());
        assert_eq!(predicate.to_sql(1).clause, "TRUE");
    }

    #[test]
    fn test_department_matches_own_level_only() {
        let predicate = QueryFilterBuilder::new()
            .build_predicate(&department_actor(), &OBSERVATION_COLUMNS)
            .unwrap();
        assert_eq!(predicate, Predicate::eq("department_id", "department-001"));

        let sql = predicate.to_sql(1);
        assert_eq!(sql.clause, "department_id = $1");
        assert_eq!(sql.params, vec!["department-001".to_string()]);
    }

    #[test]
    fn test_teacher_is_scoped_by_ownership() {
        let teacher = Actor::new("u1", Role::Teacher)
            .with_location(GeoLevel::School, "school-001");
        let predicate = QueryFilterBuilder::new()
            .build_predicate(&teacher, &OBSERVATION_COLUMNS)
            .unwrap();

        let sql = predicate.to_sql(1);
        assert_eq!(sql.clause, "(observer_id = $1 OR teacher_id = $2)");
        assert_eq!(sql.params, vec!["u1".to_string(), "u1".to_string()]);
        assert!(!sql.clause.contains("school_id"));

        assert!(predicate.matches(&row(&[("observer_id", "u1"), ("school_id", "school-009")])));
        assert!(predicate.matches(&row(&[("observer_id", "x"), ("teacher_id", "u1")])));
        assert!(!predicate.matches(&row(&[("observer_id", "u2"), ("school_id", "school-001")])));
    }

    #[test]
    fn test_missing_anchor_matches_nothing() {
        let actor = Actor::new("c1", Role::Cluster).with_location(GeoLevel::Zone, "zone-001");
        let predicate = QueryFilterBuilder::new()
            .build_predicate(&actor, &OBSERVATION_COLUMNS)
            .unwrap();
        assert_eq!(predicate, Predicate::Nothing);
        assert!(!predicate.matches(&row(&[("zone_id", "zone-001")])));
    }

    #[test]
    fn test_resource_without_level_column_is_fault() {
        const SCHOOL_ONLY: ResourceLocationColumns = ResourceLocationColumns {
            resource: "visits",
            zone: None,
            province: None,
            department: None,
            cluster: None,
            school: Some("school_id"),
            owner: &[],
        };
        let err = QueryFilterBuilder::new()
            .build_predicate(&department_actor(), &SCHOOL_ONLY)
            .unwrap_err();
        assert!(err.is_configuration_fault());

        let teacher = Actor::new("u1", Role::Teacher);
        assert!(QueryFilterBuilder::new()
            .build_predicate(&teacher, &SCHOOL_ONLY)
            .is_err());
    }

    #[test]
    fn test_scope_is_anded_with_caller_filters() {
        let caller = Predicate::eq("status", "submitted")
            .and(Predicate::search(&["title", "notes"], "reading"));
        let predicate = QueryFilterBuilder::new()
            .scoped(&department_actor(), &OBSERVATION_COLUMNS, caller)
            .unwrap();

        let sql = predicate.to_sql(3);
        assert_eq!(
            sql.clause,
            "(department_id = $3 AND status = $4 AND (title ILIKE $5 OR notes ILIKE $5))"
        );
        assert_eq!(sql.params.len(), 3);
        assert_eq!(sql.params[2], "%reading%");

        assert!(predicate.matches(&row(&[
            ("department_id", "department-001"),
            ("status", "submitted"),
            ("title", "Reading circle"),
        ])));
        assert!(!predicate.matches(&row(&[
            ("department_id", "department-002"),
            ("status", "submitted"),
            ("title", "Reading circle"),
        ])));
    }

    #[test]
    fn test_admin_scope_keeps_caller_filters() {
        let admin = Actor::new("root", Role::Administrator);
        let predicate = QueryFilterBuilder::new()
            .scoped(&admin, &OBSERVATION_COLUMNS, Predicate::eq("school_id", "school-001"))
            .unwrap();
        assert_eq!(predicate, Predicate::eq("school_id", "school-001"));
    }

    #[test]
    fn test_combinator_identities() {
        let p = Predicate::eq("a", "1");
        assert_eq!(Predicate::All.and(p.clone()), p);
        assert_eq!(p.clone().and(Predicate::Nothing), Predicate::Nothing);
        assert_eq!(Predicate::Nothing.or(p.clone()), p);
        assert_eq!(p.clone().or(Predicate::All), Predicate::All);
        assert_eq!(Predicate::all_of(vec![]), Predicate::All);
        assert_eq!(Predicate::Or(vec![]).to_sql(1).clause, "FALSE");
    }

    #[test]
    fn test_search_escapes_like_wildcards() {
        let sql = Predicate::search(&["title"], "100%_done").to_sql(1);
        assert_eq!(sql.params, vec!["%100\\%\\_done%".to_string()]);
    }
}
