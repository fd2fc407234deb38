//! 角色层级注册表
//! 每个角色的静态策略：管理哪些角色、能否审批、可见范围

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::{
    error::AppError,
    models::role::{Role, RolePolicy},
};

/// Immutable role policy table, validated once at startup.
#[derive(Debug, Clone)]
pub struct RoleHierarchyRegistry {
    policies: HashMap<Role, RolePolicy>,
}

impl RoleHierarchyRegistry {
    /// 从策略表构建注册表
    ///
    /// 表必须覆盖全部 7 个角色，不能自我管理，管理关系必须无环。
    pub fn new(policies: Vec<RolePolicy>) -> Result<Self, AppError> {
        let mut table = HashMap::with_capacity(policies.len());
        for policy in policies {
            if policy.managed_roles.contains(&policy.role) {
                return Err(AppError::InvalidRolePolicy(format!(
                    "role {} manages itself",
                    policy.role
                )));
            }
            let role = policy.role;
            if table.insert(role, policy).is_some() {
                return Err(AppError::InvalidRolePolicy(format!(
                    "duplicate policy for role {}",
                    role
                )));
            }
        }

        for role in Role::ALL {
            if !table.contains_key(&role) {
                return Err(AppError::MissingRolePolicy(role));
            }
        }

        let registry = Self { policies: table };
        registry.ensure_acyclic()?;
        Ok(registry)
    }

    /// 默认策略表，与 role_policies 迁移写入的种子数据一致
    ///
    /// 服务启动时从数据库加载；嵌入方和测试可直接使用这份表。
    pub fn standard() -> Result<Self, AppError> {
        Self::new(default_policies())
    }

    pub fn policy(&self, role: Role) -> Result<&RolePolicy, AppError> {
        self.policies
            .get(&role)
            .ok_or(AppError::MissingRolePolicy(role))
    }

    pub fn managed_roles(&self, role: Role) -> Result<&BTreeSet<Role>, AppError> {
        Ok(&self.policy(role)?.managed_roles)
    }

    /// 按字符串查找（来自外部数据的角色值）
    pub fn managed_roles_by_name(&self, role: &str) -> Result<&BTreeSet<Role>, AppError> {
        let role: Role = role.parse()?;
        self.managed_roles(role)
    }

    pub fn can_manage(&self, actor_role: Role, target_role: Role) -> Result<bool, AppError> {
        Ok(self.managed_roles(actor_role)?.contains(&target_role))
    }

    pub fn can_approve(&self, role: Role) -> Result<bool, AppError> {
        Ok(self.policy(role)?.can_approve_escalated_actions)
    }

    pub fn view_scope(&self, role: Role) -> Result<&str, AppError> {
        Ok(self.policy(role)?.view_scope_label.as_str())
    }

    fn ensure_acyclic(&self) -> Result<(), AppError> {
        let mut done: HashSet<Role> = HashSet::new();
        for role in Role::ALL {
            let mut path = Vec::new();
            self.visit(role, &mut path, &mut done)?;
        }
        Ok(())
    }

    fn visit(&self, role: Role, path: &mut Vec<Role>, done: &mut HashSet<Role>) -> Result<(), AppError> {
        if done.contains(&role) {
            return Ok(());
        }
        if path.contains(&role) {
            path.push(role);
            let cycle: Vec<&str> = path.iter().map(|r| r.as_str()).collect();
            return Err(AppError::InvalidRolePolicy(format!(
                "management cycle: {}",
                cycle.join(" -> ")
            )));
        }

        path.push(role);
        for managed in self.managed_roles(role)? {
            self.visit(*managed, path, done)?;
        }
        path.pop();
        done.insert(role);
        Ok(())
    }
}

pub(crate) fn default_policies() -> Vec<RolePolicy> {
    use Role::*;

    vec![
        RolePolicy::new(
            Administrator,
            &[Zone, Provincial, Department, Cluster, Director, Teacher],
            "All zones",
            true,
        )
        .with_notes("Exempt from location scope checks"),
        RolePolicy::new(
            Zone,
            &[Provincial, Department, Cluster, Director, Teacher],
            "Assigned zone",
            true,
        ),
        RolePolicy::new(
            Provincial,
            &[Department, Cluster, Director, Teacher],
            "Assigned province",
            true,
        ),
        RolePolicy::new(Department, &[Cluster, Director, Teacher], "Assigned department", true),
        RolePolicy::new(Cluster, &[Director, Teacher], "Assigned cluster", false),
        RolePolicy::new(Director, &[Teacher], "Assigned school", false),
        RolePolicy::new(Teacher, &[], "Own observations", false)
            .with_notes("Scoped by ownership, not by location"),
    ]
}
