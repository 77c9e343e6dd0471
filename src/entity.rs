use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// Entity types carried over from the document store. Declaration order is also the
/// tie-break order used when computing the migration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    #[serde(rename = "users")]
    User,
    #[serde(rename = "docker_images")]
    DockerImage,
    #[serde(rename = "app_db")]
    App,
    #[serde(rename = "deployments")]
    Deployment,
    #[serde(rename = "bases")]
    VariantBase,
    #[serde(rename = "app_variants")]
    AppVariant,
    #[serde(rename = "app_variant_revisions")]
    AppVariantRevision,
    #[serde(rename = "environments")]
    Environment,
    #[serde(rename = "environments_revisions")]
    EnvironmentRevision,
    #[serde(rename = "templates")]
    Template,
    #[serde(rename = "testsets")]
    TestSet,
    #[serde(rename = "evaluators_configs")]
    EvaluatorConfig,
    #[serde(rename = "human_evaluations")]
    HumanEvaluation,
    #[serde(rename = "human_evaluations_scenarios")]
    HumanEvaluationScenario,
    #[serde(rename = "evaluations")]
    Evaluation,
    #[serde(rename = "evaluation_scenarios")]
    EvaluationScenario,
}

impl EntityType {
    pub const ALL: [EntityType; 16] = [
        Self::User,
        Self::DockerImage,
        Self::App,
        Self::Deployment,
        Self::VariantBase,
        Self::AppVariant,
        Self::AppVariantRevision,
        Self::Environment,
        Self::EnvironmentRevision,
        Self::Template,
        Self::TestSet,
        Self::EvaluatorConfig,
        Self::HumanEvaluation,
        Self::HumanEvaluationScenario,
        Self::Evaluation,
        Self::EvaluationScenario,
    ];

    /// Source collection name. Target tables share it.
    pub fn collection(self) -> &'static str {
        match self {
            Self::User => "users",
            Self::DockerImage => "docker_images",
            Self::App => "app_db",
            Self::Deployment => "deployments",
            Self::VariantBase => "bases",
            Self::AppVariant => "app_variants",
            Self::AppVariantRevision => "app_variant_revisions",
            Self::Environment => "environments",
            Self::EnvironmentRevision => "environments_revisions",
            Self::Template => "templates",
            Self::TestSet => "testsets",
            Self::EvaluatorConfig => "evaluators_configs",
            Self::HumanEvaluation => "human_evaluations",
            Self::HumanEvaluationScenario => "human_evaluations_scenarios",
            Self::Evaluation => "evaluations",
            Self::EvaluationScenario => "evaluation_scenarios",
        }
    }

    pub fn table(self) -> &'static str {
        self.collection()
    }

    /// Entity types whose records this type's transformer resolves references into.
    pub fn dependencies(self) -> &'static [EntityType] {
        use EntityType::*;
        match self {
            User | Template => &[],
            DockerImage | App => &[User],
            Deployment | TestSet | EvaluatorConfig => &[App, User],
            VariantBase => &[App, User, DockerImage, Deployment],
            AppVariant => &[App, DockerImage, User, VariantBase],
            AppVariantRevision => &[AppVariant, User, VariantBase],
            Environment => &[App, User, AppVariant, AppVariantRevision, Deployment],
            EnvironmentRevision => &[Environment, User, AppVariantRevision, Deployment],
            HumanEvaluation => &[App, User, TestSet, AppVariant, AppVariantRevision],
            HumanEvaluationScenario => &[User, HumanEvaluation],
            Evaluation => &[App, User, TestSet, AppVariant, AppVariantRevision],
            EvaluationScenario => &[User, Evaluation, AppVariant],
        }
    }

    fn rank(self) -> usize {
        Self::ALL
            .iter()
            .position(|entity| *entity == self)
            .unwrap_or(Self::ALL.len())
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

impl FromStr for EntityType {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|entity| entity.collection() == trimmed)
            .ok_or_else(|| MigrateError::InvalidOrder(format!("unknown entity type '{trimmed}'")))
    }
}

/// Default migration order over every known entity type.
pub fn dependency_order() -> Result<Vec<EntityType>> {
    topological_order(&EntityType::ALL, EntityType::dependencies)
}

/// Kahn's algorithm over `nodes`; ready nodes are taken in declaration order so the
/// result is deterministic. Dependencies outside `nodes` are ignored.
pub fn topological_order<F>(nodes: &[EntityType], deps_of: F) -> Result<Vec<EntityType>>
where
    F: Fn(EntityType) -> &'static [EntityType],
{
    let members: HashSet<EntityType> = nodes.iter().copied().collect();
    let mut pending: HashMap<EntityType, usize> = HashMap::with_capacity(members.len());
    let mut dependents: HashMap<EntityType, Vec<EntityType>> = HashMap::new();

    for &node in &members {
        let deps: HashSet<EntityType> = deps_of(node)
            .iter()
            .copied()
            .filter(|dep| members.contains(dep))
            .collect();
        pending.insert(node, deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(node);
        }
    }

    let mut ready: BTreeSet<(usize, EntityType)> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(node, _)| (node.rank(), *node))
        .collect();
    let mut order = Vec::with_capacity(members.len());

    while let Some(next) = ready.pop_first() {
        let (_, node) = next;
        order.push(node);
        for dependent in dependents.get(&node).into_iter().flatten() {
            if let Some(count) = pending.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert((dependent.rank(), *dependent));
                }
            }
        }
    }

    if order.len() != members.len() {
        let mut stuck: Vec<EntityType> = members
            .into_iter()
            .filter(|node| !order.contains(node))
            .collect();
        stuck.sort();
        let names: Vec<&str> = stuck.iter().map(|e| e.collection()).collect();
        return Err(MigrateError::InvalidOrder(format!(
            "dependency cycle among: {}",
            names.join(", ")
        )));
    }

    Ok(order)
}

/// Check an explicitly configured order: no repeats, and every dependency is migrated
/// before its dependents.
pub fn validate_order(order: &[EntityType]) -> Result<()> {
    let mut seen = HashSet::with_capacity(order.len());

    for &entity in order {
        if !seen.insert(entity) {
            return Err(MigrateError::InvalidOrder(format!(
                "'{entity}' appears more than once"
            )));
        }
        if let Some(dep) = entity.dependencies().iter().find(|dep| !seen.contains(dep)) {
            return Err(MigrateError::InvalidOrder(format!(
                "'{entity}' references '{dep}', which is not migrated before it"
            )));
        }
    }

    Ok(())
}
