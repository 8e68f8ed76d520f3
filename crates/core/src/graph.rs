//! Skill graph: a directed-acyclic prerequisite structure over skills.
//!
//! Construction is batch (`SkillGraph::build`) so that forward references
//! between skills can be checked for cycles in one pass; once built, a
//! graph's skills and their prerequisite sets are immutable.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use noesis_shared::{GraphError, NoesisError, NoesisResult, SkillId};
use serde::{Deserialize, Serialize};

/// A single skill node. Immutable once placed in a `SkillGraph`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub id: SkillId,
    pub name: String,
    pub prerequisites: BTreeSet<SkillId>,
}

impl Skill {
    #[must_use]
    pub fn new(id: impl Into<SkillId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            prerequisites: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_prerequisites(
        id: impl Into<SkillId>,
        name: impl Into<String>,
        prerequisites: impl IntoIterator<Item = SkillId>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            prerequisites: prerequisites.into_iter().collect(),
        }
    }
}

/// Result of `SkillGraph::validate()`: every offending skill id is reported,
/// not just the first one found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<GraphError>,
}

/// A DAG of skills keyed by id. `BTreeMap` so iteration is already
/// lexicographic wherever that matters without an explicit sort.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillGraph {
    skills: BTreeMap<SkillId, Skill>,
}

impl SkillGraph {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            skills: BTreeMap::new(),
        }
    }

    /// Builds a graph from a full skill list, rejecting dangling
    /// prerequisites and cycles found anywhere in the batch.
    pub fn build(skills: impl IntoIterator<Item = Skill>) -> NoesisResult<Self> {
        let mut map = BTreeMap::new();
        for skill in skills {
            if map.insert(skill.id.clone(), skill.clone()).is_some() {
                return Err(NoesisError::invalid_graph(GraphError::DuplicateSkill {
                    skill: skill.id,
                }));
            }
        }

        let mut dangling = Vec::new();
        for skill in map.values() {
            for prereq in &skill.prerequisites {
                if !map.contains_key(prereq) {
                    dangling.push(GraphError::DanglingPrerequisite {
                        skill: skill.id.clone(),
                        prerequisite: prereq.clone(),
                    });
                }
            }
        }
        if let Some(first) = dangling.into_iter().next() {
            return Err(NoesisError::invalid_graph(first));
        }

        let graph = Self { skills: map };
        if let Some(cycle) = graph.find_cycle() {
            return Err(NoesisError::invalid_graph(GraphError::Cycle { skills: cycle }));
        }
        Ok(graph)
    }

    /// Adds a skill to an already-constructed graph. Every prerequisite must
    /// already be present, so this can never introduce a cycle.
    pub fn add_skill(&mut self, skill: Skill) -> NoesisResult<()> {
        if self.skills.contains_key(&skill.id) {
            return Err(NoesisError::invalid_graph(GraphError::DuplicateSkill {
                skill: skill.id,
            }));
        }
        for prereq in &skill.prerequisites {
            if !self.skills.contains_key(prereq) {
                return Err(NoesisError::invalid_graph(GraphError::DanglingPrerequisite {
                    skill: skill.id.clone(),
                    prerequisite: prereq.clone(),
                }));
            }
        }
        self.skills.insert(skill.id.clone(), skill);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &SkillId) -> Option<&Skill> {
        self.skills.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &SkillId) -> bool {
        self.skills.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn skill_ids(&self) -> impl Iterator<Item = &SkillId> {
        self.skills.keys()
    }

    /// Re-validates the current graph, collecting every cycle and dangling
    /// reference found rather than stopping at the first.
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();
        for skill in self.skills.values() {
            for prereq in &skill.prerequisites {
                if !self.skills.contains_key(prereq) {
                    errors.push(GraphError::DanglingPrerequisite {
                        skill: skill.id.clone(),
                        prerequisite: prereq.clone(),
                    });
                }
            }
        }
        if let Some(cycle) = self.find_cycle() {
            errors.push(GraphError::Cycle { skills: cycle });
        }
        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// DFS-based cycle detection. Returns the skill ids on the first cycle
    /// found, in the order visited, if the graph is not acyclic.
    fn find_cycle(&self) -> Option<Vec<SkillId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            InProgress,
            Done,
        }

        let mut marks: BTreeMap<&SkillId, Mark> = BTreeMap::new();
        let mut stack: Vec<SkillId> = Vec::new();

        fn visit<'a>(
            graph: &'a SkillGraph,
            id: &'a SkillId,
            marks: &mut BTreeMap<&'a SkillId, Mark>,
            stack: &mut Vec<SkillId>,
        ) -> Option<Vec<SkillId>> {
            if let Some(mark) = marks.get(id) {
                return match mark {
                    Mark::Done => None,
                    Mark::InProgress => {
                        let start = stack.iter().position(|s| s == id).unwrap_or(0);
                        Some(stack[start..].to_vec())
                    }
                };
            }
            marks.insert(id, Mark::InProgress);
            stack.push(id.clone());
            if let Some(skill) = graph.skills.get(id) {
                for prereq in &skill.prerequisites {
                    if let Some(cycle) = visit(graph, prereq, marks, stack) {
                        return Some(cycle);
                    }
                }
            }
            stack.pop();
            marks.insert(id, Mark::Done);
            None
        }

        for id in self.skills.keys() {
            if let Some(cycle) = visit(self, id, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
        None
    }

    /// Kahn's algorithm with a min-heap tiebreaker so equal-depth skills
    /// come out lexicographically ordered, making the order deterministic
    /// and reproducible across runs.
    #[must_use]
    pub fn topological_order(&self) -> Vec<SkillId> {
        let mut indegree: BTreeMap<SkillId, usize> = self
            .skills
            .keys()
            .map(|id| (id.clone(), 0usize))
            .collect();
        // A skill's indegree is the number of prerequisites it declares.
        for skill in self.skills.values() {
            *indegree.get_mut(&skill.id).unwrap() = skill.prerequisites.len();
        }

        let mut dependents: BTreeMap<&SkillId, Vec<&SkillId>> = BTreeMap::new();
        for skill in self.skills.values() {
            for prereq in &skill.prerequisites {
                dependents.entry(prereq).or_default().push(&skill.id);
            }
        }

        let mut ready: BTreeSet<SkillId> = indegree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(id, _)| id.clone())
            .collect();

        let mut order = Vec::with_capacity(self.skills.len());
        while let Some(next) = ready.iter().next().cloned() {
            ready.remove(&next);
            order.push(next.clone());
            if let Some(deps) = dependents.get(&next) {
                for dependent in deps {
                    let entry = indegree.get_mut(*dependent).unwrap();
                    *entry -= 1;
                    if *entry == 0 {
                        ready.insert((*dependent).clone());
                    }
                }
            }
        }
        order
    }

    /// Full transitive closure of a skill's prerequisites, in topological
    /// order (ancestors before descendants).
    #[must_use]
    pub fn all_prerequisites(&self, id: &SkillId) -> Vec<SkillId> {
        let mut visited: BTreeSet<SkillId> = BTreeSet::new();
        let mut frontier: VecDeque<SkillId> = VecDeque::new();
        if let Some(skill) = self.skills.get(id) {
            frontier.extend(skill.prerequisites.iter().cloned());
        }
        while let Some(current) = frontier.pop_front() {
            if visited.insert(current.clone()) {
                if let Some(skill) = self.skills.get(&current) {
                    for prereq in &skill.prerequisites {
                        if !visited.contains(prereq) {
                            frontier.push_back(prereq.clone());
                        }
                    }
                }
            }
        }
        self.topological_order()
            .into_iter()
            .filter(|s| visited.contains(s))
            .collect()
    }

    /// Immediate and transitive dependents: every skill whose prerequisite
    /// chain includes `id`.
    #[must_use]
    pub fn dependents(&self, id: &SkillId) -> Vec<SkillId> {
        let mut result: BTreeSet<SkillId> = BTreeSet::new();
        let mut changed = true;
        while changed {
            changed = false;
            for skill in self.skills.values() {
                if result.contains(&skill.id) {
                    continue;
                }
                let depends_on_target = skill.prerequisites.contains(id)
                    || skill.prerequisites.iter().any(|p| result.contains(p));
                if depends_on_target {
                    result.insert(skill.id.clone());
                    changed = true;
                }
            }
        }
        result.into_iter().collect()
    }

    /// Number of transitive dependents of `id` — the "leverage" proxy used
    /// by the session planner's new-skill-introduction tier.
    #[must_use]
    pub fn leverage(&self, id: &SkillId) -> usize {
        self.dependents(id).len()
    }

    /// O(deps(b)): is `a` among `b`'s transitive prerequisites?
    #[must_use]
    pub fn is_prerequisite_of(&self, a: &SkillId, b: &SkillId) -> bool {
        self.all_prerequisites(b).iter().any(|p| p == a)
    }
}
