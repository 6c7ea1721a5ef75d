//! Provider index and demand-driven planning.
//!
//! The index records which provider produces which tag under which visibility and
//! rejects declarations that can never be wired. The planner walks from the
//! requested outputs and the invokers to every provider invocation they need,
//! choosing among candidates with the binding set. Nodes are keyed by
//! (provider, instance scope), so a module-scoped provider gets one node per
//! consuming module and every other provider gets exactly one node.

use crate::container::binding::BindingSet;
use crate::container::descriptor::{ModuleKey, Scope, TypeTag};
use crate::container::outputs::Requirement;
use crate::container::resolver::DependencyGraph;
use crate::errors::CoreError;
use crate::providers::context::{AnyValue, InputValue};
use crate::providers::provider::{Input, OutputKind, Provider};
use std::any::TypeId;
use std::collections::{HashMap, VecDeque};

/// A provider together with the module that registered it
#[derive(Debug, Clone)]
pub struct ProviderEntry {
    pub provider: Provider,
    pub owner: Option<ModuleKey>,
}

impl ProviderEntry {
    pub fn new(provider: Provider, owner: Option<ModuleKey>) -> Self {
        Self { provider, owner }
    }

    fn owner_name(&self) -> Option<&str> {
        self.owner.as_ref().map(ModuleKey::name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    entry: usize,
    output: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagShape {
    Single,
    OnePerModule,
    Many,
}

impl TagShape {
    fn of(kind: OutputKind) -> Self {
        match kind {
            OutputKind::Single | OutputKind::ModuleLocal => TagShape::Single,
            OutputKind::OnePerModule => TagShape::OnePerModule,
            OutputKind::ManyPerContainer => TagShape::Many,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            TagShape::Single => "a single value",
            TagShape::OnePerModule => "one-per-module",
            TagShape::Many => "many-per-container",
        }
    }
}

/// Every provider of a run, indexed by the tags it produces
#[derive(Debug, Default)]
pub struct ProviderIndex {
    entries: Vec<ProviderEntry>,
    singles: HashMap<String, Vec<Candidate>>,
    module_local: HashMap<String, HashMap<String, Candidate>>,
    collected: HashMap<String, Vec<Candidate>>,
    many: HashMap<String, Vec<Candidate>>,
    invokers: Vec<usize>,
    shapes: HashMap<String, (TagShape, TypeId, usize)>,
}

impl ProviderIndex {
    /// Index providers in the given order, rejecting conflicting declarations
    pub fn build(entries: Vec<ProviderEntry>) -> Result<Self, CoreError> {
        let mut index = Self::default();
        for entry in entries {
            index.add(entry)?;
        }

        tracing::debug!(
            "Indexed {} providers ({} invokers)",
            index.entries.len(),
            index.invokers.len()
        );
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> &ProviderEntry {
        &self.entries[index]
    }

    fn add(&mut self, entry: ProviderEntry) -> Result<(), CoreError> {
        entry.provider.validate()?;
        let id = self.entries.len();

        if entry.provider.is_invoker() {
            self.invokers.push(id);
        }

        for (output, spec) in entry.provider.outputs().iter().enumerate() {
            self.check_shape(&entry, id, &spec.tag, TagShape::of(spec.kind))?;
            let candidate = Candidate { entry: id, output };
            let tag = spec.tag.name().to_string();

            match spec.kind {
                OutputKind::Single => {
                    let existing = self.singles.entry(tag).or_default();
                    if let Some(previous) = existing.iter().find(|c| {
                        self.entries[c.entry].provider.outputs()[c.output].implementation == spec.implementation
                    }) {
                        return Err(CoreError::DuplicateProvider {
                            type_name: spec.tag.to_string(),
                            implementation: spec.implementation.clone(),
                            providers: vec![
                                self.entries[previous.entry].provider.name().to_string(),
                                entry.provider.name().to_string(),
                            ],
                        });
                    }
                    existing.push(candidate);
                }
                OutputKind::ModuleLocal => {
                    let module = entry.owner_name().ok_or_else(|| {
                        CoreError::invalid_provider(
                            entry.provider.name(),
                            format!("module-local output {} must be provided by a module", spec.tag),
                        )
                    })?;
                    let locals = self.module_local.entry(module.to_string()).or_default();
                    if let Some(previous) = locals.get(&tag) {
                        return Err(CoreError::DuplicateProvider {
                            type_name: spec.tag.to_string(),
                            implementation: spec.implementation.clone(),
                            providers: vec![
                                self.entries[previous.entry].provider.name().to_string(),
                                entry.provider.name().to_string(),
                            ],
                        });
                    }
                    locals.insert(tag, candidate);
                }
                OutputKind::OnePerModule => {
                    let module = entry.owner_name().ok_or_else(|| {
                        CoreError::invalid_provider(
                            entry.provider.name(),
                            format!("one-per-module output {} must be provided by a module", spec.tag),
                        )
                    })?;
                    let contributors = self.collected.entry(tag).or_default();
                    if contributors
                        .iter()
                        .any(|c| self.entries[c.entry].owner_name() == Some(module))
                    {
                        return Err(CoreError::invalid_provider(
                            entry.provider.name(),
                            format!("module \"{}\" already contributes {}", module, spec.tag),
                        ));
                    }
                    contributors.push(candidate);
                }
                OutputKind::ManyPerContainer => {
                    self.many.entry(tag).or_default().push(candidate);
                }
            }
        }

        self.entries.push(entry);
        Ok(())
    }

    fn check_shape(&mut self, entry: &ProviderEntry, id: usize, tag: &TypeTag, shape: TagShape) -> Result<(), CoreError> {
        match self.shapes.get(tag.name()) {
            Some((known, _, first)) if *known != shape => Err(CoreError::invalid_provider(
                entry.provider.name(),
                format!(
                    "{} is declared as {} here but as {} by provider '{}'",
                    tag,
                    shape.as_str(),
                    known.as_str(),
                    self.provider_name(*first, id, entry)
                ),
            )),
            Some((_, type_id, first)) if *type_id != tag.type_id() => Err(CoreError::invalid_provider(
                entry.provider.name(),
                format!(
                    "{} is declared with a different Rust type by provider '{}'",
                    tag,
                    self.provider_name(*first, id, entry)
                ),
            )),
            Some(_) => Ok(()),
            None => {
                self.shapes.insert(tag.name().to_string(), (shape, tag.type_id(), id));
                Ok(())
            }
        }
    }

    fn provider_name<'a>(&'a self, index: usize, current: usize, entry: &'a ProviderEntry) -> &'a str {
        if index == current {
            entry.provider.name()
        } else {
            self.entries[index].provider.name()
        }
    }

    fn implementation(&self, candidate: &Candidate) -> &str {
        &self.entries[candidate.entry].provider.outputs()[candidate.output].implementation
    }

    fn output_tag(&self, candidate: &Candidate) -> &TypeTag {
        &self.entries[candidate.entry].provider.outputs()[candidate.output].tag
    }
}

/// Where a planned input gets its value from
#[derive(Debug, Clone)]
pub enum InputPlan {
    /// (node, output position), or nothing for an unprovided optional input
    Value(Option<(usize, usize)>),
    ModuleMap(Vec<(String, usize, usize)>),
    Many(Vec<(usize, usize)>),
    Key(ModuleKey),
}

impl InputPlan {
    /// Build the input value from the outputs of already executed nodes
    pub(crate) fn materialize(&self, produced: &[Option<Vec<AnyValue>>]) -> Result<InputValue, CoreError> {
        let fetch = |node: usize, output: usize| -> Result<AnyValue, CoreError> {
            produced
                .get(node)
                .and_then(Option::as_ref)
                .and_then(|outputs| outputs.get(output))
                .cloned()
                .ok_or_else(|| CoreError::provider(format!("value of plan node {} is not available yet", node)))
        };

        Ok(match self {
            InputPlan::Value(None) => InputValue::Value(None),
            InputPlan::Value(Some((node, output))) => InputValue::Value(Some(fetch(*node, *output)?)),
            InputPlan::ModuleMap(entries) => InputValue::ModuleMap(
                entries
                    .iter()
                    .map(|(module, node, output)| Ok((module.clone(), fetch(*node, *output)?)))
                    .collect::<Result<_, CoreError>>()?,
            ),
            InputPlan::Many(entries) => InputValue::Many(
                entries
                    .iter()
                    .map(|(node, output)| fetch(*node, *output))
                    .collect::<Result<_, CoreError>>()?,
            ),
            InputPlan::Key(key) => InputValue::Key(key.clone()),
        })
    }
}

/// One provider invocation in the plan
#[derive(Debug, Clone)]
pub struct PlannedNode {
    pub entry: usize,
    pub scope: Scope,
    pub inputs: Vec<InputPlan>,
}

/// Result of planning: invocations, their dependency graph and where each
/// requested output comes from
#[derive(Debug)]
pub struct Plan {
    pub graph: DependencyGraph,
    pub nodes: Vec<PlannedNode>,
    pub outputs: Vec<InputPlan>,
}

/// Walks from the requested outputs and invokers to every invocation they need
pub struct Planner<'a> {
    index: &'a ProviderIndex,
    bindings: &'a BindingSet,
    graph: DependencyGraph,
    nodes: Vec<PlannedNode>,
    node_ids: HashMap<(usize, Scope), usize>,
    pending: VecDeque<usize>,
}

const REQUESTED_OUTPUT: &str = "requested output";

impl<'a> Planner<'a> {
    pub fn new(index: &'a ProviderIndex, bindings: &'a BindingSet) -> Self {
        Self {
            index,
            bindings,
            graph: DependencyGraph::new(),
            nodes: Vec::new(),
            node_ids: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    /// Plan the requested outputs first, then every invoker
    pub fn plan(mut self, requirements: &[Requirement]) -> Result<Plan, CoreError> {
        let mut outputs = Vec::with_capacity(requirements.len());
        for requirement in requirements {
            let plan = match requirement {
                Requirement::Single(tag) => match self.resolve_value(tag, true, &Scope::Global, REQUESTED_OUTPUT)? {
                    Some(source) => InputPlan::Value(Some(source)),
                    None => {
                        return Err(CoreError::MissingOutput {
                            type_name: tag.to_string(),
                        })
                    }
                },
                Requirement::OnePerModule(tag) => {
                    if !self.index.collected.contains_key(tag.name()) {
                        return Err(CoreError::MissingOutput {
                            type_name: tag.to_string(),
                        });
                    }
                    self.resolve_collected(tag, REQUESTED_OUTPUT)?
                }
                Requirement::Many(tag) => {
                    if !self.index.many.contains_key(tag.name()) {
                        return Err(CoreError::MissingOutput {
                            type_name: tag.to_string(),
                        });
                    }
                    self.resolve_many(tag, REQUESTED_OUTPUT)?
                }
            };
            outputs.push(plan);
        }
        self.drain()?;

        let index = self.index;
        for &invoker in &index.invokers {
            let scope = Scope::from_module(index.entry(invoker).owner.as_ref());
            self.node_for(invoker, scope);
        }
        self.drain()?;

        tracing::debug!("Planned {} provider invocations", self.nodes.len());

        Ok(Plan {
            graph: self.graph,
            nodes: self.nodes,
            outputs,
        })
    }

    fn drain(&mut self) -> Result<(), CoreError> {
        let index = self.index;
        while let Some(node) = self.pending.pop_front() {
            let entry = index.entry(self.nodes[node].entry);
            let scope = self.nodes[node].scope.clone();
            let required_by = entry.provider.name();

            let mut inputs = Vec::with_capacity(entry.provider.inputs().len());
            for input in entry.provider.inputs() {
                let plan = match input {
                    Input::Value { tag, optional } => {
                        InputPlan::Value(self.resolve_value(tag, *optional, &scope, required_by)?)
                    }
                    Input::OnePerModule(tag) => self.resolve_collected(tag, required_by)?,
                    Input::Many(tag) => self.resolve_many(tag, required_by)?,
                    Input::ModuleKey => InputPlan::Key(scope.module().cloned().ok_or_else(|| {
                        CoreError::ModuleScopeRequired {
                            type_name: "ModuleKey".to_string(),
                            required_by: required_by.to_string(),
                        }
                    })?),
                    Input::OwnModuleKey => InputPlan::Key(entry.owner.clone().ok_or_else(|| {
                        CoreError::ModuleScopeRequired {
                            type_name: "OwnModuleKey".to_string(),
                            required_by: required_by.to_string(),
                        }
                    })?),
                };

                for dependency in plan_sources(&plan) {
                    self.graph.add_dependency(node, dependency);
                }
                inputs.push(plan);
            }

            self.nodes[node].inputs = inputs;
        }

        Ok(())
    }

    fn node_for(&mut self, entry: usize, scope: Scope) -> usize {
        if let Some(&node) = self.node_ids.get(&(entry, scope.clone())) {
            return node;
        }

        let node = self.graph.add_node(node_label(self.index.entry(entry), &scope));
        self.nodes.push(PlannedNode {
            entry,
            scope: scope.clone(),
            inputs: Vec::new(),
        });
        self.node_ids.insert((entry, scope), node);
        self.pending.push_back(node);
        node
    }

    /// Resolve one value of `tag` as seen from `scope`
    fn resolve_value(
        &mut self,
        tag: &TypeTag,
        optional: bool,
        scope: &Scope,
        required_by: &str,
    ) -> Result<Option<(usize, usize)>, CoreError> {
        let index = self.index;
        if let Some(module) = scope.module() {
            let local = index
                .module_local
                .get(module.name())
                .and_then(|locals| locals.get(tag.name()))
                .copied();
            if let Some(candidate) = local {
                return self.instantiate(candidate, tag, scope, required_by).map(Some);
            }
        }

        let candidates = index
            .singles
            .get(tag.name())
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        if candidates.is_empty() {
            if optional {
                return Ok(None);
            }
            return Err(CoreError::MissingDependency {
                type_name: tag.to_string(),
                required_by: required_by.to_string(),
            });
        }

        let chosen = match self.bindings.lookup(scope, tag.name()) {
            Some(bound) => *candidates
                .iter()
                .find(|c| index.implementation(c) == bound.implementation)
                .ok_or_else(|| CoreError::BindingTargetNotFound {
                    interface: tag.to_string(),
                    implementation: bound.implementation.to_string(),
                    scope: bound.location(),
                    candidates: self.implementations(candidates),
                })?,
            None if candidates.len() == 1 => candidates[0],
            None => {
                return Err(CoreError::Ambiguous {
                    type_name: tag.to_string(),
                    scope: scope.to_string(),
                    candidates: self.implementations(candidates),
                })
            }
        };

        self.instantiate(chosen, tag, scope, required_by).map(Some)
    }

    fn resolve_collected(&mut self, tag: &TypeTag, required_by: &str) -> Result<InputPlan, CoreError> {
        let candidates = self.index.collected.get(tag.name()).cloned().unwrap_or_default();
        let mut entries = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let owner = self.index.entry(candidate.entry).owner.clone();
            let module = match owner {
                Some(key) => key,
                None => {
                    return Err(CoreError::ModuleScopeRequired {
                        type_name: tag.to_string(),
                        required_by: required_by.to_string(),
                    })
                }
            };
            let (node, output) = self.instantiate(candidate, tag, &Scope::Module(module.clone()), required_by)?;
            entries.push((module.name().to_string(), node, output));
        }

        Ok(InputPlan::ModuleMap(entries))
    }

    fn resolve_many(&mut self, tag: &TypeTag, required_by: &str) -> Result<InputPlan, CoreError> {
        let candidates = self.index.many.get(tag.name()).cloned().unwrap_or_default();
        let mut entries = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let scope = Scope::from_module(self.index.entry(candidate.entry).owner.as_ref());
            entries.push(self.instantiate(candidate, tag, &scope, required_by)?);
        }

        Ok(InputPlan::Many(entries))
    }

    /// Plan the candidate's provider for a consumer in `scope`
    fn instantiate(
        &mut self,
        candidate: Candidate,
        tag: &TypeTag,
        scope: &Scope,
        required_by: &str,
    ) -> Result<(usize, usize), CoreError> {
        let index = self.index;
        let entry = index.entry(candidate.entry);

        if index.output_tag(&candidate).type_id() != tag.type_id() {
            return Err(CoreError::invalid_provider(
                required_by,
                format!(
                    "input {} has a different Rust type than the output of provider '{}'",
                    tag,
                    entry.provider.name()
                ),
            ));
        }

        let instance_scope = if entry.provider.is_module_scoped() {
            match scope {
                Scope::Module(_) => scope.clone(),
                Scope::Global => {
                    return Err(CoreError::ModuleScopeRequired {
                        type_name: tag.to_string(),
                        required_by: required_by.to_string(),
                    })
                }
            }
        } else {
            Scope::from_module(entry.owner.as_ref())
        };

        Ok((self.node_for(candidate.entry, instance_scope), candidate.output))
    }

    fn implementations(&self, candidates: &[Candidate]) -> Vec<String> {
        candidates
            .iter()
            .map(|c| self.index.implementation(c).to_string())
            .collect()
    }
}

fn plan_sources(plan: &InputPlan) -> Vec<usize> {
    match plan {
        InputPlan::Value(Some((node, _))) => vec![*node],
        InputPlan::Value(None) | InputPlan::Key(_) => Vec::new(),
        InputPlan::ModuleMap(entries) => entries.iter().map(|(_, node, _)| *node).collect(),
        InputPlan::Many(entries) => entries.iter().map(|(node, _)| *node).collect(),
    }
}

fn node_label(entry: &ProviderEntry, scope: &Scope) -> String {
    let outputs: Vec<&str> = entry.provider.outputs().iter().map(|o| o.tag.name()).collect();
    let produces = if outputs.is_empty() {
        "invoker".to_string()
    } else {
        outputs.join(", ")
    };

    match scope {
        Scope::Global => format!("{} ({})", produces, entry.provider.name()),
        Scope::Module(key) => format!("{} ({} in module \"{}\")", produces, entry.provider.name(), key.name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[derive(Clone)]
    struct StoreKey;

    #[derive(Clone)]
    struct Handler;

    fn noop(name: &'static str) -> crate::providers::provider::ProviderBuilder {
        Provider::builder(name)
    }

    #[test]
    fn test_duplicate_implementation_rejected() {
        let entries = vec![
            ProviderEntry::new(noop("first").output::<StoreKey>().build(|_| Ok(())), None),
            ProviderEntry::new(noop("second").output::<StoreKey>().build(|_| Ok(())), None),
        ];

        let err = ProviderIndex::build(entries).unwrap_err();
        match err {
            CoreError::DuplicateProvider { providers, .. } => assert_eq!(providers, vec!["first", "second"]),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_collected_output_requires_module() {
        let entries = vec![ProviderEntry::new(
            noop("handler").collect::<Handler>().build(|_| Ok(())),
            None,
        )];

        let err = ProviderIndex::build(entries).unwrap_err();
        assert!(err.to_string().contains("must be provided by a module"));
    }

    #[test]
    fn test_conflicting_shapes_rejected() {
        let key = ModuleKey::new("a", Uuid::new_v4());
        let entries = vec![
            ProviderEntry::new(noop("collect").collect::<Handler>().build(|_| Ok(())), Some(key)),
            ProviderEntry::new(noop("single").output::<Handler>().build(|_| Ok(())), None),
        ];

        let err = ProviderIndex::build(entries).unwrap_err();
        assert!(err.to_string().contains("one-per-module"));
    }

    #[test]
    fn test_tag_with_two_rust_types_rejected() {
        let entries = vec![
            ProviderEntry::new(
                noop("as_u32")
                    .output_tagged(TypeTag::named::<u32>("example.Limit"), "example.SmallLimit")
                    .build(|_| Ok(())),
                None,
            ),
            ProviderEntry::new(
                noop("as_u64")
                    .output_tagged(TypeTag::named::<u64>("example.Limit"), "example.LargeLimit")
                    .build(|_| Ok(())),
                None,
            ),
        ];

        let err = ProviderIndex::build(entries).unwrap_err();
        match &err {
            CoreError::InvalidProvider { provider, message } => {
                assert_eq!(provider, "as_u64");
                assert!(message.contains("different Rust type"));
                assert!(message.contains("as_u32"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_module_scoped_provider_planned_per_consumer() {
        let run_id = Uuid::new_v4();
        let a = ModuleKey::new("a", run_id);
        let b = ModuleKey::new("b", run_id);
        let entries = vec![
            ProviderEntry::new(
                noop("store_key").module_key().output::<StoreKey>().build(|_| Ok(())),
                None,
            ),
            ProviderEntry::new(
                noop("handler_a").input::<StoreKey>().collect::<Handler>().build(|_| Ok(())),
                Some(a),
            ),
            ProviderEntry::new(
                noop("handler_b").input::<StoreKey>().collect::<Handler>().build(|_| Ok(())),
                Some(b),
            ),
        ];
        let index = ProviderIndex::build(entries).unwrap();
        let bindings = BindingSet::new();

        let plan = Planner::new(&index, &bindings)
            .plan(&[Requirement::OnePerModule(TypeTag::of::<Handler>())])
            .unwrap();

        let store_keys: Vec<&PlannedNode> = plan.nodes.iter().filter(|n| n.entry == 0).collect();
        assert_eq!(store_keys.len(), 2);
        assert_eq!(plan.graph.len(), 4);
    }

    #[test]
    fn test_module_scoped_value_outside_module() {
        let entries = vec![ProviderEntry::new(
            noop("store_key").module_key().output::<StoreKey>().build(|_| Ok(())),
            None,
        )];
        let index = ProviderIndex::build(entries).unwrap();
        let bindings = BindingSet::new();

        let err = Planner::new(&index, &bindings)
            .plan(&[Requirement::Single(TypeTag::of::<StoreKey>())])
            .unwrap_err();
        assert!(matches!(err, CoreError::ModuleScopeRequired { .. }));
    }

    #[test]
    fn test_unrequested_providers_are_not_planned() {
        let entries = vec![
            ProviderEntry::new(noop("needs_missing").input::<u64>().output::<StoreKey>().build(|_| Ok(())), None),
            ProviderEntry::new(noop("standalone").output::<Handler>().build(|_| Ok(())), None),
        ];
        let index = ProviderIndex::build(entries).unwrap();
        let bindings = BindingSet::new();

        let plan = Planner::new(&index, &bindings)
            .plan(&[Requirement::Single(TypeTag::of::<Handler>())])
            .unwrap();
        assert_eq!(plan.nodes.len(), 1);
        assert_eq!(plan.graph.label(0), format!("{} (standalone)", std::any::type_name::<Handler>()));
    }
}
