//! Context builder
//!
//! Resolves a stage's input wiring against the host data tree and produces
//! the flat [`Context`] its formulas are evaluated against.
//!
//! Paths are resolved relative to the trade offer, with a few aliases:
//!
//! - `offer.<path>` is the same as `<path>`
//! - `properties.<key>` unwraps an offer property to its raw `value`, or to
//!   its `enumId` when it has no raw value
//! - `stage_<id>.operationVariant[...]` / `stage_<id>.materialVariant[...]`
//!   read the catalog variant selected for stage `<id>` by its options
//!   mapping (falling back to the stage's own variant id)
//! - `stages[N]...` reads the record of prior stage `N` of the same owner
//! - `currentStage` is the index of the stage being computed
//!
//! Prior stage results are also exposed under `stage{N}_{key}` names.

use costflow_core::path::{format_path, parse_path, PathSegment};
use costflow_core::{
    CatalogLookup, Error, InputWiring, ProductStructure, Result, StageInstance, Value,
    FORBIDDEN_ROOTS,
};
use costflow_formula::Context;

const OFFER_ALIAS: &str = "offer";
const STAGES_ROOT: &str = "stages";
const CURRENT_STAGE: &str = "currentStage";
const STAGE_ALIAS_PREFIX: &str = "stage_";

/// Keys of a prior stage record exposed as `stage{N}_{key}` besides its outputs
const STAGE_COST_KEYS: [&str; 3] = ["operationCost", "materialCost", "totalCost"];

/// Which catalog variant a stage alias reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    Operation,
    Material,
}

impl VariantKind {
    fn from_segment(name: &str) -> Option<Self> {
        match name {
            "operationVariant" => Some(VariantKind::Operation),
            "materialVariant" => Some(VariantKind::Material),
            _ => None,
        }
    }
}

/// Builds evaluation contexts for the stages of one offer
#[derive(Clone)]
pub struct ContextBuilder<'a> {
    offer: &'a Value,
    catalog: &'a dyn CatalogLookup,
    structure: Option<&'a ProductStructure>,
    stages: Vec<Value>,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(offer: &'a Value, catalog: &'a dyn CatalogLookup) -> Self {
        Self {
            offer,
            catalog,
            structure: None,
            stages: Vec::new(),
        }
    }

    /// Structure used to find stages addressed by `stage_<id>` aliases
    pub fn with_structure(mut self, structure: &'a ProductStructure) -> Self {
        self.structure = Some(structure);
        self
    }

    /// Records of the stages computed before the current one, in order
    pub fn with_prior_stages(mut self, stages: Vec<Value>) -> Self {
        self.stages = stages;
        self
    }

    /// Index of the stage the context is built for
    pub fn current_stage(&self) -> usize {
        self.stages.len()
    }

    /// Resolve a source path. `Ok(None)` means the path is well-formed but
    /// nothing is there.
    pub fn resolve(&self, path: &str) -> Result<Option<Value>> {
        let mut segments = parse_path(path)?;
        if segments.first().and_then(PathSegment::as_key) == Some(OFFER_ALIAS) {
            segments.remove(0);
        }
        let Some(PathSegment::Key(root)) = segments.first() else {
            return Err(invalid(path, "path must start with a name"));
        };

        if FORBIDDEN_ROOTS.contains(&root.as_str()) {
            return Err(invalid(path, "forbidden source"));
        }

        if root == CURRENT_STAGE && segments.len() == 1 {
            return Ok(Some(Value::Number(self.current_stage() as f64)));
        }

        if root == STAGES_ROOT {
            return self.resolve_prior_stage(path, &segments[1..]);
        }

        if let Some(stage_id) = root.strip_prefix(STAGE_ALIAS_PREFIX) {
            let kind = segments
                .get(1)
                .and_then(PathSegment::as_key)
                .and_then(VariantKind::from_segment);
            if let Some(kind) = kind {
                return Ok(self
                    .stage_variant(stage_id, kind)
                    .and_then(|variant| variant.get_path(&segments[2..]))
                    .cloned());
            }
        }

        let value = self.offer.get_path(&segments);
        if segments.len() == 2 && root == "properties" {
            return Ok(value.map(unwrap_property).cloned());
        }
        Ok(value.cloned())
    }

    fn resolve_prior_stage(&self, path: &str, rest: &[PathSegment]) -> Result<Option<Value>> {
        match rest.first() {
            Some(PathSegment::Index(n)) if *n >= self.current_stage() => {
                let stage = format_path(&[
                    PathSegment::Key(STAGES_ROOT.into()),
                    PathSegment::Index(*n),
                ]);
                let reason = format!(
                    "{} is not computed before stage {}",
                    stage,
                    self.current_stage()
                );
                Err(invalid(path, &reason))
            }
            Some(PathSegment::Index(n)) => Ok(self.stages[*n].get_path(&rest[1..]).cloned()),
            None => Ok(Some(Value::Array(self.stages.clone()))),
            Some(PathSegment::Key(_)) => Err(invalid(path, "stages must be indexed")),
        }
    }

    /// Catalog variant record selected for a stage
    pub fn stage_variant(&self, stage_id: &str, kind: VariantKind) -> Option<&'a Value> {
        let stage = self.structure?.stage(stage_id)?;
        let own_id = match kind {
            VariantKind::Operation => stage.operation_variant_id.as_deref(),
            VariantKind::Material => stage.material_variant_id.as_deref(),
        };
        let id = self.mapped_variant_id(stage, kind).or(own_id)?;
        let variant = match kind {
            VariantKind::Operation => self.catalog.operation_variant(id),
            VariantKind::Material => self.catalog.material_variant(id),
        };
        if variant.is_none() {
            log::warn!("Stage {}: unknown {:?} variant '{}'", stage.id, kind, id);
        }
        variant
    }

    /// Variant id chosen by the stage's options mapping for the offer's
    /// current property value
    fn mapped_variant_id(&self, stage: &'a StageInstance, kind: VariantKind) -> Option<&'a str> {
        let mapping = stage.options_mapping.as_ref()?;
        let property = self
            .offer
            .get_path(&[
                PathSegment::Key("properties".into()),
                PathSegment::Key(mapping.property.clone()),
            ])?;
        let selectors = property_selectors(property);

        let entry = mapping
            .entries
            .iter()
            .find(|e| selectors.iter().any(|s| *s == e.when))?;
        match kind {
            VariantKind::Operation => entry.operation_variant_id.as_deref(),
            VariantKind::Material => entry.material_variant_id.as_deref(),
        }
    }

    /// Build the context for `inputs`. Unresolvable inputs are left out and
    /// read as null.
    pub fn build(&self, inputs: &[InputWiring]) -> Context {
        let mut ctx = Context::new();

        for wiring in inputs {
            let name = wiring.param_name.trim();
            match self.resolve(&wiring.source_path) {
                Ok(Some(value)) => ctx.insert(name, value),
                Ok(None) => log::debug!(
                    "Input '{}': nothing at '{}'",
                    name,
                    wiring.source_path
                ),
                Err(e) => log::warn!("Input '{}': {}", name, e),
            }
        }

        for (n, stage) in self.stages.iter().enumerate() {
            let outputs = stage
                .child(&PathSegment::Key("outputs".into()))
                .and_then(Value::as_record)
                .into_iter()
                .flatten();
            let costs = STAGE_COST_KEYS.iter().filter_map(|key| {
                stage
                    .child(&PathSegment::Key((*key).into()))
                    .map(|value| (key.to_string(), value))
            });

            for (key, value) in outputs.map(|(k, v)| (k.clone(), v)).chain(costs) {
                let alias = format!("stage{}_{}", n, key);
                if !value.is_null() && !ctx.contains(&alias) {
                    ctx.insert(alias, value.clone());
                }
            }
        }

        ctx
    }
}

impl std::fmt::Debug for ContextBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBuilder")
            .field("offer", self.offer)
            .field("stages", &self.stages.len())
            .finish()
    }
}

fn invalid(path: &str, reason: &str) -> Error {
    Error::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

/// An offer property's raw value, else its enumerated-value id
fn unwrap_property(property: &Value) -> &Value {
    let Some(map) = property.as_record() else {
        return property;
    };
    match (map.get("value"), map.get("enumId")) {
        (Some(value), _) if !value.is_null() => value,
        (_, Some(id)) => id,
        _ => property,
    }
}

/// Strings an options-mapping row can match a property by
fn property_selectors(property: &Value) -> Vec<String> {
    match property.as_record() {
        Some(map) => ["value", "enumId"]
            .iter()
            .filter_map(|k| map.get(*k))
            .filter(|v| !v.is_null())
            .map(Value::as_string)
            .collect(),
        None => vec![property.as_string()],
    }
}
