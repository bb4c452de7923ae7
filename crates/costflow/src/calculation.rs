//! Offer calculation engine
//!
//! Walks the stage / detail / binding structure of an offer, evaluates each
//! stage's calculator logic, maps the resulting values onto stage costs and
//! rolls them up bottom-up into detail, binding and offer totals. A final
//! markup pass turns the offer total into one sale price per price type.
//!
//! "No value" and zero are kept apart throughout: costs are `Option<f64>`,
//! and a stage only falls back to flat `price × quantity` pricing when its
//! logic mapped no outputs at all. Which path fired is reported in
//! [`CostRecord::source`].
//!
//! # Example
//!
//! ```rust
//! use costflow::prelude::*;
//!
//! let mut stage = StageInstance::new("cut");
//! stage.operation_price = Some(2.5);
//! let structure = ProductStructure {
//!     details: vec![Detail { id: "panel".into(), stages: vec![stage], ..Default::default() }],
//!     ..Default::default()
//! };
//! let offer = Value::Null;
//! let catalog = Catalog::new();
//!
//! let options = CalculationOptions { quantity: 4.0, ..Default::default() };
//! let result = Calculator::new(&offer, &structure, &catalog).calculate(&options).unwrap();
//! assert_eq!(result.total.total_cost, Some(10.0));
//! assert_eq!(result.details["panel"].stages[0].cost.source, CostSource::FallbackApplied);
//! ```

use crate::context::ContextBuilder;
use crate::markup::{apply_markups, SalePrice};
use costflow_core::{
    CalculatorSettings, CatalogLookup, Error, ItemRef, PriceType, ProductStructure,
    RequiredResult, Result, ResultKey, StageInstance, Value, VariableBody,
};
use costflow_formula::{try_evaluate, Context, ExprCache};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Options for an offer calculation
#[derive(Debug, Clone)]
pub struct CalculationOptions {
    /// Requested offer quantity (default: 1)
    pub quantity: f64,
    /// Price stages whose logic mapped nothing at flat price × quantity
    pub allow_fallback: bool,
    /// Set to stop the run before the next stage
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            quantity: 1.0,
            allow_fallback: true,
            cancel: None,
        }
    }
}

impl CalculationOptions {
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }
}

/// How a cost was arrived at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CostSource {
    /// Calculator logic mapped at least one output
    LogicApplied,
    /// Logic mapped nothing; flat price × quantity was used
    FallbackApplied,
    /// Nothing produced a cost
    Unresolved,
}

impl CostSource {
    /// Source of an aggregate: unresolved parts are ignored, and any
    /// fallback part marks the whole as a fallback
    fn combine(self, other: CostSource) -> CostSource {
        match (self, other) {
            (CostSource::Unresolved, s) | (s, CostSource::Unresolved) => s,
            (CostSource::FallbackApplied, _) | (_, CostSource::FallbackApplied) => {
                CostSource::FallbackApplied
            }
            _ => CostSource::LogicApplied,
        }
    }
}

/// Cost/result record of a stage, detail, binding or offer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostRecord {
    pub operation_cost: Option<f64>,
    pub material_cost: Option<f64>,
    pub total_cost: Option<f64>,
    pub currency: Option<String>,
    pub source: CostSource,
    pub logic_applied: bool,
    /// Variable values (stages only)
    pub variables: BTreeMap<String, Value>,
    /// Mapped outputs by result name (stages only)
    pub outputs: BTreeMap<String, Value>,
}

impl Default for CostRecord {
    fn default() -> Self {
        Self {
            operation_cost: None,
            material_cost: None,
            total_cost: None,
            currency: None,
            source: CostSource::Unresolved,
            logic_applied: false,
            variables: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }
}

impl CostRecord {
    /// Zero-valued record, used for a binding reached through a cycle
    pub fn zero() -> Self {
        Self {
            operation_cost: Some(0.0),
            material_cost: Some(0.0),
            total_cost: Some(0.0),
            ..Default::default()
        }
    }

    /// Sum records. A cost is `None` only if it is `None` in every part.
    pub fn aggregate<'r>(parts: impl IntoIterator<Item = &'r CostRecord>) -> CostRecord {
        let mut total = CostRecord::default();
        for part in parts {
            total.operation_cost = add_costs(total.operation_cost, part.operation_cost);
            total.material_cost = add_costs(total.material_cost, part.material_cost);
            total.total_cost = add_costs(total.total_cost, part.total_cost);
            total.source = total.source.combine(part.source);
            total.logic_applied |= part.logic_applied;

            match (&total.currency, &part.currency) {
                (None, Some(c)) => total.currency = Some(c.clone()),
                (Some(a), Some(b)) if a != b => {
                    log::warn!("Mixed currencies {} and {}; keeping {}", a, b, a)
                }
                _ => {}
            }
        }
        total
    }
}

fn add_costs(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x + y),
        (x, None) | (None, x) => x,
    }
}

/// Result of one stage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResult {
    pub stage_id: String,
    pub title: Option<String>,
    /// Position within its owner's stage list
    pub index: usize,
    #[serde(flatten)]
    pub cost: CostRecord,
}

impl StageResult {
    /// Record exposed to later stages as `stages[N]`
    pub fn to_context_value(&self) -> Value {
        Value::record([
            ("id", Value::from(self.stage_id.as_str())),
            ("index", Value::Number(self.index as f64)),
            ("operationCost", Value::from(self.cost.operation_cost)),
            ("materialCost", Value::from(self.cost.material_cost)),
            ("totalCost", Value::from(self.cost.total_cost)),
            ("currency", Value::from(self.cost.currency.clone())),
            ("outputs", Value::Record(self.cost.outputs.clone())),
            ("variables", Value::Record(self.cost.variables.clone())),
        ])
    }
}

/// Detail or binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Detail,
    Binding,
}

/// Result of a detail or binding
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult {
    pub kind: ItemKind,
    pub id: String,
    pub name: Option<String>,
    #[serde(flatten)]
    pub cost: CostRecord,
    pub stages: Vec<StageResult>,
    pub child_details: Vec<String>,
    pub child_bindings: Vec<String>,
}

/// Statistics from a calculation run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationStats {
    /// Steps announced by the dry count
    pub total_steps: usize,
    /// Stages evaluated
    pub stages_calculated: usize,
    pub logic_applied: usize,
    pub fallbacks: usize,
    pub unresolved: usize,
    /// Formulas that failed to parse or evaluate
    pub evaluation_errors: usize,
    /// Bindings reached again through one of their own descendants
    pub cycles: Vec<String>,
}

/// Progress report: `current` of `total` stages done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

/// Result of a full offer calculation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferResult {
    /// Top-level items in document order
    pub roots: Vec<ItemRef>,
    pub details: BTreeMap<String, ItemResult>,
    pub bindings: BTreeMap<String, ItemResult>,
    pub total: CostRecord,
    /// Sale price per price type id
    pub prices: BTreeMap<String, SalePrice>,
    pub stats: CalculationStats,
}

/// Calculation engine for one offer
pub struct Calculator<'a> {
    offer: &'a Value,
    structure: &'a ProductStructure,
    catalog: &'a dyn CatalogLookup,
    price_types: &'a [PriceType],
    cache: ExprCache,
}

impl<'a> Calculator<'a> {
    pub fn new(
        offer: &'a Value,
        structure: &'a ProductStructure,
        catalog: &'a dyn CatalogLookup,
    ) -> Self {
        Self {
            offer,
            structure,
            catalog,
            price_types: &[],
            cache: ExprCache::new(),
        }
    }

    pub fn with_price_types(mut self, price_types: &'a [PriceType]) -> Self {
        self.price_types = price_types;
        self
    }

    /// Number of stages a full run evaluates. Items shared by several
    /// parents and items reached through a cycle are counted once.
    pub fn count_steps(&self) -> usize {
        let roots = self.structure.top_level();
        let mut seen_details = HashSet::new();
        let mut seen_bindings = HashSet::new();
        roots
            .iter()
            .map(|root| match root {
                ItemRef::Detail(id) => self.count_detail(id, &mut seen_details),
                ItemRef::Binding(id) => {
                    self.count_binding(id, &mut seen_details, &mut seen_bindings)
                }
            })
            .sum()
    }

    fn count_detail<'s>(&'s self, id: &'s str, seen: &mut HashSet<&'s str>) -> usize {
        if !seen.insert(id) {
            return 0;
        }
        self.structure.detail(id).map_or(0, |d| d.stages.len())
    }

    fn count_binding<'s>(
        &'s self,
        id: &'s str,
        seen_details: &mut HashSet<&'s str>,
        seen_bindings: &mut HashSet<&'s str>,
    ) -> usize {
        if !seen_bindings.insert(id) {
            return 0;
        }
        let Some(binding) = self.structure.binding(id) else {
            return 0;
        };
        let details: usize = binding
            .detail_ids
            .iter()
            .map(|d| self.count_detail(d, seen_details))
            .sum();
        let bindings: usize = binding
            .binding_ids
            .iter()
            .map(|b| self.count_binding(b, seen_details, seen_bindings))
            .sum();
        binding.stages.len() + details + bindings
    }

    /// Calculate the whole offer
    pub fn calculate(&self, options: &CalculationOptions) -> Result<OfferResult> {
        self.calculate_with_progress(options, |_| {})
    }

    /// Calculate the whole offer, reporting progress after every stage.
    ///
    /// Returns [`Error::Cancelled`] if the cancel flag is set before the run
    /// completes; partial results are discarded.
    pub fn calculate_with_progress<F>(
        &self,
        options: &CalculationOptions,
        progress: F,
    ) -> Result<OfferResult>
    where
        F: FnMut(Progress),
    {
        let total_steps = self.count_steps();
        let mut run = Run {
            calc: self,
            options,
            progress,
            step: 0,
            details: BTreeMap::new(),
            bindings: BTreeMap::new(),
            ancestors: Vec::new(),
            stats: CalculationStats {
                total_steps,
                ..Default::default()
            },
        };

        let roots = self.structure.top_level();
        let mut parts = Vec::with_capacity(roots.len());
        for root in &roots {
            let cost = match root {
                ItemRef::Detail(id) => run.visit_detail(id)?,
                ItemRef::Binding(id) => run.visit_binding(id)?,
            };
            parts.extend(cost);
        }

        let total = CostRecord::aggregate(&parts);
        let prices = apply_markups(total.total_cost, options.quantity, self.price_types);
        log::debug!(
            "Calculated {} stage(s): total {:?} {}",
            run.stats.stages_calculated,
            total.total_cost,
            total.currency.as_deref().unwrap_or("")
        );

        Ok(OfferResult {
            roots,
            details: run.details,
            bindings: run.bindings,
            total,
            prices,
            stats: run.stats,
        })
    }

    /// Calculate a single stage given the results of the stages before it
    pub fn calculate_stage(
        &self,
        stage: &StageInstance,
        prior: &[StageResult],
        options: &CalculationOptions,
    ) -> StageResult {
        let mut stats = CalculationStats::default();
        self.stage_result(stage, prior, options, &mut stats)
    }

    fn settings_for(&self, stage: &StageInstance) -> Option<&'a CalculatorSettings> {
        let id = stage.calculator_id.as_deref()?;
        let settings = self.catalog.calculator(id);
        if settings.is_none() {
            log::warn!("Stage {}: unknown calculator '{}'", stage.id, id);
        }
        settings
    }

    fn stage_result(
        &self,
        stage: &StageInstance,
        prior: &[StageResult],
        options: &CalculationOptions,
        stats: &mut CalculationStats,
    ) -> StageResult {
        let builder = ContextBuilder::new(self.offer, self.catalog)
            .with_structure(self.structure)
            .with_prior_stages(prior.iter().map(StageResult::to_context_value).collect());
        let mut ctx = builder.build(&stage.inputs);

        let mut variables = BTreeMap::new();
        if let Some(settings) = self.settings_for(stage) {
            for var in settings.logic.iter() {
                let name = var.name.trim();
                let value = match var.body() {
                    VariableBody::Formula(formula) => {
                        self.evaluate_variable(stage, name, formula, &ctx, stats)
                    }
                    VariableBody::Value(value) => Some(value.clone()),
                    VariableBody::Empty => None,
                };
                let value = value.unwrap_or(Value::Null);
                ctx.insert(name, value.clone());
                variables.insert(name.to_string(), value);
            }
        }

        let outputs = map_outputs(stage, &ctx);
        let mut cost = if outputs.is_empty() {
            fallback_cost(stage, options)
        } else {
            let numeric = |r: RequiredResult| {
                outputs
                    .get(r.as_str())
                    .and_then(Value::numeric)
                    .filter(|n| n.is_finite())
            };
            CostRecord {
                operation_cost: numeric(RequiredResult::BasePrice),
                material_cost: numeric(RequiredResult::PurchasingPrice),
                source: CostSource::LogicApplied,
                logic_applied: true,
                ..Default::default()
            }
        };
        cost.total_cost = add_costs(cost.operation_cost, cost.material_cost);
        cost.currency = stage.currency.clone();
        cost.variables = variables;
        cost.outputs = outputs;

        stats.stages_calculated += 1;
        match cost.source {
            CostSource::LogicApplied => stats.logic_applied += 1,
            CostSource::FallbackApplied => stats.fallbacks += 1,
            CostSource::Unresolved => stats.unresolved += 1,
        }
        log::debug!(
            "Stage {}: {:?} total {:?}",
            stage.id,
            cost.source,
            cost.total_cost
        );

        StageResult {
            stage_id: stage.id.clone(),
            title: stage.title.clone(),
            index: prior.len(),
            cost,
        }
    }

    /// Evaluate one formula variable; `None` if it produced no value
    fn evaluate_variable(
        &self,
        stage: &StageInstance,
        name: &str,
        formula: &str,
        ctx: &Context,
        stats: &mut CalculationStats,
    ) -> Option<Value> {
        let expr = match self.cache.parse(formula) {
            Ok(expr) => expr,
            Err(e) => {
                log::warn!("Stage {}: variable '{}' does not parse: {}", stage.id, name, e);
                stats.evaluation_errors += 1;
                return None;
            }
        };
        match try_evaluate(&expr, ctx) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Stage {}: variable '{}' failed: {}", stage.id, name, e);
                stats.evaluation_errors += 1;
                None
            }
        }
    }
}

/// Outputs with a present value, keyed by result name
fn map_outputs(stage: &StageInstance, ctx: &Context) -> BTreeMap<String, Value> {
    let mut outputs = BTreeMap::new();
    for mapping in &stage.outputs {
        let key = match ResultKey::parse(&mapping.key) {
            Ok(key) => key,
            Err(e) => {
                log::warn!("Stage {}: {}", stage.id, e);
                continue;
            }
        };
        match ctx.get(mapping.source_ref.trim()) {
            Some(value) if value.is_present() => {
                outputs.insert(key.name().to_string(), value.clone());
            }
            _ => log::debug!(
                "Stage {}: '{}' has no value for result '{}'",
                stage.id,
                mapping.source_ref,
                key.name()
            ),
        }
    }
    outputs
}

/// Flat price × quantity, when allowed and a flat price exists
fn fallback_cost(stage: &StageInstance, options: &CalculationOptions) -> CostRecord {
    let has_price = stage.operation_price.is_some() || stage.material_price.is_some();
    if !options.allow_fallback || !has_price {
        return CostRecord::default();
    }

    let quantity = stage.quantity.unwrap_or(options.quantity);
    log::warn!(
        "Stage {}: logic mapped no outputs, pricing flat at quantity {}",
        stage.id,
        quantity
    );
    CostRecord {
        operation_cost: stage.operation_price.map(|p| p * quantity),
        material_cost: stage.material_price.map(|p| p * quantity),
        source: CostSource::FallbackApplied,
        ..Default::default()
    }
}

/// Mutable state of one calculation run
struct Run<'c, 'a, F> {
    calc: &'c Calculator<'a>,
    options: &'c CalculationOptions,
    progress: F,
    step: usize,
    details: BTreeMap<String, ItemResult>,
    bindings: BTreeMap<String, ItemResult>,
    /// Bindings currently being computed, outermost first
    ancestors: Vec<String>,
    stats: CalculationStats,
}

impl<'c, 'a, F: FnMut(Progress)> Run<'c, 'a, F> {
    fn run_stages(&mut self, stages: &'a [StageInstance]) -> Result<Vec<StageResult>> {
        let mut done: Vec<StageResult> = Vec::with_capacity(stages.len());
        for stage in stages {
            if self.options.is_cancelled() {
                log::debug!("Calculation cancelled at step {}", self.step);
                return Err(Error::Cancelled);
            }
            let result = self
                .calc
                .stage_result(stage, &done, self.options, &mut self.stats);
            done.push(result);

            self.step += 1;
            (self.progress)(Progress {
                current: self.step,
                total: self.stats.total_steps,
            });
        }
        Ok(done)
    }

    fn visit_detail(&mut self, id: &str) -> Result<Option<CostRecord>> {
        if let Some(done) = self.details.get(id) {
            return Ok(Some(done.cost.clone()));
        }
        let structure: &'a ProductStructure = self.calc.structure;
        let Some(detail) = structure.detail(id) else {
            log::warn!("Unknown detail '{}'", id);
            return Ok(None);
        };

        let stages = self.run_stages(&detail.stages)?;
        let cost = CostRecord::aggregate(stages.iter().map(|s| &s.cost));
        self.details.insert(
            id.to_string(),
            ItemResult {
                kind: ItemKind::Detail,
                id: id.to_string(),
                name: detail.name.clone(),
                cost: cost.clone(),
                stages,
                child_details: Vec::new(),
                child_bindings: Vec::new(),
            },
        );
        Ok(Some(cost))
    }

    fn visit_binding(&mut self, id: &str) -> Result<Option<CostRecord>> {
        if self.ancestors.iter().any(|a| a == id) {
            log::warn!(
                "Binding '{}' contains itself via {}; counting it as zero",
                id,
                self.ancestors.join(" > ")
            );
            self.stats.cycles.push(id.to_string());
            return Ok(Some(CostRecord::zero()));
        }
        if let Some(done) = self.bindings.get(id) {
            return Ok(Some(done.cost.clone()));
        }
        let structure: &'a ProductStructure = self.calc.structure;
        let Some(binding) = structure.binding(id) else {
            log::warn!("Unknown binding '{}'", id);
            return Ok(None);
        };

        self.ancestors.push(id.to_string());
        let mut parts = Vec::new();
        for child in &binding.detail_ids {
            parts.extend(self.visit_detail(child)?);
        }
        for child in &binding.binding_ids {
            parts.extend(self.visit_binding(child)?);
        }
        let stages = self.run_stages(&binding.stages)?;
        self.ancestors.pop();

        parts.extend(stages.iter().map(|s| s.cost.clone()));
        let cost = CostRecord::aggregate(&parts);
        self.bindings.insert(
            id.to_string(),
            ItemResult {
                kind: ItemKind::Binding,
                id: id.to_string(),
                name: binding.name.clone(),
                cost: cost.clone(),
                stages,
                child_details: binding.detail_ids.clone(),
                child_bindings: binding.binding_ids.clone(),
            },
        );
        Ok(Some(cost))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use costflow_core::{Binding, Catalog, Detail, InputWiring, LogicDefinition, OutputMapping, VariableDef};
    use pretty_assertions::assert_eq;

    fn calculator_settings() -> CalculatorSettings {
        CalculatorSettings {
            id: "area".into(),
            name: Some("Area pricing".into()),
            params: vec![],
            logic: LogicDefinition::new(vec![
                VariableDef::formula("area", "w * h / 1000000"),
                VariableDef::value("rate", 40.0),
                VariableDef::formula("cost", "round(area * rate, 2)"),
                VariableDef::formula("broken", "nope(1)"),
            ]),
        }
    }

    fn logic_stage(id: &str) -> StageInstance {
        let mut stage = StageInstance::new(id);
        stage.calculator_id = Some("area".into());
        stage.inputs = vec![
            InputWiring::new("w", "properties.width"),
            InputWiring::new("h", "properties.height"),
        ];
        stage.outputs = vec![
            OutputMapping::new("basePrice", "cost"),
            OutputMapping::new("width", "w"),
        ];
        stage.currency = Some("EUR".into());
        stage
    }

    fn offer() -> Value {
        Value::from(serde_json::json!({
            "properties": { "width": { "value": 1000 }, "height": { "value": 500 } }
        }))
    }

    #[test]
    fn test_logic_stage() {
        let offer = offer();
        let catalog = Catalog::new().with_calculator(calculator_settings());
        let structure = ProductStructure::default();
        let calc = Calculator::new(&offer, &structure, &catalog);

        let result = calc.calculate_stage(&logic_stage("s1"), &[], &CalculationOptions::default());
        assert_eq!(result.cost.source, CostSource::LogicApplied);
        assert_eq!(result.cost.operation_cost, Some(20.0));
        assert_eq!(result.cost.material_cost, None);
        assert_eq!(result.cost.total_cost, Some(20.0));
        assert_eq!(result.cost.variables["area"], Value::Number(0.5));
        assert_eq!(result.cost.variables["broken"], Value::Null);
        assert_eq!(result.cost.outputs["width"], Value::Number(1000.0));
    }

    #[test]
    fn test_zero_logic_result_is_not_replaced_by_fallback() {
        let offer = Value::from(serde_json::json!({
            "properties": { "width": { "value": 0 }, "height": { "value": 500 } }
        }));
        let catalog = Catalog::new().with_calculator(calculator_settings());
        let structure = ProductStructure::default();
        let calc = Calculator::new(&offer, &structure, &catalog);

        let mut stage = logic_stage("s1");
        stage.operation_price = Some(99.0);
        let result = calc.calculate_stage(&stage, &[], &CalculationOptions::default());
        assert_eq!(result.cost.source, CostSource::LogicApplied);
        assert_eq!(result.cost.total_cost, Some(0.0));
    }

    #[test]
    fn test_fallback_only_when_nothing_mapped() {
        let offer = Value::Null;
        let catalog = Catalog::new().with_calculator(calculator_settings());
        let structure = ProductStructure::default();
        let calc = Calculator::new(&offer, &structure, &catalog);

        // inputs missing: every output is absent
        let mut stage = logic_stage("s1");
        stage.operation_price = Some(3.0);
        stage.material_price = Some(0.5);
        stage.quantity = Some(10.0);
        let result = calc.calculate_stage(&stage, &[], &CalculationOptions::default());
        assert_eq!(result.cost.source, CostSource::FallbackApplied);
        assert_eq!(result.cost.operation_cost, Some(30.0));
        assert_eq!(result.cost.material_cost, Some(5.0));
        assert_eq!(result.cost.total_cost, Some(35.0));

        let options = CalculationOptions {
            allow_fallback: false,
            ..Default::default()
        };
        let result = calc.calculate_stage(&stage, &[], &options);
        assert_eq!(result.cost.source, CostSource::Unresolved);
        assert_eq!(result.cost.total_cost, None);
    }

    #[test]
    fn test_prior_stage_aliases() {
        let offer = offer();
        let double = CalculatorSettings {
            id: "double".into(),
            logic: LogicDefinition::new(vec![VariableDef::formula("cost", "stage0_basePrice * 2")]),
            ..Default::default()
        };
        let catalog = Catalog::new()
            .with_calculator(calculator_settings())
            .with_calculator(double);
        let structure = ProductStructure::default();
        let calc = Calculator::new(&offer, &structure, &catalog);
        let options = CalculationOptions::default();

        let first = calc.calculate_stage(&logic_stage("s1"), &[], &options);
        let mut second = StageInstance::new("s2");
        second.calculator_id = Some("double".into());
        second.outputs = vec![OutputMapping::new("basePrice", "cost")];
        let second = calc.calculate_stage(&second, &[first], &options);
        assert_eq!(second.index, 1);
        assert_eq!(second.cost.total_cost, Some(40.0));
    }

    #[test]
    fn test_aggregate_keeps_none_apart_from_zero() {
        let none = CostRecord::default();
        let zero = CostRecord {
            total_cost: Some(0.0),
            source: CostSource::LogicApplied,
            ..Default::default()
        };
        assert_eq!(CostRecord::aggregate([&none, &none]).total_cost, None);
        let sum = CostRecord::aggregate([&none, &zero]);
        assert_eq!(sum.total_cost, Some(0.0));
        assert_eq!(sum.source, CostSource::LogicApplied);

        let fallback = CostRecord {
            total_cost: Some(2.0),
            source: CostSource::FallbackApplied,
            ..Default::default()
        };
        assert_eq!(
            CostRecord::aggregate([&zero, &fallback]).source,
            CostSource::FallbackApplied
        );
    }

    #[test]
    fn test_count_steps_counts_shared_items_once() {
        let detail = |id: &str, n: usize| Detail {
            id: id.into(),
            stages: (0..n).map(|i| StageInstance::new(format!("{}-{}", id, i))).collect(),
            ..Default::default()
        };
        let structure = ProductStructure {
            details: vec![detail("d1", 2), detail("shared", 3)],
            bindings: vec![
                Binding {
                    id: "b1".into(),
                    detail_ids: vec!["shared".into()],
                    stages: vec![StageInstance::new("b1-0")],
                    ..Default::default()
                },
                Binding {
                    id: "b2".into(),
                    detail_ids: vec!["shared".into()],
                    binding_ids: vec!["b2".into()],
                    ..Default::default()
                },
            ],
            roots: vec![
                ItemRef::Detail("d1".into()),
                ItemRef::Binding("b1".into()),
                ItemRef::Binding("b2".into()),
            ],
        };
        let offer = Value::Null;
        let catalog = Catalog::new();
        let calc = Calculator::new(&offer, &structure, &catalog);
        assert_eq!(calc.count_steps(), 6);
    }
}
