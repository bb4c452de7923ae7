//! Formula and logic validation
//!
//! Static checks run before evaluation: forbidden sources, indexed paths,
//! parenthesis balance, syntax, free identifiers and forward references,
//! types, input wiring and output mapping. Validation never stops early;
//! every issue found across all formulas and mappings is reported.
//!
//! Issues are de-duplicated by `(severity, scope, ref_id, message)` and
//! sorted forbidden-source errors first, then syntax errors, then
//! unknown-identifier errors, then other errors, then warnings.

use crate::ast::Expr;
use crate::parser::parse_formula;
use crate::typecheck::{infer_type, type_from_path, SymbolKind, SymbolTable, ValueType};
use ahash::{AHashMap, AHashSet};
use costflow_core::logic::{
    InputWiring, LogicDefinition, OutputMapping, ParamDeclaration, RequiredResult, ResultKey,
    VariableBody,
};
use costflow_core::FORBIDDEN_ROOTS;
use lazy_regex::regex;
use std::fmt;

/// Issue severity. Errors block committing a formula set; warnings never block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

/// What an issue is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Input,
    Var,
    Result,
    Global,
}

/// Machine-readable issue category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueCode {
    /// Reference to a forbidden top-level name
    ForbiddenSource,
    /// Numeric index other than `stages[N]`
    ForbiddenIndex,
    /// `stages[N]` or `stageN_x` with N past the current stage
    FutureStage,
    /// Tokenize/parse failure or unbalanced parentheses
    Syntax,
    UnknownIdentifier,
    /// Reference to the variable itself or to one declared later
    ForwardReference,
    TypeMismatch,
    UnknownFunction,
    ArgumentCount,
    /// Malformed variable or param definition
    Definition,
    /// Malformed input wiring
    Wiring,
    /// Malformed output mapping
    Output,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::ForbiddenSource => "forbidden-source",
            IssueCode::ForbiddenIndex => "forbidden-index",
            IssueCode::FutureStage => "future-stage",
            IssueCode::Syntax => "syntax",
            IssueCode::UnknownIdentifier => "unknown-identifier",
            IssueCode::ForwardReference => "forward-reference",
            IssueCode::TypeMismatch => "type-mismatch",
            IssueCode::UnknownFunction => "unknown-function",
            IssueCode::ArgumentCount => "argument-count",
            IssueCode::Definition => "definition",
            IssueCode::Wiring => "wiring",
            IssueCode::Output => "output",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        })
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scope::Input => "input",
            Scope::Var => "var",
            Scope::Result => "result",
            Scope::Global => "global",
        })
    }
}

/// One validation finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub scope: Scope,
    /// Name of the input, variable or result key the issue is about
    pub ref_id: Option<String>,
    pub code: IssueCode,
    pub message: String,
    pub hint: Option<String>,
}

impl ValidationIssue {
    pub fn error(scope: Scope, ref_id: Option<&str>, code: IssueCode, message: String) -> Self {
        Self {
            severity: Severity::Error,
            scope,
            ref_id: ref_id.map(str::to_string),
            code,
            message,
            hint: None,
        }
    }

    pub fn warning(scope: Scope, ref_id: Option<&str>, code: IssueCode, message: String) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(scope, ref_id, code, message)
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Sort bucket: forbidden source, syntax, unknown identifier, other
    /// errors, warnings
    fn priority(&self) -> u8 {
        match (self.severity, self.code) {
            (Severity::Warning, _) => 4,
            (_, IssueCode::ForbiddenSource) => 0,
            (_, IssueCode::Syntax) => 1,
            (_, IssueCode::UnknownIdentifier | IssueCode::ForwardReference) => 2,
            _ => 3,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}", self.severity, self.scope)?;
        if let Some(id) = &self.ref_id {
            write!(f, " {}", id)?;
        }
        write!(f, "] {}: {}", self.code.as_str(), self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {})", hint)?;
        }
        Ok(())
    }
}

/// De-duplicate by `(severity, scope, ref_id, message)` keeping the first
/// occurrence, then stable-sort by priority bucket
pub fn finalize_issues(issues: Vec<ValidationIssue>) -> Vec<ValidationIssue> {
    let mut seen = AHashSet::new();
    let mut unique: Vec<ValidationIssue> = issues
        .into_iter()
        .filter(|i| {
            seen.insert((
                i.severity,
                i.scope,
                i.ref_id.clone(),
                i.message.clone(),
            ))
        })
        .collect();
    unique.sort_by_key(ValidationIssue::priority);
    unique
}

/// Everything needed to validate one stage's calculator logic
#[derive(Debug, Clone, Copy)]
pub struct ValidationRequest<'a> {
    pub params: &'a [ParamDeclaration],
    pub inputs: &'a [InputWiring],
    pub logic: &'a LogicDefinition,
    /// Output mapping to check; `None` skips result checks
    pub outputs: Option<&'a [OutputMapping]>,
    /// Zero-based index of the stage being validated
    pub current_stage: usize,
}

/// Result of [`validate_logic`]
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Sorted, de-duplicated issues
    pub issues: Vec<ValidationIssue>,
    /// Final symbol table (inputs, then every variable)
    pub symbols: SymbolTable,
    /// Inferred type of each variable, in declaration order
    pub var_types: Vec<(String, ValueType)>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(ValidationIssue::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| !i.is_error())
    }
}

/// Whether `name` is a valid variable/param name
pub fn is_valid_name(name: &str) -> bool {
    regex!(r"^[A-Za-z_][A-Za-z0-9_]*$").is_match(name)
        && !matches!(
            name.to_ascii_lowercase().as_str(),
            "and" | "or" | "not"
        )
        && !matches!(name, "true" | "false" | "null")
}

/// Stage index of a `stage{N}_{key}` prior-stage alias
pub fn stage_alias_index(name: &str) -> Option<usize> {
    regex!(r"^stage(\d+)_[A-Za-z0-9_]+$")
        .captures(name)
        .and_then(|caps| caps[1].parse().ok())
}

/// Validate a complete logic definition for one stage
pub fn validate_logic(request: &ValidationRequest<'_>) -> ValidationReport {
    let mut issues = Vec::new();
    let mut symbols = SymbolTable::new();

    check_inputs(request, &mut symbols, &mut issues);

    let later_vars: AHashMap<&str, usize> = request
        .logic
        .vars
        .iter()
        .enumerate()
        .map(|(i, v)| (v.name.trim(), i))
        .rev()
        .collect();

    let mut var_types = Vec::with_capacity(request.logic.vars.len());
    let mut seen_vars = AHashSet::new();

    for (position, var) in request.logic.iter().enumerate() {
        let name = var.name.trim();
        let ref_id = Some(name);

        if name.is_empty() {
            issues.push(ValidationIssue::error(
                Scope::Var,
                None,
                IssueCode::Definition,
                format!("Variable #{} has no name", position + 1),
            ));
        } else if !is_valid_name(name) {
            issues.push(
                ValidationIssue::error(
                    Scope::Var,
                    ref_id,
                    IssueCode::Definition,
                    format!("'{}' is not a valid variable name", name),
                )
                .with_hint("Use letters, digits and underscores, starting with a letter"),
            );
        }
        if !name.is_empty() && !seen_vars.insert(name.to_string()) {
            issues.push(ValidationIssue::error(
                Scope::Var,
                ref_id,
                IssueCode::Definition,
                format!("Variable '{}' is declared more than once", name),
            ));
        } else if symbols
            .get(name)
            .map_or(false, |s| s.kind == SymbolKind::Input)
        {
            issues.push(ValidationIssue::warning(
                Scope::Var,
                ref_id,
                IssueCode::Definition,
                format!("Variable '{}' shadows the input of the same name", name),
            ));
        }

        let value_type = match var.body() {
            VariableBody::Empty => {
                issues.push(ValidationIssue::error(
                    Scope::Var,
                    ref_id,
                    IssueCode::Definition,
                    format!("Variable '{}' has neither a formula nor a value", name),
                ));
                ValueType::Unknown
            }
            VariableBody::Value(value) => ValueType::of_value(value),
            VariableBody::Formula(formula) => {
                let scope = FormulaScope {
                    scope: Scope::Var,
                    ref_id,
                    current_stage: request.current_stage,
                    position: Some(position),
                    later_vars: &later_vars,
                };
                check_formula(formula, &scope, &symbols, &mut issues)
            }
        };

        if !name.is_empty() {
            symbols.add_var(name, value_type);
        }
        var_types.push((name.to_string(), value_type));
    }

    if let Some(outputs) = request.outputs {
        check_outputs(outputs, &symbols, &mut issues);
    }

    ValidationReport {
        issues: finalize_issues(issues),
        symbols,
        var_types,
    }
}

/// Validate a single formula against an existing symbol table
pub fn validate_formula(
    formula: &str,
    symbols: &SymbolTable,
    current_stage: usize,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let later_vars = AHashMap::new();
    let scope = FormulaScope {
        scope: Scope::Global,
        ref_id: None,
        current_stage,
        position: None,
        later_vars: &later_vars,
    };
    check_formula(formula, &scope, symbols, &mut issues);
    finalize_issues(issues)
}

fn check_inputs(
    request: &ValidationRequest<'_>,
    symbols: &mut SymbolTable,
    issues: &mut Vec<ValidationIssue>,
) {
    let mut declared = AHashSet::new();
    for param in request.params {
        let name = param.name.trim();
        if !is_valid_name(name) {
            issues.push(ValidationIssue::error(
                Scope::Input,
                Some(name),
                IssueCode::Definition,
                format!("'{}' is not a valid param name", name),
            ));
        }
        if !declared.insert(name) {
            issues.push(ValidationIssue::error(
                Scope::Input,
                Some(name),
                IssueCode::Definition,
                format!("Param '{}' is declared more than once", name),
            ));
        }
    }

    let mut wired: AHashMap<&str, &str> = AHashMap::new();
    for wiring in request.inputs {
        let name = wiring.param_name.trim();
        let path = wiring.source_path.trim();

        if wired.insert(name, path).is_some() {
            issues.push(ValidationIssue::error(
                Scope::Input,
                Some(name),
                IssueCode::Wiring,
                format!("Input '{}' is wired more than once", name),
            ));
        }
        if !declared.contains(name) {
            issues.push(
                ValidationIssue::error(
                    Scope::Input,
                    Some(name),
                    IssueCode::Wiring,
                    format!("Input '{}' is wired but not declared as a param", name),
                )
                .with_hint("Declare the param on the calculator settings"),
            );
        }
        if path.is_empty() {
            issues.push(ValidationIssue::error(
                Scope::Input,
                Some(name),
                IssueCode::Wiring,
                format!("Input '{}' has no source path", name),
            ));
            continue;
        }
        check_forbidden_sources(path, Scope::Input, Some(name), issues);
        check_indices(path, Scope::Input, Some(name), request.current_stage, issues);
    }

    for param in request.params {
        let name = param.name.trim();
        if !wired.contains_key(name) {
            issues.push(ValidationIssue::warning(
                Scope::Input,
                Some(name),
                IssueCode::Wiring,
                format!("Param '{}' is not wired to any source", name),
            ));
        }
        let declared_type = param
            .declared_type
            .as_deref()
            .map(ValueType::from_declared)
            .filter(|t| *t != ValueType::Unknown);
        let inferred_type = wired.get(name).map(|path| type_from_path(path));
        symbols.add_input(name, declared_type, inferred_type);
    }

    // Undeclared wirings still resolve, so they still count as symbols
    for wiring in request.inputs {
        let name = wiring.param_name.trim();
        if !declared.contains(name) && !symbols.contains(name) {
            symbols.add_input(name, None, Some(type_from_path(&wiring.source_path)));
        }
    }
}

fn check_outputs(
    outputs: &[OutputMapping],
    symbols: &SymbolTable,
    issues: &mut Vec<ValidationIssue>,
) {
    let mut seen = AHashSet::new();

    for mapping in outputs {
        let key = mapping.key.trim();
        let ref_id = Some(key);

        match ResultKey::parse(key) {
            Ok(parsed) => {
                if !seen.insert(parsed.name().to_string()) {
                    issues.push(ValidationIssue::error(
                        Scope::Result,
                        ref_id,
                        IssueCode::Output,
                        format!("Result '{}' is mapped more than once", parsed.name()),
                    ));
                }
            }
            Err(e) => issues.push(
                ValidationIssue::error(Scope::Result, ref_id, IssueCode::Output, e.to_string())
                    .with_hint("Use width, length, height, weight, purchasingPrice, basePrice or slug|Title"),
            ),
        }

        let source = mapping.source_ref.trim();
        if source.is_empty() {
            issues.push(ValidationIssue::error(
                Scope::Result,
                ref_id,
                IssueCode::Output,
                format!("Result '{}' has no source", key),
            ));
        } else if !symbols.contains(source) {
            issues.push(ValidationIssue::error(
                Scope::Result,
                ref_id,
                IssueCode::Output,
                format!("Result '{}' references unknown source '{}'", key, source),
            ));
        }
    }

    for required in RequiredResult::ALL {
        if !seen.contains(required.as_str()) {
            issues.push(ValidationIssue::warning(
                Scope::Result,
                Some(required.as_str()),
                IssueCode::Output,
                format!("Required result '{}' is not mapped", required),
            ));
        }
    }
}

/// Where a formula sits, for issue attribution and forward-reference checks
struct FormulaScope<'a> {
    scope: Scope,
    ref_id: Option<&'a str>,
    current_stage: usize,
    /// Declaration index of the variable being checked
    position: Option<usize>,
    /// Variable name -> first declaration index
    later_vars: &'a AHashMap<&'a str, usize>,
}

/// Run every formula-level check; returns the inferred type
fn check_formula(
    formula: &str,
    scope: &FormulaScope<'_>,
    symbols: &SymbolTable,
    issues: &mut Vec<ValidationIssue>,
) -> ValueType {
    let forbidden = check_forbidden_sources(formula, scope.scope, scope.ref_id, issues);
    check_indices(formula, scope.scope, scope.ref_id, scope.current_stage, issues);

    if !parens_balanced(formula) {
        issues.push(ValidationIssue::error(
            scope.scope,
            scope.ref_id,
            IssueCode::Syntax,
            "Unbalanced parentheses".to_string(),
        ));
        return ValueType::Unknown;
    }

    let expr = match parse_formula(formula) {
        Ok(expr) => expr,
        Err(e) => {
            issues.push(ValidationIssue::error(
                scope.scope,
                scope.ref_id,
                IssueCode::Syntax,
                e.to_string(),
            ));
            return ValueType::Unknown;
        }
    };

    check_identifiers(&expr, scope, symbols, &forbidden, issues);

    let report = infer_type(&expr, symbols);
    for issue in report.issues {
        // Free identifiers were already reported above with a precise reason
        if issue.code == IssueCode::UnknownIdentifier {
            continue;
        }
        issues.push(ValidationIssue {
            severity: issue.severity,
            scope: scope.scope,
            ref_id: scope.ref_id.map(str::to_string),
            code: issue.code,
            message: issue.message,
            hint: None,
        });
    }
    report.value_type
}

fn check_identifiers(
    expr: &Expr,
    scope: &FormulaScope<'_>,
    symbols: &SymbolTable,
    forbidden: &[&str],
    issues: &mut Vec<ValidationIssue>,
) {
    for name in expr.identifiers() {
        if forbidden.contains(&name) || symbols.contains(name) {
            continue;
        }

        if let (Some(position), Some(&declared_at)) = (scope.position, scope.later_vars.get(name))
        {
            if declared_at >= position {
                let message = if declared_at == position {
                    format!("'{}' references itself", name)
                } else {
                    format!("'{}' is declared after this variable", name)
                };
                issues.push(
                    ValidationIssue::error(
                        scope.scope,
                        scope.ref_id,
                        IssueCode::ForwardReference,
                        message,
                    )
                    .with_hint("A variable can only use inputs and variables declared before it"),
                );
                continue;
            }
        }

        match stage_alias_index(name) {
            Some(n) if n <= scope.current_stage => {}
            Some(n) => issues.push(ValidationIssue::error(
                scope.scope,
                scope.ref_id,
                IssueCode::FutureStage,
                format!(
                    "'{}' refers to stage {}, which is not computed before stage {}",
                    name, n, scope.current_stage
                ),
            )),
            None => issues.push(ValidationIssue::error(
                scope.scope,
                scope.ref_id,
                IssueCode::UnknownIdentifier,
                format!("Unknown identifier '{}'", name),
            )),
        }
    }
}

/// One error per forbidden root mentioned anywhere in `text`. Returns the
/// roots found.
fn check_forbidden_sources(
    text: &str,
    scope: Scope,
    ref_id: Option<&str>,
    issues: &mut Vec<ValidationIssue>,
) -> Vec<&'static str> {
    let found: Vec<&'static str> = FORBIDDEN_ROOTS
        .iter()
        .copied()
        .filter(|root| mentions_word(text, root))
        .collect();

    for root in &found {
        issues.push(
            ValidationIssue::error(
                scope,
                ref_id,
                IssueCode::ForbiddenSource,
                format!("'{}' is a forbidden source", root),
            )
            .with_hint("Read the resolved current offer instead of the raw offer list"),
        );
    }
    found
}

/// Whole-word occurrence of `word` in `text`
fn mentions_word(text: &str, word: &str) -> bool {
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';
    text.match_indices(word).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + word.len()..].chars().next();
        !before.map_or(false, is_ident) && !after.map_or(false, is_ident)
    })
}

/// Numeric indices, bracketed (`items[0]`) or dotted (`items.0`): only
/// `stages[N]` / `stages.N` with `N <= current_stage` is allowed
fn check_indices(
    text: &str,
    scope: Scope,
    ref_id: Option<&str>,
    current_stage: usize,
    issues: &mut Vec<ValidationIssue>,
) {
    let bracketed = regex!(r"([A-Za-z_][A-Za-z0-9_]*)?\s*\[\s*(\d+)\s*\]")
        .captures_iter(text)
        .map(|caps| (caps.get(1).map_or("", |m| m.as_str()), caps, false));
    let dotted = regex!(r"([A-Za-z_][A-Za-z0-9_]*)\.(\d+)\b")
        .captures_iter(text)
        .map(|caps| (caps.get(1).map_or("", |m| m.as_str()), caps, true));

    for (owner, caps, is_dotted) in bracketed.chain(dotted) {
        let index = &caps[2];
        let shown = if is_dotted {
            format!("{}.{}", owner, index)
        } else {
            format!("{}[{}]", owner, index)
        };

        if owner == "stages" {
            let within = index
                .parse::<usize>()
                .map_or(false, |n| n <= current_stage);
            if !within {
                issues.push(ValidationIssue::error(
                    scope,
                    ref_id,
                    IssueCode::FutureStage,
                    format!("{} is not computed before stage {}", shown, current_stage),
                ));
            }
        } else {
            issues.push(
                ValidationIssue::error(
                    scope,
                    ref_id,
                    IssueCode::ForbiddenIndex,
                    format!("Numeric index '{}' is not allowed", shown),
                )
                .with_hint("Only prior stages may be indexed, as stages[N]"),
            );
        }
    }
}

/// Parenthesis balance outside string literals
fn parens_balanced(text: &str) -> bool {
    let mut depth: i64 = 0;
    let mut quote: Option<char> = None;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(_), '\\') => {
                chars.next();
            }
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            (None, _) => {}
        }
    }
    depth == 0
}
