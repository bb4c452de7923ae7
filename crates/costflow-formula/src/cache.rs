//! Parsed-expression cache
//!
//! The same calculator logic is usually shared by many stages, so each
//! formula text is tokenized and parsed once per cache. Failed parses are
//! cached too. A cache belongs to one calculation run and is not shared
//! across threads.

use crate::ast::Expr;
use crate::error::FormulaResult;
use crate::parser::parse_formula;
use ahash::AHashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Formula text → parse result
#[derive(Debug, Default)]
pub struct ExprCache {
    entries: RefCell<AHashMap<String, FormulaResult<Rc<Expr>>>>,
}

impl ExprCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `formula`, or return the cached result of an earlier parse
    pub fn parse(&self, formula: &str) -> FormulaResult<Rc<Expr>> {
        if let Some(entry) = self.entries.borrow().get(formula) {
            return entry.clone();
        }
        let result = parse_formula(formula).map(Rc::new);
        if let Err(e) = &result {
            log::debug!("Caching parse failure for '{}': {}", formula, e);
        }
        self.entries
            .borrow_mut()
            .insert(formula.to_string(), result.clone());
        result
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}
