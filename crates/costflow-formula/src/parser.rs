//! Formula parser
//!
//! Recursive-descent parser over the token stream produced by
//! [`tokenize`](crate::token::tokenize). Malformed input is always an error;
//! the parser never truncates or guesses.

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::token::{tokenize, Token, TokenKind};
use costflow_core::Value;

/// Deepest expression nesting the parser accepts. Parentheses, call
/// arguments, unary operators and chained binary operators each add a level.
pub const MAX_DEPTH: usize = 256;

/// Tokenize and parse formula text
pub fn parse_formula(formula: &str) -> FormulaResult<Expr> {
    let tokens = tokenize(formula)?;
    parse(&tokens)
}

/// Parse a token stream into an expression tree
pub fn parse(tokens: &[Token]) -> FormulaResult<Expr> {
    if tokens.is_empty() {
        return Err(FormulaError::Parse("Empty formula".into()));
    }

    let mut parser = FormulaParser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_expression()?;

    if let Some(token) = parser.current_token() {
        return Err(FormulaError::Parse(format!(
            "Unexpected '{}' at position {}",
            token.text, token.position
        )));
    }

    Ok(expr)
}

/// Formula parser
struct FormulaParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl<'a> FormulaParser<'a> {
    // === Helper methods ===

    fn current_token(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<&'a Token> {
        let token = self.current_token();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind, text: &str) -> bool {
        self.current_token().map_or(false, |t| t.is(kind, text))
    }

    fn expect(&mut self, kind: TokenKind, text: &str) -> FormulaResult<()> {
        match self.current_token() {
            Some(token) if token.is(kind, text) => {
                self.consume();
                Ok(())
            }
            Some(token) => Err(FormulaError::Parse(format!(
                "Expected '{}', got '{}' at position {}",
                text, token.text, token.position
            ))),
            None => Err(FormulaError::Parse(format!(
                "Expected '{}', got end of formula",
                text
            ))),
        }
    }

    fn descend(&mut self) -> FormulaResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::Parse(format!(
                "Formula nested too deeply (more than {} levels)",
                MAX_DEPTH
            )));
        }
        Ok(())
    }

    /// Match the current token against an operator table and consume it
    fn match_operator(&mut self, table: &[(&str, BinaryOperator)]) -> Option<BinaryOperator> {
        let token = self.current_token()?;
        if token.kind != TokenKind::Operator {
            return None;
        }
        let op = table
            .iter()
            .find(|(symbol, _)| *symbol == token.text)
            .map(|(_, op)| *op)?;
        self.consume();
        Some(op)
    }

    fn parse_left_assoc(
        &mut self,
        table: &[(&str, BinaryOperator)],
        next: fn(&mut Self) -> FormulaResult<Expr>,
    ) -> FormulaResult<Expr> {
        let mut left = next(self)?;
        let mut chained = 0;
        while let Some(op) = self.match_operator(table) {
            // every operator deepens the left-leaning tree by one
            self.descend()?;
            chained += 1;
            let right = next(self)?;
            left = Expr::binary(op, left, right);
        }
        self.depth -= chained;
        Ok(left)
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Logical or: ||
    // 2. Logical and: &&
    // 3. Equality: ==, !=
    // 4. Comparison: <, <=, >, >=
    // 5. Additive: +, -
    // 6. Multiplicative: *, /, %
    // 7. Unary: !, -
    // 8. Primary: literals, identifiers, function calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<Expr> {
        self.descend()?;
        let expr = self.parse_or()?;
        self.depth -= 1;
        Ok(expr)
    }

    fn parse_or(&mut self) -> FormulaResult<Expr> {
        self.parse_left_assoc(&[("||", BinaryOperator::Or)], Self::parse_and)
    }

    fn parse_and(&mut self) -> FormulaResult<Expr> {
        self.parse_left_assoc(&[("&&", BinaryOperator::And)], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> FormulaResult<Expr> {
        self.parse_left_assoc(
            &[("==", BinaryOperator::Equal), ("!=", BinaryOperator::NotEqual)],
            Self::parse_comparison,
        )
    }

    fn parse_comparison(&mut self) -> FormulaResult<Expr> {
        self.parse_left_assoc(
            &[
                ("<", BinaryOperator::LessThan),
                ("<=", BinaryOperator::LessEqual),
                (">", BinaryOperator::GreaterThan),
                (">=", BinaryOperator::GreaterEqual),
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> FormulaResult<Expr> {
        self.parse_left_assoc(
            &[("+", BinaryOperator::Add), ("-", BinaryOperator::Subtract)],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<Expr> {
        self.parse_left_assoc(
            &[
                ("*", BinaryOperator::Multiply),
                ("/", BinaryOperator::Divide),
                ("%", BinaryOperator::Modulo),
            ],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> FormulaResult<Expr> {
        let op = if self.check(TokenKind::Operator, "!") {
            Some(UnaryOperator::Not)
        } else if self.check(TokenKind::Operator, "-") {
            Some(UnaryOperator::Negate)
        } else {
            None
        };

        match op {
            Some(op) => {
                self.consume();
                self.descend()?;
                let operand = self.parse_unary()?;
                self.depth -= 1;
                Ok(Expr::unary(op, operand))
            }
            None => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> FormulaResult<Expr> {
        let token = self
            .consume()
            .ok_or_else(|| FormulaError::Parse("Unexpected end of formula".into()))?;

        match token.kind {
            TokenKind::Number => token
                .text
                .parse::<f64>()
                .map(Expr::number)
                .map_err(|_| {
                    FormulaError::Parse(format!(
                        "Invalid number '{}' at position {}",
                        token.text, token.position
                    ))
                }),

            TokenKind::String => Ok(Expr::string(token.text.clone())),

            TokenKind::Paren if token.text == "(" => {
                let expr = self.parse_expression()?;
                self.expect(TokenKind::Paren, ")")?;
                Ok(expr)
            }

            TokenKind::Identifier => {
                // Check if it's a function call
                if self.check(TokenKind::Paren, "(") {
                    return self.parse_function_call(&token.text);
                }
                Ok(match token.text.as_str() {
                    "true" => Expr::Literal(Value::Bool(true)),
                    "false" => Expr::Literal(Value::Bool(false)),
                    "null" => Expr::Literal(Value::Null),
                    name => Expr::identifier(name),
                })
            }

            _ => Err(FormulaError::Parse(format!(
                "Unexpected '{}' at position {}",
                token.text, token.position
            ))),
        }
    }

    fn parse_function_call(&mut self, name: &str) -> FormulaResult<Expr> {
        self.expect(TokenKind::Paren, "(")?;

        let mut args = Vec::new();

        // Parse arguments
        if !self.check(TokenKind::Paren, ")") {
            args.push(self.parse_expression()?);

            while self.check(TokenKind::Comma, ",") {
                self.consume();
                args.push(self.parse_expression()?);
            }
        }

        if self.current_token().is_none() {
            return Err(FormulaError::Parse(format!(
                "Unterminated argument list for {}()",
                name
            )));
        }
        self.expect(TokenKind::Paren, ")")?;

        Ok(Expr::call(name, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_formula("42").unwrap(), Expr::number(42.0));
        assert_eq!(parse_formula("3.14").unwrap(), Expr::number(3.14));
        assert_eq!(parse_formula(".5").unwrap(), Expr::number(0.5));
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse_formula("'Hello'").unwrap(), Expr::string("Hello"));
        assert_eq!(
            parse_formula("true").unwrap(),
            Expr::Literal(Value::Bool(true))
        );
        assert_eq!(parse_formula("null").unwrap(), Expr::Literal(Value::Null));
        // Literal words are case-sensitive
        assert_eq!(parse_formula("TRUE").unwrap(), Expr::identifier("TRUE"));
    }

    #[test]
    fn test_parse_arithmetic_precedence() {
        // 1+(2*3)
        assert_eq!(
            parse_formula("1+2*3").unwrap(),
            Expr::binary(
                BinaryOperator::Add,
                Expr::number(1.0),
                Expr::binary(BinaryOperator::Multiply, Expr::number(2.0), Expr::number(3.0))
            )
        );
        // (10-4)-3, left associative
        assert_eq!(
            parse_formula("10 - 4 - 3").unwrap(),
            Expr::binary(
                BinaryOperator::Subtract,
                Expr::binary(BinaryOperator::Subtract, Expr::number(10.0), Expr::number(4.0)),
                Expr::number(3.0)
            )
        );
    }

    #[test]
    fn test_parse_logical_precedence() {
        // a || (b && (c == d))
        let expr = parse_formula("a or b and c == d").unwrap();
        assert_eq!(
            expr,
            Expr::binary(
                BinaryOperator::Or,
                Expr::identifier("a"),
                Expr::binary(
                    BinaryOperator::And,
                    Expr::identifier("b"),
                    Expr::binary(BinaryOperator::Equal, Expr::identifier("c"), Expr::identifier("d"))
                )
            )
        );
        // equality binds looser than comparison
        assert_eq!(
            parse_formula("a < b == c").unwrap().to_string(),
            "((a < b) == c)"
        );
    }

    #[test]
    fn test_parse_unary() {
        assert_eq!(
            parse_formula("-x * 2").unwrap(),
            Expr::binary(
                BinaryOperator::Multiply,
                Expr::unary(UnaryOperator::Negate, Expr::identifier("x")),
                Expr::number(2.0)
            )
        );
        assert_eq!(
            parse_formula("not not a").unwrap(),
            Expr::unary(
                UnaryOperator::Not,
                Expr::unary(UnaryOperator::Not, Expr::identifier("a"))
            )
        );
    }

    #[test]
    fn test_parse_function() {
        assert_eq!(
            parse_formula("round(x, 2)").unwrap(),
            Expr::call("round", vec![Expr::identifier("x"), Expr::number(2.0)])
        );
        assert_eq!(parse_formula("now()").unwrap(), Expr::call("now", vec![]));
        assert_eq!(
            parse_formula("if(a > 1, max(b, c), 0)").unwrap().to_string(),
            "if((a > 1), max(b, c), 0)"
        );
    }

    #[test]
    fn test_parse_parentheses() {
        assert_eq!(
            parse_formula("(1 + 2) * 3").unwrap().to_string(),
            "((1 + 2) * 3)"
        );
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "",
            "1 +",
            "(1 + 2",
            "1 + 2)",
            "f(1, 2",
            "f(1,)",
            "f(,1)",
            "1 2",
            "*3",
            ")",
            "a b",
        ] {
            let err = parse_formula(bad).unwrap_err();
            assert!(err.is_syntax(), "{:?} -> {:?}", bad, err);
        }
    }

    #[test]
    fn test_parse_rejects_deep_nesting() {
        let too_deep = |err: FormulaError| {
            assert!(err.is_syntax());
            assert!(err.to_string().contains("nested too deeply"), "{}", err);
        };

        too_deep(parse_formula(&format!("{}1", "-".repeat(5000))).unwrap_err());
        too_deep(parse_formula(&format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000))).unwrap_err());
        too_deep(parse_formula(&format!("{}1{}", "abs(".repeat(1000), ")".repeat(1000))).unwrap_err());
        let long_sum = vec!["1"; 1000].join(" + ");
        too_deep(parse_formula(&long_sum).unwrap_err());
    }

    #[test]
    fn test_parse_accepts_moderate_nesting() {
        let parens = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(parse_formula(&parens).unwrap(), Expr::number(1.0));
        assert!(parse_formula(&format!("{}x", "-".repeat(200))).is_ok());
        assert!(parse_formula(&vec!["1"; 100].join(" + ")).is_ok());
    }

    #[test]
    fn test_parse_reports_unterminated_call() {
        let err = parse_formula("max(1, 2").unwrap_err();
        assert_eq!(
            err,
            FormulaError::Parse("Unterminated argument list for max()".into())
        );
    }
}
