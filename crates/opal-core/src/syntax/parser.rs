//! Parser implementation for Opal source files.

use super::ast::{
    BinOp, ClassDecl, EnumDecl, EnumMember, Expr, ExprKind, File, FunctionDecl, Item, LetDecl,
    Modifiers, Param, Spanned, Stmt, TyExpr, UnaryOp,
};
use crate::source::{SourceId, Span};
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use std::sync::LazyLock;

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct OpalParser;

/// Pratt parser for expression precedence.
static PRATT_PARSER: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        // Lowest precedence
        .op(Op::infix(Rule::bit_or, Assoc::Left))
        .op(Op::infix(Rule::bit_xor, Assoc::Left))
        .op(Op::infix(Rule::bit_and, Assoc::Left))
        .op(Op::infix(Rule::shl, Assoc::Left) | Op::infix(Rule::shr, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left)
            | Op::infix(Rule::div, Assoc::Left)
            | Op::infix(Rule::rem, Assoc::Left))
        // Highest precedence
        .op(Op::prefix(Rule::neg) | Op::prefix(Rule::not))
        .op(Op::postfix(Rule::cast) | Op::postfix(Rule::member) | Op::postfix(Rule::call_args))
});

/// Parse error with source location.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("parse error: {message} at line {line}, column {column}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("unexpected rule: expected {expected}, found {found}")]
    UnexpectedRule { expected: String, found: String },

    #[error("missing required element: {0}")]
    Missing(String),
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let (line, column) = match err.line_col {
            pest::error::LineColLocation::Pos((l, c)) => (l, c),
            pest::error::LineColLocation::Span((l, c), _) => (l, c),
        };
        ParseError::Syntax {
            message: err.variant.message().to_string(),
            line,
            column,
        }
    }
}

fn unexpected(expected: &str, found: Rule) -> ParseError {
    ParseError::UnexpectedRule {
        expected: expected.to_string(),
        found: format!("{:?}", found),
    }
}

struct ParserContext {
    source_id: SourceId,
}

impl ParserContext {
    fn span(&self, pair: &Pair<Rule>) -> Span {
        let pest_span = pair.as_span();
        Span::new(self.source_id, pest_span.start(), pest_span.end())
    }
}

/// Parse a source string into a [`File`].
pub fn parse(source: &str) -> Result<File, ParseError> {
    parse_with_source_id(source, SourceId(0))
}

/// Parse a source string, attributing spans to `source_id`.
pub fn parse_with_source_id(source: &str, source_id: SourceId) -> Result<File, ParseError> {
    let mut pairs = OpalParser::parse(Rule::file, source)?;
    let ctx = ParserContext { source_id };

    let file_pair = pairs
        .next()
        .ok_or_else(|| ParseError::Missing("file".into()))?;

    let mut items = Vec::new();
    for pair in file_pair.into_inner() {
        match pair.as_rule() {
            Rule::item => {
                let span = ctx.span(&pair);
                let inner = pair
                    .into_inner()
                    .next()
                    .ok_or_else(|| ParseError::Missing("declaration".into()))?;
                items.push(Spanned::new(ctx.parse_item(inner)?, span));
            }
            Rule::EOI => {}
            other => return Err(unexpected("item", other)),
        }
    }

    Ok(File { items })
}

impl ParserContext {
    fn parse_item(&self, pair: Pair<Rule>) -> Result<Item, ParseError> {
        match pair.as_rule() {
            Rule::function_decl => Ok(Item::Function(self.parse_function(pair)?)),
            Rule::class_decl => Ok(Item::Class(self.parse_class(pair)?)),
            Rule::enum_decl => Ok(Item::Enum(self.parse_enum(pair)?)),
            Rule::let_decl => Ok(Item::Let(self.parse_let(pair)?)),
            Rule::statement => Ok(Item::Stmt(self.parse_statement(pair)?.node)),
            other => Err(unexpected("declaration", other)),
        }
    }

    fn apply_modifier(&self, pair: Pair<Rule>, modifiers: &mut Modifiers) -> Result<(), ParseError> {
        let inner = pair
            .into_inner()
            .next()
            .ok_or_else(|| ParseError::Missing("modifier".into()))?;
        match inner.as_rule() {
            Rule::export_kw => modifiers.export = true,
            Rule::declare_kw => modifiers.declare = true,
            Rule::static_kw => modifiers.is_static = true,
            other => return Err(unexpected("modifier", other)),
        }
        Ok(())
    }

    fn parse_function(&self, pair: Pair<Rule>) -> Result<FunctionDecl, ParseError> {
        let mut decl = FunctionDecl {
            name: String::new(),
            name_span: Span::default(),
            modifiers: Modifiers::default(),
            type_params: Vec::new(),
            params: Vec::new(),
            ret: None,
            body: None,
        };

        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::modifier => self.apply_modifier(p, &mut decl.modifiers)?,
                Rule::fn_kw => {}
                Rule::ident => {
                    decl.name_span = self.span(&p);
                    decl.name = p.as_str().to_string();
                }
                Rule::type_params => {
                    for tp in p.into_inner() {
                        decl.type_params.push(tp.as_str().to_string());
                    }
                }
                Rule::param_list => {
                    for param in p.into_inner() {
                        decl.params.push(self.parse_param(param)?);
                    }
                }
                Rule::type_annot => decl.ret = Some(self.parse_type_annot(p)?),
                Rule::block => decl.body = Some(self.parse_block(p)?),
                other => return Err(unexpected("function part", other)),
            }
        }

        Ok(decl)
    }

    /// Methods look like functions without the `function` keyword, and the
    /// body is mandatory.
    fn parse_method(&self, pair: Pair<Rule>) -> Result<FunctionDecl, ParseError> {
        let mut decl = FunctionDecl {
            name: String::new(),
            name_span: Span::default(),
            modifiers: Modifiers::default(),
            type_params: Vec::new(),
            params: Vec::new(),
            ret: None,
            body: None,
        };

        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::modifier => self.apply_modifier(p, &mut decl.modifiers)?,
                Rule::ident => {
                    decl.name_span = self.span(&p);
                    decl.name = p.as_str().to_string();
                }
                Rule::param_list => {
                    for param in p.into_inner() {
                        decl.params.push(self.parse_param(param)?);
                    }
                }
                Rule::type_annot => decl.ret = Some(self.parse_type_annot(p)?),
                Rule::block => decl.body = Some(self.parse_block(p)?),
                other => return Err(unexpected("method part", other)),
            }
        }

        Ok(decl)
    }

    fn parse_class(&self, pair: Pair<Rule>) -> Result<ClassDecl, ParseError> {
        let mut decl = ClassDecl {
            name: String::new(),
            name_span: Span::default(),
            modifiers: Modifiers::default(),
            methods: Vec::new(),
        };

        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::modifier => self.apply_modifier(p, &mut decl.modifiers)?,
                Rule::class_kw => {}
                Rule::ident => {
                    decl.name_span = self.span(&p);
                    decl.name = p.as_str().to_string();
                }
                Rule::method_decl => {
                    let span = self.span(&p);
                    decl.methods.push(Spanned::new(self.parse_method(p)?, span));
                }
                other => return Err(unexpected("class part", other)),
            }
        }

        Ok(decl)
    }

    fn parse_enum(&self, pair: Pair<Rule>) -> Result<EnumDecl, ParseError> {
        let mut decl = EnumDecl {
            name: String::new(),
            name_span: Span::default(),
            members: Vec::new(),
        };

        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::modifier | Rule::enum_kw => {}
                Rule::ident => {
                    decl.name_span = self.span(&p);
                    decl.name = p.as_str().to_string();
                }
                Rule::enum_member => {
                    let mut inner = p.into_inner();
                    let name_pair = inner
                        .next()
                        .ok_or_else(|| ParseError::Missing("enum member name".into()))?;
                    let value = inner.next().map(|e| self.parse_expr(e)).transpose()?;
                    decl.members.push(EnumMember {
                        name: name_pair.as_str().to_string(),
                        name_span: self.span(&name_pair),
                        value,
                    });
                }
                other => return Err(unexpected("enum part", other)),
            }
        }

        Ok(decl)
    }

    fn parse_let(&self, pair: Pair<Rule>) -> Result<LetDecl, ParseError> {
        let mut decl = LetDecl {
            name: String::new(),
            name_span: Span::default(),
            ty: None,
            value: None,
        };

        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::modifier | Rule::let_kw => {}
                Rule::ident => {
                    decl.name_span = self.span(&p);
                    decl.name = p.as_str().to_string();
                }
                Rule::type_annot => decl.ty = Some(self.parse_type_annot(p)?),
                Rule::expr => decl.value = Some(self.parse_expr(p)?),
                other => return Err(unexpected("variable part", other)),
            }
        }

        Ok(decl)
    }

    fn parse_param(&self, pair: Pair<Rule>) -> Result<Param, ParseError> {
        let mut inner = pair.into_inner();
        let name_pair = inner
            .next()
            .ok_or_else(|| ParseError::Missing("parameter name".into()))?;
        let ty_pair = inner
            .next()
            .ok_or_else(|| ParseError::Missing("parameter type".into()))?;
        Ok(Param {
            name: name_pair.as_str().to_string(),
            name_span: self.span(&name_pair),
            ty: self.parse_type(ty_pair)?,
        })
    }

    fn parse_type_annot(&self, pair: Pair<Rule>) -> Result<TyExpr, ParseError> {
        let inner = pair
            .into_inner()
            .next()
            .ok_or_else(|| ParseError::Missing("type".into()))?;
        self.parse_type(inner)
    }

    fn parse_type(&self, pair: Pair<Rule>) -> Result<TyExpr, ParseError> {
        let span = self.span(&pair);
        let mut name = String::new();
        let mut args = Vec::new();

        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::ident => name = p.as_str().to_string(),
                Rule::type_args => {
                    for arg in p.into_inner() {
                        args.push(self.parse_type(arg)?);
                    }
                }
                other => return Err(unexpected("type", other)),
            }
        }

        Ok(TyExpr { name, args, span })
    }

    fn parse_block(&self, pair: Pair<Rule>) -> Result<Vec<Spanned<Stmt>>, ParseError> {
        pair.into_inner().map(|p| self.parse_statement(p)).collect()
    }

    fn parse_statement(&self, pair: Pair<Rule>) -> Result<Spanned<Stmt>, ParseError> {
        let span = self.span(&pair);
        let inner = pair
            .into_inner()
            .next()
            .ok_or_else(|| ParseError::Missing("statement".into()))?;

        let stmt = match inner.as_rule() {
            Rule::return_stmt => {
                let value = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::expr)
                    .map(|e| self.parse_expr(e))
                    .transpose()?;
                Stmt::Return { value }
            }
            Rule::let_decl => Stmt::Let(self.parse_let(inner)?),
            Rule::expr_stmt => {
                let expr_pair = inner
                    .into_inner()
                    .next()
                    .ok_or_else(|| ParseError::Missing("expression".into()))?;
                Stmt::Expr(self.parse_expr(expr_pair)?)
            }
            other => return Err(unexpected("statement", other)),
        };

        Ok(Spanned::new(stmt, span))
    }

    fn parse_expr(&self, pair: Pair<Rule>) -> Result<Expr, ParseError> {
        PRATT_PARSER
            .map_primary(|p| self.parse_primary(p))
            .map_prefix(|op, rhs| {
                let rhs = rhs?;
                let span = self.span(&op).merge(rhs.span);
                let unary = match op.as_rule() {
                    Rule::neg => UnaryOp::Neg,
                    Rule::not => UnaryOp::Not,
                    other => return Err(unexpected("prefix operator", other)),
                };
                Ok(Expr::new(
                    ExprKind::Unary {
                        op: unary,
                        expr: Box::new(rhs),
                    },
                    span,
                ))
            })
            .map_postfix(|lhs, op| {
                let lhs = lhs?;
                let span = lhs.span.merge(self.span(&op));
                match op.as_rule() {
                    Rule::cast => {
                        let ty_pair = op
                            .into_inner()
                            .find(|p| p.as_rule() == Rule::type_expr)
                            .ok_or_else(|| ParseError::Missing("cast target type".into()))?;
                        Ok(Expr::new(
                            ExprKind::Cast {
                                expr: Box::new(lhs),
                                ty: self.parse_type(ty_pair)?,
                            },
                            span,
                        ))
                    }
                    Rule::member => {
                        let name_pair = op
                            .into_inner()
                            .next()
                            .ok_or_else(|| ParseError::Missing("member name".into()))?;
                        Ok(Expr::new(
                            ExprKind::Member {
                                base: Box::new(lhs),
                                member: name_pair.as_str().to_string(),
                            },
                            span,
                        ))
                    }
                    Rule::call_args => {
                        let args = op
                            .into_inner()
                            .map(|p| self.parse_expr(p))
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(Expr::new(
                            ExprKind::Call {
                                callee: Box::new(lhs),
                                args,
                            },
                            span,
                        ))
                    }
                    other => Err(unexpected("postfix operator", other)),
                }
            })
            .map_infix(|lhs, op, rhs| {
                let lhs = lhs?;
                let rhs = rhs?;
                let bin = match op.as_rule() {
                    Rule::add => BinOp::Add,
                    Rule::sub => BinOp::Sub,
                    Rule::mul => BinOp::Mul,
                    Rule::div => BinOp::Div,
                    Rule::rem => BinOp::Rem,
                    Rule::bit_and => BinOp::BitAnd,
                    Rule::bit_or => BinOp::BitOr,
                    Rule::bit_xor => BinOp::BitXor,
                    Rule::shl => BinOp::Shl,
                    Rule::shr => BinOp::Shr,
                    other => return Err(unexpected("operator", other)),
                };
                let span = lhs.span.merge(rhs.span);
                Ok(Expr::new(
                    ExprKind::Binary {
                        op: bin,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    span,
                ))
            })
            .parse(pair.into_inner())
    }

    fn parse_primary(&self, pair: Pair<Rule>) -> Result<Expr, ParseError> {
        let span = self.span(&pair);
        match pair.as_rule() {
            Rule::number => Ok(Expr::new(
                ExprKind::Number {
                    text: pair.as_str().to_string(),
                },
                span,
            )),
            Rule::bool_lit => Ok(Expr::new(ExprKind::Bool(pair.as_str() == "true"), span)),
            Rule::ident => Ok(Expr::new(ExprKind::Ident(pair.as_str().to_string()), span)),
            Rule::paren_expr => {
                let inner = pair
                    .into_inner()
                    .next()
                    .ok_or_else(|| ParseError::Missing("parenthesized expression".into()))?;
                Ok(Expr::new(
                    ExprKind::Paren(Box::new(self.parse_expr(inner)?)),
                    span,
                ))
            }
            other => Err(unexpected("expression", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_function(file: &File) -> &FunctionDecl {
        match &file.items[0].node {
            Item::Function(f) => f,
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn parse_exported_function() {
        let file = parse("export function add(a: int, b: int): int { return a + b; }").unwrap();
        assert_eq!(file.items.len(), 1);

        let f = first_function(&file);
        assert_eq!(f.name, "add");
        assert!(f.modifiers.export);
        assert!(!f.modifiers.declare);
        assert_eq!(f.params.len(), 2);
        assert_eq!(f.params[1].ty.name, "int");
        assert_eq!(f.ret.as_ref().unwrap().name, "int");
        assert_eq!(f.body.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn parse_declare_without_body() {
        let file = parse("declare function log(x: double): void;").unwrap();
        let f = first_function(&file);
        assert!(f.modifiers.declare);
        assert!(f.body.is_none());
    }

    #[test]
    fn parse_class_with_methods() {
        let file = parse(
            "class Adder {
                base(): int { return 0; }
                static zero(): int { return 0; }
            }",
        )
        .unwrap();

        match &file.items[0].node {
            Item::Class(c) => {
                assert_eq!(c.name, "Adder");
                assert_eq!(c.methods.len(), 2);
                assert!(!c.methods[0].modifiers.is_static);
                assert!(c.methods[1].modifiers.is_static);
            }
            other => panic!("expected class, got {:?}", other),
        }
    }

    #[test]
    fn parse_enum_with_values() {
        let file = parse("enum E { A = 1, B = 2 }").unwrap();
        match &file.items[0].node {
            Item::Enum(e) => {
                assert_eq!(e.name, "E");
                assert_eq!(e.members.len(), 2);
                assert_eq!(e.members[0].name, "A");
                assert!(e.members[0].value.is_some());
            }
            other => panic!("expected enum, got {:?}", other),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let file = parse("function f(a: int, b: int, c: int): int { return a + b * c; }").unwrap();
        let f = first_function(&file);
        let Stmt::Return { value: Some(expr) } = &f.body.as_ref().unwrap()[0].node else {
            panic!("expected return");
        };
        let ExprKind::Binary { op, rhs, .. } = &expr.kind else {
            panic!("expected binary, got {:?}", expr.kind);
        };
        assert_eq!(*op, BinOp::Add);
        assert!(matches!(
            rhs.kind,
            ExprKind::Binary { op: BinOp::Mul, .. }
        ));
    }

    #[test]
    fn cast_is_a_postfix_operator() {
        let file = parse("function f(x: int): int { return x as byte + 1; }").unwrap();
        let f = first_function(&file);
        let Stmt::Return { value: Some(expr) } = &f.body.as_ref().unwrap()[0].node else {
            panic!("expected return");
        };
        // `as` binds tighter than `+`: (x as byte) + 1
        let ExprKind::Binary { op: BinOp::Add, lhs, .. } = &expr.kind else {
            panic!("expected addition, got {:?}", expr.kind);
        };
        match &lhs.kind {
            ExprKind::Cast { ty, .. } => assert_eq!(ty.name, "byte"),
            other => panic!("expected cast, got {:?}", other),
        }
    }

    #[test]
    fn member_access_and_literals() {
        let file = parse("function f(): int { return E.B + 0xFF; }").unwrap();
        let f = first_function(&file);
        let Stmt::Return { value: Some(expr) } = &f.body.as_ref().unwrap()[0].node else {
            panic!("expected return");
        };
        let ExprKind::Binary { lhs, rhs, .. } = &expr.kind else {
            panic!("expected binary");
        };
        assert!(matches!(lhs.kind, ExprKind::Member { .. }));
        match &rhs.kind {
            ExprKind::Number { text } => assert_eq!(text, "0xFF"),
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn pointer_type_arguments() {
        let file = parse("function f(p: Ptr<int>): uintptr { return p; }").unwrap();
        let f = first_function(&file);
        let ty = &f.params[0].ty;
        assert_eq!(ty.name, "Ptr");
        assert_eq!(ty.args.len(), 1);
        assert_eq!(ty.args[0].name, "int");
    }

    #[test]
    fn top_level_let_parses() {
        let file = parse("let answer: int = 42;").unwrap();
        match &file.items[0].node {
            Item::Let(l) => {
                assert_eq!(l.name, "answer");
                assert!(l.ty.is_some());
                assert!(l.value.is_some());
            }
            other => panic!("expected let, got {:?}", other),
        }
    }

    #[test]
    fn syntax_error_reports_location() {
        let err = parse("function {").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
    }
}
