//! Parser turning the token stream into a tree of text and action nodes.

use strsim::levenshtein;

use super::FuncMap;
use super::lexer::{Keyword, Token, TokenKind};
use super::value::Value;
use crate::templating::error::TemplateError;

/// Maximum edit distance, as a percentage of the name length, for
/// "did you mean" suggestions on unknown functions.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Action {
        pipe: Pipeline,
    },
    If {
        branches: Vec<(Pipeline, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
    Range {
        pipe: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
    With {
        pipe: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pipeline {
    pub line: usize,
    /// Variables declared (`:=`) or assigned (`=`) by this pipeline.
    pub decl: Vec<String>,
    pub assign: bool,
    pub cmds: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Command {
    pub line: usize,
    pub args: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Func(String),
    Literal(Value),
    Variable { name: String, fields: Vec<String> },
    Dot { fields: Vec<String> },
    Pipeline(Box<Pipeline>),
}

/// What ended a list of nodes.
enum Terminator {
    Eof,
    End,
    Else(Option<Pipeline>),
}

pub(crate) fn parse(
    name: &str,
    tokens: Vec<Token>,
    funcs: &FuncMap,
) -> Result<Vec<Node>, TemplateError> {
    let mut parser = Parser {
        name,
        tokens,
        idx: 0,
        funcs,
    };
    let (nodes, terminator) = parser.parse_list()?;
    match terminator {
        Terminator::Eof => Ok(nodes),
        Terminator::End => parser.error("unexpected {{end}}"),
        Terminator::Else(_) => parser.error("unexpected {{else}}"),
    }
}

struct Parser<'a> {
    name: &'a str,
    tokens: Vec<Token>,
    idx: usize,
    funcs: &'a FuncMap,
}

impl Parser<'_> {
    fn peek(&self) -> &TokenKind {
        self.tokens.get(self.idx).map_or(&TokenKind::Eof, |t| &t.kind)
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        self.tokens.get(self.idx + offset).map_or(&TokenKind::Eof, |t| &t.kind)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.idx)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn next(&mut self) -> Token {
        let token = self.tokens.get(self.idx).cloned().unwrap_or(Token {
            kind: TokenKind::Eof,
            line: self.line(),
            spaced: false,
        });
        if self.idx < self.tokens.len() {
            self.idx += 1;
        }
        token
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, TemplateError> {
        Err(TemplateError::Parse {
            name: self.name.to_string(),
            line: self.line(),
            message: message.into(),
        })
    }

    fn expect_right_delim(&mut self, context: &str) -> Result<(), TemplateError> {
        match self.peek() {
            TokenKind::RightDelim => {
                self.next();
                Ok(())
            }
            other => self.error(format!("unexpected {} in {context}", describe(other))),
        }
    }

    fn parse_list(&mut self) -> Result<(Vec<Node>, Terminator), TemplateError> {
        let mut nodes = Vec::new();
        loop {
            match self.next().kind {
                TokenKind::Text(text) => nodes.push(Node::Text(text)),
                TokenKind::Eof => return Ok((nodes, Terminator::Eof)),
                TokenKind::LeftDelim => match self.peek().clone() {
                    TokenKind::Keyword(Keyword::End) => {
                        self.next();
                        self.expect_right_delim("end")?;
                        return Ok((nodes, Terminator::End));
                    }
                    TokenKind::Keyword(Keyword::Else) => {
                        self.next();
                        if matches!(self.peek(), TokenKind::Keyword(Keyword::If)) {
                            self.next();
                            let pipe = self.parse_pipeline(true, false)?;
                            return Ok((nodes, Terminator::Else(Some(pipe))));
                        }
                        self.expect_right_delim("else")?;
                        return Ok((nodes, Terminator::Else(None)));
                    }
                    TokenKind::Keyword(Keyword::If) => {
                        self.next();
                        nodes.push(self.parse_if()?);
                    }
                    TokenKind::Keyword(Keyword::Range) => {
                        self.next();
                        nodes.push(self.parse_range()?);
                    }
                    TokenKind::Keyword(Keyword::With) => {
                        self.next();
                        nodes.push(self.parse_with()?);
                    }
                    _ => {
                        let pipe = self.parse_pipeline(true, false)?;
                        nodes.push(Node::Action {
                            pipe,
                        });
                    }
                },
                other => return self.error(format!("unexpected {}", describe(&other))),
            }
        }
    }

    fn parse_if(&mut self) -> Result<Node, TemplateError> {
        let mut branches = Vec::new();
        let mut pipe = self.parse_pipeline(true, false)?;
        loop {
            let (body, terminator) = self.parse_list()?;
            branches.push((pipe, body));
            match terminator {
                Terminator::End => {
                    return Ok(Node::If {
                        branches,
                        otherwise: Vec::new(),
                    });
                }
                Terminator::Else(Some(next)) => pipe = next,
                Terminator::Else(None) => {
                    let otherwise = self.parse_closing_else("if")?;
                    return Ok(Node::If {
                        branches,
                        otherwise,
                    });
                }
                Terminator::Eof => return self.error("unexpected EOF in if"),
            }
        }
    }

    fn parse_range(&mut self) -> Result<Node, TemplateError> {
        let pipe = self.parse_pipeline(true, true)?;
        let (body, otherwise) = self.parse_block_body("range")?;
        Ok(Node::Range {
            pipe,
            body,
            otherwise,
        })
    }

    fn parse_with(&mut self) -> Result<Node, TemplateError> {
        let pipe = self.parse_pipeline(true, false)?;
        let (body, otherwise) = self.parse_block_body("with")?;
        Ok(Node::With {
            pipe,
            body,
            otherwise,
        })
    }

    fn parse_block_body(&mut self, context: &str) -> Result<(Vec<Node>, Vec<Node>), TemplateError> {
        let (body, terminator) = self.parse_list()?;
        match terminator {
            Terminator::End => Ok((body, Vec::new())),
            Terminator::Else(None) => Ok((body, self.parse_closing_else(context)?)),
            Terminator::Else(Some(_)) => self.error(format!("else if is not allowed in {context}")),
            Terminator::Eof => self.error(format!("unexpected EOF in {context}")),
        }
    }

    fn parse_closing_else(&mut self, context: &str) -> Result<Vec<Node>, TemplateError> {
        let (otherwise, terminator) = self.parse_list()?;
        match terminator {
            Terminator::End => Ok(otherwise),
            Terminator::Else(_) => self.error(format!("expected end; found else in {context}")),
            Terminator::Eof => self.error(format!("unexpected EOF in {context}")),
        }
    }

    /// Parse `[decl :=] cmd | cmd ...` up to the closing delimiter, or up to
    /// the closing parenthesis when `top_level` is false.
    fn parse_pipeline(
        &mut self,
        top_level: bool,
        allow_two_vars: bool,
    ) -> Result<Pipeline, TemplateError> {
        let line = self.line();
        let mut decl = Vec::new();
        let mut assign = false;

        if top_level && let TokenKind::Variable(first) = self.peek().clone() {
            let shape = match (self.peek_at(1), self.peek_at(2), self.peek_at(3)) {
                (TokenKind::Declare, _, _) => Some((vec![first], false, 2)),
                (TokenKind::Assign, _, _) => Some((vec![first], true, 2)),
                (TokenKind::Comma, TokenKind::Variable(second), TokenKind::Declare) => {
                    Some((vec![first, second.clone()], false, 4))
                }
                _ => None,
            };
            if let Some((names, is_assign, consumed)) = shape {
                if names.len() > 1 && !allow_two_vars {
                    return self.error("too many declarations");
                }
                decl = names;
                assign = is_assign;
                self.idx += consumed;
            }
        }

        let mut cmds = Vec::new();
        loop {
            let cmd = self.parse_command(top_level)?;
            cmds.push(cmd);
            match self.peek() {
                TokenKind::Pipe => {
                    self.next();
                }
                TokenKind::RightDelim if top_level => {
                    self.next();
                    break;
                }
                TokenKind::RightParen if !top_level => {
                    self.next();
                    break;
                }
                other => return self.error(format!("unexpected {} in operand", describe(other))),
            }
        }

        Ok(Pipeline {
            line,
            decl,
            assign,
            cmds,
        })
    }

    fn parse_command(&mut self, top_level: bool) -> Result<Command, TemplateError> {
        let line = self.line();
        let mut args = Vec::new();
        loop {
            let operand = match self.peek().clone() {
                TokenKind::Pipe | TokenKind::RightDelim | TokenKind::RightParen => break,
                TokenKind::Eof => return self.error("unclosed action"),
                TokenKind::Ident(name) => {
                    self.next();
                    self.check_function(&name)?;
                    Operand::Func(name)
                }
                TokenKind::Str(s) => {
                    self.next();
                    Operand::Literal(Value::String(s))
                }
                TokenKind::Number(text) => {
                    self.next();
                    Operand::Literal(self.parse_number(&text)?)
                }
                TokenKind::Bool(b) => {
                    self.next();
                    Operand::Literal(Value::Bool(b))
                }
                TokenKind::Nil => {
                    self.next();
                    Operand::Literal(Value::Nil)
                }
                TokenKind::Dot => {
                    self.next();
                    Operand::Dot {
                        fields: self.parse_fields(),
                    }
                }
                TokenKind::Field(first) => {
                    self.next();
                    let mut fields = vec![first];
                    fields.extend(self.parse_fields());
                    Operand::Dot {
                        fields,
                    }
                }
                TokenKind::Variable(name) => {
                    self.next();
                    Operand::Variable {
                        name,
                        fields: self.parse_fields(),
                    }
                }
                TokenKind::LeftParen => {
                    self.next();
                    Operand::Pipeline(Box::new(self.parse_pipeline(false, false)?))
                }
                other => return self.error(format!("unexpected {} in command", describe(&other))),
            };
            args.push(operand);
        }

        if args.is_empty() {
            let context = if top_level {
                "missing value for command"
            } else {
                "missing value for parenthesized pipeline"
            };
            return self.error(context);
        }
        Ok(Command {
            line,
            args,
        })
    }

    /// Collect `.Field` tokens written directly after an operand.
    fn parse_fields(&mut self) -> Vec<String> {
        let mut fields = Vec::new();
        while let Some(token) = self.tokens.get(self.idx) {
            match &token.kind {
                TokenKind::Field(name) if !token.spaced => {
                    fields.push(name.clone());
                    self.idx += 1;
                }
                _ => break,
            }
        }
        fields
    }

    fn check_function(&self, name: &str) -> Result<(), TemplateError> {
        if self.funcs.contains_key(name) {
            return Ok(());
        }
        let limit = name.len() * SIMILARITY_THRESHOLD_PERCENT / 100;
        let suggestion = self
            .funcs
            .keys()
            .map(|candidate| (candidate, levenshtein(name, candidate)))
            .filter(|(_, distance)| *distance <= limit)
            .min_by_key(|(_, distance)| *distance)
            .map(|(candidate, _)| candidate);
        match suggestion {
            Some(candidate) => self.error(format!(
                "function {name:?} not defined (did you mean {candidate:?}?)"
            )),
            None => self.error(format!("function {name:?} not defined")),
        }
    }

    fn parse_number(&self, text: &str) -> Result<Value, TemplateError> {
        let cleaned = text.replace('_', "");
        let (negative, digits) = match cleaned.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
        };

        if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
            return match i64::from_str_radix(hex, 16) {
                Ok(v) => Ok(Value::Int(if negative { -v } else { v })),
                Err(_) if !negative => u64::from_str_radix(hex, 16)
                    .map(Value::Uint)
                    .or_else(|_| self.error(format!("illegal number syntax: {text:?}"))),
                Err(_) => self.error(format!("illegal number syntax: {text:?}")),
            };
        }

        if digits.contains(['.', 'e', 'E']) {
            return cleaned
                .parse::<f64>()
                .map(Value::Float)
                .or_else(|_| self.error(format!("illegal number syntax: {text:?}")));
        }

        match cleaned.parse::<i64>() {
            Ok(v) => Ok(Value::Int(v)),
            Err(_) => digits
                .parse::<u64>()
                .ok()
                .filter(|_| !negative)
                .map(Value::Uint)
                .map_or_else(|| self.error(format!("illegal number syntax: {text:?}")), Ok),
        }
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Text(_) => "text".to_string(),
        TokenKind::LeftDelim => "left delimiter".to_string(),
        TokenKind::RightDelim => "right delimiter".to_string(),
        TokenKind::Ident(name) => format!("identifier {name:?}"),
        TokenKind::Keyword(k) => format!("keyword {k:?}").to_lowercase(),
        TokenKind::Field(name) => format!("field .{name}"),
        TokenKind::Dot => "dot".to_string(),
        TokenKind::Variable(name) => format!("variable {name}"),
        TokenKind::Str(s) => format!("string {s:?}"),
        TokenKind::Number(n) => format!("number {n}"),
        TokenKind::Bool(b) => format!("bool {b}"),
        TokenKind::Nil => "nil".to_string(),
        TokenKind::Pipe => "pipe".to_string(),
        TokenKind::LeftParen => "'('".to_string(),
        TokenKind::RightParen => "')'".to_string(),
        TokenKind::Comma => "','".to_string(),
        TokenKind::Declare => "':='".to_string(),
        TokenKind::Assign => "'='".to_string(),
        TokenKind::Eof => "EOF".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templating::engine::{Delimiters, func, lexer::lex};

    fn funcs() -> FuncMap {
        let mut funcs = FuncMap::new();
        funcs.insert("ConfigOption".to_string(), func(|_| Ok(Value::Nil)));
        funcs.insert("ToUpper".to_string(), func(|_| Ok(Value::Nil)));
        funcs
    }

    fn parse_str(text: &str) -> Result<Vec<Node>, TemplateError> {
        let tokens = lex(text, Delimiters::CURLY_REPL).unwrap();
        parse("test", tokens, &funcs())
    }

    #[test]
    fn test_pipeline_structure() {
        let nodes = parse_str(r#"{{repl ConfigOption "a" | ToUpper }}"#).unwrap();
        let Node::Action {
            pipe,
        } = &nodes[0]
        else {
            panic!("expected action, got {nodes:?}");
        };
        assert_eq!(pipe.cmds.len(), 2);
        assert_eq!(pipe.cmds[0].args[0], Operand::Func("ConfigOption".into()));
        assert_eq!(pipe.cmds[0].args[1], Operand::Literal(Value::String("a".into())));
    }

    #[test]
    fn test_unknown_function_suggests_close_match() {
        let err = parse_str(r#"{{repl Configoption "a" }}"#).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(r#"function "Configoption" not defined"#), "{msg}");
        assert!(msg.contains(r#"did you mean "ConfigOption""#), "{msg}");
    }

    #[test]
    fn test_if_else_chain() {
        let nodes =
            parse_str("{{repl if true }}a{{repl else if false }}b{{repl else }}c{{repl end }}")
                .unwrap();
        let Node::If {
            branches,
            otherwise,
        } = &nodes[0]
        else {
            panic!("expected if");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(otherwise, &vec![Node::Text("c".into())]);
    }

    #[test]
    fn test_unbalanced_blocks() {
        assert!(parse_str("{{repl if true }}a").is_err());
        assert!(parse_str("a{{repl end }}").is_err());
    }

    #[test]
    fn test_number_literals() {
        let nodes = parse_str("{{repl -7 }}{{repl 2.5 }}{{repl 0x10 }}").unwrap();
        let literals: Vec<_> = nodes
            .iter()
            .map(|n| match n {
                Node::Action {
                    pipe,
                } => pipe.cmds[0].args[0].clone(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            literals,
            vec![
                Operand::Literal(Value::Int(-7)),
                Operand::Literal(Value::Float(2.5)),
                Operand::Literal(Value::Int(16)),
            ]
        );
    }

    #[test]
    fn test_range_declarations() {
        let nodes = parse_str("{{repl range $i, $e := . }}{{repl $e }}{{repl end }}").unwrap();
        let Node::Range {
            pipe,
            ..
        } = &nodes[0]
        else {
            panic!("expected range");
        };
        assert_eq!(pipe.decl, vec!["$i".to_string(), "$e".to_string()]);
        assert!(parse_str("{{repl $i, $e := . }}").is_err());
    }
}
