//! Tree-walking executor for parsed templates.

use super::FuncMap;
use super::parser::{Command, Node, Operand, Pipeline};
use super::value::Value;
use crate::templating::error::TemplateError;

pub(crate) fn execute(
    name: &str,
    nodes: &[Node],
    funcs: &FuncMap,
    data: &Value,
) -> Result<String, TemplateError> {
    let mut state = State {
        name,
        funcs,
        root: data,
        vars: Vec::new(),
        out: String::new(),
    };
    state.walk(nodes, data)?;
    Ok(state.out)
}

struct State<'a> {
    name: &'a str,
    funcs: &'a FuncMap,
    root: &'a Value,
    /// Variable stack; blocks truncate back to their starting height on exit.
    vars: Vec<(String, Value)>,
    out: String,
}

impl State<'_> {
    fn error<T>(&self, line: usize, message: impl Into<String>) -> Result<T, TemplateError> {
        Err(TemplateError::Exec {
            name: self.name.to_string(),
            line,
            message: message.into(),
        })
    }

    fn walk(&mut self, nodes: &[Node], dot: &Value) -> Result<(), TemplateError> {
        for node in nodes {
            match node {
                Node::Text(text) => self.out.push_str(text),
                Node::Action {
                    pipe,
                } => {
                    let value = self.eval_pipeline(pipe, dot)?;
                    if pipe.decl.is_empty() {
                        self.print(&value, pipe.line)?;
                    }
                }
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let mark = self.vars.len();
                    let mut taken = false;
                    for (pipe, body) in branches {
                        if self.eval_pipeline(pipe, dot)?.is_truthy() {
                            self.walk(body, dot)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        self.walk(otherwise, dot)?;
                    }
                    self.vars.truncate(mark);
                }
                Node::With {
                    pipe,
                    body,
                    otherwise,
                } => {
                    let mark = self.vars.len();
                    let value = self.eval_pipeline(pipe, dot)?;
                    if value.is_truthy() {
                        self.walk(body, &value)?;
                    } else {
                        self.walk(otherwise, dot)?;
                    }
                    self.vars.truncate(mark);
                }
                Node::Range {
                    pipe,
                    body,
                    otherwise,
                } => self.walk_range(pipe, body, otherwise, dot)?,
            }
        }
        Ok(())
    }

    fn walk_range(
        &mut self,
        pipe: &Pipeline,
        body: &[Node],
        otherwise: &[Node],
        dot: &Value,
    ) -> Result<(), TemplateError> {
        let mark = self.vars.len();
        let value = self.eval_commands(&pipe.cmds, dot)?;
        // Integer ranges are walked lazily; only lists and maps are materialised.
        let items: Box<dyn Iterator<Item = (Value, Value)>> = match value {
            Value::List(items) => Box::new(
                items.into_iter().enumerate().map(|(i, v)| (Value::Int(i as i64), v)),
            ),
            Value::Map(map) => Box::new(map.into_iter().map(|(k, v)| (Value::String(k), v))),
            Value::Int(n) if n >= 0 => Box::new((0..n).map(|i| (Value::Int(i), Value::Int(i)))),
            Value::Uint(n) => Box::new((0..n).map(|i| (Value::Uint(i), Value::Uint(i)))),
            Value::Nil => Box::new(std::iter::empty()),
            other => {
                return self.error(
                    pipe.line,
                    format!("range can't iterate over {}", other.type_name()),
                );
            }
        };

        let mut items = items.peekable();
        if items.peek().is_none() {
            self.walk(otherwise, dot)?;
        }
        for (index, element) in items {
            let iteration = self.vars.len();
            match pipe.decl.as_slice() {
                [elem] => self.vars.push((elem.clone(), element.clone())),
                [idx, elem] => {
                    self.vars.push((idx.clone(), index));
                    self.vars.push((elem.clone(), element.clone()));
                }
                _ => {}
            }
            self.walk(body, &element)?;
            self.vars.truncate(iteration);
        }
        self.vars.truncate(mark);
        Ok(())
    }

    fn print(&mut self, value: &Value, line: usize) -> Result<(), TemplateError> {
        use std::fmt::Write;
        write!(self.out, "{value}").or_else(|e| self.error(line, e.to_string()))
    }

    fn eval_pipeline(&mut self, pipe: &Pipeline, dot: &Value) -> Result<Value, TemplateError> {
        let value = self.eval_commands(&pipe.cmds, dot)?;
        for var in &pipe.decl {
            if pipe.assign {
                match self.vars.iter_mut().rev().find(|(name, _)| name == var) {
                    Some(slot) => slot.1 = value.clone(),
                    None => return self.error(pipe.line, format!("undefined variable: {var}")),
                }
            } else {
                self.vars.push((var.clone(), value.clone()));
            }
        }
        Ok(value)
    }

    fn eval_commands(&mut self, cmds: &[Command], dot: &Value) -> Result<Value, TemplateError> {
        let mut piped: Option<Value> = None;
        for cmd in cmds {
            piped = Some(self.eval_command(cmd, dot, piped)?);
        }
        Ok(piped.unwrap_or_default())
    }

    fn eval_command(
        &mut self,
        cmd: &Command,
        dot: &Value,
        piped: Option<Value>,
    ) -> Result<Value, TemplateError> {
        let Some((first, rest)) = cmd.args.split_first() else {
            return self.error(cmd.line, "empty command");
        };
        match first {
            Operand::Func(name) => {
                let mut args = Vec::with_capacity(rest.len() + 1);
                for arg in rest {
                    args.push(self.eval_operand(arg, dot, cmd.line)?);
                }
                args.extend(piped);
                self.call(name, &args, cmd.line)
            }
            operand => {
                if !rest.is_empty() || piped.is_some() {
                    return self.error(cmd.line, "can't give argument to non-function");
                }
                self.eval_operand(operand, dot, cmd.line)
            }
        }
    }

    fn eval_operand(
        &mut self,
        operand: &Operand,
        dot: &Value,
        line: usize,
    ) -> Result<Value, TemplateError> {
        match operand {
            Operand::Func(name) => self.call(name, &[], line),
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Dot {
                fields,
            } => Ok(walk_fields(dot.clone(), fields)),
            Operand::Variable {
                name,
                fields,
            } => {
                let base = if name == "$" {
                    self.root.clone()
                } else {
                    match self.vars.iter().rev().find(|(n, _)| n == name) {
                        Some((_, value)) => value.clone(),
                        None => return self.error(line, format!("undefined variable: {name}")),
                    }
                };
                Ok(walk_fields(base, fields))
            }
            Operand::Pipeline(pipe) => self.eval_pipeline(pipe, dot),
        }
    }

    fn call(&mut self, name: &str, args: &[Value], line: usize) -> Result<Value, TemplateError> {
        let Some(function) = self.funcs.get(name) else {
            return self.error(line, format!("function {name:?} not defined"));
        };
        function(args).map_err(|e| TemplateError::Call {
            name: self.name.to_string(),
            line,
            function: name.to_string(),
            message: e.to_string(),
        })
    }
}

fn walk_fields(mut value: Value, fields: &[String]) -> Value {
    for field in fields {
        value = value.field(field);
    }
    value
}
