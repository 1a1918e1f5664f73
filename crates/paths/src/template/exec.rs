//! Template evaluation

use super::parse::{Command, Node, Operand, Pipeline};
use super::value::Value;
use crate::error::TemplateError;

pub(super) fn render(
    nodes: &[Node],
    context: &serde_json::Value,
    out: &mut String,
) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Action(pipeline) => eval_pipeline(pipeline, context)?.print_to(out),
            Node::If {
                branches,
                otherwise,
            } => {
                let mut taken = false;
                for (condition, body) in branches {
                    if eval_pipeline(condition, context)?.is_truthy() {
                        render(body, context, out)?;
                        taken = true;
                        break;
                    }
                }
                if !taken {
                    render(otherwise, context, out)?;
                }
            }
        }
    }
    Ok(())
}

fn eval_pipeline(pipeline: &Pipeline, context: &serde_json::Value) -> Result<Value, TemplateError> {
    let mut piped = None;
    for command in &pipeline.commands {
        piped = Some(eval_command(command, context, piped)?);
    }
    Ok(piped.unwrap_or(Value::Missing))
}

fn eval_command(
    command: &Command,
    context: &serde_json::Value,
    piped: Option<Value>,
) -> Result<Value, TemplateError> {
    match command.func {
        Some(func) => {
            let mut args = command
                .args
                .iter()
                .map(|arg| eval_operand(arg, context))
                .collect::<Result<Vec<_>, _>>()?;
            args.extend(piped);
            func.call(args)
        }
        None => {
            if piped.is_some() {
                return Err(TemplateError::render("can't give argument to non-function"));
            }
            match command.args.first() {
                Some(operand) => eval_operand(operand, context),
                None => Err(TemplateError::render("missing value for command")),
            }
        }
    }
}

fn eval_operand(operand: &Operand, context: &serde_json::Value) -> Result<Value, TemplateError> {
    match operand {
        Operand::Literal(value) => Ok(value.clone()),
        Operand::Sub(pipeline) => eval_pipeline(pipeline, context),
        Operand::Field(path) => lookup(context, path),
    }
}

fn lookup(context: &serde_json::Value, path: &[String]) -> Result<Value, TemplateError> {
    let mut current = context;
    for key in path {
        current = match current {
            serde_json::Value::Object(map) => match map.get(key) {
                Some(next) => next,
                None => return Ok(Value::Missing),
            },
            serde_json::Value::Null => return Ok(Value::Missing),
            other => {
                return Err(TemplateError::render(format!(
                    "can't evaluate field {} in type {}",
                    key,
                    Value::from(other).kind()
                )));
            }
        };
    }
    Ok(Value::from(current))
}
