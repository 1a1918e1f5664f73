//! Template function library

use super::value::Value;
use crate::error::TemplateError;
use crate::escape;
use regex::Regex;

/// Functions callable from templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Func {
    Escape,
    EscapeTagged,
    Unescape,
    Split,
    Index,
    Replace,
    ReplaceRegex,
    Lower,
    Upper,
    TrimPrefix,
    TrimSuffix,
    Eq,
    Ne,
    Not,
    And,
    Or,
    Default,
}

impl Func {
    pub fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "escape" => Self::Escape,
            "escapeTagged" => Self::EscapeTagged,
            "unescape" => Self::Unescape,
            "split" => Self::Split,
            "index" => Self::Index,
            "replace" => Self::Replace,
            "replaceRegex" => Self::ReplaceRegex,
            "lower" => Self::Lower,
            "upper" => Self::Upper,
            "trimPrefix" => Self::TrimPrefix,
            "trimSuffix" => Self::TrimSuffix,
            "eq" => Self::Eq,
            "ne" => Self::Ne,
            "not" => Self::Not,
            "and" => Self::And,
            "or" => Self::Or,
            "default" => Self::Default,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Escape => "escape",
            Self::EscapeTagged => "escapeTagged",
            Self::Unescape => "unescape",
            Self::Split => "split",
            Self::Index => "index",
            Self::Replace => "replace",
            Self::ReplaceRegex => "replaceRegex",
            Self::Lower => "lower",
            Self::Upper => "upper",
            Self::TrimPrefix => "trimPrefix",
            Self::TrimSuffix => "trimSuffix",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Not => "not",
            Self::And => "and",
            Self::Or => "or",
            Self::Default => "default",
        }
    }

    /// Call the function; a piped value has already been appended to `args`
    pub fn call(self, args: Vec<Value>) -> Result<Value, TemplateError> {
        let name = self.name();
        match self {
            Self::Escape => {
                arity(name, &args, 1)?;
                Ok(Value::Str(escape::escape(args[0].as_str_arg(name, 0)?)))
            }
            Self::EscapeTagged => {
                arity(name, &args, 1)?;
                Ok(Value::Str(escape::escape_tagged(args[0].as_str_arg(name, 0)?)))
            }
            Self::Unescape => {
                arity(name, &args, 1)?;
                Ok(Value::Str(escape::unescape(args[0].as_str_arg(name, 0)?)))
            }
            Self::Split => {
                arity(name, &args, 2)?;
                let input = args[0].as_str_arg(name, 0)?;
                let sep = args[1].as_str_arg(name, 1)?;
                Ok(Value::List(split(input, sep)))
            }
            Self::Index => index(args),
            Self::Replace => {
                arity(name, &args, 3)?;
                let input = args[0].as_str_arg(name, 0)?;
                let from = args[1].as_str_arg(name, 1)?;
                let to = args[2].as_str_arg(name, 2)?;
                Ok(Value::Str(input.replace(from, to)))
            }
            Self::ReplaceRegex => {
                arity(name, &args, 3)?;
                let input = args[0].as_str_arg(name, 0)?;
                let pattern = args[1].as_str_arg(name, 1)?;
                let replacement = args[2].as_str_arg(name, 2)?;
                let re = Regex::new(pattern)
                    .map_err(|e| TemplateError::render(format!("{}: {}", name, e)))?;
                Ok(Value::Str(re.replace_all(input, replacement).into_owned()))
            }
            Self::Lower => {
                arity(name, &args, 1)?;
                Ok(Value::Str(args[0].as_str_arg(name, 0)?.to_lowercase()))
            }
            Self::Upper => {
                arity(name, &args, 1)?;
                Ok(Value::Str(args[0].as_str_arg(name, 0)?.to_uppercase()))
            }
            Self::TrimPrefix => {
                arity(name, &args, 2)?;
                let input = args[0].as_str_arg(name, 0)?;
                let prefix = args[1].as_str_arg(name, 1)?;
                Ok(Value::Str(input.strip_prefix(prefix).unwrap_or(input).to_string()))
            }
            Self::TrimSuffix => {
                arity(name, &args, 2)?;
                let input = args[0].as_str_arg(name, 0)?;
                let suffix = args[1].as_str_arg(name, 1)?;
                Ok(Value::Str(input.strip_suffix(suffix).unwrap_or(input).to_string()))
            }
            Self::Eq => {
                min_arity(name, &args, 2)?;
                let first = &args[0];
                for other in &args[1..] {
                    if equal(first, other)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            Self::Ne => {
                arity(name, &args, 2)?;
                Ok(Value::Bool(!equal(&args[0], &args[1])?))
            }
            Self::Not => {
                arity(name, &args, 1)?;
                Ok(Value::Bool(!args[0].is_truthy()))
            }
            Self::And => {
                min_arity(name, &args, 1)?;
                let mut last = Value::Missing;
                for arg in args {
                    if !arg.is_truthy() {
                        return Ok(arg);
                    }
                    last = arg;
                }
                Ok(last)
            }
            Self::Or => {
                min_arity(name, &args, 1)?;
                let mut last = Value::Missing;
                for arg in args {
                    if arg.is_truthy() {
                        return Ok(arg);
                    }
                    last = arg;
                }
                Ok(last)
            }
            Self::Default => {
                arity(name, &args, 2)?;
                let mut args = args.into_iter();
                let fallback = args.next().unwrap_or(Value::Missing);
                let given = args.next().unwrap_or(Value::Missing);
                Ok(if given.is_truthy() { given } else { fallback })
            }
        }
    }
}

fn arity(name: &str, args: &[Value], want: usize) -> Result<(), TemplateError> {
    if args.len() != want {
        return Err(TemplateError::render(format!(
            "wrong number of args for {}: want {} got {}",
            name,
            want,
            args.len()
        )));
    }
    Ok(())
}

fn min_arity(name: &str, args: &[Value], min: usize) -> Result<(), TemplateError> {
    if args.len() < min {
        return Err(TemplateError::render(format!(
            "wrong number of args for {}: want at least {} got {}",
            name,
            min,
            args.len()
        )));
    }
    Ok(())
}

fn split(input: &str, sep: &str) -> Vec<Value> {
    if sep.is_empty() {
        return input.chars().map(|c| Value::Str(c.to_string())).collect();
    }
    input.split(sep).map(Value::from).collect()
}

fn index(args: Vec<Value>) -> Result<Value, TemplateError> {
    let mut args = args.into_iter();
    let mut current = args
        .next()
        .ok_or_else(|| TemplateError::render("index of untyped nil"))?;

    for key in args {
        current = match (&current, &key) {
            (Value::List(items), Value::Int(i)) => {
                let item = usize::try_from(*i).ok().and_then(|i| items.get(i));
                match item {
                    Some(item) => item.clone(),
                    None => {
                        return Err(TemplateError::render(format!(
                            "index out of range: {}",
                            i
                        )));
                    }
                }
            }
            (Value::Map(map), Value::Str(k)) => {
                map.get(k).map(Value::from).unwrap_or(Value::Missing)
            }
            (Value::Missing | Value::Null, _) => {
                return Err(TemplateError::render("index of untyped nil"));
            }
            (container, key) => {
                return Err(TemplateError::render(format!(
                    "can't index item of type {} with {}",
                    container.kind(),
                    key.kind()
                )));
            }
        };
    }

    Ok(current)
}

fn equal(a: &Value, b: &Value) -> Result<bool, TemplateError> {
    Ok(match (a, b) {
        (Value::Missing | Value::Null, Value::Missing | Value::Null) => true,
        (Value::Missing | Value::Null, _) | (_, Value::Missing | Value::Null) => false,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => (*x as f64) == *y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::List(_) | Value::Map(_), _) | (_, Value::List(_) | Value::Map(_)) => {
            return Err(TemplateError::render(format!(
                "non-comparable types {} and {}",
                a.kind(),
                b.kind()
            )));
        }
        _ => {
            return Err(TemplateError::render(format!(
                "incompatible types for comparison: {} and {}",
                a.kind(),
                b.kind()
            )));
        }
    })
}
