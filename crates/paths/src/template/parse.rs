//! Template syntax tree and parser

use super::funcs::Func;
use super::lexer::{self, Segment, Token};
use super::value::Value;
use crate::error::TemplateError;

#[derive(Debug, Clone)]
pub(super) enum Node {
    Text(String),
    Action(Pipeline),
    If {
        branches: Vec<(Pipeline, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
}

/// Commands joined by `|`
#[derive(Debug, Clone)]
pub(super) struct Pipeline {
    pub commands: Vec<Command>,
}

/// A function call, or a single operand when `func` is `None`
#[derive(Debug, Clone)]
pub(super) struct Command {
    pub func: Option<Func>,
    pub args: Vec<Operand>,
}

#[derive(Debug, Clone)]
pub(super) enum Operand {
    Field(Vec<String>),
    Literal(Value),
    Sub(Pipeline),
}

/// What ended a list of nodes
enum Terminator {
    Eof,
    End(usize),
    Else(Option<Pipeline>, usize),
}

pub(super) fn parse(src: &str) -> Result<Vec<Node>, TemplateError> {
    let mut parser = Parser {
        segments: lexer::segments(src)?.into_iter(),
    };
    let (nodes, terminator) = parser.parse_list()?;
    match terminator {
        Terminator::Eof => Ok(nodes),
        Terminator::End(offset) => Err(TemplateError::parse(offset, "unexpected {{end}}")),
        Terminator::Else(_, offset) => Err(TemplateError::parse(offset, "unexpected {{else}}")),
    }
}

struct Parser {
    segments: std::vec::IntoIter<Segment>,
}

impl Parser {
    fn parse_list(&mut self) -> Result<(Vec<Node>, Terminator), TemplateError> {
        let mut nodes = Vec::new();

        while let Some(segment) = self.segments.next() {
            let (tokens, offset) = match segment {
                Segment::Text(text) => {
                    nodes.push(Node::Text(text));
                    continue;
                }
                Segment::Action { tokens, offset } => (tokens, offset),
            };

            match keyword(&tokens) {
                Some("if") => nodes.push(self.parse_if(&tokens[1..], offset)?),
                Some("else") => {
                    let condition = match tokens.get(1) {
                        None => None,
                        Some(Token::Ident(k)) if k == "if" => {
                            Some(parse_pipeline(&tokens[2..], offset)?)
                        }
                        Some(_) => {
                            return Err(TemplateError::parse(offset, "unexpected token after else"));
                        }
                    };
                    return Ok((nodes, Terminator::Else(condition, offset)));
                }
                Some("end") => {
                    if tokens.len() > 1 {
                        return Err(TemplateError::parse(offset, "unexpected token after end"));
                    }
                    return Ok((nodes, Terminator::End(offset)));
                }
                _ => nodes.push(Node::Action(parse_pipeline(&tokens, offset)?)),
            }
        }

        Ok((nodes, Terminator::Eof))
    }

    fn parse_if(&mut self, condition: &[Token], offset: usize) -> Result<Node, TemplateError> {
        let mut branches = Vec::new();
        let mut condition = parse_pipeline(condition, offset)?;

        loop {
            let (body, terminator) = self.parse_list()?;
            branches.push((condition, body));
            match terminator {
                Terminator::End(_) => {
                    return Ok(Node::If {
                        branches,
                        otherwise: Vec::new(),
                    });
                }
                Terminator::Else(Some(next), _) => condition = next,
                Terminator::Else(None, _) => {
                    let (otherwise, terminator) = self.parse_list()?;
                    return match terminator {
                        Terminator::End(_) => Ok(Node::If {
                            branches,
                            otherwise,
                        }),
                        Terminator::Else(_, at) => {
                            Err(TemplateError::parse(at, "expected end; found else"))
                        }
                        Terminator::Eof => Err(TemplateError::parse(offset, "unclosed if")),
                    };
                }
                Terminator::Eof => return Err(TemplateError::parse(offset, "unclosed if")),
            }
        }
    }
}

fn keyword(tokens: &[Token]) -> Option<&str> {
    match tokens.first() {
        Some(Token::Ident(name)) if matches!(name.as_str(), "if" | "else" | "end") => {
            Some(name.as_str())
        }
        _ => None,
    }
}

fn parse_pipeline(tokens: &[Token], offset: usize) -> Result<Pipeline, TemplateError> {
    let mut pos = 0;
    let pipeline = parse_pipe(tokens, &mut pos, offset, false)?;
    Ok(pipeline)
}

fn parse_pipe(
    tokens: &[Token],
    pos: &mut usize,
    offset: usize,
    nested: bool,
) -> Result<Pipeline, TemplateError> {
    let mut commands = Vec::new();
    loop {
        commands.push(parse_command(tokens, pos, offset)?);
        match tokens.get(*pos) {
            Some(Token::Pipe) => *pos += 1,
            Some(Token::RParen) if nested => return Ok(Pipeline { commands }),
            Some(Token::RParen) => return Err(TemplateError::parse(offset, "unexpected right paren")),
            None if nested => return Err(TemplateError::parse(offset, "unclosed left paren")),
            None => return Ok(Pipeline { commands }),
            Some(other) => {
                return Err(TemplateError::parse(offset, format!("unexpected {:?}", other)));
            }
        }
    }
}

fn parse_command(tokens: &[Token], pos: &mut usize, offset: usize) -> Result<Command, TemplateError> {
    let mut func = None;
    if let Some(Token::Ident(name)) = tokens.get(*pos) {
        func = Some(Func::lookup(name).ok_or_else(|| TemplateError::UnknownFunction(name.clone()))?);
        *pos += 1;
    }

    let mut args = Vec::new();
    loop {
        match tokens.get(*pos) {
            None | Some(Token::Pipe) | Some(Token::RParen) => break,
            Some(Token::Field(path)) => args.push(Operand::Field(path.clone())),
            Some(Token::Str(s)) => args.push(Operand::Literal(Value::Str(s.clone()))),
            Some(Token::Int(i)) => args.push(Operand::Literal(Value::Int(*i))),
            Some(Token::Bool(b)) => args.push(Operand::Literal(Value::Bool(*b))),
            Some(Token::LParen) => {
                *pos += 1;
                args.push(Operand::Sub(parse_pipe(tokens, pos, offset, true)?));
            }
            Some(Token::Ident(name)) => {
                if Func::lookup(name).is_none() {
                    return Err(TemplateError::UnknownFunction(name.clone()));
                }
                return Err(TemplateError::parse(
                    offset,
                    format!("function \"{}\" used as an argument; wrap the call in parentheses", name),
                ));
            }
        }
        *pos += 1;
    }

    if func.is_none() {
        if args.is_empty() {
            return Err(TemplateError::parse(offset, "missing value for command"));
        }
        if args.len() > 1 {
            return Err(TemplateError::parse(offset, "can't give argument to non-function"));
        }
    }

    Ok(Command { func, args })
}
