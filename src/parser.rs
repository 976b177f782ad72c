//! Parse Thrift IDL source into the AST using PEST.
//!
//! One call parses one file. Includes are recorded by name but not followed; see
//! [`crate::driver::Parser`] for that.

use crate::ast::*;
use crate::error::{Error, Result, SyntaxError};
use crate::fs::clean;
use crate::options::ParseOptions;
use log::trace;
use pest::error::LineColLocation;
use pest::Parser;
use pest_derive::Parser as PestParser;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct ThriftParser;

type Pair<'i> = pest::iterators::Pair<'i, Rule>;

/// Parse one source text with default options.
pub fn parse(source: &str) -> Result<Thrift> {
    parse_with_options("<source>", source, &ParseOptions::default())
}

/// Parse one source text. `name` is used for `Thrift::filename` and in error messages.
pub fn parse_with_options(name: &str, source: &str, options: &ParseOptions) -> Result<Thrift> {
    let mut pairs = ThriftParser::parse(Rule::document, source)
        .map_err(|e| syntax_error_from_pest(name, e))?;
    let document = pairs.next().ok_or_else(|| SyntaxError {
        file: name.to_string(),
        line: 1,
        column: 1,
        message: "empty parse".to_string(),
    })?;
    let builder = Builder {
        file: name,
        options,
        comments: Comments::collect(source, &document),
    };
    let mut thrift = builder.build_document(document)?;
    thrift.filename = name.to_string();
    Ok(thrift)
}

fn syntax_error_from_pest(file: &str, err: pest::error::Error<Rule>) -> Error {
    let err = err.renamed_rules(describe_rule);
    let (line, column) = match err.line_col {
        LineColLocation::Pos(pos) => pos,
        LineColLocation::Span(start, _) => start,
    };
    SyntaxError {
        file: file.to_string(),
        line,
        column,
        message: err.variant.message().into_owned(),
    }
    .into()
}

fn describe_rule(rule: &Rule) -> String {
    match rule {
        Rule::EOI => "end of input".to_string(),
        Rule::field_type => "type".to_string(),
        Rule::struct_kind => "struct, union or exception".to_string(),
        Rule::field_req => "optional or required".to_string(),
        other => format!("{:?}", other).trim_start_matches("kw_").replace('_', " "),
    }
}

/// Every comment in one file, keyed by the byte offset where it ends.
struct Comments<'a> {
    source: &'a str,
    by_end: HashMap<usize, (usize, &'a str)>,
}

impl<'a> Comments<'a> {
    fn collect(source: &'a str, document: &Pair<'a>) -> Self {
        let by_end = document
            .clone()
            .into_inner()
            .flatten()
            .filter(|p| p.as_rule() == Rule::COMMENT)
            .map(|p| {
                let span = p.as_span();
                (span.end(), (span.start(), span.as_str()))
            })
            .collect();
        Comments { source, by_end }
    }

    /// The comments directly above `offset`, separated from it only by whitespace,
    /// joined with single spaces. A comment trailing code on its own line belongs to
    /// that code and ends the run.
    fn before(&self, offset: usize) -> String {
        let mut pieces = Vec::new();
        let mut cursor = offset;
        while let Some(&(start, raw)) = self.by_end.get(&self.source[..cursor].trim_end().len()) {
            if self.trails_code(start) {
                break;
            }
            let text = comment_text(raw);
            if !text.is_empty() {
                pieces.push(text);
            }
            cursor = start;
        }
        pieces.reverse();
        pieces.join(" ")
    }

    /// Whether the comment starting at `start` follows code on the same line.
    fn trails_code(&self, start: usize) -> bool {
        let line_start = self.source[..start].rfind('\n').map_or(0, |i| i + 1);
        let prefix = self.source[line_start..start].trim_end();
        !prefix.is_empty() && !self.by_end.contains_key(&(line_start + prefix.len()))
    }
}

fn comment_text(raw: &str) -> String {
    if let Some(body) = raw.strip_prefix("/*") {
        let body = body.strip_suffix("*/").unwrap_or(body);
        body.trim_start_matches('*').replace(['\r', '\n'], "").trim().to_string()
    } else if let Some(body) = raw.strip_prefix("//") {
        body.trim().to_string()
    } else {
        raw.strip_prefix('#').unwrap_or(raw).trim().to_string()
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[derive(Clone, Copy, PartialEq)]
enum StructKind {
    Struct,
    Union,
    Exception,
}

struct Builder<'a> {
    file: &'a str,
    options: &'a ParseOptions,
    comments: Comments<'a>,
}

impl Builder<'_> {
    fn pos(&self, pair: &Pair<'_>) -> Pos {
        if !self.options.positions {
            return Pos::default();
        }
        let (line, col) = pair.as_span().start_pos().line_col();
        Pos { line, col }
    }

    fn error(&self, pair: &Pair<'_>, message: impl Into<String>) -> Error {
        let (line, column) = pair.as_span().start_pos().line_col();
        SyntaxError {
            file: self.file.to_string(),
            line,
            column,
            message: message.into(),
        }
        .into()
    }

    fn child<'i>(&self, pair: &Pair<'i>, rule: Rule) -> Result<Pair<'i>> {
        pair.clone()
            .into_inner()
            .find(|p| p.as_rule() == rule)
            .ok_or_else(|| self.error(pair, format!("missing {}", describe_rule(&rule))))
    }

    fn trace_definition(&self, kind: &str, name: &str, pos: Pos) {
        if self.options.debug {
            trace!(file = self.file, kind = kind, name = name, line = pos.line; "Built definition");
        }
    }

    fn doc(&self, pair: &Pair<'_>) -> String {
        self.comments.before(pair.as_span().start())
    }

    fn build_document(&self, pair: Pair<'_>) -> Result<Thrift> {
        let mut thrift = Thrift::default();
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::include => self.build_include(inner, &mut thrift.includes)?,
                Rule::namespace => {
                    let (scope, value) = self.build_namespace(inner)?;
                    thrift.namespaces.insert(scope, value);
                }
                Rule::const_def => {
                    let c = self.build_const(inner)?;
                    self.trace_definition("const", &c.name, c.pos);
                    thrift.constants.insert(c.name.clone(), c);
                }
                Rule::typedef => {
                    let t = self.build_typedef(inner)?;
                    self.trace_definition("typedef", &t.alias, t.pos);
                    thrift.typedefs.insert(t.alias.clone(), t);
                }
                Rule::enum_def => {
                    let e = self.build_enum(inner)?;
                    self.trace_definition("enum", &e.name, e.pos);
                    thrift.enums.insert(e.name.clone(), e);
                }
                Rule::senum_def => {
                    let e = self.build_senum(inner)?;
                    self.trace_definition("senum", &e.name, e.pos);
                    thrift.senums.insert(e.name.clone(), e);
                }
                Rule::struct_like => {
                    let (kind, s) = self.build_struct_like(inner)?;
                    let collection = match kind {
                        StructKind::Struct => &mut thrift.structs,
                        StructKind::Union => &mut thrift.unions,
                        StructKind::Exception => &mut thrift.exceptions,
                    };
                    self.trace_definition("struct", &s.name, s.pos);
                    collection.insert(s.name.clone(), s);
                }
                Rule::template_def => {
                    let t = self.build_template(inner)?;
                    self.trace_definition("template", &t.def.name, t.def.pos);
                    thrift.templates.insert(t.def.name.clone(), t);
                }
                Rule::service => {
                    let s = self.build_service(inner)?;
                    self.trace_definition("service", &s.name, s.pos);
                    thrift.services.insert(s.name.clone(), s);
                }
                _ => {}
            }
        }
        Ok(thrift)
    }

    // ==================== Headers ====================

    fn build_include(&self, pair: Pair<'_>, includes: &mut HashMap<String, PathBuf>) -> Result<()> {
        let literal = self.child(&pair, Rule::string_literal)?;
        let path = PathBuf::from(self.build_string(&literal)?);
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| self.error(&literal, "include path has no file name"))?;
        if let Some(first) = includes.get(&name) {
            if clean(first) != clean(&path) {
                return Err(Error::IncludeConflict {
                    name,
                    first: first.clone(),
                    second: path,
                });
            }
        }
        includes.entry(name).or_insert(path);
        Ok(())
    }

    fn build_namespace(&self, pair: Pair<'_>) -> Result<(String, String)> {
        let scope = self.child(&pair, Rule::namespace_scope)?;
        let value = self.child(&pair, Rule::namespace_value)?;
        Ok((scope.as_str().to_string(), value.as_str().to_string()))
    }

    // ==================== Definitions ====================

    fn build_const(&self, pair: Pair<'_>) -> Result<Constant> {
        let pos = self.pos(&pair);
        let comment = self.doc(&pair);
        let ty = self.build_type(self.child(&pair, Rule::field_type)?)?;
        let name = self.child(&pair, Rule::identifier)?.as_str().to_string();
        let value = self.build_const_value(self.child(&pair, Rule::const_value)?, Some(&ty))?;
        Ok(Constant {
            pos,
            comment,
            name,
            ty,
            value,
        })
    }

    fn build_typedef(&self, pair: Pair<'_>) -> Result<Typedef> {
        let mut typedef = Typedef {
            pos: self.pos(&pair),
            comment: self.doc(&pair),
            ..Default::default()
        };
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::field_type => typedef.ty = self.build_type(inner)?,
                Rule::identifier => typedef.alias = inner.as_str().to_string(),
                Rule::annotations => typedef.annotations = self.build_annotations(inner)?,
                _ => {}
            }
        }
        Ok(typedef)
    }

    fn build_enum(&self, pair: Pair<'_>) -> Result<Enum> {
        let mut e = Enum {
            pos: self.pos(&pair),
            comment: self.doc(&pair),
            ..Default::default()
        };
        let mut next_value = 0i64;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::identifier => e.name = inner.as_str().to_string(),
                Rule::enum_value => {
                    let value = self.build_enum_value(inner, next_value)?;
                    next_value = value.value.wrapping_add(1);
                    e.values.insert(value.name.clone(), value);
                }
                Rule::annotations => e.annotations = self.build_annotations(inner)?,
                _ => {}
            }
        }
        Ok(e)
    }

    fn build_enum_value(&self, pair: Pair<'_>, implicit: i64) -> Result<EnumValue> {
        let mut value = EnumValue {
            pos: self.pos(&pair),
            comment: self.doc(&pair),
            value: implicit,
            ..Default::default()
        };
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::identifier => value.name = inner.as_str().to_string(),
                Rule::int_constant => value.value = self.build_int(&inner)?,
                Rule::annotations => value.annotations = self.build_annotations(inner)?,
                _ => {}
            }
        }
        Ok(value)
    }

    fn build_senum(&self, pair: Pair<'_>) -> Result<SEnum> {
        let mut e = SEnum {
            pos: self.pos(&pair),
            comment: self.doc(&pair),
            ..Default::default()
        };
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::identifier => e.name = inner.as_str().to_string(),
                Rule::senum_value => {
                    let value = self.build_senum_value(inner)?;
                    e.values.insert(value.value.clone(), value);
                }
                Rule::annotations => e.annotations = self.build_annotations(inner)?,
                _ => {}
            }
        }
        Ok(e)
    }

    fn build_senum_value(&self, pair: Pair<'_>) -> Result<SEnumValue> {
        let mut value = SEnumValue {
            pos: self.pos(&pair),
            comment: self.doc(&pair),
            ..Default::default()
        };
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::identifier => value.value = inner.as_str().to_string(),
                Rule::string_literal => value.value = self.build_string(&inner)?,
                Rule::annotations => value.annotations = self.build_annotations(inner)?,
                _ => {}
            }
        }
        Ok(value)
    }

    fn build_struct_like(&self, pair: Pair<'_>) -> Result<(StructKind, Struct)> {
        let mut kind = StructKind::Struct;
        let mut s = Struct {
            pos: self.pos(&pair),
            comment: self.doc(&pair),
            ..Default::default()
        };
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::struct_kind => {
                    kind = match inner.as_str() {
                        "union" => StructKind::Union,
                        "exception" => StructKind::Exception,
                        _ => StructKind::Struct,
                    }
                }
                Rule::identifier => s.name = inner.as_str().to_string(),
                Rule::field => s.fields.push(self.build_field(inner)?),
                Rule::annotations => s.annotations = self.build_annotations(inner)?,
                _ => {}
            }
        }
        // Union members are never required.
        if kind == StructKind::Union {
            for field in &mut s.fields {
                field.optional = true;
            }
        }
        Ok((kind, s))
    }

    fn build_template(&self, pair: Pair<'_>) -> Result<TemplateDef> {
        let mut template = TemplateDef {
            def: Struct {
                pos: self.pos(&pair),
                comment: self.doc(&pair),
                ..Default::default()
            },
            type_params: Vec::new(),
        };
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::identifier => template.def.name = inner.as_str().to_string(),
                Rule::type_params => {
                    template.type_params = inner
                        .into_inner()
                        .filter(|p| p.as_rule() == Rule::identifier)
                        .map(|p| p.as_str().to_string())
                        .collect();
                }
                Rule::field => template.def.fields.push(self.build_field(inner)?),
                Rule::annotations => template.def.annotations = self.build_annotations(inner)?,
                _ => {}
            }
        }
        Ok(template)
    }

    fn build_service(&self, pair: Pair<'_>) -> Result<Service> {
        let mut service = Service {
            pos: self.pos(&pair),
            comment: self.doc(&pair),
            ..Default::default()
        };
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::identifier => service.name = inner.as_str().to_string(),
                Rule::extends => {
                    let base = self.child(&inner, Rule::identifier)?;
                    service.extends = Some(base.as_str().to_string());
                }
                Rule::method => {
                    let method = self.build_method(inner)?;
                    service.methods.insert(method.name.clone(), method);
                }
                Rule::annotations => service.annotations = self.build_annotations(inner)?,
                _ => {}
            }
        }
        Ok(service)
    }

    fn build_method(&self, pair: Pair<'_>) -> Result<Method> {
        let mut method = Method {
            pos: self.pos(&pair),
            comment: self.doc(&pair),
            ..Default::default()
        };
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::kw_oneway => method.oneway = true,
                Rule::function_type => {
                    method.return_type = match inner.clone().into_inner().find(|p| p.as_rule() == Rule::field_type) {
                        Some(ty) => Some(self.build_type(ty)?),
                        None => None,
                    };
                }
                Rule::identifier => method.name = inner.as_str().to_string(),
                Rule::arguments => method.arguments = self.build_fields(inner)?,
                Rule::throws => {
                    method.exceptions = self.build_fields(inner)?;
                    for field in &mut method.exceptions {
                        field.optional = true;
                    }
                }
                Rule::annotations => method.annotations = self.build_annotations(inner)?,
                _ => {}
            }
        }
        Ok(method)
    }

    // ==================== Fields and types ====================

    fn build_fields(&self, pair: Pair<'_>) -> Result<Vec<Field>> {
        let mut fields = Vec::new();
        for inner in pair.into_inner() {
            if inner.as_rule() == Rule::field {
                fields.push(self.build_field(inner)?);
            }
        }
        Ok(fields)
    }

    fn build_field(&self, pair: Pair<'_>) -> Result<Field> {
        let mut field = Field {
            pos: self.pos(&pair),
            comment: self.doc(&pair),
            ..Default::default()
        };
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::field_id => {
                    let id = self.build_int(&inner)?;
                    field.id = i32::try_from(id)
                        .map_err(|_| self.error(&inner, format!("field id {} out of range", id)))?;
                }
                Rule::field_req => field.optional = inner.as_str() == "optional",
                Rule::field_type => field.ty = self.build_type(inner)?,
                Rule::identifier => field.name = inner.as_str().to_string(),
                Rule::const_value => field.default = Some(self.build_const_value(inner, Some(&field.ty))?),
                Rule::annotations => field.annotations = self.build_annotations(inner)?,
                _ => {}
            }
        }
        Ok(field)
    }

    fn build_type(&self, pair: Pair<'_>) -> Result<Type> {
        let pos = self.pos(&pair);
        let mut ty = None;
        let mut annotations = Vec::new();
        for inner in pair.clone().into_inner() {
            match inner.as_rule() {
                Rule::identifier => ty = Some(Type::named(inner.as_str())),
                Rule::map_type => {
                    let mut args = self.build_type_args(&inner)?.into_iter();
                    match (args.next(), args.next()) {
                        (Some(key), Some(value)) => ty = Some(Type::map(key, value)),
                        _ => return Err(self.error(&inner, "map needs key and value types")),
                    }
                }
                Rule::list_type | Rule::set_type => {
                    let value = self
                        .build_type_args(&inner)?
                        .into_iter()
                        .next()
                        .ok_or_else(|| self.error(&inner, "missing element type"))?;
                    ty = Some(if inner.as_rule() == Rule::list_type {
                        Type::list(value)
                    } else {
                        Type::set(value)
                    });
                }
                Rule::template_ref => {
                    let template = self.child(&inner, Rule::identifier)?.as_str().to_string();
                    ty = Some(Type::instance(template, self.build_type_args(&inner)?));
                }
                Rule::annotations => annotations = self.build_annotations(inner)?,
                _ => {}
            }
        }
        let mut ty = ty.ok_or_else(|| self.error(&pair, "missing type"))?;
        ty.pos = pos;
        ty.annotations = annotations;
        Ok(ty)
    }

    fn build_type_args(&self, pair: &Pair<'_>) -> Result<Vec<Type>> {
        pair.clone()
            .into_inner()
            .filter(|p| p.as_rule() == Rule::field_type)
            .map(|p| self.build_type(p))
            .collect()
    }

    fn build_annotations(&self, pair: Pair<'_>) -> Result<Vec<Annotation>> {
        pair.into_inner()
            .filter(|p| p.as_rule() == Rule::annotation)
            .map(|p| -> Result<Annotation> {
                Ok(Annotation {
                    pos: self.pos(&p),
                    name: self.child(&p, Rule::identifier)?.as_str().to_string(),
                    value: self.build_string(&self.child(&p, Rule::string_literal)?)?,
                })
            })
            .collect()
    }

    // ==================== Literals ====================

    /// `hint` is the declared type, used to tell `set` constants from `list` ones.
    fn build_const_value(&self, pair: Pair<'_>, hint: Option<&Type>) -> Result<ConstValue> {
        let inner = pair
            .clone()
            .into_inner()
            .find(|p| p.as_rule() != Rule::COMMENT)
            .ok_or_else(|| self.error(&pair, "empty constant value"))?;
        match inner.as_rule() {
            Rule::int_constant => Ok(ConstValue::Int(self.build_int(&inner)?)),
            Rule::double_constant => inner
                .as_str()
                .parse::<f64>()
                .map(ConstValue::Double)
                .map_err(|e| self.error(&inner, format!("invalid double {:?}: {}", inner.as_str(), e))),
            Rule::string_literal => Ok(ConstValue::String(self.build_string(&inner)?)),
            Rule::identifier => Ok(match inner.as_str() {
                "true" => ConstValue::Bool(true),
                "false" => ConstValue::Bool(false),
                other => ConstValue::Identifier(other.to_string()),
            }),
            Rule::const_list => {
                let element = hint.and_then(|t| t.value_type.as_deref());
                let values = inner
                    .into_inner()
                    .filter(|p| p.as_rule() == Rule::const_value)
                    .map(|p| self.build_const_value(p, element))
                    .collect::<Result<Vec<_>>>()?;
                if hint.is_some_and(|t| t.name == "set") {
                    Ok(ConstValue::Set(values))
                } else {
                    Ok(ConstValue::List(values))
                }
            }
            Rule::const_map => {
                let key_hint = hint.and_then(|t| t.key_type.as_deref());
                let value_hint = hint.and_then(|t| t.value_type.as_deref());
                let mut entries = Vec::new();
                for entry in inner.into_inner().filter(|p| p.as_rule() == Rule::const_map_entry) {
                    let mut parts = entry.clone().into_inner().filter(|p| p.as_rule() == Rule::const_value);
                    match (parts.next(), parts.next()) {
                        (Some(key), Some(value)) => entries.push(KeyValue {
                            key: self.build_const_value(key, key_hint)?,
                            value: self.build_const_value(value, value_hint)?,
                        }),
                        _ => return Err(self.error(&entry, "map entry needs key and value")),
                    }
                }
                Ok(ConstValue::Map(entries))
            }
            other => Err(self.error(&inner, format!("unexpected {} in constant", describe_rule(&other)))),
        }
    }

    fn build_int(&self, pair: &Pair<'_>) -> Result<i64> {
        let text = pair.as_str();
        let (negative, digits) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };
        let invalid = |e: &dyn std::fmt::Display| self.error(pair, format!("invalid integer {:?}: {}", text, e));
        match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
            Some(hex) => {
                let magnitude = u64::from_str_radix(hex, 16).map_err(|e| invalid(&e))?;
                let value = if negative {
                    -i128::from(magnitude)
                } else {
                    i128::from(magnitude)
                };
                i64::try_from(value).map_err(|e| invalid(&e))
            }
            None => text.parse::<i64>().map_err(|e| invalid(&e)),
        }
    }

    fn build_string(&self, pair: &Pair<'_>) -> Result<String> {
        let chars = pair
            .clone()
            .into_inner()
            .next()
            .ok_or_else(|| self.error(pair, "malformed string literal"))?;
        Ok(unescape(chars.as_str()))
    }
}
