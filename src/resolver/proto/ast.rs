//! Minimal .proto model: lexer, recursive-descent parser and pretty printer
//!
//! This covers the subset flattening needs: `syntax`, `package`, `import`,
//! file/message/enum options, messages with scalar/named/`map` fields,
//! `optional`/`repeated`/`required` labels, `oneof` groups, nested messages
//! and enums, and `reserved` statements. Option values and reserved ranges
//! are carried as raw token text; they are re-emitted, never interpreted.

use std::fmt::Write;

use thiserror::Error;

/// Parse failure, with the line it occurred on
#[derive(Error, Debug)]
#[error("line {line}: {message}")]
pub struct ProtoError {
    pub line: usize,
    pub message: String,
}

impl ProtoError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// A parsed .proto file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoFile {
    pub syntax: Option<String>,
    pub package: Option<String>,
    pub imports: Vec<Import>,
    pub options: Vec<ProtoOption>,
    pub types: Vec<TypeDecl>,
}

impl ProtoFile {
    /// Names of the top-level messages and enums declared in this file
    pub fn top_level_names(&self) -> Vec<String> {
        self.types.iter().map(|t| t.name().to_string()).collect()
    }
}

/// An import statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// `public` or `weak`, when present
    pub modifier: Option<String>,
    /// Import path as written, e.g. `"Address.proto"`
    pub path: String,
}

/// An option statement, value kept as raw token text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoOption {
    pub name: String,
    pub value: String,
}

/// A top-level or nested type declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDecl {
    Message(Message),
    Enum(EnumDecl),
}

impl TypeDecl {
    pub fn name(&self) -> &str {
        match self {
            TypeDecl::Message(m) => &m.name,
            TypeDecl::Enum(e) => &e.name,
        }
    }
}

/// A message declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub name: String,
    pub entries: Vec<MessageEntry>,
}

/// One entry inside a message body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageEntry {
    Field(Field),
    OneOf(OneOf),
    Message(Message),
    Enum(EnumDecl),
    Option(ProtoOption),
    Reserved(String),
}

/// A field label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLabel {
    None,
    Optional,
    Repeated,
    Required,
}

/// A field's type position
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// Scalar or (possibly dotted, possibly leading-dot) named type
    Named(String),
    /// `map<key, value>`; only the value position may name a message/enum
    Map { key: String, value: String },
}

/// A message field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub label: FieldLabel,
    pub type_ref: TypeRef,
    pub name: String,
    pub number: u32,
    /// Raw `[...]` option text, brackets included
    pub options: Option<String>,
}

/// A oneof group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneOf {
    pub name: String,
    pub options: Vec<ProtoOption>,
    pub fields: Vec<Field>,
}

/// An enum declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDecl {
    pub name: String,
    pub entries: Vec<EnumEntry>,
}

/// One entry inside an enum body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumEntry {
    Value {
        name: String,
        number: i64,
        options: Option<String>,
    },
    Option(ProtoOption),
    Reserved(String),
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Number(String),
    Str(String),
    Punct(char),
}

impl Token {
    /// Source-like rendering, used when carrying raw option/reserved text
    fn render(&self) -> String {
        match self {
            Token::Ident(s) | Token::Number(s) => s.clone(),
            Token::Str(s) => format!("\"{}\"", s),
            Token::Punct(c) => c.to_string(),
        }
    }
}

fn lex(input: &str) -> Result<Vec<(Token, usize)>, ProtoError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1;

    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            line += 1;
            i += 1;
        } else if c.is_whitespace() {
            i += 1;
        } else if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            loop {
                if i + 1 >= chars.len() {
                    return Err(ProtoError::new(line, "unterminated block comment"));
                }
                if chars[i] == '*' && chars[i + 1] == '/' {
                    i += 2;
                    break;
                }
                if chars[i] == '\n' {
                    line += 1;
                }
                i += 1;
            }
        } else if c == '"' || c == '\'' {
            let quote = c;
            i += 1;
            let mut value = String::new();
            loop {
                if i >= chars.len() {
                    return Err(ProtoError::new(line, "unterminated string literal"));
                }
                if chars[i] == quote {
                    i += 1;
                    break;
                }
                if chars[i] == '\\' && i + 1 < chars.len() {
                    value.push(chars[i]);
                    value.push(chars[i + 1]);
                    i += 2;
                    continue;
                }
                value.push(chars[i]);
                i += 1;
            }
            tokens.push((Token::Str(value), line));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push((Token::Ident(chars[start..i].iter().collect()), line));
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                i += 1;
            }
            tokens.push((Token::Number(chars[start..i].iter().collect()), line));
        } else {
            tokens.push((Token::Punct(c), line));
            i += 1;
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos.min(self.tokens.len().saturating_sub(1)))
            .map(|(_, l)| *l)
            .unwrap_or(0)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> ProtoError {
        ProtoError::new(self.line(), message)
    }

    fn expect_punct(&mut self, expected: char) -> Result<(), ProtoError> {
        match self.advance() {
            Some(Token::Punct(c)) if c == expected => Ok(()),
            other => Err(self.error(format!("expected '{}', got {:?}", expected, other))),
        }
    }

    fn expect_ident(&mut self) -> Result<String, ProtoError> {
        match self.advance() {
            Some(Token::Ident(s)) => Ok(s),
            other => Err(self.error(format!("expected identifier, got {:?}", other))),
        }
    }

    fn expect_string(&mut self) -> Result<String, ProtoError> {
        match self.advance() {
            Some(Token::Str(s)) => Ok(s),
            other => Err(self.error(format!("expected string literal, got {:?}", other))),
        }
    }

    fn at_punct(&self, c: char) -> bool {
        matches!(self.peek(), Some(Token::Punct(p)) if *p == c)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s == keyword)
    }

    /// `['.'] ident ('.' ident)*`
    fn parse_type_name(&mut self) -> Result<String, ProtoError> {
        let mut name = String::new();
        if self.at_punct('.') {
            self.advance();
            name.push('.');
        }
        name.push_str(&self.expect_ident()?);
        while self.at_punct('.') {
            self.advance();
            name.push('.');
            name.push_str(&self.expect_ident()?);
        }
        Ok(name)
    }

    /// Collect raw token text up to (but not including) `;`
    fn raw_until_semicolon(&mut self) -> Result<String, ProtoError> {
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unexpected end of input, expected ';'")),
                Some(Token::Punct(';')) => {
                    self.advance();
                    return Ok(out);
                }
                Some(_) => {
                    let token = self.advance().ok_or_else(|| self.error("end of input"))?;
                    append_raw(&mut out, &token.render());
                }
            }
        }
    }

    /// Collect a raw `[...]` group, tracking bracket and brace nesting
    fn raw_bracket_group(&mut self) -> Result<String, ProtoError> {
        self.expect_punct('[')?;
        let mut out = String::from("[");
        let mut depth = 1usize;
        loop {
            let token = match self.advance() {
                Some(t) => t,
                None => return Err(self.error("unterminated '[' group")),
            };
            match &token {
                Token::Punct('[') | Token::Punct('{') => depth += 1,
                Token::Punct(']') | Token::Punct('}') => {
                    depth -= 1;
                    if depth == 0 {
                        out.push(']');
                        return Ok(out);
                    }
                }
                _ => {}
            }
            append_raw(&mut out, &token.render());
        }
    }

    /// `option <name> = <value> ;` with the leading `option` already consumed
    fn parse_option(&mut self) -> Result<ProtoOption, ProtoError> {
        let mut name = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unexpected end of input in option")),
                Some(Token::Punct('=')) => {
                    self.advance();
                    break;
                }
                Some(_) => {
                    let token = self.advance().ok_or_else(|| self.error("end of input"))?;
                    append_raw(&mut name, &token.render());
                }
            }
        }
        let value = self.raw_until_semicolon()?;
        Ok(ProtoOption { name, value })
    }

    fn parse_field_tail(
        &mut self,
        label: FieldLabel,
        type_ref: TypeRef,
    ) -> Result<Field, ProtoError> {
        let name = self.expect_ident()?;
        self.expect_punct('=')?;
        let number = match self.advance() {
            Some(Token::Number(n)) => n
                .parse::<u32>()
                .map_err(|_| self.error(format!("invalid field number '{}'", n)))?,
            other => return Err(self.error(format!("expected field number, got {:?}", other))),
        };
        let options = if self.at_punct('[') {
            Some(self.raw_bracket_group()?)
        } else {
            None
        };
        self.expect_punct(';')?;
        Ok(Field {
            label,
            type_ref,
            name,
            number,
            options,
        })
    }

    fn parse_field(&mut self) -> Result<Field, ProtoError> {
        let label = if self.at_keyword("optional") {
            self.advance();
            FieldLabel::Optional
        } else if self.at_keyword("repeated") {
            self.advance();
            FieldLabel::Repeated
        } else if self.at_keyword("required") {
            self.advance();
            FieldLabel::Required
        } else {
            FieldLabel::None
        };

        if self.at_keyword("map") {
            self.advance();
            self.expect_punct('<')?;
            let key = self.expect_ident()?;
            self.expect_punct(',')?;
            let value = self.parse_type_name()?;
            self.expect_punct('>')?;
            return self.parse_field_tail(label, TypeRef::Map { key, value });
        }

        let type_name = self.parse_type_name()?;
        self.parse_field_tail(label, TypeRef::Named(type_name))
    }

    fn parse_oneof(&mut self) -> Result<OneOf, ProtoError> {
        let name = self.expect_ident()?;
        self.expect_punct('{')?;
        let mut options = Vec::new();
        let mut fields = Vec::new();
        loop {
            if self.at_punct('}') {
                self.advance();
                return Ok(OneOf {
                    name,
                    options,
                    fields,
                });
            }
            if self.at_punct(';') {
                self.advance();
                continue;
            }
            if self.at_keyword("option") {
                self.advance();
                options.push(self.parse_option()?);
                continue;
            }
            fields.push(self.parse_field()?);
        }
    }

    fn parse_message(&mut self) -> Result<Message, ProtoError> {
        let name = self.expect_ident()?;
        self.expect_punct('{')?;
        let mut entries = Vec::new();
        loop {
            if self.at_punct('}') {
                self.advance();
                return Ok(Message { name, entries });
            }
            if self.at_punct(';') {
                self.advance();
                continue;
            }
            if self.at_keyword("message") {
                self.advance();
                entries.push(MessageEntry::Message(self.parse_message()?));
            } else if self.at_keyword("enum") {
                self.advance();
                entries.push(MessageEntry::Enum(self.parse_enum()?));
            } else if self.at_keyword("oneof") {
                self.advance();
                entries.push(MessageEntry::OneOf(self.parse_oneof()?));
            } else if self.at_keyword("option") {
                self.advance();
                entries.push(MessageEntry::Option(self.parse_option()?));
            } else if self.at_keyword("reserved") {
                self.advance();
                entries.push(MessageEntry::Reserved(self.raw_until_semicolon()?));
            } else if self.at_keyword("extend") || self.at_keyword("extensions") || self.at_keyword("group") {
                return Err(self.error("extend/extensions/group declarations are not supported"));
            } else if self.peek().is_none() {
                return Err(self.error("unexpected end of input in message body"));
            } else {
                entries.push(MessageEntry::Field(self.parse_field()?));
            }
        }
    }

    fn parse_enum(&mut self) -> Result<EnumDecl, ProtoError> {
        let name = self.expect_ident()?;
        self.expect_punct('{')?;
        let mut entries = Vec::new();
        loop {
            if self.at_punct('}') {
                self.advance();
                return Ok(EnumDecl { name, entries });
            }
            if self.at_punct(';') {
                self.advance();
                continue;
            }
            if self.at_keyword("option") {
                self.advance();
                entries.push(EnumEntry::Option(self.parse_option()?));
                continue;
            }
            if self.at_keyword("reserved") {
                self.advance();
                entries.push(EnumEntry::Reserved(self.raw_until_semicolon()?));
                continue;
            }
            if self.peek().is_none() {
                return Err(self.error("unexpected end of input in enum body"));
            }
            let value_name = self.expect_ident()?;
            self.expect_punct('=')?;
            let negative = if self.at_punct('-') {
                self.advance();
                true
            } else {
                false
            };
            let number = match self.advance() {
                Some(Token::Number(n)) => {
                    let parsed = n
                        .parse::<i64>()
                        .map_err(|_| self.error(format!("invalid enum number '{}'", n)))?;
                    if negative {
                        -parsed
                    } else {
                        parsed
                    }
                }
                other => return Err(self.error(format!("expected enum number, got {:?}", other))),
            };
            let options = if self.at_punct('[') {
                Some(self.raw_bracket_group()?)
            } else {
                None
            };
            self.expect_punct(';')?;
            entries.push(EnumEntry::Value {
                name: value_name,
                number,
                options,
            });
        }
    }

    fn parse_file(&mut self) -> Result<ProtoFile, ProtoError> {
        let mut file = ProtoFile {
            syntax: None,
            package: None,
            imports: Vec::new(),
            options: Vec::new(),
            types: Vec::new(),
        };

        while self.pos < self.tokens.len() {
            let token = self.tokens[self.pos].0.clone();
            match token {
                Token::Punct(';') => {
                    self.advance();
                }
                Token::Ident(keyword) => match keyword.as_str() {
                    "syntax" => {
                        self.advance();
                        self.expect_punct('=')?;
                        file.syntax = Some(self.expect_string()?);
                        self.expect_punct(';')?;
                    }
                    "package" => {
                        self.advance();
                        file.package = Some(self.parse_type_name()?);
                        self.expect_punct(';')?;
                    }
                    "import" => {
                        self.advance();
                        let modifier = if self.at_keyword("public") || self.at_keyword("weak") {
                            Some(self.expect_ident()?)
                        } else {
                            None
                        };
                        let path = self.expect_string()?;
                        self.expect_punct(';')?;
                        file.imports.push(Import { modifier, path });
                    }
                    "option" => {
                        self.advance();
                        file.options.push(self.parse_option()?);
                    }
                    "message" => {
                        self.advance();
                        file.types.push(TypeDecl::Message(self.parse_message()?));
                    }
                    "enum" => {
                        self.advance();
                        file.types.push(TypeDecl::Enum(self.parse_enum()?));
                    }
                    other => {
                        return Err(self.error(format!("unexpected top-level keyword '{}'", other)))
                    }
                },
                other => return Err(self.error(format!("unexpected token {:?}", other))),
            }
        }

        Ok(file)
    }
}

/// Append a rendered token to raw text with lightweight spacing rules
fn append_raw(out: &mut String, token: &str) {
    let no_space_before = matches!(token, "," | ";" | ")" | "]" | ">" | ".");
    let no_space_after_prev = out.ends_with(['(', '[', '<', '.']);
    if !out.is_empty() && !no_space_before && !no_space_after_prev {
        out.push(' ');
    }
    out.push_str(token);
}

/// Parse .proto source into the minimal model
pub fn parse(input: &str) -> Result<ProtoFile, ProtoError> {
    let tokens = lex(input)?;
    Parser { tokens, pos: 0 }.parse_file()
}

// ---------------------------------------------------------------------------
// Pretty printer
// ---------------------------------------------------------------------------

/// Re-emit a file in canonical form: two-space indent, one blank line
/// between top-level sections and declarations.
pub fn print(file: &ProtoFile) -> String {
    let mut out = String::new();

    if let Some(syntax) = &file.syntax {
        let _ = writeln!(out, "syntax = \"{}\";", syntax);
        out.push('\n');
    }
    if let Some(package) = &file.package {
        let _ = writeln!(out, "package {};", package);
        out.push('\n');
    }
    if !file.imports.is_empty() {
        for import in &file.imports {
            match &import.modifier {
                Some(modifier) => {
                    let _ = writeln!(out, "import {} \"{}\";", modifier, import.path);
                }
                None => {
                    let _ = writeln!(out, "import \"{}\";", import.path);
                }
            }
        }
        out.push('\n');
    }
    if !file.options.is_empty() {
        for option in &file.options {
            let _ = writeln!(out, "option {} = {};", option.name, option.value);
        }
        out.push('\n');
    }

    for (index, decl) in file.types.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        match decl {
            TypeDecl::Message(m) => print_message(&mut out, m, 0),
            TypeDecl::Enum(e) => print_enum(&mut out, e, 0),
        }
    }

    out
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

fn print_field(out: &mut String, field: &Field, level: usize) {
    indent(out, level);
    match field.label {
        FieldLabel::None => {}
        FieldLabel::Optional => out.push_str("optional "),
        FieldLabel::Repeated => out.push_str("repeated "),
        FieldLabel::Required => out.push_str("required "),
    }
    match &field.type_ref {
        TypeRef::Named(name) => out.push_str(name),
        TypeRef::Map { key, value } => {
            let _ = write!(out, "map<{}, {}>", key, value);
        }
    }
    let _ = write!(out, " {} = {}", field.name, field.number);
    if let Some(options) = &field.options {
        let _ = write!(out, " {}", options);
    }
    out.push_str(";\n");
}

fn print_message(out: &mut String, message: &Message, level: usize) {
    indent(out, level);
    let _ = writeln!(out, "message {} {{", message.name);
    for entry in &message.entries {
        match entry {
            MessageEntry::Field(field) => print_field(out, field, level + 1),
            MessageEntry::OneOf(oneof) => {
                indent(out, level + 1);
                let _ = writeln!(out, "oneof {} {{", oneof.name);
                for option in &oneof.options {
                    indent(out, level + 2);
                    let _ = writeln!(out, "option {} = {};", option.name, option.value);
                }
                for field in &oneof.fields {
                    print_field(out, field, level + 2);
                }
                indent(out, level + 1);
                out.push_str("}\n");
            }
            MessageEntry::Message(nested) => print_message(out, nested, level + 1),
            MessageEntry::Enum(nested) => print_enum(out, nested, level + 1),
            MessageEntry::Option(option) => {
                indent(out, level + 1);
                let _ = writeln!(out, "option {} = {};", option.name, option.value);
            }
            MessageEntry::Reserved(raw) => {
                indent(out, level + 1);
                let _ = writeln!(out, "reserved {};", raw);
            }
        }
    }
    indent(out, level);
    out.push_str("}\n");
}

fn print_enum(out: &mut String, decl: &EnumDecl, level: usize) {
    indent(out, level);
    let _ = writeln!(out, "enum {} {{", decl.name);
    for entry in &decl.entries {
        match entry {
            EnumEntry::Value {
                name,
                number,
                options,
            } => {
                indent(out, level + 1);
                match options {
                    Some(opts) => {
                        let _ = writeln!(out, "{} = {} {};", name, number, opts);
                    }
                    None => {
                        let _ = writeln!(out, "{} = {};", name, number);
                    }
                }
            }
            EnumEntry::Option(option) => {
                indent(out, level + 1);
                let _ = writeln!(out, "option {} = {};", option.name, option.value);
            }
            EnumEntry::Reserved(raw) => {
                indent(out, level + 1);
                let _ = writeln!(out, "reserved {};", raw);
            }
        }
    }
    indent(out, level);
    out.push_str("}\n");
}
