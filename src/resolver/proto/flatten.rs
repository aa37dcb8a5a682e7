//! Import inlining and qualified-name rewriting
//!
//! Flattening makes a subject file behave as if every locally referenced
//! file had been pasted into it: type references are rewritten to the bare
//! declared names, the referenced files' top-level declarations are appended
//! after the subject's own types, and the matching import statements are
//! dropped. Transitive imports are followed depth-first, each file inlined
//! once, so a chain subject -> A -> B yields one file ordered subject, A, B.

use std::collections::{BTreeMap, HashSet};

use super::ast::{Field, Message, MessageEntry, ProtoError, ProtoFile, TypeDecl, TypeRef};

/// Flatten a subject file against its locally referenced files, keyed by
/// import path as it appears in `import` statements.
pub fn flatten(
    mut subject: ProtoFile,
    local: &BTreeMap<String, ProtoFile>,
) -> Result<ProtoFile, ProtoError> {
    let mut inliner = Inliner {
        local,
        inlined: HashSet::new(),
        appended: Vec::new(),
    };

    inliner.rewrite_against_imports(&mut subject)?;
    let import_order: Vec<String> = subject
        .imports
        .iter()
        .filter(|i| local.contains_key(&i.path))
        .map(|i| i.path.clone())
        .collect();
    subject.imports.retain(|i| !local.contains_key(&i.path));
    for path in import_order {
        inliner.inline(&path)?;
    }

    subject.types.extend(inliner.appended);
    check_collisions(&subject)?;
    Ok(subject)
}

struct Inliner<'a> {
    local: &'a BTreeMap<String, ProtoFile>,
    inlined: HashSet<String>,
    appended: Vec<TypeDecl>,
}

impl<'a> Inliner<'a> {
    /// Rewrite a file's type references against every local import it
    /// declares. Each import is a separate pass checking all of that file's
    /// top-level names, so an import declaring both a message and an enum
    /// has references to either rewritten together.
    fn rewrite_against_imports(&self, file: &mut ProtoFile) -> Result<(), ProtoError> {
        let current_package = file.package.clone();
        for import in &file.imports {
            let Some(imported) = self.local.get(&import.path) else {
                continue;
            };
            let rewriter = Rewriter::new(
                current_package.as_deref(),
                imported.package.as_deref(),
                imported.top_level_names(),
            );
            for decl in &mut file.types {
                if let TypeDecl::Message(message) = decl {
                    rewriter.rewrite_message(message);
                }
            }
        }
        Ok(())
    }

    /// Inline one imported file: rewrite its own references, append its
    /// top-level declarations, then follow its imports depth-first.
    fn inline(&mut self, path: &str) -> Result<(), ProtoError> {
        if !self.inlined.insert(path.to_string()) {
            return Ok(());
        }
        let Some(file) = self.local.get(path) else {
            return Ok(());
        };
        let mut file = file.clone();
        self.rewrite_against_imports(&mut file)?;
        self.appended.extend(file.types);
        for import in &file.imports {
            if self.local.contains_key(&import.path) {
                self.inline(&import.path)?;
            }
        }
        Ok(())
    }
}

/// Rewrites references to one imported file's top-level types
struct Rewriter<'a> {
    current_package: Option<&'a str>,
    imported_package: Option<&'a str>,
    imported_names: Vec<String>,
}

impl<'a> Rewriter<'a> {
    fn new(
        current_package: Option<&'a str>,
        imported_package: Option<&'a str>,
        imported_names: Vec<String>,
    ) -> Self {
        Self {
            current_package,
            imported_package,
            imported_names,
        }
    }

    fn rewrite_message(&self, message: &mut Message) {
        for entry in &mut message.entries {
            match entry {
                MessageEntry::Field(field) => self.rewrite_field(field),
                MessageEntry::OneOf(oneof) => {
                    for field in &mut oneof.fields {
                        self.rewrite_field(field);
                    }
                }
                MessageEntry::Message(nested) => self.rewrite_message(nested),
                MessageEntry::Enum(_) | MessageEntry::Option(_) | MessageEntry::Reserved(_) => {}
            }
        }
    }

    fn rewrite_field(&self, field: &mut Field) {
        match &mut field.type_ref {
            TypeRef::Named(name) => {
                if let Some(rewritten) = self.rewrite_name(name) {
                    *name = rewritten;
                }
            }
            TypeRef::Map { value, .. } => {
                if let Some(rewritten) = self.rewrite_name(value) {
                    *value = rewritten;
                }
            }
        }
    }

    /// Resolve a type reference against the imported names.
    ///
    /// Spellings are tried most specific first: `.pkg.Type`, `pkg.Type`,
    /// the package path with leading segments dropped progressively, then
    /// the bare name. A reference to a nested type keeps its dotted suffix;
    /// only the resolvable prefix is replaced.
    fn rewrite_name(&self, reference: &str) -> Option<String> {
        for candidate in self.spellings() {
            for name in &self.imported_names {
                let spelled = candidate.apply(name);
                if reference == spelled {
                    return Some(name.clone());
                }
                if let Some(suffix) = reference.strip_prefix(&format!("{}.", spelled)) {
                    return Some(format!("{}.{}", name, suffix));
                }
            }
        }
        None
    }

    fn spellings(&self) -> Vec<Spelling> {
        let mut spellings = Vec::new();
        match self.imported_package {
            Some(package) => {
                spellings.push(Spelling::Qualified {
                    prefix: format!(".{}", package),
                });
                spellings.push(Spelling::Qualified {
                    prefix: package.to_string(),
                });
                // relative spellings: leading package segments shared with
                // the current package may be dropped one at a time, e.g.
                // from package a.b referencing a.b.c.Type both c.Type and
                // the bare Type are valid
                let segments: Vec<&str> = package.split('.').collect();
                let current: Vec<&str> = self
                    .current_package
                    .map(|p| p.split('.').collect())
                    .unwrap_or_default();
                for dropped in 1..segments.len() {
                    if dropped > current.len() || segments[..dropped] != current[..dropped] {
                        break;
                    }
                    spellings.push(Spelling::Qualified {
                        prefix: segments[dropped..].join("."),
                    });
                }
            }
            None => {
                spellings.push(Spelling::Qualified {
                    prefix: String::new(),
                });
            }
        }
        spellings.push(Spelling::Bare);
        spellings
    }

}

enum Spelling {
    /// `<prefix>.Name`; an empty prefix spells `.Name`
    Qualified { prefix: String },
    /// `Name` alone
    Bare,
}

impl Spelling {
    fn apply(&self, name: &str) -> String {
        match self {
            Spelling::Qualified { prefix } => format!("{}.{}", prefix, name),
            Spelling::Bare => name.to_string(),
        }
    }
}

/// Two locally referenced files declaring the same top-level type name would
/// silently shadow each other after inlining; fail instead.
fn check_collisions(file: &ProtoFile) -> Result<(), ProtoError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for decl in &file.types {
        if !seen.insert(decl.name()) {
            return Err(ProtoError {
                line: 0,
                message: format!(
                    "duplicate top-level type '{}' after inlining local references",
                    decl.name()
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::proto::ast::{self, FieldLabel};

    fn parse(source: &str) -> ProtoFile {
        ast::parse(source).unwrap()
    }

    fn locals(entries: &[(&str, &str)]) -> BTreeMap<String, ProtoFile> {
        entries
            .iter()
            .map(|(name, source)| (name.to_string(), parse(source)))
            .collect()
    }

    fn field_type(file: &ProtoFile, message: &str, field: &str) -> String {
        for decl in &file.types {
            let TypeDecl::Message(m) = decl else { continue };
            if m.name != message {
                continue;
            }
            for entry in &m.entries {
                match entry {
                    MessageEntry::Field(f) if f.name == field => match &f.type_ref {
                        TypeRef::Named(n) => return n.clone(),
                        TypeRef::Map { value, .. } => return value.clone(),
                    },
                    MessageEntry::OneOf(oneof) => {
                        for f in &oneof.fields {
                            if f.name == field {
                                if let TypeRef::Named(n) = &f.type_ref {
                                    return n.clone();
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        panic!("field {}.{} not found", message, field);
    }

    const ADDRESS: &str = r#"
        syntax = "proto3";
        package com.example.address;

        message Address {
            string city = 1;
            AddressType kind = 2;
        }

        enum AddressType {
            HOME = 0;
            WORK = 1;
        }
    "#;

    #[test]
    fn test_fully_qualified_reference_rewritten() {
        let subject = parse(
            r#"
            syntax = "proto3";
            package com.example.user;
            import "Address.proto";
            message User {
                .com.example.address.Address home = 1;
            }
            "#,
        );
        let flat = flatten(subject, &locals(&[("Address.proto", ADDRESS)])).unwrap();
        assert_eq!(field_type(&flat, "User", "home"), "Address");
        assert!(flat.imports.is_empty());
    }

    #[test]
    fn test_package_relative_and_bare_spellings_rewritten() {
        let subject = parse(
            r#"
            syntax = "proto3";
            package com.example;
            import "Address.proto";
            message User {
                address.Address near = 1;
                com.example.address.Address far = 2;
                Address bare = 3;
            }
            "#,
        );
        let flat = flatten(subject, &locals(&[("Address.proto", ADDRESS)])).unwrap();
        assert_eq!(field_type(&flat, "User", "near"), "Address");
        assert_eq!(field_type(&flat, "User", "far"), "Address");
        assert_eq!(field_type(&flat, "User", "bare"), "Address");
    }

    #[test]
    fn test_all_field_positions_rewritten() {
        let subject = parse(
            r#"
            syntax = "proto3";
            package com.example.user;
            import "Address.proto";
            message User {
                repeated com.example.address.Address addresses = 1;
                optional com.example.address.Address previous = 2;
                map<string, com.example.address.Address> by_label = 3;
                oneof location {
                    com.example.address.Address home = 4;
                    string unknown = 5;
                }
            }
            "#,
        );
        let flat = flatten(subject, &locals(&[("Address.proto", ADDRESS)])).unwrap();
        assert_eq!(field_type(&flat, "User", "addresses"), "Address");
        assert_eq!(field_type(&flat, "User", "previous"), "Address");
        assert_eq!(field_type(&flat, "User", "by_label"), "Address");
        assert_eq!(field_type(&flat, "User", "home"), "Address");

        // labels survive rewriting
        let TypeDecl::Message(user) = &flat.types[0] else {
            panic!("expected message");
        };
        let MessageEntry::Field(addresses) = &user.entries[0] else {
            panic!("expected field");
        };
        assert_eq!(addresses.label, FieldLabel::Repeated);
    }

    #[test]
    fn test_multi_type_import_rewrites_every_name() {
        let subject = parse(
            r#"
            syntax = "proto3";
            package com.example.user;
            import "Address.proto";
            message User {
                com.example.address.Address home = 1;
                com.example.address.AddressType kind = 2;
            }
            "#,
        );
        let flat = flatten(subject, &locals(&[("Address.proto", ADDRESS)])).unwrap();
        assert_eq!(field_type(&flat, "User", "home"), "Address");
        assert_eq!(field_type(&flat, "User", "kind"), "AddressType");
    }

    #[test]
    fn test_nested_type_reference_keeps_suffix() {
        let address = r#"
            syntax = "proto3";
            package com.example.address;
            message Address {
                string city = 1;
                enum AddressType {
                    HOME = 0;
                }
            }
        "#;
        let subject = parse(
            r#"
            syntax = "proto3";
            package com.example.user;
            import "Address.proto";
            message User {
                com.example.address.Address.AddressType kind = 1;
            }
            "#,
        );
        let flat = flatten(subject, &locals(&[("Address.proto", address)])).unwrap();
        assert_eq!(field_type(&flat, "User", "kind"), "Address.AddressType");
    }

    #[test]
    fn test_transitive_chain_flattens_in_encounter_order() {
        let street = r#"
            syntax = "proto3";
            package com.example.street;
            message Street {
                string name = 1;
            }
        "#;
        let address = r#"
            syntax = "proto3";
            package com.example.address;
            import "Street.proto";
            message Address {
                com.example.street.Street street = 1;
            }
        "#;
        let subject = parse(
            r#"
            syntax = "proto3";
            package com.example.user;
            import "Address.proto";
            message User {
                com.example.address.Address home = 1;
            }
            "#,
        );
        let flat = flatten(
            subject,
            &locals(&[("Address.proto", address), ("Street.proto", street)]),
        )
        .unwrap();

        let names: Vec<&str> = flat.types.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["User", "Address", "Street"]);
        assert!(flat.imports.is_empty());
        assert_eq!(field_type(&flat, "User", "home"), "Address");
        assert_eq!(field_type(&flat, "Address", "street"), "Street");
    }

    #[test]
    fn test_unrelated_import_is_preserved() {
        let subject = parse(
            r#"
            syntax = "proto3";
            import "google/protobuf/timestamp.proto";
            import "Address.proto";
            message User {
                Address home = 1;
                google.protobuf.Timestamp created = 2;
            }
            "#,
        );
        let flat = flatten(subject, &locals(&[("Address.proto", ADDRESS)])).unwrap();
        assert_eq!(flat.imports.len(), 1);
        assert_eq!(flat.imports[0].path, "google/protobuf/timestamp.proto");
        assert_eq!(
            field_type(&flat, "User", "created"),
            "google.protobuf.Timestamp"
        );
    }

    #[test]
    fn test_colliding_top_level_names_are_an_error() {
        let first = r#"
            syntax = "proto3";
            message Shared { string a = 1; }
        "#;
        let second = r#"
            syntax = "proto3";
            message Shared { string b = 1; }
        "#;
        let subject = parse(
            r#"
            syntax = "proto3";
            import "First.proto";
            import "Second.proto";
            message User {
                Shared one = 1;
            }
            "#,
        );
        let result = flatten(
            subject,
            &locals(&[("First.proto", first), ("Second.proto", second)]),
        );
        assert!(result.is_err());
    }
}
