//! Parser unit tests.

use crate::ast::{Arena, ImportTarget, Value};
use crate::foundation::{DefKind, SortDir};
use crate::lexer::tokenize;
use crate::parser::{parse_schema, ParsedSchema};

fn parse(source: &str) -> (Arena, ParsedSchema) {
    let tokens = tokenize(source).expect("lexing failed");
    let mut arena = Arena::new();
    let parsed = parse_schema(&tokens, 0, &mut arena).expect("parsing failed");
    (arena, parsed)
}

fn parse_err(source: &str) -> String {
    let tokens = tokenize(source).expect("lexing failed");
    let mut arena = Arena::new();
    parse_schema(&tokens, 0, &mut arena)
        .expect_err("parse should fail")
        .message
}

#[test]
fn minimal_schema() {
    let (arena, parsed) = parse("schema app.core { }");
    assert_eq!(parsed.package, "app.core");
    assert_eq!(arena.def(parsed.root).name, "core");
    assert_eq!(arena.def(parsed.root).package.as_deref(), Some("app.core"));
    assert!(parsed.imports.is_empty());
}

#[test]
fn imports_with_and_without_alias() {
    let (_, parsed) = parse(
        r#"schema app.main {
            use venus;
            require app.core as core;
            use "https://www.example.com/schemas/ext.yasdl" as ext;
        }"#,
    );
    assert_eq!(parsed.imports.len(), 3);
    assert_eq!(
        parsed.imports[0].target,
        ImportTarget::Package("venus".into())
    );
    assert!(!parsed.imports[0].required);
    assert_eq!(parsed.imports[0].visible_name(), "venus");
    assert!(parsed.imports[1].required);
    assert_eq!(parsed.imports[1].visible_name(), "core");
    assert!(matches!(parsed.imports[2].target, ImportTarget::Uri(_)));
}

#[test]
fn imports_must_precede_definitions() {
    let msg = parse_err("schema a { field f; use venus; }");
    assert!(msg.contains("precede"));
}

#[test]
fn field_with_colon_and_arrow_sugar() {
    let (arena, parsed) = parse(
        r#"schema app.core {
            fieldset invoice {
                field issuer : reference -> person { notnull true; }
            }
        }"#,
    );
    let invoice = arena.static_child(parsed.root, "invoice").unwrap();
    let issuer = arena.static_child(invoice, "issuer").unwrap();
    assert_eq!(arena.def(issuer).kind, DefKind::Field);

    let ancestors = arena.property_child(issuer, "ancestors").unwrap();
    let anc_name = arena.def(ancestors).args[0].value.as_name().unwrap();
    assert_eq!(anc_name.dotted(), "reference");

    let references = arena.property_child(issuer, "references").unwrap();
    let ref_name = arena.def(references).args[0].value.as_name().unwrap();
    assert_eq!(ref_name.dotted(), "person");

    let notnull = arena.property_child(issuer, "notnull").unwrap();
    assert_eq!(arena.def(notnull).args[0].value, Value::Bool(true));
}

#[test]
fn universal_reference_arrow() {
    let (arena, parsed) = parse(
        r#"schema app.core {
            fieldset audit { field target -> any; }
        }"#,
    );
    let audit = arena.static_child(parsed.root, "audit").unwrap();
    let target = arena.static_child(audit, "target").unwrap();
    let references = arena.property_child(target, "references").unwrap();
    assert_eq!(arena.def(references).args[0].value, Value::Any);
}

#[test]
fn imp_name_and_absolute_name() {
    let (arena, parsed) = parse(
        r#"schema app.core {
            field firstname : =name { implements schema.name; }
        }"#,
    );
    let firstname = arena.static_child(parsed.root, "firstname").unwrap();
    let ancestors = arena.property_child(firstname, "ancestors").unwrap();
    let anc = arena.def(ancestors).args[0].value.as_name().unwrap();
    assert!(anc.imp);
    assert!(!anc.absolute);

    let implements = arena.property_child(firstname, "implements").unwrap();
    let imp = arena.def(implements).args[0].value.as_name().unwrap();
    assert!(imp.absolute);
    assert_eq!(imp.dotted(), "name");
}

#[test]
fn multiple_ancestors_after_colon() {
    let (arena, parsed) = parse("schema a { fieldset c : x =y.z w; }");
    let c = arena.static_child(parsed.root, "c").unwrap();
    let ancestors = arena.property_child(c, "ancestors").unwrap();
    let args = &arena.def(ancestors).args;
    assert_eq!(args.len(), 3);
    assert_eq!(args[0].value.as_name().unwrap().dotted(), "x");
    assert!(args[1].value.as_name().unwrap().imp);
    assert_eq!(args[1].value.as_name().unwrap().dotted(), "y.z");
    assert_eq!(args[2].value.as_name().unwrap().dotted(), "w");
}

#[test]
fn index_with_sorted_fields_and_deletion() {
    let (arena, parsed) = parse(
        r#"schema app.core {
            fieldset person {
                field code;
                field name;
                delete title;
                index idx_code { fields +code -name; unique true; }
            }
        }"#,
    );
    let person = arena.static_child(parsed.root, "person").unwrap();

    let deletion = arena
        .def(person)
        .children
        .iter()
        .copied()
        .find(|&c| arena.def(c).kind == DefKind::Deletion)
        .unwrap();
    assert_eq!(arena.def(deletion).delete_target.as_deref(), Some("title"));
    assert!(arena.def(deletion).name.is_empty());

    let index = arena.static_child(person, "idx_code").unwrap();
    assert_eq!(arena.def(index).kind, DefKind::Index);
    let fields = arena.property_child(index, "fields").unwrap();
    let args = &arena.def(fields).args;
    assert_eq!(args.len(), 2);
    assert_eq!(args[0].direction, SortDir::Asc);
    assert_eq!(args[1].direction, SortDir::Desc);
    assert_eq!(args[1].value.as_name().unwrap().dotted(), "name");
}

#[test]
fn constraint_block() {
    let (arena, parsed) = parse(
        r#"schema app.core {
            fieldset person {
                field age { type "integer"; }
                constraint age_positive { check "age > 0" age; }
            }
        }"#,
    );
    let person = arena.static_child(parsed.root, "person").unwrap();
    let constraint = arena.static_child(person, "age_positive").unwrap();
    assert_eq!(arena.def(constraint).kind, DefKind::Constraint);
    let check = arena.property_child(constraint, "check").unwrap();
    assert_eq!(arena.def(check).args.len(), 2);
}

#[test]
fn min_classes_brackets() {
    let (arena, parsed) = parse("schema a { cluster idx[index]; }");
    let cluster = arena.property_child(parsed.root, "cluster").unwrap();
    let name = arena.def(cluster).args[0].value.as_name().unwrap();
    let set = name.min_classes.unwrap();
    assert!(set.contains(DefKind::Index));
    assert!(!set.contains(DefKind::Field));
}

#[test]
fn property_value_forms() {
    let (arena, parsed) = parse(
        r#"schema a {
            guid "g-1";
            weight 1.5;
            size 100;
            flag false;
            nothing none;
            everything all;
        }"#,
    );
    let weight = arena.property_child(parsed.root, "weight").unwrap();
    assert_eq!(arena.def(weight).args[0].value, Value::Float(1.5));
    let nothing = arena.property_child(parsed.root, "nothing").unwrap();
    assert_eq!(arena.def(nothing).args[0].value, Value::None);
    let everything = arena.property_child(parsed.root, "everything").unwrap();
    assert_eq!(arena.def(everything).args[0].value, Value::All);
}

#[test]
fn stub_fieldset() {
    let (arena, parsed) = parse("schema a { fieldset code; }");
    let code = arena.static_child(parsed.root, "code").unwrap();
    assert!(arena.def(code).children.is_empty());
}

#[test]
fn syntax_error_messages() {
    assert!(parse_err("schema a { field ; }").contains("expected name"));
    assert!(parse_err("schema a { field f }").contains("expected"));
    assert!(parse_err("fieldset a { }").contains("expected schema"));
}
