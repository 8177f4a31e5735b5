//! End-to-end scenarios exercising the characteristic interactions of
//! inheritance, implementation trees and realization.

mod common;

use common::{compile_err, compile_ok, find};
use yasdl::foundation::DefKind;
use yasdl::ExitStatus;

/// Members merge in ancestor order and `delete` filters inherited names.
#[test]
fn member_merge_order_with_deletion() {
    let compilation = compile_ok(
        &[(
            "app.s1",
            r#"schema app.s1 {
                guid "g-s1";
                abstract fieldset a {
                    field f1 { type "char"; size 10; }
                    field f2 { type "char"; size 10; }
                    field f3 { type "char"; size 10; }
                }
                fieldset b : a {
                    delete f2;
                }
            }"#,
        )],
        &["app.s1"],
    );

    let b = find(&compilation, "app.s1.b");
    let field_members: Vec<&str> = compilation
        .arena
        .def(b)
        .members
        .iter()
        .filter(|(_, &m)| compilation.arena.def(m).kind == DefKind::Field)
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(field_members, vec!["f1", "f3"]);

    for &member in compilation.arena.def(b).members.values() {
        assert_eq!(compilation.arena.fi(member), member);
    }
}

/// An imp-name ancestor inherits through the final implementor: the
/// implementor's own properties win, everything else flows up from the
/// specification.
#[test]
fn imp_name_ancestor_follows_final_implementor() {
    let compilation = compile_ok(
        &[(
            "app.s2",
            r#"schema app.s2 {
                guid "g-s2";
                abstract field name { type "char"; size 100; }
                field firstname : =name { reqlevel "mandatory"; }
                final field goodname { implements name; type "text"; }
            }"#,
        )],
        &["app.s2"],
    );

    let name = find(&compilation, "app.s2.name");
    let firstname = find(&compilation, "app.s2.firstname");
    let goodname = find(&compilation, "app.s2.goodname");

    assert_eq!(compilation.arena.fi(name), goodname);
    assert_eq!(compilation.arena.def(firstname).ancestors, vec![goodname]);

    let info = compilation.field_info(firstname);
    assert_eq!(info.type_name.as_deref(), Some("text"));
    assert_eq!(info.size, Some(100));
    assert_eq!(info.reqlevel, "mandatory");
}

/// Stub reimplementation under a new name: static overwrites move members
/// to the current insertion point, and indexes resolve to the renamed
/// final implementors.
#[test]
fn stub_reimplementation_rename() {
    let compilation = compile_ok(
        &[(
            "app.indexes",
            r#"schema app.indexes {
                guid "g-idx";
                abstract fieldset codename {
                    field code { type "char"; size 10; }
                    field name { type "char"; size 100; }
                }
                required fieldset outer_3 : codename {
                    guid "g-outer3";
                    field code3 { implements schema.codename.code; type "char"; size 10; }
                    field name3 { implements schema.codename.name; type "char"; size 100; }
                    field code { type "char"; size 5; }
                    index uidx_code { fields code3; unique true; }
                    index idx_name { fields name3; }
                }
            }"#,
        )],
        &["app.indexes"],
    );

    let outer = find(&compilation, "app.indexes.outer_3");
    assert!(compilation.arena.def(outer).toplevel);
    assert_eq!(compilation.toplevel_fieldsets, vec![outer]);

    let field_order: Vec<String> = compilation
        .field_paths(outer)
        .iter()
        .map(|path| compilation.arena.def(*path.last().unwrap()).name.clone())
        .collect();
    assert_eq!(field_order, vec!["code3", "name3", "code"]);

    let code3 = find(&compilation, "app.indexes.outer_3.code3");
    let name3 = find(&compilation, "app.indexes.outer_3.name3");
    let indexes = compilation.indexes(outer);
    assert_eq!(indexes.len(), 2);

    let uidx = &indexes[0];
    assert_eq!(compilation.arena.def(uidx.def).name, "uidx_code");
    assert!(uidx.unique);
    assert_eq!(uidx.fields.len(), 1);
    assert_eq!(*uidx.fields[0].0.last().unwrap(), code3);

    let idx = &indexes[1];
    assert_eq!(compilation.arena.def(idx.def).name, "idx_name");
    assert!(!idx.unique);
    assert_eq!(*idx.fields[0].0.last().unwrap(), name3);
}

/// A required member of a specification that ends up hidden in the final
/// implementation is a phase-6 error.
#[test]
fn required_member_hidden_by_deletion() {
    let failure = compile_err(
        &[
            (
                "app.cmr",
                r#"schema app.cmr {
                    guid "g-cmr";
                    abstract fieldset partner {
                        required field name { type "char"; size 100; }
                        field address { type "char"; size 200; }
                    }
                    abstract fieldset customer {
                        field credit { type "numeric"; size 10; precision 2; }
                    }
                }"#,
            ),
            (
                "app.enduser",
                r#"schema app.enduser {
                    require app.cmr as cmr;
                    guid "g-enduser";
                    required fieldset client : cmr.partner cmr.customer {
                        implements all;
                        guid "g-client";
                        delete name;
                        field fullname { type "char"; size 200; }
                    }
                }"#,
            ),
        ],
        &["app.enduser"],
    );

    assert_eq!(failure.status, ExitStatus::SemanticError);
    let phase6: Vec<_> = failure
        .diagnostics
        .iter()
        .filter(|d| d.code.phase() == 6)
        .collect();
    assert!(!phase6.is_empty(), "{}", failure.render());
    assert!(phase6
        .iter()
        .any(|d| d.message.contains("app.cmr.partner.name")));
}

/// Realization propagates through `required` fieldsets and foreign-key
/// references; embedded fieldsets realize without becoming tables.
#[test]
fn realization_propagates_through_references() {
    let compilation = compile_ok(
        &[(
            "app.inv",
            r#"schema app.inv {
                guid "g-inv";
                required fieldset invoice {
                    guid "g-invoice";
                    field number { type "char"; size 20; notnull true; }
                    field issuer -> person;
                }
                fieldset person {
                    guid "g-person";
                    field name { type "char"; size 100; }
                    fieldset address {
                        field city { type "char"; size 60; }
                    }
                }
            }"#,
        )],
        &["app.inv"],
    );

    let invoice = find(&compilation, "app.inv.invoice");
    let person = find(&compilation, "app.inv.person");
    let address = find(&compilation, "app.inv.person.address");
    let city = find(&compilation, "app.inv.person.address.city");

    assert!(compilation.arena.def(invoice).toplevel);
    assert!(compilation.arena.def(person).toplevel);
    assert!(compilation.arena.def(address).realized);
    assert!(!compilation.arena.def(address).toplevel);
    assert!(compilation.arena.def(city).realized);

    let issuer = find(&compilation, "app.inv.invoice.issuer");
    let info = compilation.field_info(issuer);
    assert_eq!(info.reference, Some(person));
    assert_eq!(info.type_name.as_deref(), Some("identifier"));

    // The uncovered foreign key earns an advisory notice.
    assert!(compilation
        .diagnostics
        .iter()
        .any(|d| d.message.contains("covering index")));
}

/// An ancestor cycle stops the pipeline in phase 3; later phases never
/// run.
#[test]
fn ancestor_cycle_detected() {
    let failure = compile_err(
        &[(
            "app.cycle",
            r#"schema app.cycle {
                guid "g-cycle";
                field a : b;
                field b : c;
                field c : a;
            }"#,
        )],
        &["app.cycle"],
    );

    assert_eq!(failure.status, ExitStatus::SemanticError);
    let errors: Vec<_> = failure
        .diagnostics
        .iter()
        .filter(|d| d.severity == yasdl::Severity::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code.phase(), 3);
    assert!(errors[0].message.contains("circular ancestry"));
    // Phases 4+ were never entered.
    assert!(failure.diagnostics.iter().all(|d| d.code.phase() < 4));
}
