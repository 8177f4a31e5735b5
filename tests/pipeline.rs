//! Phase-by-phase pipeline tests: failure policies, realization rules,
//! and the quantified invariants of the annotated state.

mod common;

use common::{compile_err, compile_ok, find, try_compile};
use yasdl::foundation::DefKind;
use yasdl::{ExitStatus, Severity, StandardTypes};

fn wrap(body: &str) -> String {
    format!("schema app.t {{ guid \"g-t\"; {} }}", body)
}

fn single_err(body: &str) -> yasdl::Failure {
    compile_err(&[("app.t", &wrap(body))], &["app.t"])
}

fn has_code(failure: &yasdl::Failure, code: u16) -> bool {
    failure.diagnostics.iter().any(|d| d.code.0 == code)
}

// --- phase 1 -------------------------------------------------------------

#[test]
fn duplicate_names_in_one_block() {
    let failure = single_err("fieldset a { field x; field x; }");
    assert!(has_code(&failure, 1031), "{}", failure.render());
}

#[test]
fn deletion_target_counts_for_uniqueness() {
    let failure = single_err("fieldset a { field x; delete x; }");
    assert!(has_code(&failure, 1031), "{}", failure.render());
}

#[test]
fn reserved_word_as_name() {
    let failure = single_err("fieldset a { field rename; }");
    assert!(has_code(&failure, 1021), "{}", failure.render());
}

#[test]
fn id_is_not_a_valid_name() {
    let failure = single_err("fieldset a { field id; }");
    assert!(has_code(&failure, 1022), "{}", failure.render());
}

#[test]
fn special_property_name_as_definition() {
    let failure = single_err("fieldset a { fieldset references; }");
    assert!(has_code(&failure, 1041), "{}", failure.render());
}

#[test]
fn abstract_final_conflict() {
    let failure = single_err("abstract final fieldset a { field x; }");
    assert!(has_code(&failure, 1051), "{}", failure.render());
}

#[test]
fn implements_unresolved_name() {
    let failure = single_err("field a { implements nosuch; }");
    assert!(has_code(&failure, 1065), "{}", failure.render());
}

#[test]
fn implements_self_is_rejected() {
    let failure = single_err("field a { implements a; }");
    assert!(has_code(&failure, 1066), "{}", failure.render());
}

#[test]
fn implements_kind_mismatch() {
    let failure = single_err("fieldset fs { field x; } field a { implements fs; }");
    // The statically restricted search cannot see the fieldset at all.
    assert!(has_code(&failure, 1065), "{}", failure.render());
}

#[test]
fn implements_cycle() {
    let failure = single_err(
        "field a { implements b; } field b { implements c; } field c { implements a; }",
    );
    assert!(has_code(&failure, 1071), "{}", failure.render());
}

// --- phase 2 -------------------------------------------------------------

#[test]
fn multiple_implementors_rejected() {
    let failure = single_err(
        "field spec; field one { implements spec; } field two { implements spec; }",
    );
    assert!(has_code(&failure, 2011), "{}", failure.render());
}

#[test]
fn implemented_definition_with_imp_ancestor() {
    let failure = single_err(
        "field base; field a : =base; field b { implements a; }",
    );
    assert!(has_code(&failure, 2021), "{}", failure.render());
}

#[test]
fn abstract_required_needs_an_implementation() {
    let failure = single_err("abstract required fieldset a { field x; }");
    assert!(has_code(&failure, 2041), "{}", failure.render());
}

#[test]
fn final_definition_cannot_be_implemented() {
    let failure = single_err(
        "final field spec; field imp { implements spec; }",
    );
    assert!(has_code(&failure, 2042), "{}", failure.render());
}

#[test]
fn implementation_tree_containment() {
    let failure = single_err(
        "fieldset outer { fieldset inner { field x; } implements inner; }",
    );
    // Reported as static containment while the implements binding runs.
    assert!(has_code(&failure, 1067), "{}", failure.render());
}

// --- phase 3 -------------------------------------------------------------

#[test]
fn self_ancestry_is_rejected() {
    let failure = single_err("fieldset x : x;");
    assert!(has_code(&failure, 3017), "{}", failure.render());
}

#[test]
fn shadowing_ancestor_idiom_binds_outward() {
    let compilation = compile_ok(
        &[(
            "app.t",
            r#"schema app.t {
                guid "g-t";
                abstract fieldset location { field city { type "char"; size 60; } }
                fieldset site {
                    fieldset location : location;
                }
            }"#,
        )],
        &["app.t"],
    );
    let outer = find(&compilation, "app.t.location");
    let inner = find(&compilation, "app.t.site.location");
    assert_eq!(compilation.arena.def(inner).ancestors, vec![outer]);
}

#[test]
fn unused_deletion_warns() {
    let compilation = compile_ok(
        &[(
            "app.t",
            &wrap("fieldset a { field x { type \"char\"; size 1; } delete nothere; }"),
        )],
        &["app.t"],
    );
    assert!(compilation
        .diagnostics
        .iter()
        .any(|d| d.code.0 == 3071 && d.severity == Severity::Warning));
}

// --- phase 4 -------------------------------------------------------------

#[test]
fn unresolved_property_name() {
    let failure = single_err(
        "required fieldset a { guid \"g-a\"; field x { type \"char\"; size 1; } \
         index i { fields nosuch; } }",
    );
    assert!(has_code(&failure, 4022), "{}", failure.render());
}

#[test]
fn reference_to_nested_fieldset() {
    let failure = single_err(
        "required fieldset a { guid \"g-a\"; field x -> b.inner; } \
         fieldset b { guid \"g-b\"; fieldset inner { field y { type \"char\"; size 1; } } }",
    );
    assert!(has_code(&failure, 4031), "{}", failure.render());
}

#[test]
fn reference_to_enclosing_fieldset() {
    let failure = single_err(
        "required fieldset a { guid \"g-a\"; field x -> a; field y { type \"char\"; size 1; } }",
    );
    assert!(has_code(&failure, 4032), "{}", failure.render());
}

#[test]
fn index_without_fields_property() {
    let failure = single_err(
        "required fieldset a { guid \"g-a\"; field x { type \"char\"; size 1; } \
         index i { unique true; } }",
    );
    assert!(has_code(&failure, 4041), "{}", failure.render());
}

#[test]
fn index_on_foreign_field() {
    let failure = single_err(
        "required fieldset a { guid \"g-a\"; field x { type \"char\"; size 1; } } \
         required fieldset b { guid \"g-b\"; field y { type \"char\"; size 1; } \
         index i { fields a.x; } }",
    );
    assert!(has_code(&failure, 4044), "{}", failure.render());
}

#[test]
fn index_duplicate_field() {
    let failure = single_err(
        "required fieldset a { guid \"g-a\"; field x { type \"char\"; size 1; } \
         index i { fields x x; } }",
    );
    assert!(has_code(&failure, 4045), "{}", failure.render());
}

#[test]
fn constraints_resolve_their_field_arguments() {
    let compilation = compile_ok(
        &[(
            "app.t",
            r#"schema app.t {
                guid "g-t";
                required fieldset person {
                    guid "g-person";
                    field age { type "integer"; }
                    constraint age_positive { check "age > 0" age; }
                }
            }"#,
        )],
        &["app.t"],
    );
    let person = find(&compilation, "app.t.person");
    let age = find(&compilation, "app.t.person.age");
    let constraints = compilation.constraints(person);
    assert_eq!(constraints.len(), 1);
    assert_eq!(constraints[0].check.len(), 2);
    assert_eq!(constraints[0].check[1].resolved, Some(age));
}

#[test]
fn constraint_requires_check() {
    let failure = single_err(
        "required fieldset a { guid \"g-a\"; field x { type \"char\"; size 1; } \
         constraint c { label \"x\"; } }",
    );
    assert!(has_code(&failure, 4051), "{}", failure.render());
}

// --- phase 5 -------------------------------------------------------------

#[test]
fn plain_use_does_not_propagate_realization() {
    let compilation = compile_ok(
        &[
            (
                "app.main",
                r#"schema app.main {
                    use app.lib as lib;
                    guid "g-main";
                    required fieldset own {
                        guid "g-own";
                        field x : lib.tag;
                    }
                }"#,
            ),
            (
                "app.lib",
                r#"schema app.lib {
                    guid "g-lib";
                    abstract field tag { type "char"; size 10; }
                    required fieldset unused_here {
                        guid "g-unused";
                        field y { type "char"; size 1; }
                    }
                }"#,
            ),
        ],
        &["app.main"],
    );
    let own = find(&compilation, "app.main.own");
    let foreign = find(&compilation, "app.lib.unused_here");
    assert!(compilation.arena.def(own).toplevel);
    assert!(!compilation.arena.def(foreign).realized);
    assert!(!compilation.registry.by_package("app.lib").unwrap().realized);
}

#[test]
fn require_propagates_realization() {
    let compilation = compile_ok(
        &[
            (
                "app.main",
                r#"schema app.main { require app.lib as lib; guid "g-main"; }"#,
            ),
            (
                "app.lib",
                r#"schema app.lib {
                    guid "g-lib";
                    required fieldset stamp {
                        guid "g-stamp";
                        field at { type "datetime"; }
                    }
                }"#,
            ),
        ],
        &["app.main"],
    );
    let stamp = find(&compilation, "app.lib.stamp");
    assert!(compilation.arena.def(stamp).toplevel);
    assert!(compilation.registry.by_package("app.lib").unwrap().realized);
}

#[test]
fn required_fieldset_with_nested_final_implementation() {
    let failure = single_err(
        "required fieldset spec { guid \"g-s\"; field x { type \"char\"; size 1; } } \
         fieldset holder { guid \"g-h\"; fieldset nested { implements spec; \
         field x { type \"char\"; size 1; } } }",
    );
    assert!(has_code(&failure, 5011), "{}", failure.render());
}

#[test]
fn realized_abstract_member_without_implementation() {
    let failure = single_err(
        "required fieldset a { guid \"g-a\"; field x { type \"char\"; size 1; } \
         abstract fieldset part { field y { type \"char\"; size 1; } } }",
    );
    assert!(has_code(&failure, 5031), "{}", failure.render());
}

// --- phase 7 -------------------------------------------------------------

#[test]
fn toplevel_fieldset_needs_a_realized_field() {
    let failure = single_err("required fieldset a { guid \"g-a\"; label \"empty\"; }");
    assert!(has_code(&failure, 7011), "{}", failure.render());
}

#[test]
fn realized_field_needs_a_type() {
    let failure = single_err("required fieldset a { guid \"g-a\"; field x; }");
    assert!(has_code(&failure, 7054), "{}", failure.render());
}

#[test]
fn referencing_field_type_must_be_identifier() {
    let failure = single_err(
        "required fieldset a { guid \"g-a\"; field x -> b { type \"char\"; } } \
         fieldset b { guid \"g-b\"; field y { type \"char\"; size 1; } }",
    );
    assert!(has_code(&failure, 7052), "{}", failure.render());
}

#[test]
fn notnull_outside_a_field() {
    let failure = single_err(
        "required fieldset a { guid \"g-a\"; notnull true; field x { type \"char\"; size 1; } }",
    );
    assert!(has_code(&failure, 7081), "{}", failure.render());
}

#[test]
fn duplicate_guid() {
    let failure = single_err(
        "required fieldset a { guid \"dup\"; field x { type \"char\"; size 1; } } \
         required fieldset b { guid \"dup\"; field y { type \"char\"; size 1; } }",
    );
    assert!(has_code(&failure, 7112), "{}", failure.render());
}

#[test]
fn toplevel_fieldset_needs_a_guid() {
    let failure = single_err("required fieldset a { field x { type \"char\"; size 1; } }");
    assert!(has_code(&failure, 7192), "{}", failure.render());
}

#[test]
fn setnull_conflicts_with_notnull() {
    let failure = single_err(
        "required fieldset a { guid \"g-a\"; field x -> b { notnull true; } \
         field z { type \"char\"; size 1; } } \
         fieldset b { guid \"g-b\"; ondelete \"setnull\"; \
         field y { type \"char\"; size 1; } }",
    );
    assert!(has_code(&failure, 7181), "{}", failure.render());
}

#[test]
fn missing_language_warns_but_compiles() {
    let result = try_compile(
        &[(
            "app.nolang",
            r#"schema app.nolang { guid "g-nl"; }"#,
        )],
        &["app.nolang"],
    );
    let compilation = result.expect("warnings must not fail the build");
    assert!(compilation
        .diagnostics
        .iter()
        .any(|d| d.code.0 == 7141 && d.severity == Severity::Warning));
    assert_eq!(
        compilation.language(find(&compilation, "app.nolang")),
        "en"
    );
}

// --- phase 8 -------------------------------------------------------------

#[test]
fn driver_checks_type_support_and_size() {
    let mut fetcher = yasdl::MemoryFetcher::new();
    fetcher.add(
        "app.t",
        &wrap(
            "required fieldset a { guid \"g-a\"; \
             field x { type \"char\"; } \
             field y { type \"blob5\"; size 1; } }",
        ),
    );
    let types = StandardTypes;
    let options = yasdl::CompileOptions {
        types: Some(&types),
        ..yasdl::CompileOptions::new()
    };
    let failure = yasdl::compile_with(&["app.t".to_string()], &fetcher, &options)
        .expect_err("driver checks must fail");
    assert!(has_code(&failure, 8011), "{}", failure.render());
    assert!(has_code(&failure, 8012), "{}", failure.render());
    assert_eq!(failure.status, ExitStatus::SemanticError);
}

// --- venus ---------------------------------------------------------------

#[test]
fn venus_base_definitions_are_inheritable() {
    let compilation = compile_ok(
        &[(
            "app.t",
            r#"schema app.t {
                guid "g-t";
                required fieldset card {
                    guid "g-card";
                    field caption : venus.displaylabel;
                }
            }"#,
        )],
        &["app.t"],
    );
    let caption = find(&compilation, "app.t.card.caption");
    let info = compilation.field_info(caption);
    assert_eq!(info.type_name.as_deref(), Some("char"));
    assert_eq!(info.size, Some(200));
    assert!(compilation.arena.def(caption).realized);
}

// --- strict mode ---------------------------------------------------------

#[test]
fn strict_mode_promotes_warnings() {
    let mut fetcher = yasdl::MemoryFetcher::new();
    fetcher.add("app.nolang", r#"schema app.nolang { guid "g-nl"; }"#);
    let options = yasdl::CompileOptions {
        strict: true,
        ..yasdl::CompileOptions::new()
    };
    let failure = yasdl::compile_with(&["app.nolang".to_string()], &fetcher, &options)
        .expect_err("strict mode must fail on warnings");
    assert_eq!(failure.status, ExitStatus::SemanticError);
    assert!(failure
        .diagnostics
        .iter()
        .all(|d| d.severity != Severity::Error));
}

// --- invariants ----------------------------------------------------------

fn rich_schema() -> yasdl::Compilation {
    compile_ok(
        &[(
            "app.rich",
            r#"schema app.rich {
                guid "g-rich";
                abstract field label { type "char"; size 100; }
                final field title { implements label; type "text"; }
                abstract fieldset codename {
                    field code { type "char"; size 10; }
                }
                required fieldset item : codename {
                    guid "g-item";
                    field caption : =label;
                    field code2 { implements schema.codename.code; type "char"; size 10; }
                    field owner -> holder { need_index false; }
                    index idx { fields code2; }
                }
                fieldset holder {
                    guid "g-holder";
                    field name { type "char"; size 100; }
                }
            }"#,
        )],
        &["app.rich"],
    )
}

#[test]
fn final_implementor_is_idempotent_and_total() {
    let compilation = rich_schema();
    for id in compilation.arena.ids() {
        let def = compilation.arena.def(id);
        if !def.is_structural() {
            continue;
        }
        let fi = compilation.arena.fi(id);
        assert_eq!(compilation.arena.fi(fi), fi, "fi not idempotent at {}", id);
        // Exactly one of: own final implementor, or has a direct one.
        assert_ne!(
            fi == id,
            def.direct_implementor.is_some(),
            "fi/direct_implementor disagree at {}",
            id
        );
    }
}

#[test]
fn ancestors_never_contain_each_other() {
    let compilation = rich_schema();
    for id in compilation.arena.ids() {
        for &anc in &compilation.arena.def(id).ancestors {
            assert_ne!(anc, id);
            assert!(!compilation.arena.owns(anc, id));
            assert!(!compilation.arena.owns(id, anc));
        }
    }
}

#[test]
fn members_are_final_implementations() {
    let compilation = rich_schema();
    for id in compilation.arena.ids() {
        for &member in compilation.arena.def(id).members.values() {
            assert_eq!(compilation.arena.fi(member), member);
        }
    }
}

#[test]
fn no_realized_abstract_final_implementation() {
    let compilation = rich_schema();
    for id in compilation.arena.ids() {
        let def = compilation.arena.def(id);
        if def.realized && def.modifiers.is_abstract() {
            assert_ne!(compilation.arena.fi(id), id);
        }
    }
}

#[test]
fn realized_referencing_fields_have_identifier_type() {
    let compilation = rich_schema();
    for id in compilation.arena.ids() {
        let def = compilation.arena.def(id);
        if def.kind == DefKind::Field
            && def.realized
            && compilation.arena.referenced_fieldset(id).is_some()
        {
            assert_eq!(compilation.field_type(id).as_deref(), Some("identifier"));
        }
    }
}

#[test]
fn guid_map_collects_every_carrier() {
    let compilation = rich_schema();
    let map = compilation.guid_map();
    // venus, the schema, and the two guid-carrying fieldsets.
    assert_eq!(map.len(), 4);
    assert_eq!(map.get("g-item").map(String::as_str), Some("app.rich.item"));
    let json = compilation.guid_map_json().expect("serializable");
    assert!(json.contains("g-holder"));
}
