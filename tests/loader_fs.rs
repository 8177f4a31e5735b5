//! Filesystem loader tests: dotted names map to files on the search
//! path, canonical identities deduplicate, and the declared package name
//! must match the file location.

use std::fs;
use yasdl::{compile, CompileOptions, ExitStatus};

fn write_schema(root: &std::path::Path, relative: &str, source: &str) -> std::path::PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("schema files have parents")).expect("mkdir");
    fs::write(&path, source).expect("write schema");
    path
}

#[test]
fn loads_imports_from_the_search_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let main = write_schema(
        dir.path(),
        "app/main.yasdl",
        r#"schema app.main {
            require app.core as core;
            guid "g-main";
            required fieldset note {
                guid "g-note";
                field body : core.text_field;
            }
        }"#,
    );
    write_schema(
        dir.path(),
        "app/core.yasdl",
        r#"schema app.core {
            guid "g-core";
            abstract field text_field { type "text"; }
        }"#,
    );

    let options = CompileOptions {
        search_path: vec![dir.path().to_path_buf()],
        ..CompileOptions::new()
    };
    let compilation = compile(&[main.to_string_lossy().into_owned()], &options)
        .unwrap_or_else(|failure| panic!("{}", failure.render()));

    assert!(compilation.registry.by_package("app.core").is_some());
    let note = compilation.toplevel_fieldsets[0];
    assert_eq!(compilation.arena.path(note), "app.main.note");
}

#[test]
fn sibling_imports_resolve_relative_to_the_importing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let main = write_schema(
        dir.path(),
        "app/main.yasdl",
        r#"schema app.main { use helper; guid "g-main"; }"#,
    );
    // No search path entry points here; the importing file's directory
    // is searched first.
    write_schema(
        dir.path(),
        "app/helper.yasdl",
        r#"schema helper { guid "g-helper"; }"#,
    );

    let options = CompileOptions {
        search_path: Vec::new(),
        ..CompileOptions::default()
    };
    let compilation = compile(&[main.to_string_lossy().into_owned()], &options)
        .unwrap_or_else(|failure| panic!("{}", failure.render()));
    assert!(compilation.registry.by_package("helper").is_some());
}

#[test]
fn declared_package_must_match_location() {
    let dir = tempfile::tempdir().expect("tempdir");
    let main = write_schema(
        dir.path(),
        "app/main.yasdl",
        r#"schema app.elsewhere { guid "g-x"; }"#,
    );
    let options = CompileOptions {
        search_path: vec![dir.path().to_path_buf()],
        ..CompileOptions::new()
    };
    let failure = compile(&[main.to_string_lossy().into_owned()], &options)
        .expect_err("package/location mismatch must fail");
    assert_eq!(failure.status, ExitStatus::SemanticError);
    assert!(failure.render().contains("does not match its location"));
}

#[test]
fn missing_top_schema_is_an_input_error() {
    let options = CompileOptions::new();
    let failure = compile(&["no/such/file.yasdl".to_string()], &options)
        .expect_err("missing input must fail");
    assert_eq!(failure.status, ExitStatus::InputError);
}

#[test]
fn syntax_error_is_an_input_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let main = write_schema(
        dir.path(),
        "app/broken.yasdl",
        "schema app.broken { field ; }",
    );
    let options = CompileOptions::new();
    let failure = compile(&[main.to_string_lossy().into_owned()], &options)
        .expect_err("syntax error must fail");
    assert_eq!(failure.status, ExitStatus::InputError);
    assert!(failure.render().contains("expected name"));
}
