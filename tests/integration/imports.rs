//! Import discovery, data injection and rewriting through the service.

use anyhow::Result;
use serde_json::json;

use typst_prep::resolver::scratch_filename;
use typst_prep::test_utils::{TestProject, init_test_logging};
use typst_prep::{Bindings, TypstService};

use crate::common::bindings;

fn service(project: &TestProject) -> Result<TypstService> {
    init_test_logging(None);
    Ok(TypstService::new(project.config())?)
}

#[test]
fn test_transitive_imports_are_rewritten() -> Result<()> {
    let project = TestProject::new()?;
    let styles = project.write("resources/typst/Styles.typ", "#import \"colors/Palette.typ\" : *\n#let h = 1")?;
    let palette = project.write("resources/typst/colors/Palette.typ", "#let accent = red")?;
    let svc = service(&project)?;

    let resolution = svc.preprocess("#import \"Styles.typ\" : *\nBody", &Bindings::new(), None)?;

    let styles_name = scratch_filename(&styles);
    let palette_name = scratch_filename(&palette);
    assert_eq!(resolution.entrypoint, format!("#import \"{styles_name}\" : *\nBody"));
    assert_eq!(resolution.graph.len(), 2);

    let styles_file = resolution
        .files
        .iter()
        .find(|f| f.entry.scratch_filename == styles_name)
        .expect("Styles.typ resolved");
    assert_eq!(styles_file.text(), Some(format!("#import \"{palette_name}\" : *\n#let h = 1").as_str()));
    assert_eq!(styles_file.entry.original_import_path, "Styles.typ");
    Ok(())
}

#[test]
fn test_data_import_expands_and_resolves() -> Result<()> {
    let project = TestProject::new()?;
    let base = project.write("resources/typst/Invoice.typ", "#let render = [#title]")?;
    let svc = service(&project)?;
    let data = bindings(json!({"invoice": {"title": "INV-7", "lines": [1, 2]}}));

    let resolution = svc.preprocess("#!import \"Invoice.typ\" with_data: invoice\n#render", &data, None)?;

    let name = scratch_filename(&base);
    assert_eq!(
        resolution.entrypoint,
        format!(
            "#let invoice = (title: \"INV-7\", lines: (1, 2))\n#let title = \"INV-7\"\n#let lines = (1, 2)\n#import \"{name}\" : *\n#render"
        )
    );
    assert_eq!(resolution.files.len(), 1);
    Ok(())
}

#[test]
fn test_missing_binding_emits_plain_import() -> Result<()> {
    let project = TestProject::new()?;
    let svc = service(&project)?;

    let resolution = svc.preprocess("#!import \"Base.typ\" with_data: absent", &Bindings::new(), None)?;

    assert_eq!(resolution.entrypoint, "#import \"Base.typ\" : *");
    Ok(())
}

#[test]
fn test_package_prefix_resolves_from_base_path() -> Result<()> {
    let project = TestProject::new()?;
    let letterhead = project.write("resources/typst/shared/Letterhead.typ", "#let letterhead = []")?;
    let svc = service(&project)?;
    let elsewhere = project.path().join("docs");
    std::fs::create_dir_all(&elsewhere)?;

    let resolution = svc.preprocess(
        "#import \"resources/typst/shared/Letterhead.typ\" : letterhead",
        &Bindings::new(),
        Some(&elsewhere),
    )?;

    assert_eq!(
        resolution.entrypoint,
        format!("#import \"{}\" : letterhead", scratch_filename(&letterhead))
    );
    Ok(())
}

#[test]
fn test_unresolvable_imports_are_left_for_the_compiler() -> Result<()> {
    let project = TestProject::new()?;
    let svc = service(&project)?;
    let source = "#import \"Missing.typ\" : *\n#import \"/etc/passwd\" : *\n#import \"../../../../etc/hosts\" : *\n#import \"@preview/cetz:0.2.2\": canvas";

    let resolution = svc.preprocess(source, &Bindings::new(), None)?;

    assert_eq!(resolution.entrypoint, source);
    assert!(resolution.graph.is_empty());
    Ok(())
}

#[test]
fn test_cycle_terminates() -> Result<()> {
    let project = TestProject::new()?;
    let a = project.write("resources/typst/A.typ", "#import \"B.typ\" : *\n#let a = 1")?;
    let b = project.write("resources/typst/B.typ", "#import \"A.typ\" : *\n#let b = 2")?;
    let svc = service(&project)?;

    let resolution = svc.preprocess("#import \"A.typ\" : *", &Bindings::new(), None)?;

    assert_eq!(resolution.graph.len(), 2);
    let b_file = resolution
        .files
        .iter()
        .find(|f| f.entry.source_path == b)
        .expect("B.typ resolved");
    assert_eq!(b_file.text(), Some(format!("#import \"{}\" : *\n#let b = 2", scratch_filename(&a)).as_str()));
    Ok(())
}

#[test]
fn test_template_dependency_is_rendered_with_bindings() -> Result<()> {
    let project = TestProject::new()?;
    let header = project.write("resources/typst/Header.tera.typ", "#let header = [{{ company }}]")?;
    let plain = project.write("resources/typst/Plain.typ", "#let raw = [{{ company }}]")?;
    let svc = service(&project)?;
    let data = bindings(json!({"company": "ACME"}));

    let resolution = svc.preprocess(
        "#import \"Header.tera.typ\" : header\n#import \"Plain.typ\" : raw",
        &data,
        None,
    )?;

    let content_of = |path: &std::path::Path| {
        resolution
            .files
            .iter()
            .find(|f| f.entry.source_path == path)
            .and_then(|f| f.text().map(str::to_string))
    };
    assert_eq!(content_of(&header).as_deref(), Some("#let header = [ACME]"));
    assert_eq!(content_of(&plain).as_deref(), Some("#let raw = [{{ company }}]"));
    Ok(())
}
